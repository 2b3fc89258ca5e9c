//! Webhook signature verification.
//!
//! Notifications carry a `t=<unix>,v1=<hex hmac>` header. The signed payload
//! is `"{timestamp}.{body}"`, authenticated with HMAC-SHA256 under the
//! webhook secret. Stale timestamps are rejected to blunt replay of captured
//! deliveries.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signed notification, in seconds.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Signature verification failures. All map to a non-retryable 400.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("malformed signature header")]
    MalformedHeader,

    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,

    #[error("signature mismatch")]
    Mismatch,
}

/// Verifies webhook signatures against the shared gateway secret.
pub struct SignatureVerifier {
    secret: SecretString,
}

impl SignatureVerifier {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verify `header` against `payload`.
    ///
    /// # Errors
    ///
    /// Returns a [`SignatureError`] when the header cannot be parsed, the
    /// timestamp is outside tolerance, or the HMAC does not match.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), SignatureError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// [`Self::verify`] with an explicit clock, for tests.
    pub fn verify_at(
        &self,
        payload: &[u8],
        header: &str,
        now: i64,
    ) -> Result<(), SignatureError> {
        let (timestamp, signature) = parse_header(header)?;

        if (now - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
            return Err(SignatureError::StaleTimestamp);
        }

        let signature = hex::decode(signature).map_err(|_| SignatureError::MalformedHeader)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::Mismatch)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        // verify_slice is constant-time.
        mac.verify_slice(&signature)
            .map_err(|_| SignatureError::Mismatch)
    }
}

fn parse_header(header: &str) -> Result<(i64, &str), SignatureError> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(t), Some(s)) if !s.is_empty() => Ok((t, s)),
        _ => Err(SignatureError::MalformedHeader),
    }
}

/// Compute the signature header for `payload` at `timestamp`.
///
/// Used by tests and by the local development gateway stub.
#[must_use]
pub fn sign(secret: &str, payload: &[u8], timestamp: i64) -> String {
    #[allow(clippy::expect_used)]
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let hex = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_k4qQ9mZx27TbV5nR8pLwY3cF6hJdS1aG";

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SecretString::from(SECRET))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"event":"payment.succeeded"}"#;
        let now = chrono::Utc::now().timestamp();
        let header = sign(SECRET, payload, now);
        verifier().verify_at(payload, &header, now).expect("valid");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = br#"{"event":"payment.succeeded"}"#;
        let now = chrono::Utc::now().timestamp();
        let header = sign("whsec_other_secret_value_x9Y8z7W6v5U4", payload, now);
        let err = verifier()
            .verify_at(payload, &header, now)
            .expect_err("mismatch");
        assert!(matches!(err, SignatureError::Mismatch));
    }

    #[test]
    fn test_modified_payload_rejected() {
        let payload = br#"{"event":"payment.succeeded"}"#;
        let tampered = br#"{"event":"payment.succeeded","amount":"0"}"#;
        let now = chrono::Utc::now().timestamp();
        let header = sign(SECRET, payload, now);
        let err = verifier()
            .verify_at(tampered, &header, now)
            .expect_err("mismatch");
        assert!(matches!(err, SignatureError::Mismatch));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let now = chrono::Utc::now().timestamp();
        let header = sign(SECRET, payload, now - 600);
        let err = verifier()
            .verify_at(payload, &header, now)
            .expect_err("stale");
        assert!(matches!(err, SignatureError::StaleTimestamp));
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let payload = b"{}";
        let now = chrono::Utc::now().timestamp();
        for header in ["", "garbage", "t=123", "v1=abcd", "t=notanumber,v1=abcd"] {
            let err = verifier()
                .verify_at(payload, header, now)
                .expect_err("malformed");
            assert!(matches!(err, SignatureError::MalformedHeader), "{header}");
        }
    }
}
