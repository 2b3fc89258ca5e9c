//! HTTP client for the hosted payment gateway.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::PaymentConfig;

use super::{CreateSessionRequest, GatewaySession, PaymentError, PaymentGateway};

/// Reqwest-based client for the gateway's REST API.
pub struct HostedGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: String,
}

impl HostedGateway {
    /// Create a client from the payment configuration.
    #[must_use]
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        }
    }

    async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(PaymentError::Gateway {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentGateway for HostedGateway {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<GatewaySession, PaymentError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_owned(), request.amount.to_string()),
            ("success_url".to_owned(), request.success_url),
            ("cancel_url".to_owned(), request.cancel_url),
        ];
        for (key, value) in request.metadata {
            form.push((format!("metadata[{key}]"), value));
        }

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .form(&form)
            .send()
            .await?;
        let response = Self::error_for_status(response).await?;

        let session: SessionResponse = response.json().await?;
        Ok(GatewaySession {
            id: session.id,
            redirect_url: session.url,
        })
    }

    async fn refund(&self, payment_id: &str) -> Result<(), PaymentError> {
        let response = self
            .http
            .post(format!("{}/v1/refunds", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .form(&[("payment", payment_id)])
            .send()
            .await?;
        Self::error_for_status(response).await?;
        Ok(())
    }
}
