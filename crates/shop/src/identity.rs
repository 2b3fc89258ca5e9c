//! Cart identity resolution.
//!
//! Authenticated callers are identified by the user ID the (out-of-scope)
//! auth system stored in the session. Everyone else gets an opaque anonymous
//! token, issued once and persisted in the session, so a guest keeps the
//! same cart across requests. Downstream code only ever sees a
//! [`CartOwner`].

use tower_sessions::Session;
use uuid::Uuid;

use covey_core::UserId;

use crate::error::AppError;
use crate::models::{CartOwner, session_keys};

/// Resolve the caller's cart owner, issuing an anonymous token if needed.
///
/// # Errors
///
/// Returns [`AppError::Internal`] if the session store fails.
pub async fn resolve_owner(session: &Session) -> Result<CartOwner, AppError> {
    if let Some(user_id) = session
        .get::<UserId>(session_keys::USER_ID)
        .await
        .map_err(session_error)?
    {
        return Ok(CartOwner::User(user_id));
    }

    if let Some(token) = session
        .get::<String>(session_keys::ANON_TOKEN)
        .await
        .map_err(session_error)?
    {
        return Ok(CartOwner::Anonymous(token));
    }

    let token = Uuid::new_v4().simple().to_string();
    session
        .insert(session_keys::ANON_TOKEN, &token)
        .await
        .map_err(session_error)?;
    Ok(CartOwner::Anonymous(token))
}

/// The caller's authenticated user ID.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] for anonymous callers.
pub async fn require_user(session: &Session) -> Result<UserId, AppError> {
    session
        .get::<UserId>(session_keys::USER_ID)
        .await
        .map_err(session_error)?
        .ok_or_else(|| AppError::Unauthorized("login required".to_owned()))
}

/// The caller's anonymous token, if one has been issued.
///
/// Used by cart merge to locate the guest cart being absorbed.
///
/// # Errors
///
/// Returns [`AppError::Internal`] if the session store fails.
pub async fn anon_token(session: &Session) -> Result<Option<String>, AppError> {
    session
        .get::<String>(session_keys::ANON_TOKEN)
        .await
        .map_err(session_error)
}

/// Require the admin flag set by the admin authentication system.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admin callers.
pub async fn require_admin(session: &Session) -> Result<(), AppError> {
    let is_admin = session
        .get::<bool>(session_keys::IS_ADMIN)
        .await
        .map_err(session_error)?
        .unwrap_or(false);
    if is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("admin access required".to_owned()))
    }
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session store failure: {e}"))
}
