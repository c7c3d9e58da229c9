//! `Authorization` header → `Identity`.
//!
//! - no header                          → Anonymous
//! - anything but `Bearer <token>`      → InvalidAuthenticationToken
//! - token fails the syntactic check    → InvalidAuthenticationToken
//! - unknown / expired / wrong scope    → InvalidAuthenticationToken
//! - any other store failure            → Internal
//! - otherwise                          → User

use axum::http::HeaderValue;
use tracing::{debug, error};

use crate::{
    error::AppError,
    models::{Identity, Scope},
    services::auth::token_issuer::{TokenError, TokenIssuer},
};

pub async fn authenticate(
    header: Option<&HeaderValue>,
    tokens: &TokenIssuer,
) -> Result<Identity, AppError> {
    let Some(header) = header else {
        return Ok(Identity::Anonymous);
    };

    let token = bearer_token(header).ok_or_else(|| {
        debug!("Malformed Authorization header");
        AppError::InvalidAuthenticationToken
    })?;

    if let Err(reason) = TokenIssuer::validate_plaintext(token) {
        debug!(reason, "Bearer token failed validation");
        return Err(AppError::InvalidAuthenticationToken);
    }

    match tokens.resolve(Scope::Authentication, token).await {
        Ok(user) => Ok(Identity::User(user)),
        Err(TokenError::NotFound) => Err(AppError::InvalidAuthenticationToken),
        Err(err) => {
            error!(error = ?err, "Failed to resolve authentication token");
            Err(AppError::Internal)
        }
    }
}

/// Exactly two space-separated parts, the first being `Bearer`.
fn bearer_token(header: &HeaderValue) -> Option<&str> {
    let value = header.to_str().ok()?;
    let mut parts = value.split(' ');

    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}
