use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::models::{Identity, User};

/// The caller's `Identity`, as resolved by the access middleware.
///
/// Missing extension means the access middleware is not wired in front of the
/// route; that is reported as 401 rather than silently treated as anonymous.
#[derive(Debug, Clone)]
pub struct AuthCtx(pub Identity);

impl AuthCtx {
    /// The authenticated user, or `AuthenticationRequired` for anonymous callers.
    pub fn require_user(&self) -> Result<&User, AppError> {
        self.0.user().ok_or(AppError::AuthenticationRequired)
    }
}

impl<S> FromRequestParts<S> for AuthCtx
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthCtx)
            .ok_or(AppError::AuthenticationRequired)
    }
}
