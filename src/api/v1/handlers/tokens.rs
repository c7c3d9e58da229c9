/*
 * Responsibility
 * - POST /v1/tokens/authentication (login)
 * - DELETE /v1/tokens/authentication (logout: caller の authentication token を全削除)
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::v1::{
        dto::tokens::{AuthTokenResponse, CreateAuthTokenRequest},
        extractors::{ApiJson, AuthCtx},
    },
    error::AppError,
    models::Scope,
    repos::RepoError,
    services::auth::password::verify_placeholder_blocking,
    state::AppState,
};

pub async fn create_authentication_token(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateAuthTokenRequest>,
) -> Result<(StatusCode, Json<AuthTokenResponse>), AppError> {
    req.validate()?;

    let user = match state.users.get_by_email(&req.email).await {
        Ok(user) => user,
        Err(RepoError::NotFound) => {
            // Unknown email pays the same Argon2 cost as a wrong password
            verify_placeholder_blocking(req.password).await?;
            return Err(AppError::InvalidCredentials);
        }
        Err(err) => return Err(err.into()),
    };

    if !user.password.matches_blocking(req.password).await? {
        tracing::debug!(user_id = %user.id, "password mismatch");
        return Err(AppError::InvalidCredentials);
    }

    let token = state
        .tokens
        .issue(user.id, state.config.auth_token_ttl, Scope::Authentication)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthTokenResponse {
            authentication_token: token,
        }),
    ))
}

pub async fn delete_authentication_tokens(
    State(state): State<AppState>,
    ctx: AuthCtx,
) -> Result<StatusCode, AppError> {
    let user = ctx.require_user()?;

    state
        .tokens
        .delete_all_for_scope(Scope::Authentication, user.id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
