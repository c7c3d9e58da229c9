//! Per-client admission, applied outside authentication.
//!
//! The client key is the peer IP from `ConnectInfo`. A request without a peer
//! address is a wiring error and fails with 500 before the limiter is asked.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, State, rejection::ExtensionRejection},
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::rate_limit::ClientRateLimiter;
use crate::state::AppState;

pub fn apply(router: Router<AppState>, limiter: Arc<ClientRateLimiter>) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
}

async fn rate_limit_middleware(
    State(limiter): State<Arc<ClientRateLimiter>>,
    peer: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !limiter.is_enabled() {
        return Ok(next.run(req).await);
    }

    let ConnectInfo(addr) = peer.map_err(|err| {
        tracing::error!(error = %err, "peer address unavailable for rate limiting");
        AppError::Internal
    })?;

    let client = addr.ip().to_string();
    if !limiter.allow(&client) {
        tracing::warn!(client = %client, "rate limit exceeded");
        return Err(AppError::RateLimitExceeded);
    }

    Ok(next.run(req).await)
}
