//! Authorization header → `Identity` in request extensions.
//!
//! Runs for every request. A missing header yields `Identity::Anonymous`;
//! whether anonymous callers may proceed is decided later by the route's gates.
//! Every response, success or failure, carries `Vary: Authorization`.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use crate::services::auth::authenticate;
use crate::state::AppState;

/// Apply the access middleware to every route of `router`.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let resolved = authenticate(req.headers().get(header::AUTHORIZATION), &state.tokens).await;

    let mut response = match resolved {
        Ok(identity) => {
            // middleware → extractor / gate への受け渡し
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(err) => {
            tracing::warn!(error = %err, "authentication failed");
            err.into_response()
        }
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("authorization"));
    response
}
