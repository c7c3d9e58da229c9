//! HTTP-level middleware (cross-cutting concerns).
//!
//! Responsibility:
//! - Request-Id generation + propagation (X-Request-Id)
//! - Access logging / request tracing (TraceLayer)
//! - Body size limits
//! - Global timeout (`REQUEST_TIMEOUT_SECONDS`)
//! - Panic recovery: a panicking handler becomes a 500 JSON response and the
//!   connection is closed

use std::any::Any;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::{HeaderValue, StatusCode, header, header::HeaderName};
use axum::response::{IntoResponse, Json, Response};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::error::{AppError, ErrorBody, ErrorResponse};

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Apply HTTP-level middleware to the given Router.
pub fn apply(router: Router, request_timeout: Duration) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    let layers = ServiceBuilder::new()
        // Make the service error `Infallible` by converting errors into responses.
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                timeout_response()
            } else {
                tracing::error!(error = %err, "unhandled middleware error");
                AppError::Internal.into_response()
            }
        }))
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response));

    router.layer(layers)
}

fn timeout_response() -> Response {
    let body = ErrorResponse {
        error: ErrorBody {
            code: "REQUEST_TIMEOUT",
            message: "the request took too long to process".to_string(),
            fields: None,
        },
    };
    (StatusCode::REQUEST_TIMEOUT, Json(body)).into_response()
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = %detail, "handler panicked");

    let mut response = AppError::Internal.into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
