/*
 * Responsibility
 * - 全リクエストの受信数 / 応答数 / 処理時間 (µs) / status 別応答数を数える
 * - http layer の外側に掛けるので timeout (408) や panic (500) の応答も数に入る
 */
use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};
use tokio::time::Instant;

use crate::services::metrics::RequestMetrics;

pub fn apply(router: Router, metrics: RequestMetrics) -> Router {
    router.layer(middleware::from_fn_with_state(metrics, metrics_middleware))
}

async fn metrics_middleware(
    State(metrics): State<RequestMetrics>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    metrics.record_received();

    let response = next.run(req).await;

    metrics.record_response(response.status().as_u16(), started.elapsed());
    response
}
