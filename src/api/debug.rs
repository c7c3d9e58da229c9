/*
 * Responsibility
 * - GET /debug/vars: 稼働中プロセスの内部状態 (version, request metrics, pool, limiter, background tasks)
 * - /v1 の外。rate limit と access middleware は他の route と同じく通る
 */
use axum::{Json, extract::State};
use serde::Serialize;

use crate::{services::metrics::MetricsSnapshot, state::AppState};

#[derive(Debug, Serialize)]
pub struct DatabaseStats {
    pub connections: u32,
    pub idle: usize,
    pub max_connections: u32,
}

#[derive(Debug, Serialize)]
pub struct DebugVars {
    pub version: &'static str,
    pub timestamp: i64,
    pub cpus: usize,
    pub background_tasks: usize,
    pub rate_limited_clients: usize,
    /// `null` when running on in-memory stores.
    pub database: Option<DatabaseStats>,
    #[serde(flatten)]
    pub requests: MetricsSnapshot,
}

pub async fn debug_vars(State(state): State<AppState>) -> Json<DebugVars> {
    let database = state.db.as_ref().map(|pool| DatabaseStats {
        connections: pool.size(),
        idle: pool.num_idle(),
        max_connections: pool.options().get_max_connections(),
    });

    Json(DebugVars {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        cpus: std::thread::available_parallelism().map_or(1, usize::from),
        background_tasks: state.tasks.outstanding(),
        rate_limited_clients: state.limiter.tracked_clients(),
        database,
        requests: state.metrics.snapshot(),
    })
}
