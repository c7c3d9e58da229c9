/*
 * Responsibility
 * - GET /v1/healthcheck (疎通用, 認証不要)
 * - environment / version を返す
 */
use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub environment: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub system_info: SystemInfo,
}

pub async fn healthcheck(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "available",
        system_info: SystemInfo {
            environment: state.config.app_env.as_str(),
            version: env!("CARGO_PKG_VERSION"),
        },
    })
}
