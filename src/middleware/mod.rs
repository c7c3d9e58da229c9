/*
 * Responsibility
 * - middleware の公開インターフェース
 * - http: request id / trace / body limit / timeout / panic recovery
 * - metrics: request counters (http layer のさらに外側)
 * - rate_limit: per-client admission (outermost app-level layer)
 * - auth: access (Identity 解決) と gates (activation / permission)
 */
pub mod auth;
pub mod http;
pub mod metrics;
pub mod rate_limit;
