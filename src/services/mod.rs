/*
 * Responsibility
 * - handler から呼ばれるドメインサービス群
 * - auth: password hashing, opaque tokens, bearer resolution
 * - rate_limit / background / notifier / metrics: process-wide components held in AppState
 */
pub mod auth;
pub mod background;
pub mod metrics;
pub mod notifier;
pub mod rate_limit;
