/*
 * Responsibility
 * - handler 向け extractor の公開ポイント
 */
pub mod auth_ctx;
pub mod json;

pub use auth_ctx::AuthCtx;
pub use json::ApiJson;
