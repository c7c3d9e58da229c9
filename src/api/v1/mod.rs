/*
 * Responsibility
 * - v1 の公開ポイント (routes() の re-export など)
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;
pub mod validator;

pub use routes::routes;
