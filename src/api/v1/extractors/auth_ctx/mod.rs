/*!
 * Caller identity extractor
 *
 * Responsibility:
 * - access middleware が extensions に入れた Identity を handler に渡す
 * - 認可 (activation / permission) は gates の責務。ここでは判定しない
 */

mod core;

pub use core::AuthCtx;
