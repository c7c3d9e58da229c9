/*
 * Responsibility
 * - Domain types shared by repos / services / handlers
 * - No I/O here; persistence lives in repos, HTTP shapes live in api::v1::dto
 */
pub mod movie;
pub mod permission;
pub mod token;
pub mod user;

pub use movie::{Filters, Metadata, Movie, Runtime};
pub use permission::PermissionSet;
pub use token::{Scope, Token};
pub use user::{Identity, User};
