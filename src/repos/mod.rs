/*
 * Responsibility
 * - Store contracts consumed by services and handlers
 * - Postgres implementations live next to this file; memory.rs backs dev mode and tests
 * - Implementations own their own timeouts only when asked; TokenIssuer / gates bound calls themselves
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Filters, Metadata, Movie, PermissionSet, Scope, Token, User};

pub mod error;
pub mod memory;
pub mod movie_repo;
pub mod permission_repo;
pub mod token_repo;
pub mod user_repo;

pub use error::{RepoError, RepoResult};
pub use memory::MemoryStore;
pub use movie_repo::MovieRepo;
pub use permission_repo::PermissionRepo;
pub use token_repo::TokenRepo;
pub use user_repo::UserRepo;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fills `id`, `created_at` and `version` on success.
    async fn insert(&self, user: &mut User) -> RepoResult<()>;
    /// `insert` plus the initial permission grant, committed together.
    /// On error neither the user nor any grant is stored.
    async fn insert_with_permissions(
        &self,
        user: &mut User,
        codes: &[&'static str],
    ) -> RepoResult<()>;
    async fn get_by_email(&self, email: &str) -> RepoResult<User>;
    /// Optimistic update keyed on `(id, version)`; bumps `version` on success.
    async fn update(&self, user: &mut User) -> RepoResult<()>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &Token) -> RepoResult<()>;
    /// The owner of an unexpired token with this hash and scope.
    async fn lookup(&self, hash: &[u8], scope: Scope, now: DateTime<Utc>) -> RepoResult<User>;
    async fn delete_all_for_scope(&self, scope: Scope, user_id: Uuid) -> RepoResult<u64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get_all_for_user(&self, user_id: Uuid) -> RepoResult<PermissionSet>;
    async fn add_for_user(&self, user_id: Uuid, codes: &[&'static str]) -> RepoResult<()>;
}

/// Filtering for `MovieStore::list`.
#[derive(Debug, Clone, Default)]
pub struct MovieQuery {
    pub title: String,
    pub genres: Vec<String>,
    pub filters: Filters,
}

#[async_trait]
pub trait MovieStore: Send + Sync {
    async fn insert(&self, movie: &mut Movie) -> RepoResult<()>;
    async fn get(&self, id: i64) -> RepoResult<Movie>;
    async fn list(&self, query: &MovieQuery) -> RepoResult<(Vec<Movie>, Metadata)>;
    async fn update(&self, movie: &mut Movie) -> RepoResult<()>;
    async fn delete(&self, id: i64) -> RepoResult<()>;
}
