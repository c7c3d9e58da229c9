/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - stores (trait objects), TokenIssuer, rate limiter, background tasks, notifier, metrics
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    config::Config,
    repos::{
        MemoryStore, MovieRepo, MovieStore, PermissionRepo, PermissionStore, TokenRepo,
        TokenStore, UserRepo, UserStore,
    },
    services::{
        auth::TokenIssuer, background::BackgroundTasks, notifier::Notifier,
        metrics::RequestMetrics, rate_limit::ClientRateLimiter,
    },
};

/// The store implementations backing one running app.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub movies: Arc<dyn MovieStore>,
    /// Kept for pool statistics; `None` for in-memory stores.
    pub pool: Option<PgPool>,
}

impl Repositories {
    pub fn postgres(db: PgPool) -> Self {
        Self {
            users: Arc::new(UserRepo::new(db.clone())),
            tokens: Arc::new(TokenRepo::new(db.clone())),
            permissions: Arc::new(PermissionRepo::new(db.clone())),
            movies: Arc::new(MovieRepo::new(db.clone())),
            pool: Some(db),
        }
    }

    /// One shared `MemoryStore` behind every trait, so tokens can see users.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            tokens: store.clone(),
            permissions: store.clone(),
            movies: store,
            pool: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserStore>,
    pub tokens: TokenIssuer,
    pub permissions: Arc<dyn PermissionStore>,
    pub movies: Arc<dyn MovieStore>,
    pub limiter: Arc<ClientRateLimiter>,
    pub tasks: BackgroundTasks,
    pub notifier: Arc<dyn Notifier>,
    pub metrics: RequestMetrics,
    pub db: Option<PgPool>,
}

impl AppState {
    pub fn new(config: Config, repos: Repositories, notifier: Arc<dyn Notifier>) -> Self {
        let tokens = TokenIssuer::new(repos.tokens, config.store_timeout);
        let limiter = Arc::new(ClientRateLimiter::new(config.limiter));

        Self {
            config: Arc::new(config),
            users: repos.users,
            tokens,
            permissions: repos.permissions,
            movies: repos.movies,
            limiter,
            tasks: BackgroundTasks::new(),
            notifier,
            metrics: RequestMetrics::new(),
            db: repos.pool,
        }
    }
}
