/*
 * Responsibility
 * - Config読み込み → 依存生成 → Router 組み立て
 * - Middleware の適用順: metrics (最外) → http → rate limit → access (Identity) → route gates
 * - GET /debug/vars は /v1 の外
 * - axum::serve() で起動し、シグナルで graceful shutdown
 *   (sweeper 停止 → background task の drain を SHUTDOWN_TIMEOUT_SECONDS まで待つ)
 */
use std::{net::SocketAddr, panic, sync::Arc};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    api,
    config::Config,
    error::AppError,
    middleware,
    services::notifier::LogNotifier,
    state::{AppState, Repositories},
};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,movie_api=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook() {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing so they don't get lost.
        // Handler and background task panics are caught at their task boundary,
        // so the process keeps serving.
        tracing::error!(?info, "panic");
        default_hook(info);
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    init_panic_hook();

    let config = Config::from_env()?;

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let repos = build_repositories(&config).await?;
    let notifier = Arc::new(LogNotifier::new(config.mail_sender.clone()));
    let state = AppState::new(config.clone(), repos, notifier);

    let sweeper = state.limiter.spawn_sweeper();
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper.abort();

    tracing::info!(
        outstanding = state.tasks.outstanding(),
        "waiting for background tasks"
    );
    if let Err(err) = state.tasks.wait_idle(config.shutdown_timeout).await {
        tracing::warn!(error = %err, "shutting down with background tasks still running");
    }

    tracing::info!("server stopped");
    Ok(())
}

async fn build_repositories(config: &Config) -> Result<Repositories> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory stores");
        return Ok(Repositories::in_memory());
    };

    let db = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .idle_timeout(config.db_max_idle)
        .acquire_timeout(config.store_timeout)
        .connect(database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("failed to run migrations")?;

    tracing::info!("database connection pool established");
    Ok(Repositories::postgres(db))
}

/// The full application, without the transport. Callers serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the rate limiter
/// can see peer addresses.
pub fn build_router(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout;
    let metrics = state.metrics.clone();

    let router = Router::new()
        .nest("/v1", api::v1::routes(&state))
        .route("/debug/vars", get(api::debug::debug_vars))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found);

    // Inner first: access (Identity) runs after rate limiting
    let router = middleware::auth::access::apply(router, state.clone());
    let router = middleware::rate_limit::apply(router, Arc::clone(&state.limiter));

    let router = middleware::http::apply(router.with_state(state), request_timeout);
    middleware::metrics::apply(router, metrics)
}

async fn not_found() -> AppError {
    AppError::NotFound
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}
