/*
 * Responsibility
 * - 環境変数や設定の読み込み (PORT, DATABASE_URL, limiter / token / timeout 設定など)
 * - 設定値のバリデーション (不正なら起動失敗)
 * - from_lookup は環境に触らずに同じ解釈をテストするための入口
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::rate_limit::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    /// `None` runs on in-memory stores (development only).
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_max_idle: Duration,

    pub limiter: RateLimitConfig,

    pub store_timeout: Duration,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,

    pub auth_token_ttl: Duration,
    pub activation_token_ttl: Duration,

    pub mail_sender: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
            app_env: AppEnv::Development,
            database_url: None,
            db_max_connections: 25,
            db_max_idle: Duration::from_secs(15 * 60),
            limiter: RateLimitConfig::default(),
            store_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(20),
            auth_token_ttl: Duration::from_secs(24 * 60 * 60),
            activation_token_ttl: Duration::from_secs(3 * 24 * 60 * 60),
            mail_sender: "Greenlight <no-reply@greenlight.local>".to_string(),
        }
    }
}

/// Parse `key` if present; absent keeps `default`, present-but-unparsable is an error.
fn parsed<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn seconds<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parsed(lookup, key, default.as_secs()).map(Duration::from_secs)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port: u16 = parsed(&lookup, "PORT", defaults.addr.port())?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if database_url.is_none() && app_env.is_production() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let limiter = RateLimitConfig {
            enabled: parsed(&lookup, "LIMITER_ENABLED", defaults.limiter.enabled)?,
            rps: parsed(&lookup, "LIMITER_RPS", defaults.limiter.rps)?,
            burst: parsed(&lookup, "LIMITER_BURST", defaults.limiter.burst)?,
            idle_timeout: seconds(&lookup, "LIMITER_IDLE_SECONDS", defaults.limiter.idle_timeout)?,
            sweep_interval: seconds(
                &lookup,
                "LIMITER_SWEEP_SECONDS",
                defaults.limiter.sweep_interval,
            )?,
        };
        if !(limiter.rps.is_finite() && limiter.rps >= 0.0) {
            return Err(ConfigError::Invalid("LIMITER_RPS"));
        }
        if limiter.burst == 0 {
            return Err(ConfigError::Invalid("LIMITER_BURST"));
        }
        if limiter.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid("LIMITER_SWEEP_SECONDS"));
        }

        let store_timeout = seconds(&lookup, "STORE_TIMEOUT_SECONDS", defaults.store_timeout)?;
        if store_timeout.is_zero() {
            return Err(ConfigError::Invalid("STORE_TIMEOUT_SECONDS"));
        }

        Ok(Self {
            addr,
            app_env,
            database_url,
            db_max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_max_idle: seconds(&lookup, "DB_MAX_IDLE_SECONDS", defaults.db_max_idle)?,
            limiter,
            store_timeout,
            request_timeout: seconds(&lookup, "REQUEST_TIMEOUT_SECONDS", defaults.request_timeout)?,
            shutdown_timeout: seconds(
                &lookup,
                "SHUTDOWN_TIMEOUT_SECONDS",
                defaults.shutdown_timeout,
            )?,
            auth_token_ttl: seconds(&lookup, "AUTH_TOKEN_TTL_SECONDS", defaults.auth_token_ttl)?,
            activation_token_ttl: seconds(
                &lookup,
                "ACTIVATION_TOKEN_TTL_SECONDS",
                defaults.activation_token_ttl,
            )?,
            mail_sender: lookup("MAIL_SENDER").unwrap_or(defaults.mail_sender),
        })
    }
}
