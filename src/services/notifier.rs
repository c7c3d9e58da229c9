//! Outbound notification interface used by background work (welcome mail etc.).
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

/// Notification-layer errors.
///
/// Kept independent from `AppError`: notifications only ever run in
/// background tasks, where a failure is logged and never reaches a client.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("unknown notification template: {0}")]
    UnknownTemplate(String),
    #[error("notification transport error: {0}")]
    Transport(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

pub const USER_WELCOME: &str = "user_welcome";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, template: &str, data: &Value) -> NotifyResult<()>;
}

/// Writes each notification as a structured log record instead of delivering it.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    sender: String,
}

impl LogNotifier {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }

    fn subject(template: &str) -> NotifyResult<&'static str> {
        match template {
            USER_WELCOME => Ok("Welcome to Greenlight!"),
            other => Err(NotifyError::UnknownTemplate(other.to_string())),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, template: &str, data: &Value) -> NotifyResult<()> {
        let subject = Self::subject(template)?;

        // the activation token is part of `data`; only its presence is logged
        let keys: Vec<&str> = data
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();

        info!(
            from = %self.sender,
            to = %recipient,
            template,
            subject,
            data_keys = ?keys,
            "Notification sent"
        );
        Ok(())
    }
}
