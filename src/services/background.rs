//! Fire-and-forget work that outlives the request which started it.
//!
//! Every spawned task is counted until it finishes, fails or panics, so that
//! shutdown can wait for the count to drain. A failing task never affects the
//! process or any other task.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, error};

#[derive(Debug, Error)]
#[error("{outstanding} background task(s) still running after {waited:?}")]
pub struct TimedOut {
    pub outstanding: usize,
    pub waited: Duration,
}

#[derive(Debug, Default)]
struct Inner {
    outstanding: AtomicUsize,
    idle: Notify,
}

/// Decrements the counter on every exit path of a task.
struct Guard(Arc<Inner>);

impl Drop for Guard {
    fn drop(&mut self) {
        if self.0.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Run `work` on its own task. An `Err` or a panic is logged with `name`.
    pub fn spawn<F>(&self, name: &'static str, work: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        let guard = Guard(Arc::clone(&self.inner));

        tokio::spawn(async move {
            let _guard = guard;

            match tokio::spawn(work).await {
                Ok(Ok(())) => debug!(task = name, "Background task finished"),
                Ok(Err(err)) => error!(task = name, error = ?err, "Background task failed"),
                Err(join_err) if join_err.is_panic() => {
                    error!(task = name, error = %join_err, "Background task panicked")
                }
                Err(join_err) => {
                    error!(task = name, error = %join_err, "Background task was cancelled")
                }
            }
        });
    }

    /// Resolve once no task is outstanding, or give up after `deadline`.
    pub async fn wait_idle(&self, deadline: Duration) -> Result<(), TimedOut> {
        let drained = async {
            loop {
                let notified = self.inner.idle.notified();
                tokio::pin!(notified);
                // Register before checking so a wakeup in between is not lost
                notified.as_mut().enable();

                if self.outstanding() == 0 {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(deadline, drained)
            .await
            .map_err(|_| TimedOut {
                outstanding: self.outstanding(),
                waited: deadline,
            })
    }
}
