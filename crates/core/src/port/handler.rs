// Listener callbacks

use crate::domain::QueuedJob;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::future::Future;

/// Application callback invoked once per delivered job.
///
/// The job counts as in flight until the returned future resolves.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, job: QueuedJob) -> Result<()>;
}

/// Receives handler failures and backing-queue errors raised while listening
pub trait ErrorHandler: Send + Sync {
    fn on_error(&self, error: &AppError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&AppError) + Send + Sync,
{
    fn on_error(&self, error: &AppError) {
        self(error)
    }
}

/// MessageHandler backed by an async closure
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a `MessageHandler`
///
/// # Example
/// ```text
/// let handler = handler_fn(|job: QueuedJob| async move {
///     println!("got {}", job.id);
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(QueuedJob) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(QueuedJob) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, job: QueuedJob) -> Result<()> {
        (self.f)(job).await
    }
}
