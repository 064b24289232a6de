// Listener registration and consumer subscription

use crate::application::constants::DEFAULT_MAX_IN_PROGRESS;
use crate::domain::QueuedJob;
use crate::error::{AppError, Result};
use crate::port::{ErrorHandler, JobQueue, MessageHandler};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handlers and consumer settings registered through `add_listener`
#[derive(Clone)]
pub struct ListenerConfig {
    pub message_handler: Arc<dyn MessageHandler>,
    pub on_consumer_error: Arc<dyn ErrorHandler>,
    /// Handler invocations allowed in flight at once
    pub max_in_progress: usize,
    /// Reserved for per-batch delivery; jobs are delivered one by one today
    pub is_batch_pull: bool,
}

impl ListenerConfig {
    pub fn new(
        message_handler: Arc<dyn MessageHandler>,
        on_consumer_error: Arc<dyn ErrorHandler>,
    ) -> Self {
        Self {
            message_handler,
            on_consumer_error,
            max_in_progress: DEFAULT_MAX_IN_PROGRESS,
            is_batch_pull: false,
        }
    }

    pub fn with_max_in_progress(mut self, max_in_progress: usize) -> Self {
        self.max_in_progress = max_in_progress;
        self
    }

    pub fn with_batch_pull(mut self, is_batch_pull: bool) -> Self {
        self.is_batch_pull = is_batch_pull;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_in_progress == 0 {
            return Err(AppError::Validation(
                "max_in_progress must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ListenerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerConfig")
            .field("max_in_progress", &self.max_in_progress)
            .field("is_batch_pull", &self.is_batch_pull)
            .finish_non_exhaustive()
    }
}

/// Forwards jobs to the application handler and reports its failures to
/// the registered error handler before handing them back to the queue.
struct RoutedHandler {
    queue_name: String,
    inner: Arc<dyn MessageHandler>,
    on_error: Arc<dyn ErrorHandler>,
}

#[async_trait]
impl MessageHandler for RoutedHandler {
    async fn handle(&self, job: QueuedJob) -> Result<()> {
        let job_id = job.id.clone();
        debug!(queue = %self.queue_name, job_id = %job_id, "Delivering job");

        match self.inner.handle(job).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    queue = %self.queue_name,
                    job_id = %job_id,
                    error = %e,
                    "Message handler failed"
                );
                self.on_error.on_error(&e);
                Err(e)
            }
        }
    }
}

/// Subscribe a consumer that feeds every delivered job to the registered handler
pub(crate) async fn subscribe(
    queue: &dyn JobQueue,
    queue_name: &str,
    config: ListenerConfig,
) -> Result<()> {
    let handler = Arc::new(RoutedHandler {
        queue_name: queue_name.to_string(),
        inner: config.message_handler,
        on_error: Arc::clone(&config.on_consumer_error),
    });

    queue
        .process(config.max_in_progress, handler, config.on_consumer_error)
        .await
}
