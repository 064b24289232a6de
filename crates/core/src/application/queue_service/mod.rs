// Queue Service - Facade over a backing job queue

pub mod batch;
pub mod listener;
pub mod publish;

pub use batch::BatchPublishReport;
pub use listener::ListenerConfig;

use crate::domain::{
    JobHandle, JobOptions, ListenerState, PublishPayload, QueueServiceConfig, ServiceType,
};
use crate::error::{AppError, Result};
use crate::port::JobQueue;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::info;

struct ListenerSlot {
    state: ListenerState,
    config: Option<ListenerConfig>,
}

/// Queue facade. One instance per logical queue, shared by `Arc`.
pub struct QueueService {
    service_type: ServiceType,
    queue_name: String,
    queue: Arc<dyn JobQueue>,
    listener: Mutex<ListenerSlot>,
}

impl QueueService {
    /// Create a facade over an already connected backing queue.
    ///
    /// # Errors
    /// - AppError::Config if a required field is missing
    /// - AppError::Unsupported for service types without a backing implementation
    pub fn new(config: &QueueServiceConfig, queue: Arc<dyn JobQueue>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            service_type: config.service_type,
            queue_name: config.queue_name.clone(),
            queue,
            listener: Mutex::new(ListenerSlot {
                state: ListenerState::Unregistered,
                config: None,
            }),
        })
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Backing queue handle (read access for inspection tools)
    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    /// Enqueue exactly one job
    ///
    /// # Arguments
    /// * `payload` - job data, or a spread `[data]` / `[name, data]` argument list
    /// * `delay_ms` - milliseconds before the job becomes eligible
    /// * `options` - backing options; `remove_on_complete` is always forced on
    pub async fn publish(
        &self,
        payload: impl Into<PublishPayload>,
        delay_ms: u64,
        options: JobOptions,
    ) -> Result<JobHandle> {
        match self.service_type {
            ServiceType::Bull => {
                publish::execute(self.queue.as_ref(), payload.into(), delay_ms, options).await
            }
            other => Err(AppError::Unsupported(other.to_string())),
        }
    }

    /// Append `items` one at a time to the fullest open batch, creating new
    /// batch jobs (delayed by `delay_ms`) when none is open.
    ///
    /// Read, pick and update are separate queue calls; concurrent callers on
    /// the same queue may interleave between them.
    pub async fn publish_in_batches(
        &self,
        items: Vec<Value>,
        delay_ms: u64,
        batch_size: usize,
    ) -> Result<BatchPublishReport> {
        match self.service_type {
            ServiceType::Bull => {
                batch::execute(self.queue.as_ref(), items, delay_ms, batch_size).await
            }
            other => Err(AppError::Unsupported(other.to_string())),
        }
    }

    /// Register handlers. Allowed until `start_listener` succeeds.
    pub fn add_listener(&self, config: ListenerConfig) -> Result<()> {
        config.validate()?;
        let mut slot = self
            .listener
            .lock()
            .map_err(|_| AppError::InvalidState("listener lock poisoned".to_string()))?;
        slot.state
            .register()
            .map_err(|e| AppError::InvalidState(e.to_string()))?;
        slot.config = Some(config);
        Ok(())
    }

    /// Subscribe the registered handlers to the backing queue. Runs once.
    pub async fn start_listener(&self) -> Result<()> {
        let config = {
            let mut slot = self
                .listener
                .lock()
                .map_err(|_| AppError::InvalidState("listener lock poisoned".to_string()))?;
            slot.state
                .start()
                .map_err(|e| AppError::InvalidState(e.to_string()))?;
            slot.config.clone()
        };
        let Some(config) = config else {
            return Err(AppError::InvalidState(
                "listener registered without handlers".to_string(),
            ));
        };

        let max_in_progress = config.max_in_progress;
        let outcome = match self.service_type {
            ServiceType::Bull => {
                listener::subscribe(self.queue.as_ref(), &self.queue_name, config).await
            }
            other => Err(AppError::Unsupported(other.to_string())),
        };

        if let Err(e) = outcome {
            // Subscription never happened; allow another attempt
            if let Ok(mut slot) = self.listener.lock() {
                slot.state = ListenerState::Registered;
            }
            return Err(e);
        }

        info!(
            queue = %self.queue_name,
            max_in_progress = max_in_progress,
            "Listener started"
        );
        Ok(())
    }

    pub fn listener_state(&self) -> ListenerState {
        self.listener
            .lock()
            .map(|slot| slot.state)
            .unwrap_or(ListenerState::Unregistered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionParams, JobState};
    use crate::port::handler_fn;
    use crate::port::job_queue::mocks::InMemoryJobQueue;
    use serde_json::json;

    fn config() -> QueueServiceConfig {
        QueueServiceConfig::bull("mail", "app", ConnectionParams::new("localhost", 6379))
    }

    fn service() -> (QueueService, Arc<InMemoryJobQueue>) {
        let queue = Arc::new(InMemoryJobQueue::new());
        let service = QueueService::new(&config(), queue.clone()).unwrap();
        (service, queue)
    }

    fn listener() -> ListenerConfig {
        ListenerConfig::new(
            Arc::new(handler_fn(|_job| async { Ok(()) })),
            Arc::new(|_e: &AppError| {}),
        )
    }

    #[test]
    fn test_construction_rejects_missing_queue_name() {
        let mut cfg = config();
        cfg.queue_name = String::new();
        let result = QueueService::new(&cfg, Arc::new(InMemoryJobQueue::new()));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_publish_forces_remove_on_complete_and_delay() {
        let (service, queue) = service();
        let handle = service
            .publish(json!({"to": "a@b.c"}), 500, JobOptions::default())
            .await
            .unwrap();

        let job = queue.job(&handle.id).unwrap();
        assert_eq!(job.state, JobState::Delayed);
        assert!(job.options.remove_on_complete);
        assert_eq!(job.options.delay_ms, 500);
    }

    #[tokio::test]
    async fn test_start_before_register_is_invalid() {
        let (service, _queue) = service();
        let err = service.start_listener().await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(service.listener_state(), ListenerState::Unregistered);
    }

    #[tokio::test]
    async fn test_listener_starts_exactly_once() {
        let (service, queue) = service();
        service.add_listener(listener().with_max_in_progress(4)).unwrap();
        service.start_listener().await.unwrap();

        assert_eq!(service.listener_state(), ListenerState::Listening);
        assert_eq!(queue.consumer_concurrency(), Some(4));
        assert!(matches!(
            service.start_listener().await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            service.add_listener(listener()),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn test_zero_max_in_progress_rejected() {
        let (service, _queue) = service();
        let err = service
            .add_listener(listener().with_max_in_progress(0))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(service.listener_state(), ListenerState::Unregistered);
    }
}
