// Job Queue Port (Interface)

use crate::domain::{JobHandle, JobState, NewJob, QueuedJob};
use crate::error::Result;
use crate::port::{ErrorHandler, MessageHandler};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Backing job queue with delayed jobs and per-job mutable data
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue one job. Jobs with `options.delay_ms > 0` start out delayed.
    async fn add(&self, job: NewJob) -> Result<JobHandle>;

    /// All jobs currently in any of `states`, grouped in the order of `states`
    async fn get_jobs(&self, states: &[JobState]) -> Result<Vec<QueuedJob>>;

    /// Replace the stored data of a job
    ///
    /// # Errors
    /// - AppError::NotFound if the job no longer exists
    async fn update_data(&self, id: &str, data: Value) -> Result<()>;

    /// Make a delayed job eligible for processing right away
    ///
    /// # Errors
    /// - AppError::PromotionRace if the job is not delayed anymore
    async fn promote(&self, id: &str) -> Result<()>;

    /// Start consuming: at most `concurrency` handler calls in flight.
    ///
    /// A handler `Err` fails the job, or schedules a retry while
    /// `options.max_attempts()` is not exhausted.
    /// Errors of the queue itself go to `on_error`; the consumer keeps running.
    async fn process(
        &self,
        concurrency: usize,
        handler: Arc<dyn MessageHandler>,
        on_error: Arc<dyn ErrorHandler>,
    ) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use futures::stream::{self, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Consumer {
        concurrency: usize,
        handler: Arc<dyn MessageHandler>,
        on_error: Arc<dyn ErrorHandler>,
    }

    #[derive(Default)]
    struct Inner {
        jobs: Vec<QueuedJob>,
        next_id: u64,
        promote_calls: Vec<String>,
        fail_updates: bool,
    }

    /// In-memory job queue. Jobs are listed in insertion order within a state.
    pub struct InMemoryJobQueue {
        inner: Mutex<Inner>,
        consumer: Mutex<Option<Consumer>>,
    }

    impl Default for InMemoryJobQueue {
        fn default() -> Self {
            Self::new()
        }
    }

    impl InMemoryJobQueue {
        pub fn new() -> Self {
            Self {
                inner: Mutex::new(Inner {
                    next_id: 1,
                    ..Default::default()
                }),
                consumer: Mutex::new(None),
            }
        }

        /// Snapshot of every job in insertion order
        pub fn jobs(&self) -> Vec<QueuedJob> {
            self.inner.lock().unwrap().jobs.clone()
        }

        pub fn job(&self, id: &str) -> Option<QueuedJob> {
            self.inner
                .lock()
                .unwrap()
                .jobs
                .iter()
                .find(|j| j.id == id)
                .cloned()
        }

        /// Insert a job directly (test setup)
        pub fn seed(&self, data: Value, state: JobState) -> String {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_id.to_string();
            inner.next_id += 1;
            let timestamp = inner.next_id as i64 * 1000;
            inner.jobs.push(QueuedJob {
                id: id.clone(),
                name: None,
                data,
                state,
                options: Default::default(),
                attempts_made: 0,
                timestamp,
                failed_reason: None,
            });
            id
        }

        /// Force a state change, e.g. a delay elapsing
        pub fn set_state(&self, id: &str, state: JobState) {
            let mut inner = self.inner.lock().unwrap();
            if let Some(job) = inner.jobs.iter_mut().find(|j| j.id == id) {
                job.state = state;
            }
        }

        /// Ids passed to `promote`, successful or not
        pub fn promote_calls(&self) -> Vec<String> {
            self.inner.lock().unwrap().promote_calls.clone()
        }

        /// Make every following `update_data` fail with a backend error
        pub fn fail_updates(&self, fail: bool) {
            self.inner.lock().unwrap().fail_updates = fail;
        }

        pub fn consumer_concurrency(&self) -> Option<usize> {
            self.consumer.lock().unwrap().as_ref().map(|c| c.concurrency)
        }

        /// Report a queue-level error to the registered consumer
        pub fn emit_error(&self, error: AppError) {
            let on_error = self
                .consumer
                .lock()
                .unwrap()
                .as_ref()
                .map(|c| Arc::clone(&c.on_error));
            if let Some(on_error) = on_error {
                on_error.on_error(&error);
            }
        }

        /// Deliver waiting jobs to the consumer until none is left.
        ///
        /// Up to the registered concurrency handler calls run at once. A
        /// failed job with attempts left is retried: right away when it has
        /// no backoff, otherwise it goes back to the delayed state.
        ///
        /// Returns the number of handler calls.
        pub async fn drain(&self) -> usize {
            let (handler, concurrency) = match self.consumer.lock().unwrap().as_ref() {
                Some(c) => (Arc::clone(&c.handler), c.concurrency.max(1)),
                None => return 0,
            };

            let mut delivered = 0;
            loop {
                let round = AtomicUsize::new(0);
                stream::unfold((), |()| async move { self.claim_waiting().map(|job| (job, ())) })
                    .for_each_concurrent(concurrency, |job| {
                        let handler = Arc::clone(&handler);
                        let round = &round;
                        async move {
                            let id = job.id.clone();
                            let outcome = handler.handle(job).await;
                            round.fetch_add(1, Ordering::SeqCst);
                            self.settle(&id, outcome);
                        }
                    })
                    .await;

                // Retries settled after the stream ended need another round
                match round.into_inner() {
                    0 => break,
                    n => delivered += n,
                }
            }
            delivered
        }

        fn claim_waiting(&self) -> Option<QueuedJob> {
            let mut inner = self.inner.lock().unwrap();
            let job = inner
                .jobs
                .iter_mut()
                .find(|j| j.state == JobState::Waiting)?;
            job.state = JobState::Active;
            Some(job.clone())
        }

        fn settle(&self, id: &str, outcome: Result<()>) {
            let mut inner = self.inner.lock().unwrap();
            let Some(pos) = inner.jobs.iter().position(|j| j.id == id) else {
                return;
            };
            match outcome {
                Ok(()) if inner.jobs[pos].options.remove_on_complete => {
                    inner.jobs.remove(pos);
                }
                Ok(()) => inner.jobs[pos].state = JobState::Completed,
                Err(e) => {
                    let job = &mut inner.jobs[pos];
                    let retry = job.attempts_made + 1 < job.options.max_attempts();
                    job.attempts_made += 1;
                    job.failed_reason = Some(e.to_string());
                    job.state = match (retry, job.options.backoff_ms.unwrap_or(0)) {
                        (false, _) => JobState::Failed,
                        (true, 0) => JobState::Waiting,
                        (true, _) => JobState::Delayed,
                    };
                }
            }
        }
    }

    #[async_trait]
    impl JobQueue for InMemoryJobQueue {
        async fn add(&self, job: NewJob) -> Result<JobHandle> {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_id.to_string();
            inner.next_id += 1;
            let state = if job.options.delay_ms > 0 {
                JobState::Delayed
            } else {
                JobState::Waiting
            };
            let timestamp = inner.next_id as i64 * 1000;
            inner.jobs.push(QueuedJob {
                id: id.clone(),
                name: job.name.clone(),
                data: job.data,
                state,
                options: job.options,
                attempts_made: 0,
                timestamp,
                failed_reason: None,
            });
            Ok(JobHandle { id, name: job.name })
        }

        async fn get_jobs(&self, states: &[JobState]) -> Result<Vec<QueuedJob>> {
            let inner = self.inner.lock().unwrap();
            let mut out = Vec::new();
            for state in states {
                out.extend(inner.jobs.iter().filter(|j| j.state == *state).cloned());
            }
            Ok(out)
        }

        async fn update_data(&self, id: &str, data: Value) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_updates {
                return Err(AppError::Backend("update rejected".to_string()));
            }
            match inner.jobs.iter_mut().find(|j| j.id == id) {
                Some(job) => {
                    job.data = data;
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("job {}", id))),
            }
        }

        async fn promote(&self, id: &str) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            inner.promote_calls.push(id.to_string());
            match inner.jobs.iter_mut().find(|j| j.id == id) {
                Some(job) if job.state == JobState::Delayed => {
                    job.state = JobState::Waiting;
                    job.options.delay_ms = 0;
                    Ok(())
                }
                Some(_) => Err(AppError::PromotionRace(id.to_string())),
                None => Err(AppError::NotFound(format!("job {}", id))),
            }
        }

        async fn process(
            &self,
            concurrency: usize,
            handler: Arc<dyn MessageHandler>,
            on_error: Arc<dyn ErrorHandler>,
        ) -> Result<()> {
            let mut consumer = self.consumer.lock().unwrap();
            if consumer.is_some() {
                return Err(AppError::InvalidState(
                    "consumer already registered".to_string(),
                ));
            }
            *consumer = Some(Consumer {
                concurrency,
                handler,
                on_error,
            });
            Ok(())
        }
    }
}
