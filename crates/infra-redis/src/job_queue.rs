// Redis JobQueue Implementation

use crate::constants::{DEFAULT_JOB_NAME, STALLED_CHECK_INTERVAL};
use crate::consumer::{self, ConsumerContext};
use crate::error::map_redis_error;
use crate::keys::QueueKeys;
use crate::scripts::QueueScripts;
use async_trait::async_trait;
use qcache_core::domain::{JobHandle, JobOptions, JobState, NewJob, QueuedJob};
use qcache_core::error::{AppError, Result};
use qcache_core::port::{ErrorHandler, JobQueue, MessageHandler, SystemTimeProvider, TimeProvider};
use redis::aio::ConnectionManager;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Delayed job queue stored in Redis (see `QueueKeys` for the layout).
///
/// Consumer tasks started by `process` live as long as this handle and are
/// aborted when it is dropped.
pub struct RedisJobQueue {
    conn: ConnectionManager,
    keys: QueueKeys,
    scripts: Arc<QueueScripts>,
    time_provider: Arc<dyn TimeProvider>,
    stalled_interval: Duration,
    consuming: AtomicBool,
    consumers: Mutex<Vec<JoinHandle<()>>>,
}

impl RedisJobQueue {
    pub fn new(conn: ConnectionManager, prefix: &str, queue_name: &str) -> Self {
        Self::with_time_provider(conn, prefix, queue_name, Arc::new(SystemTimeProvider))
    }

    pub fn with_time_provider(
        conn: ConnectionManager,
        prefix: &str,
        queue_name: &str,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            conn,
            keys: QueueKeys::new(prefix, queue_name),
            scripts: Arc::new(QueueScripts::new()),
            time_provider,
            stalled_interval: STALLED_CHECK_INTERVAL,
            consuming: AtomicBool::new(false),
            consumers: Mutex::new(Vec::new()),
        }
    }

    /// Period of the stalled-job check of a running consumer
    pub fn with_stalled_interval(mut self, interval: Duration) -> Self {
        self.stalled_interval = interval;
        self
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    /// Ids held by the structure of `state`, oldest first
    async fn ids_in_state(&self, state: JobState) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let key = self.keys.state(state);
        let ids: Vec<String> = match state {
            JobState::Waiting | JobState::Active => {
                let mut ids: Vec<String> = redis::cmd("LRANGE")
                    .arg(&key)
                    .arg(0)
                    .arg(-1)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| map_redis_error("LRANGE", e))?;
                // Lists are pushed on the left and consumed from the right
                ids.reverse();
                ids
            }
            JobState::Delayed | JobState::Completed | JobState::Failed => redis::cmd("ZRANGE")
                .arg(&key)
                .arg(0)
                .arg(-1)
                .query_async(&mut conn)
                .await
                .map_err(|e| map_redis_error("ZRANGE", e))?,
        };
        Ok(ids)
    }

    /// Job hashes of `ids`, fetched in one pipeline
    async fn load_jobs(&self, ids: &[String], state: JobState) -> Result<Vec<QueuedJob>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        for id in ids {
            pipe.cmd("HGETALL").arg(self.keys.job(id));
        }

        let mut conn = self.conn.clone();
        let hashes: Vec<HashMap<String, String>> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("HGETALL", e))?;

        let mut jobs = Vec::with_capacity(ids.len());
        for (id, hash) in ids.iter().zip(hashes) {
            // Removed between the listing and the read
            if let Some(job) = parse_job(id, state, &hash)? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }
}

impl Drop for RedisJobQueue {
    fn drop(&mut self) {
        if let Ok(consumers) = self.consumers.get_mut() {
            for handle in consumers.drain(..) {
                handle.abort();
            }
        }
    }
}

/// Build a `QueuedJob` from its stored hash; `None` for an empty hash
pub(crate) fn parse_job(
    id: &str,
    state: JobState,
    hash: &HashMap<String, String>,
) -> Result<Option<QueuedJob>> {
    if hash.is_empty() {
        return Ok(None);
    }
    let corrupt = |field: &str, e: &dyn std::fmt::Display| {
        AppError::Backend(format!("job {} has an invalid {} field: {}", id, field, e))
    };

    let data: Value = match hash.get("data") {
        Some(raw) => serde_json::from_str(raw).map_err(|e| corrupt("data", &e))?,
        None => Value::Null,
    };
    let options: JobOptions = match hash.get("opts") {
        Some(raw) => serde_json::from_str(raw).map_err(|e| corrupt("opts", &e))?,
        None => JobOptions::default(),
    };
    let name = hash
        .get("name")
        .filter(|n| n.as_str() != DEFAULT_JOB_NAME && !n.is_empty())
        .cloned();
    let attempts_made = match hash.get("attemptsMade") {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|e| corrupt("attemptsMade", &e))?,
        None => 0,
    };
    let timestamp = match hash.get("timestamp") {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|e| corrupt("timestamp", &e))?,
        None => 0,
    };
    let failed_reason = hash.get("failedReason").filter(|r| !r.is_empty()).cloned();

    Ok(Some(QueuedJob {
        id: id.to_string(),
        name,
        data,
        state,
        options,
        attempts_made,
        timestamp,
        failed_reason,
    }))
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn add(&self, job: NewJob) -> Result<JobHandle> {
        let now = self.time_provider.now_millis();
        let delay_ms = job.options.delay_ms;
        let due = now.saturating_add(i64::try_from(delay_ms).unwrap_or(i64::MAX));
        let data = serde_json::to_string(&job.data)?;
        let opts = serde_json::to_string(&job.options)?;
        let name = job.name.as_deref().unwrap_or(DEFAULT_JOB_NAME);

        let mut conn = self.conn.clone();
        let id: String = self
            .scripts
            .add_job
            .key(self.keys.id())
            .key(self.keys.wait())
            .key(self.keys.delayed())
            .arg(self.keys.base())
            .arg(name)
            .arg(data)
            .arg(opts)
            .arg(now)
            .arg(delay_ms)
            .arg(due)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("add job", e))?;

        debug!(queue = %self.keys.base(), job_id = %id, delay_ms = delay_ms, "Job added");
        Ok(JobHandle { id, name: job.name })
    }

    async fn get_jobs(&self, states: &[JobState]) -> Result<Vec<QueuedJob>> {
        let mut jobs = Vec::new();
        for state in states {
            let ids = self.ids_in_state(*state).await?;
            jobs.extend(self.load_jobs(&ids, *state).await?);
        }
        Ok(jobs)
    }

    async fn update_data(&self, id: &str, data: Value) -> Result<()> {
        let data = serde_json::to_string(&data)?;
        let mut conn = self.conn.clone();
        let updated: i64 = self
            .scripts
            .update_data
            .key(self.keys.job(id))
            .arg(data)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("update job data", e))?;

        if updated == 0 {
            return Err(AppError::NotFound(format!("job {}", id)));
        }
        Ok(())
    }

    async fn promote(&self, id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let promoted: i64 = self
            .scripts
            .promote
            .key(self.keys.delayed())
            .key(self.keys.wait())
            .key(self.keys.job(id))
            .arg(id)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("promote job", e))?;

        if promoted == 0 {
            return Err(AppError::PromotionRace(id.to_string()));
        }
        debug!(queue = %self.keys.base(), job_id = %id, "Job promoted");
        Ok(())
    }

    async fn process(
        &self,
        concurrency: usize,
        handler: Arc<dyn MessageHandler>,
        on_error: Arc<dyn ErrorHandler>,
    ) -> Result<()> {
        if self
            .consuming
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::InvalidState(format!(
                "queue {} already has a consumer",
                self.keys.base()
            )));
        }

        let ctx = Arc::new(ConsumerContext {
            conn: self.conn.clone(),
            keys: self.keys.clone(),
            scripts: Arc::clone(&self.scripts),
            handler,
            on_error,
            time_provider: Arc::clone(&self.time_provider),
            stalled_interval: self.stalled_interval,
        });

        let recovered = match consumer::recover_stalled(&ctx).await {
            Ok(n) => n,
            Err(e) => {
                self.consuming.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        if recovered > 0 {
            info!(queue = %self.keys.base(), recovered = recovered, "Stalled jobs moved back to wait");
        }

        let mut tasks = vec![
            tokio::spawn(consumer::run_promoter(Arc::clone(&ctx))),
            tokio::spawn(consumer::run_stalled_checker(Arc::clone(&ctx))),
        ];
        for worker in 0..concurrency.max(1) {
            tasks.push(tokio::spawn(consumer::run_worker(Arc::clone(&ctx), worker)));
        }
        self.consumers
            .lock()
            .map_err(|_| AppError::InvalidState("consumer lock poisoned".to_string()))?
            .extend(tasks);

        info!(queue = %self.keys.base(), concurrency = concurrency, "Consumer started");
        Ok(())
    }
}
