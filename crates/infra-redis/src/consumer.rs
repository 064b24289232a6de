// Consumer - worker and delayed-promoter loops of a Redis queue

use crate::constants::*;
use crate::error::map_redis_error;
use crate::job_queue::parse_job;
use crate::keys::QueueKeys;
use crate::scripts::QueueScripts;
use qcache_core::domain::{JobState, QueuedJob};
use qcache_core::error::{AppError, Result};
use qcache_core::port::{ErrorHandler, MessageHandler, TimeProvider};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Everything a consumer task needs; shared by all loops of one queue
pub(crate) struct ConsumerContext {
    pub conn: ConnectionManager,
    pub keys: QueueKeys,
    pub scripts: Arc<QueueScripts>,
    pub handler: Arc<dyn MessageHandler>,
    pub on_error: Arc<dyn ErrorHandler>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub stalled_interval: Duration,
}

/// What to do with a job after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureAction {
    /// Back to the delayed set, due at the given epoch ms
    Retry { at: i64, backoff_ms: u64 },
    Fail,
}

pub(crate) fn failure_action(job: &QueuedJob, now: i64) -> FailureAction {
    if job.attempts_made + 1 < job.options.max_attempts() {
        let backoff_ms = job.options.backoff_ms.unwrap_or(0);
        let at = now.saturating_add(i64::try_from(backoff_ms).unwrap_or(i64::MAX));
        FailureAction::Retry { at, backoff_ms }
    } else {
        FailureAction::Fail
    }
}

/// Move active jobs whose owner lock expired back to the wait list
pub(crate) async fn recover_stalled(ctx: &ConsumerContext) -> Result<u64> {
    let mut conn = ctx.conn.clone();
    let recovered: u64 = ctx
        .scripts
        .recover_stalled
        .key(ctx.keys.active())
        .key(ctx.keys.wait())
        .arg(ctx.keys.base())
        .invoke_async(&mut conn)
        .await
        .map_err(|e| map_redis_error("recover stalled jobs", e))?;
    Ok(recovered)
}

/// Re-queue jobs left in the active list, e.g. after a failed completion
/// write, once their lock has expired
pub(crate) async fn run_stalled_checker(ctx: Arc<ConsumerContext>) {
    loop {
        sleep(ctx.stalled_interval).await;
        match recover_stalled(&ctx).await {
            Ok(0) => {}
            Ok(recovered) => info!(
                queue = %ctx.keys.base(),
                recovered = recovered,
                "Stalled jobs moved back to wait"
            ),
            Err(e) => {
                error!(queue = %ctx.keys.base(), error = %e, "Stalled job check error");
                ctx.on_error.on_error(&e);
            }
        }
    }
}

/// Move due delayed jobs to the wait list until the task is aborted
pub(crate) async fn run_promoter(ctx: Arc<ConsumerContext>) {
    debug!(queue = %ctx.keys.base(), "Delayed promoter started");
    loop {
        match move_due_delayed(&ctx).await {
            Ok(0) => {}
            Ok(moved) => debug!(queue = %ctx.keys.base(), moved = moved, "Delayed jobs due"),
            Err(e) => {
                error!(queue = %ctx.keys.base(), error = %e, "Delayed promoter error");
                ctx.on_error.on_error(&e);
                sleep(ERROR_RECOVERY_SLEEP_DURATION).await;
                continue;
            }
        }
        sleep(DELAYED_POLL_INTERVAL).await;
    }
}

async fn move_due_delayed(ctx: &ConsumerContext) -> Result<u64> {
    let now = ctx.time_provider.now_millis();
    let mut conn = ctx.conn.clone();
    let moved: u64 = ctx
        .scripts
        .move_due_delayed
        .key(ctx.keys.delayed())
        .key(ctx.keys.wait())
        .arg(ctx.keys.base())
        .arg(now)
        .arg(DELAYED_MOVE_LIMIT)
        .invoke_async(&mut conn)
        .await
        .map_err(|e| map_redis_error("move delayed jobs", e))?;
    Ok(moved)
}

/// Worker loop: one handler invocation in flight at a time
pub(crate) async fn run_worker(ctx: Arc<ConsumerContext>, worker: usize) {
    info!(queue = %ctx.keys.base(), worker = worker, "Worker started");
    loop {
        match process_next_job(&ctx).await {
            Ok(true) => {}
            Ok(false) => sleep(IDLE_SLEEP_DURATION).await,
            Err(e) => {
                error!(queue = %ctx.keys.base(), worker = worker, error = %e, "Worker error");
                ctx.on_error.on_error(&e);
                sleep(ERROR_RECOVERY_SLEEP_DURATION).await;
            }
        }
    }
}

/// Take the next waiting job and run the handler on it.
///
/// Returns false when the wait list was empty.
async fn process_next_job(ctx: &ConsumerContext) -> Result<bool> {
    let mut conn = ctx.conn.clone();
    let now = ctx.time_provider.now_millis();
    let id: Option<String> = ctx
        .scripts
        .fetch_next
        .key(ctx.keys.wait())
        .key(ctx.keys.active())
        .arg(ctx.keys.base())
        .arg(JOB_LOCK_SECS)
        .arg(now)
        .invoke_async(&mut conn)
        .await
        .map_err(|e| map_redis_error("fetch next job", e))?;
    let Some(id) = id else {
        return Ok(false);
    };

    let hash: HashMap<String, String> = redis::cmd("HGETALL")
        .arg(ctx.keys.job(&id))
        .query_async(&mut conn)
        .await
        .map_err(|e| map_redis_error("HGETALL", e))?;
    let job = match parse_job(&id, JobState::Active, &hash) {
        Ok(Some(job)) => job,
        Ok(None) => {
            warn!(queue = %ctx.keys.base(), job_id = %id, "Job vanished before processing");
            finish_failed(ctx, &id, "job data missing", FailureAction::Fail).await?;
            return Ok(true);
        }
        Err(e) => {
            finish_failed(ctx, &id, &e.to_string(), FailureAction::Fail).await?;
            return Err(e);
        }
    };

    debug!(queue = %ctx.keys.base(), job_id = %id, attempt = job.attempts_made + 1, "Processing job");
    let remove_on_complete = job.options.remove_on_complete;
    let snapshot = job.clone();

    // Spawned so a panicking handler cannot take the worker down
    let handler = Arc::clone(&ctx.handler);
    let mut task = tokio::spawn(async move { handler.handle(job).await });
    let outcome = loop {
        tokio::select! {
            joined = &mut task => break joined,
            _ = sleep(LOCK_RENEW_INTERVAL) => {
                if let Err(e) = renew_lock(ctx, &id).await {
                    warn!(job_id = %id, error = %e, "Job lock renewal failed");
                }
            }
        }
    };

    match outcome {
        Ok(Ok(())) => {
            finish_completed(ctx, &id, remove_on_complete).await?;
            info!(queue = %ctx.keys.base(), job_id = %id, "Job completed");
        }
        Ok(Err(e)) => {
            // The listener already reported handler errors
            let action = failure_action(&snapshot, ctx.time_provider.now_millis());
            finish_failed(ctx, &id, &e.to_string(), action).await?;
            log_failure(ctx, &id, &e, action);
        }
        Err(join_err) => {
            let e = if join_err.is_panic() {
                AppError::Handler(format!("handler panicked on job {}", id))
            } else {
                AppError::Handler(format!("handler cancelled on job {}", id))
            };
            error!(queue = %ctx.keys.base(), job_id = %id, error = %e, "Job handler aborted");
            ctx.on_error.on_error(&e);
            let action = failure_action(&snapshot, ctx.time_provider.now_millis());
            finish_failed(ctx, &id, &e.to_string(), action).await?;
        }
    }
    Ok(true)
}

fn log_failure(ctx: &ConsumerContext, id: &str, e: &AppError, action: FailureAction) {
    match action {
        FailureAction::Retry { backoff_ms, .. } => info!(
            queue = %ctx.keys.base(),
            job_id = %id,
            backoff_ms = backoff_ms,
            error = %e,
            "Retrying job after failure"
        ),
        FailureAction::Fail => warn!(
            queue = %ctx.keys.base(),
            job_id = %id,
            error = %e,
            "Job failed"
        ),
    }
}

async fn renew_lock(ctx: &ConsumerContext, id: &str) -> Result<()> {
    let mut conn = ctx.conn.clone();
    let _: i64 = ctx
        .scripts
        .renew_lock
        .key(ctx.keys.lock(id))
        .arg(JOB_LOCK_SECS)
        .invoke_async(&mut conn)
        .await
        .map_err(|e| map_redis_error("renew job lock", e))?;
    Ok(())
}

async fn finish_completed(ctx: &ConsumerContext, id: &str, remove: bool) -> Result<()> {
    let mut conn = ctx.conn.clone();
    let _: i64 = ctx
        .scripts
        .complete
        .key(ctx.keys.active())
        .key(ctx.keys.completed())
        .key(ctx.keys.job(id))
        .key(ctx.keys.lock(id))
        .arg(id)
        .arg(ctx.time_provider.now_millis())
        .arg(if remove { "1" } else { "0" })
        .invoke_async(&mut conn)
        .await
        .map_err(|e| map_redis_error("complete job", e))?;
    Ok(())
}

async fn finish_failed(
    ctx: &ConsumerContext,
    id: &str,
    reason: &str,
    action: FailureAction,
) -> Result<()> {
    let (retry_at, backoff_ms) = match action {
        FailureAction::Retry { at, backoff_ms } => (at, backoff_ms),
        FailureAction::Fail => (-1, 0),
    };
    let mut conn = ctx.conn.clone();
    let _: i64 = ctx
        .scripts
        .fail
        .key(ctx.keys.active())
        .key(ctx.keys.failed())
        .key(ctx.keys.job(id))
        .key(ctx.keys.lock(id))
        .key(ctx.keys.delayed())
        .arg(id)
        .arg(ctx.time_provider.now_millis())
        .arg(reason)
        .arg(retry_at)
        .arg(backoff_ms)
        .invoke_async(&mut conn)
        .await
        .map_err(|e| map_redis_error("fail job", e))?;
    Ok(())
}
