// Single publish use case

use crate::domain::{DomainError, JobHandle, JobOptions, PublishPayload};
use crate::error::{AppError, Result};
use crate::port::JobQueue;
use tracing::debug;

/// Execute a single publish: exactly one enqueue call, no local retry
pub async fn execute(
    queue: &dyn JobQueue,
    payload: PublishPayload,
    delay_ms: u64,
    options: JobOptions,
) -> Result<JobHandle> {
    let job = payload
        .into_new_job(options.with_facade_defaults(delay_ms))
        .map_err(|e| match e {
            DomainError::ValidationError(msg) => AppError::Validation(msg),
            other => AppError::Domain(other),
        })?;
    let handle = queue.add(job).await?;

    debug!(job_id = %handle.id, delay_ms = delay_ms, "Job published");
    Ok(handle)
}
