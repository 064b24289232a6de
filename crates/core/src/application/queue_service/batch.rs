// Batched publish use case
//
// Every item goes to the open batch closest to completion. A batch that
// reaches `batch_size` is promoted so it skips the rest of its delay.

use crate::domain::{JobId, JobOptions, JobState, NewJob, QueuedJob};
use crate::error::{AppError, Result};
use crate::port::JobQueue;
use serde_json::Value;
use tracing::{debug, info};

/// What a `publish_in_batches` call did to the queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPublishReport {
    /// Batch jobs created, in creation order
    pub created: Vec<JobId>,
    /// Items appended to existing batches
    pub appended: usize,
    /// Batches promoted after filling up
    pub promoted: Vec<JobId>,
}

/// Index of the open batch with the most items.
///
/// Only jobs whose data is an array count as batches. Ties go to the job
/// listed first, so the choice is deterministic for a given queue ordering.
pub fn select_batch(jobs: &[QueuedJob], batch_size: usize) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (idx, job) in jobs.iter().enumerate() {
        let Some(len) = job.batch_len() else {
            continue;
        };
        if len >= batch_size {
            continue;
        }
        if best.map_or(true, |(_, best_len)| len > best_len) {
            best = Some((idx, len));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Execute batched publish, strictly one item after another
///
/// # Arguments
/// * `queue` - backing job queue
/// * `items` - logical payload items, appended in order
/// * `delay_ms` - delay of newly created batch jobs
/// * `batch_size` - items per batch; a full batch is promoted
pub async fn execute(
    queue: &dyn JobQueue,
    items: Vec<Value>,
    delay_ms: u64,
    batch_size: usize,
) -> Result<BatchPublishReport> {
    if batch_size == 0 {
        return Err(AppError::Validation(
            "batch_size must be at least 1".to_string(),
        ));
    }

    let mut report = BatchPublishReport::default();
    for item in items {
        let jobs = queue.get_jobs(&JobState::ALL).await?;

        let Some(idx) = select_batch(&jobs, batch_size) else {
            let job = NewJob::new(
                Value::Array(vec![item]),
                JobOptions::default().with_facade_defaults(delay_ms),
            );
            let handle = queue.add(job).await?;
            debug!(job_id = %handle.id, delay_ms = delay_ms, "New batch created");
            report.created.push(handle.id);
            continue;
        };

        let target = &jobs[idx];
        let mut data = target.data.as_array().cloned().unwrap_or_default();
        data.push(item);
        let filled = data.len();

        queue.update_data(&target.id, Value::Array(data)).await?;
        report.appended += 1;

        if filled == batch_size {
            match queue.promote(&target.id).await {
                Ok(()) => {
                    info!(job_id = %target.id, batch_size = batch_size, "Batch full, promoted");
                    report.promoted.push(target.id.clone());
                }
                Err(AppError::PromotionRace(id)) => {
                    debug!(job_id = %id, "Batch full but already left the delayed set");
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::job_queue::mocks::InMemoryJobQueue;
    use serde_json::json;

    fn items(range: std::ops::RangeInclusive<usize>) -> Vec<Value> {
        range.map(|i| json!(format!("p{}", i))).collect()
    }

    fn batch(n: usize) -> Value {
        Value::Array((0..n).map(|i| json!(i)).collect())
    }

    #[test]
    fn test_select_prefers_fullest_open_batch() {
        let queue = InMemoryJobQueue::new();
        queue.seed(batch(3), JobState::Delayed);
        queue.seed(batch(7), JobState::Delayed);
        queue.seed(batch(20), JobState::Waiting);
        queue.seed(json!({"plain": true}), JobState::Delayed);

        let jobs = queue.jobs();
        assert_eq!(select_batch(&jobs, 20), Some(1));
        assert_eq!(select_batch(&jobs[2..], 20), None);
    }

    #[test]
    fn test_select_tie_goes_to_first_listed() {
        let queue = InMemoryJobQueue::new();
        queue.seed(batch(5), JobState::Delayed);
        queue.seed(batch(5), JobState::Delayed);
        assert_eq!(select_batch(&queue.jobs(), 20), Some(0));
    }

    #[tokio::test]
    async fn test_twenty_five_items_make_one_full_and_one_partial_batch() {
        let queue = InMemoryJobQueue::new();
        let report = execute(&queue, items(1..=25), 15_000, 20).await.unwrap();

        let jobs = queue.jobs();
        assert_eq!(jobs.len(), 2);

        let a = &jobs[0];
        assert_eq!(a.data, Value::Array(items(1..=20)));
        assert_eq!(a.state, JobState::Waiting);

        let b = &jobs[1];
        assert_eq!(b.data, Value::Array(items(21..=25)));
        assert_eq!(b.state, JobState::Delayed);
        assert_eq!(b.options.delay_ms, 15_000);
        assert!(b.options.remove_on_complete);

        assert_eq!(report.created, vec![a.id.clone(), b.id.clone()]);
        assert_eq!(report.promoted, vec![a.id.clone()]);
        assert_eq!(report.appended, 23);
    }

    #[tokio::test]
    async fn test_batch_count_invariant() {
        for (k, r) in [(0usize, 3usize), (1, 0), (3, 7), (2, 1)] {
            let batch_size = 10;
            let total = batch_size * k + r;
            let queue = InMemoryJobQueue::new();
            if total > 0 {
                execute(&queue, items(1..=total), 1_000, batch_size)
                    .await
                    .unwrap();
            }

            let jobs = queue.jobs();
            assert_eq!(jobs.len(), k + usize::from(r > 0), "k={} r={}", k, r);
            for job in &jobs[..k] {
                assert_eq!(job.batch_len(), Some(batch_size));
                assert_eq!(job.state, JobState::Waiting);
            }
            if r > 0 {
                assert_eq!(jobs[k].batch_len(), Some(r));
                assert_eq!(jobs[k].state, JobState::Delayed);
            }
            assert_eq!(queue.promote_calls().len(), k);
        }
    }

    #[tokio::test]
    async fn test_greedy_fill_goes_to_longer_batch() {
        let queue = InMemoryJobQueue::new();
        let short = queue.seed(batch(3), JobState::Delayed);
        let long = queue.seed(batch(7), JobState::Delayed);

        execute(&queue, vec![json!("x")], 15_000, 20).await.unwrap();

        assert_eq!(queue.job(&short).unwrap().batch_len(), Some(3));
        let long = queue.job(&long).unwrap();
        assert_eq!(long.batch_len(), Some(8));
        assert_eq!(long.data[7], json!("x"));
    }

    #[tokio::test]
    async fn test_promotion_race_is_swallowed() {
        let queue = InMemoryJobQueue::new();
        let id = queue.seed(batch(19), JobState::Delayed);
        // Delay elapsed and a consumer picked the batch up
        queue.set_state(&id, JobState::Active);

        let report = execute(&queue, vec![json!("last")], 15_000, 20)
            .await
            .unwrap();

        assert_eq!(queue.promote_calls(), vec![id.clone()]);
        assert!(report.promoted.is_empty());
        assert_eq!(queue.job(&id).unwrap().batch_len(), Some(20));
        assert_eq!(queue.jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_batches_do_not_swallow_items() {
        let queue = InMemoryJobQueue::new();
        queue.seed(batch(25), JobState::Delayed);

        let report = execute(&queue, vec![json!("x")], 15_000, 20)
            .await
            .unwrap();

        assert_eq!(report.created.len(), 1);
        assert_eq!(queue.jobs().len(), 2);
    }

    #[tokio::test]
    async fn test_update_failure_propagates() {
        let queue = InMemoryJobQueue::new();
        queue.seed(batch(1), JobState::Delayed);
        queue.fail_updates(true);

        let err = execute(&queue, vec![json!("x")], 15_000, 20)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Backend(_)));
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let queue = InMemoryJobQueue::new();
        let err = execute(&queue, vec![json!(1)], 15_000, 0).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_empty_items_is_noop() {
        let queue = InMemoryJobQueue::new();
        let report = execute(&queue, vec![], 15_000, 20).await.unwrap();
        assert_eq!(report, BatchPublishReport::default());
        assert!(queue.jobs().is_empty());
    }
}
