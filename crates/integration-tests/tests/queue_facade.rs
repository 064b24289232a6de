//! Queue facade end to end over the in-memory job queue

use qcache_core::application::ListenerConfig;
use qcache_core::domain::{
    ConnectionParams, JobOptions, JobState, ListenerState, PublishPayload, QueueServiceConfig,
    QueuedJob, ServiceType,
};
use qcache_core::error::AppError;
use qcache_core::port::{handler_fn, ErrorHandler};
use qcache_core::port::job_queue::mocks::InMemoryJobQueue;
use qcache_core::QueueService;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn config() -> QueueServiceConfig {
    QueueServiceConfig::bull("notifications", "app", ConnectionParams::new("localhost", 6379))
}

fn service() -> (QueueService, Arc<InMemoryJobQueue>) {
    let queue = Arc::new(InMemoryJobQueue::new());
    let service = QueueService::new(&config(), queue.clone()).unwrap();
    (service, queue)
}

fn payloads(range: std::ops::RangeInclusive<usize>) -> Vec<Value> {
    range.map(|i| json!({"n": i})).collect()
}

/// Missing required fields are rejected at construction
#[test]
fn test_missing_config_fields_rejected() {
    let mut no_prefix = config();
    no_prefix.queue_prefix = String::new();
    assert!(matches!(
        QueueService::new(&no_prefix, Arc::new(InMemoryJobQueue::new())),
        Err(AppError::Config(_))
    ));

    let mut no_connection = config();
    no_connection.connection = None;
    assert!(matches!(
        QueueService::new(&no_connection, Arc::new(InMemoryJobQueue::new())),
        Err(AppError::Config(_))
    ));

    let mut sqs = config();
    sqs.service_type = ServiceType::Sqs;
    assert!(matches!(
        QueueService::new(&sqs, Arc::new(InMemoryJobQueue::new())),
        Err(AppError::Unsupported(_))
    ));
}

/// 25 items with batch size 20: one full promoted batch, one delayed partial
#[tokio::test]
async fn test_twenty_five_items_batch_scenario() {
    let (service, queue) = service();
    service
        .publish_in_batches(payloads(1..=25), 15_000, 20)
        .await
        .unwrap();

    let jobs = queue.jobs();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].data, Value::Array(payloads(1..=20)));
    assert_eq!(jobs[0].state, JobState::Waiting);
    assert_eq!(jobs[1].data, Value::Array(payloads(21..=25)));
    assert_eq!(jobs[1].state, JobState::Delayed);
    assert_eq!(jobs[1].options.delay_ms, 15_000);
}

/// Successive calls keep filling the open batch instead of opening new ones
#[tokio::test]
async fn test_successive_calls_fill_open_batch() {
    let (service, queue) = service();
    for i in 0..3 {
        service
            .publish_in_batches(vec![json!(i)], 15_000, 5)
            .await
            .unwrap();
    }
    let jobs = queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].batch_len(), Some(3));
    assert_eq!(jobs[0].state, JobState::Delayed);
}

/// Items are never lost or duplicated across batches
#[tokio::test]
async fn test_every_item_lands_exactly_once() {
    let (service, queue) = service();
    let items = payloads(1..=47);
    service
        .publish_in_batches(items.clone(), 1_000, 10)
        .await
        .unwrap();

    let flattened: Vec<Value> = queue
        .jobs()
        .into_iter()
        .flat_map(|job| job.data.as_array().cloned().unwrap_or_default())
        .collect();
    assert_eq!(flattened, items);
}

#[tokio::test]
async fn test_spread_payload_with_name() {
    let (service, queue) = service();
    let handle = service
        .publish(
            PublishPayload::Spread(vec![json!("welcome"), Value::Null, json!({"to": "x"})]),
            0,
            JobOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(handle.name.as_deref(), Some("welcome"));
    let job = queue.job(&handle.id).unwrap();
    assert_eq!(job.data, json!({"to": "x"}));
    assert_eq!(job.state, JobState::Waiting);

    let err = service
        .publish(
            PublishPayload::Spread(vec![json!(1), json!(2), json!(3)]),
            0,
            JobOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

/// Registered handler receives published jobs; failures reach the error handler
#[tokio::test]
async fn test_listener_delivers_jobs() {
    let (service, queue) = service();
    let seen = Arc::new(Mutex::new(Vec::<Value>::new()));
    let errors = Arc::new(Mutex::new(0usize));

    let sink = Arc::clone(&seen);
    let error_count = Arc::clone(&errors);
    service
        .add_listener(
            ListenerConfig::new(
                Arc::new(handler_fn(move |job: QueuedJob| {
                    let sink = Arc::clone(&sink);
                    async move {
                        if job.data == json!("poison") {
                            return Err(AppError::Handler("poison message".to_string()));
                        }
                        sink.lock().unwrap().push(job.data);
                        Ok(())
                    }
                })),
                Arc::new(move |_e: &AppError| *error_count.lock().unwrap() += 1),
            )
            .with_max_in_progress(2),
        )
        .unwrap();
    assert_eq!(service.listener_state(), ListenerState::Registered);

    service.start_listener().await.unwrap();
    assert_eq!(service.listener_state(), ListenerState::Listening);

    service
        .publish(json!("hello"), 0, JobOptions::default())
        .await
        .unwrap();
    service
        .publish(json!("poison"), 0, JobOptions::default())
        .await
        .unwrap();
    assert_eq!(queue.drain().await, 2);

    assert_eq!(seen.lock().unwrap().as_slice(), [json!("hello")]);
    assert_eq!(*errors.lock().unwrap(), 1);
    // Completed jobs are removed; the failed one stays
    let remaining = queue.jobs();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].state, JobState::Failed);
}

fn ignore_errors() -> Arc<dyn ErrorHandler> {
    Arc::new(|_e: &AppError| {})
}

/// No more than `max_in_progress` handler calls overlap
#[tokio::test]
async fn test_listener_bounds_handlers_in_flight() {
    let (service, queue) = service();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let current = Arc::clone(&in_flight);
    let highest = Arc::clone(&peak);
    service
        .add_listener(
            ListenerConfig::new(
                Arc::new(handler_fn(move |_job: QueuedJob| {
                    let current = Arc::clone(&current);
                    let highest = Arc::clone(&highest);
                    async move {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        highest.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                })),
                ignore_errors(),
            )
            .with_max_in_progress(2),
        )
        .unwrap();
    service.start_listener().await.unwrap();

    for i in 0..6 {
        service
            .publish(json!(i), 0, JobOptions::default())
            .await
            .unwrap();
    }
    assert_eq!(queue.drain().await, 6);

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    assert!(queue.jobs().is_empty());
}

/// A failed attempt is retried while attempts remain
#[tokio::test]
async fn test_failed_job_retried_until_attempts_exhausted() {
    let (service, queue) = service();
    let attempts_seen = Arc::new(Mutex::new(Vec::<u32>::new()));

    let sink = Arc::clone(&attempts_seen);
    service
        .add_listener(ListenerConfig::new(
            Arc::new(handler_fn(move |job: QueuedJob| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(job.attempts_made);
                    if job.data == json!("flaky") && job.attempts_made == 0 {
                        return Err(AppError::Handler("first try".to_string()));
                    }
                    if job.data == json!("broken") {
                        return Err(AppError::Handler("always".to_string()));
                    }
                    Ok(())
                }
            })),
            ignore_errors(),
        ))
        .unwrap();
    service.start_listener().await.unwrap();

    let twice = JobOptions {
        attempts: Some(2),
        ..Default::default()
    };
    service.publish(json!("flaky"), 0, twice.clone()).await.unwrap();
    let broken = service.publish(json!("broken"), 0, twice).await.unwrap();
    assert_eq!(queue.drain().await, 4);

    let mut seen = attempts_seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec![0, 0, 1, 1]);

    // The flaky job succeeded on its retry and was removed
    let remaining = queue.jobs();
    assert_eq!(remaining.len(), 1);
    let job = queue.job(&broken.id).unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts_made, 2);
    assert_eq!(job.failed_reason.as_deref(), Some("Handler error: always"));
}

/// A retry with a backoff waits in the delayed state
#[tokio::test]
async fn test_retry_with_backoff_goes_back_to_delayed() {
    let (service, queue) = service();
    service
        .add_listener(ListenerConfig::new(
            Arc::new(handler_fn(|_job: QueuedJob| async {
                Err(AppError::Handler("down".to_string()))
            })),
            ignore_errors(),
        ))
        .unwrap();
    service.start_listener().await.unwrap();

    let handle = service
        .publish(
            json!("ping"),
            0,
            JobOptions {
                attempts: Some(3),
                backoff_ms: Some(1_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(queue.drain().await, 1);

    let job = queue.job(&handle.id).unwrap();
    assert_eq!(job.state, JobState::Delayed);
    assert_eq!(job.attempts_made, 1);

    queue.set_state(&handle.id, JobState::Waiting);
    assert_eq!(queue.drain().await, 1);
    assert_eq!(queue.job(&handle.id).unwrap().attempts_made, 2);
}
