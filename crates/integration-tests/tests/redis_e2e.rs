//! Facades over a live Redis server.
//!
//! Run with: QCACHE_TEST_REDIS_URL=redis://127.0.0.1:6379 cargo test -p qcache-integration-tests -- --ignored

use qcache_core::application::ListenerConfig;
use qcache_core::domain::{
    CacheConfig, ConnectionParams, JobOptions, JobState, QueueServiceConfig, QueuedJob,
};
use qcache_core::error::AppError;
use qcache_core::port::handler_fn;
use qcache_infra_codec::Lz4Codec;
use qcache_infra_redis::{connect_cache_service, connect_queue_service};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// `redis://host:port[/db]` from the environment
fn params() -> Option<ConnectionParams> {
    let url = std::env::var("QCACHE_TEST_REDIS_URL").ok()?;
    let rest = url.strip_prefix("redis://")?;
    let (addr, db) = match rest.split_once('/') {
        Some((addr, db)) => (addr, db.parse::<u32>().ok()),
        None => (rest, None),
    };
    let (host, port) = addr.split_once(':').unwrap_or((addr, "6379"));
    let mut params = ConnectionParams::new(host, port.parse().ok()?);
    params.db = db;
    Some(params)
}

fn unique(name: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("qcache-e2e-{}-{}", name, nanos)
}

#[tokio::test]
#[ignore]
async fn test_batches_on_redis() {
    let Some(params) = params() else {
        return;
    };
    let config = QueueServiceConfig::bull("batches", unique("batch"), params);
    let service = connect_queue_service(&config).await.unwrap();

    let items: Vec<_> = (1..=25).map(|i| json!(format!("p{}", i))).collect();
    let report = service
        .publish_in_batches(items, 15_000, 20)
        .await
        .unwrap();
    assert_eq!(report.created.len(), 2);
    assert_eq!(report.promoted.len(), 1);

    let waiting = service.queue().get_jobs(&[JobState::Waiting]).await.unwrap();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].batch_len(), Some(20));

    let delayed = service.queue().get_jobs(&[JobState::Delayed]).await.unwrap();
    assert_eq!(delayed.len(), 1);
    assert_eq!(delayed[0].batch_len(), Some(5));
    assert_eq!(delayed[0].options.delay_ms, 15_000);
}

#[tokio::test]
#[ignore]
async fn test_listener_consumes_published_jobs() {
    let Some(params) = params() else {
        return;
    };
    let config = QueueServiceConfig::bull("listen", unique("listen"), params);
    let service = connect_queue_service(&config).await.unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    service
        .add_listener(ListenerConfig::new(
            Arc::new(handler_fn(move |job: QueuedJob| {
                let tx = tx.clone();
                async move {
                    tx.send(job.data)
                        .map_err(|e| AppError::Handler(e.to_string()))
                }
            })),
            Arc::new(|e: &AppError| eprintln!("consumer error: {}", e)),
        ))
        .unwrap();
    service.start_listener().await.unwrap();

    service
        .publish(json!({"hello": "redis"}), 0, JobOptions::default())
        .await
        .unwrap();
    // Delayed by 300ms: picked up by the promoter loop
    service
        .publish(json!({"later": true}), 300, JobOptions::default())
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, json!({"hello": "redis"}));
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, json!({"later": true}));
}

#[tokio::test]
#[ignore]
async fn test_cache_on_redis() {
    let Some(params) = params() else {
        return;
    };
    let service_name = unique("cache");
    let config = CacheConfig {
        host: params.host.clone(),
        port: params.port,
        service_name: service_name.clone(),
        password: None,
        db: params.db,
    };
    let cache = connect_cache_service(&config, Arc::new(Lz4Codec::new()))
        .await
        .unwrap();

    cache.set_key("greeting", "hello", Some(60)).await.unwrap();
    assert_eq!(
        cache.get_key("greeting").await.unwrap().as_deref(),
        Some("hello")
    );
    assert_ne!(
        cache.get_uncompressed_key("greeting").await.unwrap(),
        Some(b"hello".to_vec())
    );

    let keys = vec!["a".to_string(), "b".to_string()];
    cache
        .set_values(&keys, &["1".to_string(), "2".to_string()], Some(60))
        .await
        .unwrap();
    assert_eq!(
        cache.get_values(&keys).await.unwrap(),
        vec![Some("1".to_string()), Some("2".to_string())]
    );

    let deleted = cache
        .remove_keys_by_pattern(&format!("{}:*", service_name))
        .await
        .unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(cache.get_key("greeting").await.unwrap(), None);
}
