// Facade construction over Redis

use crate::connection::connect;
use crate::job_queue::RedisJobQueue;
use crate::kv_store::RedisKeyValueStore;
use qcache_core::domain::{CacheConfig, QueueServiceConfig};
use qcache_core::error::Result;
use qcache_core::port::CompressionCodec;
use qcache_core::{CacheService, QueueService};
use std::sync::Arc;
use tracing::info;

/// Validate `config`, connect and build the queue facade.
///
/// # Errors
/// - AppError::Config / AppError::Unsupported before any connection attempt
/// - AppError::Backend when Redis cannot be reached
pub async fn connect_queue_service(config: &QueueServiceConfig) -> Result<QueueService> {
    let params = config.connection()?;
    let conn = connect(params).await?;
    let queue = RedisJobQueue::new(conn, &config.queue_prefix, &config.queue_name);

    info!(
        queue = %config.queue_name,
        prefix = %config.queue_prefix,
        server = %params,
        "Queue service connected"
    );
    QueueService::new(config, Arc::new(queue))
}

/// Validate `config`, connect and build the cache facade with a service-scoped
/// and a global handle on the same connection.
pub async fn connect_cache_service(
    config: &CacheConfig,
    codec: Arc<dyn CompressionCodec>,
) -> Result<CacheService> {
    config.validate()?;
    let params = config.connection();
    let conn = connect(&params).await?;

    let scoped = RedisKeyValueStore::with_prefix(conn.clone(), config.key_prefix());
    let global = RedisKeyValueStore::new(conn);

    info!(service = %config.service_name, server = %params, "Cache service connected");
    CacheService::new(
        config.service_name.clone(),
        Arc::new(scoped),
        Arc::new(global),
        codec,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcache_core::domain::{ConnectionParams, ServiceType};
    use qcache_core::error::AppError;

    #[tokio::test]
    async fn test_invalid_queue_config_fails_before_connecting() {
        // Port 1 is never listened on; reaching connect() would be a Backend error
        let mut config =
            QueueServiceConfig::bull("mail", "", ConnectionParams::new("127.0.0.1", 1));
        assert!(matches!(
            connect_queue_service(&config).await,
            Err(AppError::Config(_))
        ));

        config.queue_prefix = "app".to_string();
        config.service_type = ServiceType::Kafka;
        assert!(matches!(
            connect_queue_service(&config).await,
            Err(AppError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_cache_without_service_name_fails_before_connecting() {
        let config = CacheConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            service_name: String::new(),
            password: None,
            db: None,
        };
        let codec: Arc<dyn CompressionCodec> =
            Arc::new(qcache_core::port::codec::mocks::TaggingCodec);
        assert!(matches!(
            connect_cache_service(&config, codec).await,
            Err(AppError::Config(_))
        ));
    }
}
