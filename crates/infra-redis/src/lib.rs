// qcache Infrastructure - Redis Adapter
// Implements: JobQueue (delayed job queue + consumer), KeyValueStore

mod connection;
mod constants;
mod consumer;
mod error;
mod job_queue;
mod keys;
mod kv_store;
mod scripts;
mod service;

pub use connection::connect;
pub use job_queue::RedisJobQueue;
pub use keys::QueueKeys;
pub use kv_store::RedisKeyValueStore;
pub use service::{connect_cache_service, connect_queue_service};

// Note: redis::RedisError conversion is handled by map_redis_error
// due to Rust's orphan rules (cannot implement From<redis::RedisError> for AppError here)
