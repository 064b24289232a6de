// Domain Layer - Queue and cache entities

pub mod cache;
pub mod config;
pub mod error;
pub mod job;
pub mod listener;

// Re-exports
pub use cache::{CacheFnOptions, DEFAULT_EXPIRY_SECONDS, DEFAULT_MGET_BATCH_SIZE};
pub use config::{CacheConfig, ConnectionParams, QueueServiceConfig, ServiceType};
pub use error::DomainError;
pub use job::{JobHandle, JobId, JobOptions, JobState, NewJob, PublishPayload, QueuedJob};
pub use listener::ListenerState;
