// Application Layer - Queue and Cache facades

pub mod cache_service;
pub mod constants;
pub mod queue_service;

// Re-exports
pub use cache_service::{CacheService, CachedFn};
pub use queue_service::{BatchPublishReport, ListenerConfig, QueueService};
