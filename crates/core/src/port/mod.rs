// Port Layer - Interfaces for external collaborators

pub mod codec;
pub mod handler;
pub mod job_queue;
pub mod kv_store;
pub mod time_provider;

// Re-exports
pub use codec::CompressionCodec;
pub use handler::{handler_fn, ErrorHandler, FnHandler, MessageHandler};
pub use job_queue::JobQueue;
pub use kv_store::KeyValueStore;
pub use time_provider::{SystemTimeProvider, TimeProvider};
