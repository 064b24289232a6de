// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported service type: {0}")]
    Unsupported(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Queue or store call failure. Never retried by the facades.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Promote was called on a job that is no longer delayed
    /// (its delay elapsed or a consumer already picked it up).
    #[error("Job {0} is not in the delayed state")]
    PromotionRace(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Handler error: {0}")]
    Handler(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: redis::RedisError conversion is handled in the infra-redis crate
// by converting to AppError::Backend(String)
