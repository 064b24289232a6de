// Facade configuration

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Backing technology behind a queue facade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Sqs,
    /// Redis-backed delayed job queue with batching support
    #[default]
    Bull,
    Kafka,
    Topic,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Sqs => "sqs",
            ServiceType::Bull => "bull",
            ServiceType::Kafka => "kafka",
            ServiceType::Topic => "topic",
        }
    }

    /// Fail fast for declared-but-unimplemented technologies
    pub fn ensure_supported(&self) -> Result<()> {
        match self {
            ServiceType::Bull => Ok(()),
            other => Err(AppError::Unsupported(other.as_str().to_string())),
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broker / store connection parameters
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: Option<u32>,
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            password: None,
            db: None,
        }
    }

    /// Connection URL understood by the redis client
    pub fn to_url(&self) -> String {
        let auth = match &self.password {
            Some(password) if !password.is_empty() => format!(":{}@", password),
            _ => String::new(),
        };
        let db = self.db.map(|db| format!("/{}", db)).unwrap_or_default();
        format!("redis://{}{}:{}{}", auth, self.host, self.port, db)
    }
}

// Never print credentials
impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .finish()
    }
}

impl std::fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)?;
        if let Some(db) = self.db {
            write!(f, "/{}", db)?;
        }
        Ok(())
    }
}

/// Queue facade configuration (immutable after construction)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueServiceConfig {
    #[serde(default)]
    pub service_type: ServiceType,
    #[serde(default)]
    pub queue_name: String,
    #[serde(default)]
    pub queue_prefix: String,
    #[serde(default)]
    pub connection: Option<ConnectionParams>,
}

impl QueueServiceConfig {
    pub fn bull(
        queue_name: impl Into<String>,
        queue_prefix: impl Into<String>,
        connection: ConnectionParams,
    ) -> Self {
        Self {
            service_type: ServiceType::Bull,
            queue_name: queue_name.into(),
            queue_prefix: queue_prefix.into(),
            connection: Some(connection),
        }
    }

    /// Check required fields for the selected service type.
    ///
    /// Runs before any connection is attempted.
    pub fn validate(&self) -> Result<()> {
        self.service_type.ensure_supported()?;

        if self.queue_name.trim().is_empty() {
            return Err(AppError::Config("Missing queueName".to_string()));
        }
        if self.queue_prefix.trim().is_empty() {
            return Err(AppError::Config("Missing queuePrefix".to_string()));
        }
        match &self.connection {
            None => Err(AppError::Config("Missing connection params".to_string())),
            Some(conn) if conn.host.trim().is_empty() => {
                Err(AppError::Config("Missing connection host".to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    /// Validated connection params
    pub fn connection(&self) -> Result<&ConnectionParams> {
        self.validate()?;
        self.connection
            .as_ref()
            .ok_or_else(|| AppError::Config("Missing connection params".to_string()))
    }
}

/// Cache facade configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: Option<u32>,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(AppError::Config("Service name is required".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(AppError::Config("Missing cache host".to_string()));
        }
        Ok(())
    }

    /// Prefix applied to every key of the service-scoped namespace
    pub fn key_prefix(&self) -> String {
        format!("{}:", self.service_name)
    }

    pub fn connection(&self) -> ConnectionParams {
        ConnectionParams {
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone(),
            db: self.db,
        }
    }
}
