// Configuration loading (file + environment)

use anyhow::{Context, Result};
use qcache_core::domain::{CacheConfig, QueueServiceConfig};
use serde::Deserialize;
use std::path::Path;

/// Environment prefix; `QCACHE__QUEUE__QUEUE_NAME=mail` sets `queue.queue_name`
const ENV_PREFIX: &str = "QCACHE";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub queue: Option<QueueServiceConfig>,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

impl Settings {
    /// Load `path` (TOML, optional) overlaid by `QCACHE__*` variables
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::File::new(&path.to_string_lossy(), config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn queue(&self) -> Result<&QueueServiceConfig> {
        self.queue
            .as_ref()
            .context("Missing [queue] section in configuration")
    }

    pub fn cache(&self) -> Result<&CacheConfig> {
        self.cache
            .as_ref()
            .context("Missing [cache] section in configuration")
    }
}
