// Cache subcommands

use crate::settings::Settings;
use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use qcache_core::CacheService;
use qcache_infra_codec::Lz4Codec;
use qcache_infra_redis::connect_cache_service;
use std::sync::Arc;

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Print the value stored under a key
    Get {
        key: String,

        /// Read from the global namespace
        #[arg(long)]
        global: bool,
    },

    /// Store a value (compressed)
    Set {
        key: String,
        value: String,

        /// Expiry in seconds (default two hours)
        #[arg(long)]
        ttl: Option<u64>,

        /// Write to the global namespace
        #[arg(long)]
        global: bool,
    },

    /// Remove a key of the service namespace
    Del { key: String },

    /// Change the expiry of a key of the service namespace
    Ttl { key: String, seconds: u64 },

    /// Delete every key matching a glob pattern (full key names)
    DelPattern { pattern: String },
}

async fn cache_service(settings: &Settings) -> Result<CacheService> {
    let config = settings.cache()?;
    connect_cache_service(config, Arc::new(Lz4Codec::new()))
        .await
        .context("Failed to connect cache service")
}

pub async fn run(settings: &Settings, command: CacheCommand) -> Result<()> {
    let cache = cache_service(settings).await?;

    match command {
        CacheCommand::Get { key, global } => {
            let value = if global {
                cache.get_global_key(&key).await?
            } else {
                cache.get_key(&key).await?
            };
            match value {
                Some(value) => println!("{}", value),
                None => println!("{}", format!("(no value for {})", key).yellow()),
            }
        }

        CacheCommand::Set {
            key,
            value,
            ttl,
            global,
        } => {
            if global {
                cache.set_global_key(&key, &value, ttl).await?;
            } else {
                cache.set_key(&key, &value, ttl).await?;
            }
            println!("{}", format!("✓ {} stored", key).green().bold());
        }

        CacheCommand::Del { key } => {
            let removed = cache.remove_key(&key).await?;
            if removed > 0 {
                println!("{}", format!("✓ {} removed", key).green().bold());
            } else {
                println!("{}", format!("(no value for {})", key).yellow());
            }
        }

        CacheCommand::Ttl { key, seconds } => {
            if cache.set_key_ttl(&key, seconds).await? {
                println!("{}", format!("✓ {} expires in {}s", key, seconds).green().bold());
            } else {
                println!("{}", format!("(no value for {})", key).yellow());
            }
        }

        CacheCommand::DelPattern { pattern } => {
            let deleted = cache.remove_keys_by_pattern(&pattern).await?;
            println!(
                "{}",
                format!("✓ {} keys matching {} deleted", deleted, pattern)
                    .green()
                    .bold()
            );
        }
    }

    Ok(())
}
