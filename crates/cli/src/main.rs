//! qcache CLI - Publish jobs, inspect queues, listen and manage the cache

mod cache_cmd;
mod logging;
mod queue_cmd;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use settings::Settings;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "qcache.toml";

#[derive(Parser)]
#[command(name = "qcache")]
#[command(about = "Queue and cache facade CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); QCACHE__* variables override it
    #[arg(long, env = "QCACHE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue one job
    Publish {
        /// Job data as JSON
        #[arg(long)]
        data: String,

        /// Optional job name
        #[arg(long)]
        name: Option<String>,

        /// Delay before the job becomes eligible (ms)
        #[arg(long, default_value_t = qcache_core::application::constants::DEFAULT_PUBLISH_DELAY_MS)]
        delay: u64,

        /// Total attempts including the first one
        #[arg(long)]
        attempts: Option<u32>,

        /// Fixed delay between attempts (ms)
        #[arg(long)]
        backoff: Option<u64>,
    },

    /// Append items to batch jobs
    PublishBatch {
        /// Items as a JSON array
        #[arg(long)]
        items: String,

        /// Delay of newly created batches (ms)
        #[arg(long, default_value_t = qcache_core::application::constants::DEFAULT_BATCH_DELAY_MS)]
        delay: u64,

        /// Items per batch
        #[arg(long, default_value_t = qcache_core::application::constants::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },

    /// List jobs of the queue
    Jobs {
        /// Only these states (waiting, delayed, active, completed, failed)
        #[arg(long, value_delimiter = ',')]
        state: Vec<String>,
    },

    /// Consume jobs and print them until Ctrl-C
    Listen {
        /// Handler invocations in flight at once
        #[arg(long, default_value_t = qcache_core::application::constants::DEFAULT_MAX_IN_PROGRESS)]
        max_in_progress: usize,
    },

    /// Cache operations
    #[command(subcommand)]
    Cache(cache_cmd::CacheCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init()?;

    let settings = Settings::load(&cli.config)?;

    match cli.command {
        Commands::Publish {
            data,
            name,
            delay,
            attempts,
            backoff,
        } => queue_cmd::publish(&settings, &data, name, delay, attempts, backoff).await,
        Commands::PublishBatch {
            items,
            delay,
            batch_size,
        } => queue_cmd::publish_batch(&settings, &items, delay, batch_size).await,
        Commands::Jobs { state } => queue_cmd::jobs(&settings, &state).await,
        Commands::Listen { max_in_progress } => queue_cmd::listen(&settings, max_in_progress).await,
        Commands::Cache(command) => cache_cmd::run(&settings, command).await,
    }
}
