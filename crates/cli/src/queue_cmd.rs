// Queue subcommands

use crate::settings::Settings;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use qcache_core::application::ListenerConfig;
use qcache_core::domain::{JobOptions, JobState, PublishPayload, QueuedJob};
use qcache_core::error::AppError;
use qcache_core::port::handler_fn;
use qcache_core::QueueService;
use qcache_infra_redis::connect_queue_service;
use serde_json::Value;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::{error, info};

#[derive(Tabled)]
struct JobRow {
    id: String,
    name: String,
    state: String,
    items: String,
    attempts: u32,
    failed_reason: String,
}

impl From<&QueuedJob> for JobRow {
    fn from(job: &QueuedJob) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone().unwrap_or_else(|| "-".to_string()),
            state: job.state.to_string(),
            items: job
                .batch_len()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            attempts: job.attempts_made,
            failed_reason: job.failed_reason.clone().unwrap_or_default(),
        }
    }
}

async fn queue_service(settings: &Settings) -> Result<QueueService> {
    let config = settings.queue()?;
    connect_queue_service(config)
        .await
        .context("Failed to connect queue service")
}

fn parse_json(raw: &str, what: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("Invalid JSON {}", what))
}

pub fn parse_states(raw: &[String]) -> Result<Vec<JobState>> {
    if raw.is_empty() {
        return Ok(JobState::ALL.to_vec());
    }
    raw.iter()
        .map(|s| {
            JobState::ALL
                .iter()
                .copied()
                .find(|state| state.as_str() == s.trim().to_lowercase())
                .with_context(|| format!("Unknown job state: {}", s))
        })
        .collect()
}

pub async fn publish(
    settings: &Settings,
    data: &str,
    name: Option<String>,
    delay: u64,
    attempts: Option<u32>,
    backoff: Option<u64>,
) -> Result<()> {
    let data = parse_json(data, "job data")?;
    let payload = match name {
        Some(name) => PublishPayload::Spread(vec![Value::String(name), data]),
        None => PublishPayload::Data(data),
    };
    let options = JobOptions {
        attempts,
        backoff_ms: backoff,
        ..Default::default()
    };

    let service = queue_service(settings).await?;
    let handle = service.publish(payload, delay, options).await?;

    println!("{}", format!("✓ Job {} published", handle.id).green().bold());
    Ok(())
}

pub async fn publish_batch(
    settings: &Settings,
    items: &str,
    delay: u64,
    batch_size: usize,
) -> Result<()> {
    let items = match parse_json(items, "items")? {
        Value::Array(items) => items,
        _ => bail!("--items must be a JSON array"),
    };
    let count = items.len();

    let service = queue_service(settings).await?;
    let report = service.publish_in_batches(items, delay, batch_size).await?;

    println!("{}", format!("✓ {} items published", count).green().bold());
    println!("  {} {}", "Batches created:".bold(), report.created.len());
    println!("  {} {}", "Items appended:".bold(), report.appended);
    println!("  {} {}", "Batches promoted:".bold(), report.promoted.len());
    Ok(())
}

pub async fn jobs(settings: &Settings, states: &[String]) -> Result<()> {
    let states = parse_states(states)?;
    let service = queue_service(settings).await?;
    let jobs = service.queue().get_jobs(&states).await?;

    if jobs.is_empty() {
        println!("{}", "No jobs".yellow());
        return Ok(());
    }
    let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

pub async fn listen(settings: &Settings, max_in_progress: usize) -> Result<()> {
    let service = queue_service(settings).await?;

    let handler = handler_fn(|job: QueuedJob| async move {
        let line = serde_json::to_string(&job)?;
        println!("{}", line);
        Ok::<(), AppError>(())
    });
    let on_error = |e: &AppError| error!(error = %e, "Consumer error");

    service.add_listener(
        ListenerConfig::new(Arc::new(handler), Arc::new(on_error))
            .with_max_in_progress(max_in_progress),
    )?;
    service.start_listener().await?;

    println!(
        "{}",
        format!("Listening on {} (Ctrl-C to stop)", service.queue_name())
            .cyan()
            .bold()
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl-C")?;
    info!(queue = %service.queue_name(), "Shutting down listener");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_states() {
        assert_eq!(parse_states(&[]).unwrap(), JobState::ALL.to_vec());
        assert_eq!(
            parse_states(&["Delayed".to_string(), " failed".to_string()]).unwrap(),
            vec![JobState::Delayed, JobState::Failed]
        );
        assert!(parse_states(&["paused".to_string()]).is_err());
    }

    #[test]
    fn test_job_row_marks_batches() {
        let job = QueuedJob {
            id: "3".to_string(),
            name: None,
            data: serde_json::json!([1, 2, 3]),
            state: JobState::Delayed,
            options: JobOptions::default(),
            attempts_made: 0,
            timestamp: 0,
            failed_reason: None,
        };
        let row = JobRow::from(&job);
        assert_eq!(row.items, "3");
        assert_eq!(row.name, "-");
        assert_eq!(row.state, "delayed");
    }
}
