// Job Domain Model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Job ID assigned by the backing queue
pub type JobId = String;

/// Job state as reported by the backing queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Eligible for processing
    Waiting,
    /// Waiting with delay remaining; `promote` moves it to `Waiting`
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobState {
    /// Every state, in the order the batcher scans them
    pub const ALL: [JobState; 5] = [
        JobState::Waiting,
        JobState::Delayed,
        JobState::Active,
        JobState::Completed,
        JobState::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Delayed => "delayed",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backing-queue job options.
///
/// The queue facade always overrides `delay_ms` with the publish delay and
/// forces `remove_on_complete`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default)]
    pub delay_ms: u64,

    #[serde(default)]
    pub remove_on_complete: bool,

    /// Total attempts including the first one (None = 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,

    /// Fixed delay before a failed attempt is retried
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_ms: Option<u64>,
}

impl JobOptions {
    /// Merge these options over the facade defaults
    pub fn with_facade_defaults(mut self, delay_ms: u64) -> Self {
        self.remove_on_complete = true;
        self.delay_ms = delay_ms;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.attempts.unwrap_or(1).max(1)
    }
}

/// Arguments of a single backing enqueue call
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub name: Option<String>,
    pub data: Value,
    pub options: JobOptions,
}

impl NewJob {
    pub fn new(data: Value, options: JobOptions) -> Self {
        Self {
            name: None,
            data,
            options,
        }
    }

    pub fn named(name: impl Into<String>, data: Value, options: JobOptions) -> Self {
        Self {
            name: Some(name.into()),
            data,
            options,
        }
    }
}

/// Payload accepted by `QueueService::publish`
#[derive(Debug, Clone, PartialEq)]
pub enum PublishPayload {
    /// Enqueued as-is
    Data(Value),
    /// Spread as positional enqueue arguments: `[data]` or `[name, data]`
    Spread(Vec<Value>),
}

impl PublishPayload {
    /// Resolve the payload into the arguments of one enqueue call.
    ///
    /// Falsy elements of a spread payload are dropped before the shape is checked.
    pub fn into_new_job(self, options: JobOptions) -> crate::domain::error::Result<NewJob> {
        match self {
            PublishPayload::Data(data) => Ok(NewJob::new(data, options)),
            PublishPayload::Spread(values) => {
                let mut args: Vec<Value> = values.into_iter().filter(is_truthy).collect();
                match args.len() {
                    1 => Ok(NewJob::new(args.remove(0), options)),
                    2 => {
                        let data = args.remove(1);
                        match args.remove(0) {
                            Value::String(name) => Ok(NewJob::named(name, data, options)),
                            other => Err(crate::domain::DomainError::ValidationError(format!(
                                "spread payload job name must be a string, got {}",
                                other
                            ))),
                        }
                    }
                    n => Err(crate::domain::DomainError::ValidationError(format!(
                        "spread payload must resolve to [data] or [name, data], got {} arguments",
                        n
                    ))),
                }
            }
        }
    }
}

impl From<Value> for PublishPayload {
    fn from(value: Value) -> Self {
        PublishPayload::Data(value)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Handle returned by an enqueue call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: JobId,
    pub name: Option<String>,
}

/// A job observed in the backing queue.
///
/// A job whose `data` is a JSON array is a batch; items are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: JobId,
    pub name: Option<String>,
    pub data: Value,
    pub state: JobState,
    pub options: JobOptions,
    pub attempts_made: u32,
    pub timestamp: i64, // epoch ms
    pub failed_reason: Option<String>,
}

impl QueuedJob {
    /// Number of items when the job is a batch
    pub fn batch_len(&self) -> Option<usize> {
        self.data.as_array().map(|items| items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spread_payload_drops_falsy_arguments() {
        let payload = PublishPayload::Spread(vec![json!(null), json!({"a": 1}), json!(false)]);
        let job = payload.into_new_job(JobOptions::default()).unwrap();
        assert_eq!(job.name, None);
        assert_eq!(job.data, json!({"a": 1}));
    }

    #[test]
    fn test_spread_payload_named_job() {
        let payload = PublishPayload::Spread(vec![json!("send-mail"), json!({"to": "x"})]);
        let job = payload.into_new_job(JobOptions::default()).unwrap();
        assert_eq!(job.name.as_deref(), Some("send-mail"));
        assert_eq!(job.data, json!({"to": "x"}));
    }

    #[test]
    fn test_spread_payload_rejects_bad_shapes() {
        assert!(PublishPayload::Spread(vec![])
            .into_new_job(JobOptions::default())
            .is_err());
        assert!(PublishPayload::Spread(vec![json!(1), json!(2)])
            .into_new_job(JobOptions::default())
            .is_err());
        assert!(PublishPayload::Spread(vec![json!("a"), json!("b"), json!("c")])
            .into_new_job(JobOptions::default())
            .is_err());
    }

    #[test]
    fn test_facade_defaults_force_remove_on_complete() {
        let opts = JobOptions {
            attempts: Some(3),
            ..Default::default()
        }
        .with_facade_defaults(250);
        assert!(opts.remove_on_complete);
        assert_eq!(opts.delay_ms, 250);
        assert_eq!(opts.max_attempts(), 3);
    }

    #[test]
    fn test_batch_len_only_for_arrays() {
        let mut job = QueuedJob {
            id: "1".into(),
            name: None,
            data: json!([1, 2]),
            state: JobState::Delayed,
            options: JobOptions::default(),
            attempts_made: 0,
            timestamp: 0,
            failed_reason: None,
        };
        assert_eq!(job.batch_len(), Some(2));

        job.data = json!({"not": "a batch"});
        assert_eq!(job.batch_len(), None);
    }
}
