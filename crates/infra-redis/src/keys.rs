// Redis key layout of one queue

use qcache_core::domain::JobState;

/// Key names under `{prefix}:{queue}:`
///
/// - `id`: job id counter
/// - `{id}`: job hash (`name`, `data`, `opts`, `timestamp`, `delay`,
///   `attemptsMade`, `failedReason`, `processedOn`, `finishedOn`)
/// - `{id}:lock`: consumer ownership marker of an active job
/// - `wait`, `active`: lists, consumed from the right
/// - `delayed`: zset scored by due time
/// - `completed`, `failed`: zsets scored by finish time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    base: String,
}

impl QueueKeys {
    pub fn new(prefix: &str, queue_name: &str) -> Self {
        Self {
            base: format!("{}:{}:", prefix, queue_name),
        }
    }

    /// Common prefix of every key of the queue
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn id(&self) -> String {
        format!("{}id", self.base)
    }

    pub fn job(&self, id: &str) -> String {
        format!("{}{}", self.base, id)
    }

    pub fn lock(&self, id: &str) -> String {
        format!("{}{}:lock", self.base, id)
    }

    pub fn wait(&self) -> String {
        format!("{}wait", self.base)
    }

    pub fn active(&self) -> String {
        format!("{}active", self.base)
    }

    pub fn delayed(&self) -> String {
        format!("{}delayed", self.base)
    }

    pub fn completed(&self) -> String {
        format!("{}completed", self.base)
    }

    pub fn failed(&self) -> String {
        format!("{}failed", self.base)
    }

    /// Structure holding the ids of jobs in `state`
    pub fn state(&self, state: JobState) -> String {
        match state {
            JobState::Waiting => self.wait(),
            JobState::Delayed => self.delayed(),
            JobState::Active => self.active(),
            JobState::Completed => self.completed(),
            JobState::Failed => self.failed(),
        }
    }
}
