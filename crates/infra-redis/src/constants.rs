// Consumer constants (no magic values)
use std::time::Duration;

/// Sleep duration when the wait list is empty (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a consumer error before the next attempt (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// How often due delayed jobs are moved to the wait list (250ms)
pub const DELAYED_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound of delayed jobs moved per poll
pub const DELAYED_MOVE_LIMIT: usize = 1000;

/// Lifetime of the lock that marks an active job as owned (30s)
pub const JOB_LOCK_SECS: u64 = 30;

/// Lock refresh period while a handler runs
pub const LOCK_RENEW_INTERVAL: Duration = Duration::from_secs(JOB_LOCK_SECS / 2);

/// How often a running consumer looks for active jobs whose lock expired
pub const STALLED_CHECK_INTERVAL: Duration = Duration::from_secs(JOB_LOCK_SECS);

/// Stored job name of anonymous jobs
pub const DEFAULT_JOB_NAME: &str = "__default__";
