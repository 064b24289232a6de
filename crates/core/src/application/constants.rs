// Facade constants (no magic values)

/// Delay applied to a freshly created batch job (15s)
pub const DEFAULT_BATCH_DELAY_MS: u64 = 15_000;

/// Items per batch job before it is promoted
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Concurrent handler invocations per listener
pub const DEFAULT_MAX_IN_PROGRESS: usize = 1;

/// Delay of a single `publish` when none is given
pub const DEFAULT_PUBLISH_DELAY_MS: u64 = 0;
