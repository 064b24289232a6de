// Lua scripts for the multi-key queue steps
//
// Each script runs atomically on the server. Job keys not passed in KEYS are
// derived from the queue base passed as the first ARGV.

use redis::Script;

/// KEYS: id, wait, delayed
/// ARGV: base, name, data, opts, timestamp, delay, due
/// Returns the new job id.
const ADD_JOB: &str = r#"
local id = redis.call('INCR', KEYS[1])
local jobKey = ARGV[1] .. id
redis.call('HSET', jobKey, 'name', ARGV[2], 'data', ARGV[3], 'opts', ARGV[4],
  'timestamp', ARGV[5], 'delay', ARGV[6], 'attemptsMade', 0)
if tonumber(ARGV[6]) > 0 then
  redis.call('ZADD', KEYS[3], ARGV[7], id)
else
  redis.call('LPUSH', KEYS[2], id)
end
return tostring(id)
"#;

/// KEYS: job
/// ARGV: data
/// Returns 1 when updated, 0 when the job does not exist.
const UPDATE_DATA: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  redis.call('HSET', KEYS[1], 'data', ARGV[1])
  return 1
end
return 0
"#;

/// KEYS: delayed, wait, job
/// ARGV: id
/// Returns 1 when promoted, 0 when the job was not delayed.
const PROMOTE: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 1 then
  redis.call('LPUSH', KEYS[2], ARGV[1])
  redis.call('HSET', KEYS[3], 'delay', 0)
  return 1
end
return 0
"#;

/// KEYS: delayed, wait
/// ARGV: base, now, limit
/// Returns the number of jobs moved.
const MOVE_DUE_DELAYED: &str = r#"
local ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[2], 'LIMIT', 0, ARGV[3])
for _, id in ipairs(ids) do
  redis.call('ZREM', KEYS[1], id)
  redis.call('LPUSH', KEYS[2], id)
  redis.call('HSET', ARGV[1] .. id, 'delay', 0)
end
return #ids
"#;

/// KEYS: wait, active
/// ARGV: base, lock secs, now
/// Returns the id of the job moved to active, or nil.
const FETCH_NEXT: &str = r#"
local id = redis.call('RPOPLPUSH', KEYS[1], KEYS[2])
if not id then
  return false
end
redis.call('SET', ARGV[1] .. id .. ':lock', '1', 'EX', ARGV[2])
redis.call('HSET', ARGV[1] .. id, 'processedOn', ARGV[3])
return id
"#;

/// KEYS: active, completed, job, lock
/// ARGV: id, now, remove ("1" or "0")
const COMPLETE: &str = r#"
redis.call('LREM', KEYS[1], -1, ARGV[1])
redis.call('DEL', KEYS[4])
if ARGV[3] == '1' then
  redis.call('DEL', KEYS[3])
else
  redis.call('ZADD', KEYS[2], ARGV[2], ARGV[1])
  redis.call('HSET', KEYS[3], 'finishedOn', ARGV[2])
end
return 1
"#;

/// KEYS: active, failed, job, lock, delayed
/// ARGV: id, now, reason, retry at (-1 = no retry), backoff
/// Returns 1 when scheduled for retry, 0 when moved to failed.
const FAIL: &str = r#"
redis.call('LREM', KEYS[1], -1, ARGV[1])
redis.call('DEL', KEYS[4])
if redis.call('EXISTS', KEYS[3]) == 0 then
  return 0
end
redis.call('HINCRBY', KEYS[3], 'attemptsMade', 1)
redis.call('HSET', KEYS[3], 'failedReason', ARGV[3])
if tonumber(ARGV[4]) >= 0 then
  redis.call('HSET', KEYS[3], 'delay', ARGV[5])
  redis.call('ZADD', KEYS[5], ARGV[4], ARGV[1])
  return 1
end
redis.call('ZADD', KEYS[2], ARGV[2], ARGV[1])
redis.call('HSET', KEYS[3], 'finishedOn', ARGV[2])
return 0
"#;

/// KEYS: active, wait
/// ARGV: base
/// Active jobs whose lock expired go back to the consuming end of wait.
/// Returns the number of recovered jobs.
const RECOVER_STALLED: &str = r#"
local ids = redis.call('LRANGE', KEYS[1], 0, -1)
local n = 0
for _, id in ipairs(ids) do
  if redis.call('EXISTS', ARGV[1] .. id .. ':lock') == 0 then
    redis.call('LREM', KEYS[1], 1, id)
    redis.call('RPUSH', KEYS[2], id)
    n = n + 1
  end
end
return n
"#;

/// KEYS: lock
/// ARGV: lock secs
const RENEW_LOCK: &str = r#"
return redis.call('EXPIRE', KEYS[1], ARGV[1])
"#;

/// ARGV: pattern
/// Returns the number of deleted keys.
pub const DELETE_MATCHING: &str = r#"
local n = 0
for _, key in ipairs(redis.call('KEYS', ARGV[1])) do
  n = n + redis.call('DEL', key)
end
return n
"#;

/// Loaded queue scripts; shared by the queue handle and its consumer tasks
pub(crate) struct QueueScripts {
    pub add_job: Script,
    pub update_data: Script,
    pub promote: Script,
    pub move_due_delayed: Script,
    pub fetch_next: Script,
    pub complete: Script,
    pub fail: Script,
    pub recover_stalled: Script,
    pub renew_lock: Script,
}

impl QueueScripts {
    pub fn new() -> Self {
        Self {
            add_job: Script::new(ADD_JOB),
            update_data: Script::new(UPDATE_DATA),
            promote: Script::new(PROMOTE),
            move_due_delayed: Script::new(MOVE_DUE_DELAYED),
            fetch_next: Script::new(FETCH_NEXT),
            complete: Script::new(COMPLETE),
            fail: Script::new(FAIL),
            recover_stalled: Script::new(RECOVER_STALLED),
            renew_lock: Script::new(RENEW_LOCK),
        }
    }
}
