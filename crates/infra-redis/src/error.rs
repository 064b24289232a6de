// redis::RedisError -> AppError

use qcache_core::error::AppError;

/// Convert a redis error into a backend error, naming the failed operation
pub(crate) fn map_redis_error(op: &str, err: redis::RedisError) -> AppError {
    if err.is_connection_dropped() || err.is_connection_refusal() {
        return AppError::Backend(format!("Redis {} failed, connection lost: {}", op, err));
    }
    if err.is_timeout() {
        return AppError::Backend(format!("Redis {} timed out: {}", op, err));
    }
    match err.code() {
        Some(code) => AppError::Backend(format!("Redis {} failed [{}]: {}", op, code, err)),
        None => AppError::Backend(format!("Redis {} failed: {}", op, err)),
    }
}
