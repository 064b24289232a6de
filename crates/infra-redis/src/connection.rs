// Redis Connection Setup

use crate::error::map_redis_error;
use qcache_core::domain::ConnectionParams;
use qcache_core::error::Result;
use redis::aio::ConnectionManager;
use tracing::debug;

/// Open a multiplexed connection with automatic reconnection
pub async fn connect(params: &ConnectionParams) -> Result<ConnectionManager> {
    let client =
        redis::Client::open(params.to_url()).map_err(|e| map_redis_error("client setup", e))?;

    let mut conn = ConnectionManager::new(client)
        .await
        .map_err(|e| map_redis_error("connect", e))?;

    let pong: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(|e| map_redis_error("PING", e))?;

    debug!(server = %params, reply = %pong, "Redis connected");
    Ok(conn)
}
