use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info};

use seatline_core::{HoldStatus, HoldStore, SeatError, SeatId, SeatResult};

/// Scans the seat's prefix and sets the caller's key only when nothing
/// matched, all inside one script so no other client can interleave.
///
/// KEYS[1] = caller's hold key
/// ARGV[1] = MATCH pattern for the seat
/// ARGV[2] = token
/// ARGV[3] = ttl in seconds
/// ARGV[4] = SCAN COUNT hint
///
/// Returns the matched keys; an empty reply means the hold was written.
/// The script touches keys it does not declare, so it needs a
/// non-clustered Redis.
///
/// SCAN walks the whole keyspace, not just this seat's keys, and Redis runs
/// nothing else until the script returns. Every reserve therefore costs one
/// full keyspace pass, so keep the hold database free of unrelated keys.
const CLAIM_SCRIPT: &str = r#"
    local matched = {}
    local cursor = "0"
    repeat
        local page = redis.call("SCAN", cursor, "MATCH", ARGV[1], "COUNT", ARGV[4])
        cursor = page[1]
        for _, key in ipairs(page[2]) do
            table.insert(matched, key)
        end
    until cursor == "0"

    if #matched == 0 then
        redis.call("SET", KEYS[1], ARGV[2], "EX", ARGV[3])
    end
    return matched
"#;

pub fn hold_prefix(seat_id: SeatId) -> String {
    format!("seat:{}:", seat_id)
}

pub fn hold_key(seat_id: SeatId, token: &str) -> String {
    format!("seat:{}:{}", seat_id, token)
}

fn token_from_key(seat_id: SeatId, key: &str) -> Option<String> {
    key.strip_prefix(&hold_prefix(seat_id))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Maps client failures onto the seat error taxonomy.
pub(crate) fn hold_store_error(e: redis::RedisError) -> SeatError {
    if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal() {
        SeatError::Unavailable(e.to_string())
    } else {
        SeatError::Internal(e.to_string())
    }
}

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    scan_count: u32,
}

impl RedisClient {
    pub async fn new(connection_string: &str, scan_count: u32) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, scan_count: scan_count.max(1) })
    }

    async fn connection(&self) -> SeatResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(hold_store_error)
    }

    pub async fn ping(&self) -> SeatResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(hold_store_error)?;
        Ok(())
    }
}

#[async_trait]
impl HoldStore for RedisClient {
    async fn set_hold(&self, seat_id: SeatId, token: &str, ttl: Duration) -> SeatResult<()> {
        let mut conn = self.connection().await?;
        let key = hold_key(seat_id, token);
        conn.set_ex::<_, _, ()>(&key, token, ttl.as_secs())
            .await
            .map_err(hold_store_error)?;
        info!("Seat hold set: {}", key);
        Ok(())
    }

    async fn delete_hold(&self, seat_id: SeatId, token: &str) -> SeatResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(hold_key(seat_id, token))
            .await
            .map_err(hold_store_error)
    }

    async fn scan_holds(&self, seat_id: SeatId) -> SeatResult<HashSet<String>> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", hold_prefix(seat_id));

        let mut tokens = HashSet::new();
        let mut cursor: u64 = 0;
        // A page may be empty while the cursor is still live; only cursor 0
        // ends the pass.
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(hold_store_error)?;

            tokens.extend(keys.iter().filter_map(|k| token_from_key(seat_id, k)));

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(seat_id, holds = tokens.len(), "Scanned seat holds");
        Ok(tokens)
    }

    async fn claim_hold(&self, seat_id: SeatId, token: &str, ttl: Duration) -> SeatResult<HoldStatus> {
        let mut conn = self.connection().await?;
        let key = hold_key(seat_id, token);

        let matched: Vec<String> = redis::Script::new(CLAIM_SCRIPT)
            .key(&key)
            .arg(format!("{}*", hold_prefix(seat_id)))
            .arg(token)
            .arg(ttl.as_secs())
            .arg(self.scan_count)
            .invoke_async(&mut conn)
            .await
            .map_err(hold_store_error)?;

        let status = HoldStatus::resolve(
            matched.iter().filter_map(|k| token_from_key(seat_id, k)),
            token,
        );
        if status == HoldStatus::NoHold {
            info!("Seat hold claimed: {}", key);
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_key_shape() {
        assert_eq!(hold_key(7, "tok-A"), "seat:7:tok-A");
        assert_eq!(hold_prefix(7), "seat:7:");
    }

    #[test]
    fn test_token_from_key() {
        assert_eq!(token_from_key(7, "seat:7:tok-A").as_deref(), Some("tok-A"));
        assert_eq!(token_from_key(7, "seat:70:tok-A"), None);
        assert_eq!(token_from_key(7, "seat:7:"), None);
    }

    #[test]
    fn test_token_may_contain_colons() {
        assert_eq!(token_from_key(3, "seat:3:a:b").as_deref(), Some("a:b"));
    }

    #[test]
    fn test_io_failure_is_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = hold_store_error(redis::RedisError::from(io));
        assert!(matches!(err, SeatError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        // Nothing listens on port 1.
        let client = RedisClient::new("redis://127.0.0.1:1/", 10).await.unwrap();
        let err = client.scan_holds(1).await.unwrap_err();
        assert!(matches!(err, SeatError::Unavailable(_)));
    }
}
