//! [`KeyValueStore`] on a Redis logical database.
use crate::{pool::ConnectionPool, RedisStoreConfig, RetryPolicy};
use dreplay_core::{Cancellation, KeyValueStore, ReplayBufferError, Result, TransitionKey};
use log::{info, trace, warn};
use redis::{Client, Connection, RedisError, RedisResult};
use std::{thread, time::Duration};

/// Key-value store on a logical database of a Redis server.
///
/// | operation    | command     |
/// |--------------|-------------|
/// | `put`        | `SET`       |
/// | `get`        | `GET`       |
/// | `delete`     | `DEL`       |
/// | `count`      | `DBSIZE`    |
/// | `random_key` | `RANDOMKEY` |
/// | `keys`       | `SCAN`      |
/// | `clear`      | `FLUSHDB`   |
///
/// Connections are opened in [`RedisStore::connect`] and closed when the store
/// is dropped. Each command runs with a read/write timeout bounded by the
/// caller's deadline. Commands failing on a broken or refused connection are
/// retried following the [`RetryPolicy`] of the configuration; every command
/// above is idempotent for the replay buffer, so a retry cannot duplicate data.
pub struct RedisStore {
    pool: ConnectionPool,
    io_timeout: Duration,
    scan_count: usize,
    retry: RetryPolicy,
}

/// Errors after which the connection cannot be trusted and the command may be retried.
fn is_transient(e: &RedisError) -> bool {
    e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
}

fn unavailable(op: &str, e: RedisError) -> ReplayBufferError {
    ReplayBufferError::StoreUnavailable(format!("{}: {}", op, e))
}

impl RedisStore {
    /// Connects to the server and opens the connection pool.
    ///
    /// Each connection must be established within `connect_timeout_ms`,
    /// handshake included.
    pub fn connect(config: &RedisStoreConfig) -> Result<Self> {
        let client =
            Client::open(config.connection_info()).map_err(|e| unavailable("open", e))?;
        let pool = ConnectionPool::open(
            client,
            config.pool_size,
            config.connect_timeout(),
            &Cancellation::new(),
        )
        .map_err(|e| unavailable("connect", e))?;
        info!(
            "Connected to Redis at {}:{}, db={}",
            config.host, config.port, config.db
        );

        Ok(Self {
            pool,
            io_timeout: config.io_timeout(),
            scan_count: config.scan_count.max(1),
            retry: config.retry.clone(),
        })
    }

    /// Checks that the server answers.
    pub fn ping(&self, cancel: &Cancellation) -> Result<()> {
        self.call("PING", cancel, |con| redis::cmd("PING").query::<String>(con))
            .map(|_| ())
    }

    /// Sets the read/write timeout of the next command. Returns `true` if the
    /// caller's deadline is tighter than the configured timeout.
    fn set_timeouts(&self, con: &mut Connection, cancel: &Cancellation) -> RedisResult<bool> {
        let (timeout, capped) = match cancel.remaining() {
            Some(remaining) if remaining < self.io_timeout => (remaining, true),
            _ => (self.io_timeout, false),
        };
        // A zero timeout is rejected by the socket
        let timeout = timeout.max(Duration::from_millis(1));
        con.set_read_timeout(Some(timeout))?;
        con.set_write_timeout(Some(timeout))?;
        Ok(capped)
    }

    /// Runs a command on a pooled connection with retries.
    fn call<T, F>(&self, op: &str, cancel: &Cancellation, f: F) -> Result<T>
    where
        F: Fn(&mut Connection) -> RedisResult<T>,
    {
        let mut attempt = 0;
        loop {
            cancel.check()?;
            let mut pooled = self.pool.checkout(cancel)?;
            let mut capped = false;
            let res = pooled.connection(cancel).and_then(|con| {
                capped = self.set_timeouts(con, cancel)?;
                f(con)
            });

            let e = match res {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            let transient = is_transient(&e);
            if transient {
                pooled.discard();
            }
            drop(pooled);

            cancel.check()?;
            if e.is_timeout() && capped {
                return Err(ReplayBufferError::DeadlineExceeded);
            }
            if !transient || attempt >= self.retry.max_retries {
                return Err(unavailable(op, e));
            }

            attempt += 1;
            let backoff = self.retry.backoff_duration(attempt);
            if let Some(remaining) = cancel.remaining() {
                if remaining <= backoff {
                    return Err(unavailable(op, e));
                }
            }
            warn!(
                "Redis {} failed ({}), retry {}/{} in {:?}",
                op, e, attempt, self.retry.max_retries, backoff
            );
            thread::sleep(backoff);
        }
    }
}

impl KeyValueStore for RedisStore {
    fn put(&self, key: &TransitionKey, blob: &[u8], cancel: &Cancellation) -> Result<()> {
        let key = key.to_string();
        self.call("SET", cancel, |con| {
            redis::cmd("SET").arg(&key).arg(blob).query::<()>(con)
        })
    }

    fn get(&self, key: &TransitionKey, cancel: &Cancellation) -> Result<Option<Vec<u8>>> {
        let key = key.to_string();
        self.call("GET", cancel, |con| {
            redis::cmd("GET").arg(&key).query::<Option<Vec<u8>>>(con)
        })
    }

    fn delete(&self, key: &TransitionKey, cancel: &Cancellation) -> Result<()> {
        let key = key.to_string();
        self.call("DEL", cancel, |con| redis::cmd("DEL").arg(&key).query::<()>(con))
    }

    fn count(&self, cancel: &Cancellation) -> Result<usize> {
        self.call("DBSIZE", cancel, |con| redis::cmd("DBSIZE").query::<usize>(con))
    }

    fn random_key(&self, cancel: &Cancellation) -> Result<Option<TransitionKey>> {
        let key = self.call("RANDOMKEY", cancel, |con| {
            redis::cmd("RANDOMKEY").query::<Option<String>>(con)
        })?;
        key.map(|key| key.parse()).transpose()
    }

    fn keys(&self, cancel: &Cancellation) -> Result<Vec<TransitionKey>> {
        let mut keys: Vec<TransitionKey> = vec![];
        let mut cursor = 0u64;
        loop {
            let (next, page) = self.call("SCAN", cancel, |con| {
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("COUNT")
                    .arg(self.scan_count)
                    .query::<(u64, Vec<String>)>(con)
            })?;
            trace!("SCAN page of {} keys, next cursor {}", page.len(), next);
            for key in page.iter() {
                keys.push(key.parse()?);
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may report a key more than once
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn clear(&self, cancel: &Cancellation) -> Result<()> {
        self.call("FLUSHDB", cancel, |con| redis::cmd("FLUSHDB").query::<()>(con))
    }
}
