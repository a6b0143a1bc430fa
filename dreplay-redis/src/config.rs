//! Configuration of [`RedisStore`](crate::RedisStore).
use crate::RetryPolicy;
use anyhow::Result;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    time::Duration,
};

/// Configuration of [`RedisStore`](crate::RedisStore).
///
/// The namespace of a replay buffer is the logical database `db` of the Redis
/// server. Buffers sharing transitions must use the same `host`, `port` and
/// `db`; nothing else should write to that database.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct RedisStoreConfig {
    /// Host name of the Redis server.
    pub host: String,

    /// Port of the Redis server.
    pub port: u16,

    /// Logical database used as the namespace of the replay buffer.
    pub db: i64,

    /// Password, if the server requires authentication.
    pub password: Option<String>,

    /// Number of connections opened when the store is created.
    pub pool_size: usize,

    /// Timeout for establishing a connection in milliseconds.
    pub connect_timeout_ms: u64,

    /// Read and write timeout of each command in milliseconds.
    pub io_timeout_ms: u64,

    /// `COUNT` hint of the `SCAN` pages used to list the namespace.
    pub scan_count: usize,

    /// Retries of commands failing with connection errors.
    pub retry: RetryPolicy,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            pool_size: 4,
            connect_timeout_ms: 5000,
            io_timeout_ms: 5000,
            scan_count: 512,
            retry: RetryPolicy::default(),
        }
    }
}

impl RedisStoreConfig {
    /// Sets the host and the port of the server.
    pub fn endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Sets the logical database.
    pub fn db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// Sets the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the number of pooled connections.
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Sets the timeout for establishing a connection in milliseconds.
    pub fn connect_timeout_ms(mut self, v: u64) -> Self {
        self.connect_timeout_ms = v;
        self
    }

    /// Sets the read and write timeout of each command in milliseconds.
    pub fn io_timeout_ms(mut self, v: u64) -> Self {
        self.io_timeout_ms = v;
        self
    }

    /// Sets the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Connection URL for display, with the password masked.
    pub fn url(&self) -> String {
        match &self.password {
            Some(_) => format!("redis://:***@{}:{}/{}", self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// Address and credentials handed to the client.
    ///
    /// The password is passed as is, so it may contain characters that are
    /// reserved in URLs.
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                username: None,
                password: self.password.clone(),
            },
        }
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub(crate) fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Constructs [`RedisStoreConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`RedisStoreConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_url() {
        let config = RedisStoreConfig::default();
        assert_eq!(config.url(), "redis://localhost:6379/0");

        let config = config.endpoint("10.0.0.5", 6380).db(3).password("s3cret");
        assert_eq!(config.url(), "redis://:***@10.0.0.5:6380/3");
    }

    #[test]
    fn test_connection_info_keeps_reserved_characters() {
        let config = RedisStoreConfig::default()
            .endpoint("10.0.0.5", 6380)
            .db(3)
            .password("p@ss/w#rd:1");
        let info = config.connection_info();
        match &info.addr {
            ConnectionAddr::Tcp(host, port) => {
                assert_eq!(host, "10.0.0.5");
                assert_eq!(*port, 6380);
            }
            addr => panic!("unexpected address {:?}", addr),
        }
        assert_eq!(info.redis.db, 3);
        assert_eq!(info.redis.password.as_deref(), Some("p@ss/w#rd:1"));
        assert_eq!(info.redis.username, None);
        assert!(redis::Client::open(info).is_ok());
    }

    #[test]
    fn test_serde_config() -> Result<()> {
        let config = RedisStoreConfig::default()
            .endpoint("redis", 6379)
            .db(2)
            .pool_size(8)
            .retry(RetryPolicy::none());

        let dir = TempDir::new("redis_store_config")?;
        let path = dir.path().join("redis.yaml");
        config.save(&path)?;
        assert_eq!(RedisStoreConfig::load(&path)?, config);
        Ok(())
    }
}
