//! Configuration of a replay buffer on Redis.
use crate::RedisReplayBuffer;
use anyhow::Result;
use dreplay_core::DistributedReplayBufferConfig;
use dreplay_redis::{RedisStore, RedisStoreConfig};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`RedisReplayBuffer`]: the buffer and the store endpoint.
///
/// ```yaml
/// replay_buffer:
///   capacity: 1000000
///   allow_duplicates_in_batch_sampling: false
/// redis:
///   host: redis.internal
///   port: 6379
///   db: 1
/// ```
///
/// Missing fields take their default values.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
#[serde(default)]
pub struct DistributedReplayConfig {
    /// Capacity and sampling policy.
    pub replay_buffer: DistributedReplayBufferConfig,

    /// Endpoint and client settings of the store.
    pub redis: RedisStoreConfig,
}

impl DistributedReplayConfig {
    /// Sets the configuration of the replay buffer.
    pub fn replay_buffer(mut self, config: DistributedReplayBufferConfig) -> Self {
        self.replay_buffer = config;
        self
    }

    /// Sets the configuration of the Redis store.
    pub fn redis(mut self, config: RedisStoreConfig) -> Self {
        self.redis = config;
        self
    }

    /// Connects to Redis and builds the replay buffer.
    pub fn build<O, A>(&self) -> dreplay_core::Result<RedisReplayBuffer<O, A>>
    where
        O: Serialize + DeserializeOwned,
        A: Serialize + DeserializeOwned,
    {
        self.replay_buffer.validate()?;
        let store = RedisStore::connect(&self.redis)?;
        RedisReplayBuffer::build(&self.replay_buffer, store)
    }

    /// Constructs [`DistributedReplayConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DistributedReplayConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dreplay_core::{MemoryGranularity, ReplayBufferError};
    use tempdir::TempDir;

    #[test]
    fn test_serde_config() -> Result<()> {
        let config = DistributedReplayConfig::default()
            .replay_buffer(DistributedReplayBufferConfig::default().capacity(500))
            .redis(RedisStoreConfig::default().endpoint("redis", 6380).db(1));

        let dir = TempDir::new("distributed_replay_config")?;
        let path = dir.path().join("replay.yaml");
        config.save(&path)?;
        assert_eq!(DistributedReplayConfig::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_partial_yaml() -> Result<()> {
        let yaml = "replay_buffer:\n  capacity: 3\nredis:\n  db: 2\n";
        let config: DistributedReplayConfig = serde_yaml::from_str(yaml)?;
        assert_eq!(config.replay_buffer.capacity, 3);
        assert!(config.replay_buffer.allow_duplicates_in_batch_sampling);
        assert_eq!(config.redis.url(), "redis://localhost:6379/2");
        Ok(())
    }

    #[test]
    fn test_invalid_config_fails_before_connecting() {
        // Nothing listens on port 1, the granularity check must come first
        let config = DistributedReplayConfig::default()
            .replay_buffer(
                DistributedReplayBufferConfig::default().granularity(MemoryGranularity::Episodes),
            )
            .redis(RedisStoreConfig::default().endpoint("127.0.0.1", 1));
        assert!(matches!(
            config.build::<f32, i64>(),
            Err(ReplayBufferError::InvalidConfig(_))
        ));
    }
}
