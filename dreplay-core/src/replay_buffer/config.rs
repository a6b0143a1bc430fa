//! Configuration of [`DistributedReplayBuffer`](super::DistributedReplayBuffer).
use crate::{ReplayBufferError, Result};
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Unit in which the capacity of a replay buffer is expressed.
///
/// Only [`MemoryGranularity::Transitions`] is supported by
/// [`DistributedReplayBuffer`](super::DistributedReplayBuffer): the store keeps
/// no episode boundaries.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum MemoryGranularity {
    /// Capacity counts transitions.
    Transitions,

    /// Capacity counts episodes.
    Episodes,
}

/// Configuration of [`DistributedReplayBuffer`](super::DistributedReplayBuffer).
///
/// ```
/// use dreplay_core::DistributedReplayBufferConfig;
///
/// let config = DistributedReplayBufferConfig::default()
///     .capacity(100_000)
///     .allow_duplicates_in_batch_sampling(false);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct DistributedReplayBufferConfig {
    /// Maximum number of transitions kept in the store. `0` means unbounded.
    pub capacity: usize,

    /// Unit of `capacity`.
    pub granularity: MemoryGranularity,

    /// If `false`, sampling fails when the store holds fewer transitions than requested.
    /// If `true`, sampling keeps drawing until enough transitions show up.
    pub allow_duplicates_in_batch_sampling: bool,

    /// Upper bound of random key draws per requested transition in a sampling call.
    /// `0` removes the bound, leaving only the caller's cancellation.
    pub max_draws_per_item: usize,
}

impl Default for DistributedReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            granularity: MemoryGranularity::Transitions,
            allow_duplicates_in_batch_sampling: true,
            max_draws_per_item: 1000,
        }
    }
}

impl DistributedReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the unit of the capacity.
    pub fn granularity(mut self, granularity: MemoryGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Sets the sampling policy.
    pub fn allow_duplicates_in_batch_sampling(mut self, v: bool) -> Self {
        self.allow_duplicates_in_batch_sampling = v;
        self
    }

    /// Sets the bound of random key draws per requested transition.
    pub fn max_draws_per_item(mut self, v: usize) -> Self {
        self.max_draws_per_item = v;
        self
    }

    /// Checks that a replay buffer can be built from this configuration.
    pub fn validate(&self) -> Result<()> {
        match self.granularity {
            MemoryGranularity::Transitions => Ok(()),
            MemoryGranularity::Episodes => Err(ReplayBufferError::InvalidConfig(
                "capacity can only be expressed in transitions".to_string(),
            )),
        }
    }

    /// Constructs [`DistributedReplayBufferConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DistributedReplayBufferConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
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
    fn test_serde_config() -> anyhow::Result<()> {
        let config = DistributedReplayBufferConfig::default()
            .capacity(3)
            .allow_duplicates_in_batch_sampling(false)
            .max_draws_per_item(0);

        let dir = TempDir::new("replay_buffer_config")?;
        let path = dir.path().join("replay_buffer.yaml");
        config.save(&path)?;
        let config_ = DistributedReplayBufferConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_missing_fields_take_defaults() -> anyhow::Result<()> {
        let config: DistributedReplayBufferConfig = serde_yaml::from_str("capacity: 10\n")?;
        assert_eq!(config, DistributedReplayBufferConfig::default().capacity(10));
        Ok(())
    }

    #[test]
    fn test_episode_granularity_is_rejected() {
        let config = DistributedReplayBufferConfig::default().granularity(MemoryGranularity::Episodes);
        assert!(matches!(
            config.validate(),
            Err(ReplayBufferError::InvalidConfig(_))
        ));
    }
}
