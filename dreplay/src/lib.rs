//! Replay buffer for reinforcement learning shared over a key-value store.
//!
//! dreplay consists of the following crates:
//!
//! * [dreplay-core](dreplay_core) defines transitions, their codecs, the
//!   [`KeyValueStore`](dreplay_core::KeyValueStore) interface and
//!   [`DistributedReplayBuffer`](dreplay_core::DistributedReplayBuffer), which
//!   enforces the capacity and samples batches on top of any store. It also has
//!   an in-process store for tests.
//! * [dreplay-redis](dreplay_redis) implements the store on a Redis database, so
//!   that simulation workers and learners in different processes or hosts share
//!   one replay buffer.
//! * dreplay (this crate) re-exports both and reads the combined configuration
//!   from YAML.
//!
//! ```no_run
//! use dreplay::{Cancellation, DistributedReplayConfig, RedisReplayBuffer, Transition};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = DistributedReplayConfig::load("replay.yaml")?;
//!     let buffer: RedisReplayBuffer<Vec<f32>, i64> = config.build()?;
//!     let cancel = Cancellation::new();
//!
//!     buffer.store(&Transition::new(vec![0.0], 1, vec![0.1], 1.0, false, false), &cancel)?;
//!     let batch = buffer.sample(1, &cancel)?;
//!     assert_eq!(batch.len(), 1);
//!     Ok(())
//! }
//! ```
mod config;
pub use config::DistributedReplayConfig;
pub use dreplay_core::{
    self, BincodeCodec, Cancellation, DistributedReplayBuffer, DistributedReplayBufferConfig,
    InMemoryStore, JsonCodec, KeyValueStore, MemoryGranularity, ReplayBufferError, Transition,
    TransitionCodec, TransitionKey,
};
pub use dreplay_redis::{self, RedisStore, RedisStoreConfig, RetryPolicy};

/// Replay buffer on a Redis database.
pub type RedisReplayBuffer<O, A> = DistributedReplayBuffer<O, A, RedisStore>;
