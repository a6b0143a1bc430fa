//! Replay buffer over a key-value store.
mod base;
mod config;
pub use base::DistributedReplayBuffer;
pub use config::{DistributedReplayBufferConfig, MemoryGranularity};
