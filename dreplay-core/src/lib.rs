#![warn(missing_docs)]
//! Replay buffer for reinforcement learning whose transitions live in a shared
//! key-value store.
//!
//! Simulation workers store transitions and learners sample batches through
//! [`DistributedReplayBuffer`]s built on the same store namespace, without
//! sharing a process. The buffer keeps nothing but its configuration in memory:
//!
//! * [`KeyValueStore`] is the interface to the backing store. [`InMemoryStore`]
//!   implements it in process; networked backends live in other crates.
//! * [`TransitionCodec`] turns [`Transition`]s into the blobs held by the store.
//! * [`Cancellation`] bounds every store call and every draw loop.
pub mod cancel;
pub mod codec;
pub mod error;
pub mod replay_buffer;
pub mod store;
mod transition;
pub use cancel::Cancellation;
pub use codec::{BincodeCodec, JsonCodec, TransitionCodec};
pub use error::{ReplayBufferError, Result};
pub use replay_buffer::{DistributedReplayBuffer, DistributedReplayBufferConfig, MemoryGranularity};
pub use store::{InMemoryStore, KeyValueStore};
pub use transition::{Transition, TransitionKey};
