#![warn(missing_docs)]
//! Redis backend of [`DistributedReplayBuffer`](dreplay_core::DistributedReplayBuffer).
//!
//! Start a server, then build replay buffers on the same database from as many
//! processes as needed:
//!
//! ```no_run
//! use dreplay_core::{Cancellation, DistributedReplayBuffer, DistributedReplayBufferConfig};
//! use dreplay_redis::{RedisStore, RedisStoreConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = RedisStore::connect(&RedisStoreConfig::default().endpoint("localhost", 6379))?;
//!     let config = DistributedReplayBufferConfig::default().capacity(100_000);
//!     let buffer = DistributedReplayBuffer::<Vec<f32>, i64, _>::build(&config, store)?;
//!
//!     let batch = buffer.sample(32, &Cancellation::new())?;
//!     println!("{} transitions", batch.len());
//!     Ok(())
//! }
//! ```
mod config;
mod pool;
mod retry;
mod store;
pub use config::RedisStoreConfig;
pub use retry::RetryPolicy;
pub use store::RedisStore;
