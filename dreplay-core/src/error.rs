//! Errors in the library.
use thiserror::Error;

/// Errors of [`DistributedReplayBuffer`](crate::DistributedReplayBuffer) and
/// [`KeyValueStore`](crate::KeyValueStore) implementations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplayBufferError {
    /// Sampling without duplicates was requested for more transitions than stored.
    #[error("Cannot sample {requested} transitions, the buffer holds {available}")]
    InsufficientData {
        /// Requested batch size.
        requested: usize,

        /// Number of transitions in the store at call time.
        available: usize,
    },

    /// An aggregate was requested over an empty buffer.
    #[error("The replay buffer is empty")]
    EmptyBuffer,

    /// A call to the backing store failed.
    #[error("Key-value store unavailable: {0}")]
    StoreUnavailable(String),

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// The caller's deadline passed before the operation completed.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The sampling loop gave up after too many draws.
    #[error("Gave up sampling after {draws} draws, collected {collected} of {requested}")]
    DrawLimitExceeded {
        /// Requested batch size.
        requested: usize,

        /// Number of distinct transitions collected before giving up.
        collected: usize,

        /// Number of random key draws issued.
        draws: usize,
    },

    /// A stored record could not be decoded into the requested transition type.
    #[error("Incompatible record: {0}")]
    IncompatibleRecord(String),

    /// A key in the namespace is not a transition key.
    #[error("Invalid transition key: {0}")]
    InvalidKey(String),

    /// The configuration cannot be used to build a buffer.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Shorthand for results of buffer and store operations.
pub type Result<T> = std::result::Result<T, ReplayBufferError>;
