//! Interface of the key-value store holding the transitions.
//!
//! A replay buffer keeps no transition in process memory. All of its state lives
//! in a [`KeyValueStore`], one namespace per buffer, which may be shared over the
//! network by any number of producers and consumers. Each method is assumed to be
//! atomic on its own; no sequence of calls is.
mod memory;
use crate::{Cancellation, Result, TransitionKey};
pub use memory::InMemoryStore;
use std::sync::Arc;

/// Operations the replay buffer needs from a backing store.
///
/// All methods take the caller's [`Cancellation`] handle. Implementations must
/// give up with [`ReplayBufferError::Cancelled`] or
/// [`ReplayBufferError::DeadlineExceeded`] rather than block past it, and report
/// service faults as [`ReplayBufferError::StoreUnavailable`].
///
/// [`ReplayBufferError::Cancelled`]: crate::ReplayBufferError::Cancelled
/// [`ReplayBufferError::DeadlineExceeded`]: crate::ReplayBufferError::DeadlineExceeded
/// [`ReplayBufferError::StoreUnavailable`]: crate::ReplayBufferError::StoreUnavailable
pub trait KeyValueStore: Send + Sync {
    /// Inserts or overwrites the blob under `key`.
    fn put(&self, key: &TransitionKey, blob: &[u8], cancel: &Cancellation) -> Result<()>;

    /// Fetches the blob under `key`, `None` if absent.
    fn get(&self, key: &TransitionKey, cancel: &Cancellation) -> Result<Option<Vec<u8>>>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &TransitionKey, cancel: &Cancellation) -> Result<()>;

    /// Number of live keys in the namespace.
    fn count(&self, cancel: &Cancellation) -> Result<usize>;

    /// One of the live keys, `None` if the namespace is empty.
    fn random_key(&self, cancel: &Cancellation) -> Result<Option<TransitionKey>>;

    /// All live keys of the namespace.
    ///
    /// This scans the whole namespace and is meant for diagnostics.
    fn keys(&self, cancel: &Cancellation) -> Result<Vec<TransitionKey>>;

    /// Removes every key of the namespace.
    fn clear(&self, cancel: &Cancellation) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn put(&self, key: &TransitionKey, blob: &[u8], cancel: &Cancellation) -> Result<()> {
        (**self).put(key, blob, cancel)
    }

    fn get(&self, key: &TransitionKey, cancel: &Cancellation) -> Result<Option<Vec<u8>>> {
        (**self).get(key, cancel)
    }

    fn delete(&self, key: &TransitionKey, cancel: &Cancellation) -> Result<()> {
        (**self).delete(key, cancel)
    }

    fn count(&self, cancel: &Cancellation) -> Result<usize> {
        (**self).count(cancel)
    }

    fn random_key(&self, cancel: &Cancellation) -> Result<Option<TransitionKey>> {
        (**self).random_key(cancel)
    }

    fn keys(&self, cancel: &Cancellation) -> Result<Vec<TransitionKey>> {
        (**self).keys(cancel)
    }

    fn clear(&self, cancel: &Cancellation) -> Result<()> {
        (**self).clear(cancel)
    }
}
