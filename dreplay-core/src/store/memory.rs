//! Process-local key-value store.
use super::KeyValueStore;
use crate::{Cancellation, ReplayBufferError, Result, TransitionKey};
use log::trace;
use std::{
    collections::HashMap,
    sync::{Mutex, RwLock},
};

#[derive(Default)]
struct Entries {
    /// Dense list of live keys, for uniform random draws.
    keys: Vec<TransitionKey>,

    /// Position in `keys` and blob of each live key.
    blobs: HashMap<TransitionKey, (usize, Vec<u8>)>,
}

impl Entries {
    fn insert(&mut self, key: TransitionKey, blob: Vec<u8>) {
        match self.blobs.get_mut(&key) {
            Some(entry) => entry.1 = blob,
            None => {
                self.blobs.insert(key, (self.keys.len(), blob));
                self.keys.push(key);
            }
        }
    }

    fn remove(&mut self, key: &TransitionKey) {
        if let Some((ix, _)) = self.blobs.remove(key) {
            self.keys.swap_remove(ix);
            if let Some(moved) = self.keys.get(ix) {
                if let Some(entry) = self.blobs.get_mut(moved) {
                    entry.0 = ix;
                }
            }
        }
    }
}

/// A key-value store kept in process memory.
///
/// It behaves like a single namespace of a remote store: every method is atomic
/// and `random_key` draws uniformly among live keys in O(1). Useful for tests and
/// for producers and consumers living in the same process.
pub struct InMemoryStore {
    entries: RwLock<Entries>,
    rng: Mutex<fastrand::Rng>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store with a randomly seeded key sampler.
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    /// Creates an empty store whose key sampler is seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(fastrand::Rng::with_seed(seed))
    }

    fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            rng: Mutex::new(rng),
        }
    }
}

fn poisoned<T>(_: T) -> ReplayBufferError {
    ReplayBufferError::StoreUnavailable("in-memory store lock poisoned".to_string())
}

impl KeyValueStore for InMemoryStore {
    fn put(&self, key: &TransitionKey, blob: &[u8], cancel: &Cancellation) -> Result<()> {
        cancel.check()?;
        trace!("put {}", key);
        self.entries.write().map_err(poisoned)?.insert(*key, blob.to_vec());
        Ok(())
    }

    fn get(&self, key: &TransitionKey, cancel: &Cancellation) -> Result<Option<Vec<u8>>> {
        cancel.check()?;
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.blobs.get(key).map(|(_, blob)| blob.clone()))
    }

    fn delete(&self, key: &TransitionKey, cancel: &Cancellation) -> Result<()> {
        cancel.check()?;
        trace!("delete {}", key);
        self.entries.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    fn count(&self, cancel: &Cancellation) -> Result<usize> {
        cancel.check()?;
        Ok(self.entries.read().map_err(poisoned)?.keys.len())
    }

    fn random_key(&self, cancel: &Cancellation) -> Result<Option<TransitionKey>> {
        cancel.check()?;
        let entries = self.entries.read().map_err(poisoned)?;
        if entries.keys.is_empty() {
            return Ok(None);
        }
        let ix = self.rng.lock().map_err(poisoned)?.usize(..entries.keys.len());
        Ok(Some(entries.keys[ix]))
    }

    fn keys(&self, cancel: &Cancellation) -> Result<Vec<TransitionKey>> {
        cancel.check()?;
        Ok(self.entries.read().map_err(poisoned)?.keys.clone())
    }

    fn clear(&self, cancel: &Cancellation) -> Result<()> {
        cancel.check()?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.keys.clear();
        entries.blobs.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[test]
    fn test_put_get_delete() {
        let store = InMemoryStore::with_seed(42);
        let cancel = Cancellation::new();
        let (k1, k2) = (TransitionKey::new(), TransitionKey::new());

        store.put(&k1, b"a", &cancel).unwrap();
        store.put(&k2, b"b", &cancel).unwrap();
        store.put(&k1, b"c", &cancel).unwrap();
        assert_eq!(store.count(&cancel).unwrap(), 2);
        assert_eq!(store.get(&k1, &cancel).unwrap(), Some(b"c".to_vec()));

        store.delete(&k1, &cancel).unwrap();
        store.delete(&k1, &cancel).unwrap();
        assert_eq!(store.get(&k1, &cancel).unwrap(), None);
        assert_eq!(store.keys(&cancel).unwrap(), vec![k2]);
        assert_eq!(store.random_key(&cancel).unwrap(), Some(k2));

        store.clear(&cancel).unwrap();
        assert_eq!(store.count(&cancel).unwrap(), 0);
        assert_eq!(store.random_key(&cancel).unwrap(), None);
    }

    #[test]
    fn test_index_survives_swap_remove() {
        let store = InMemoryStore::with_seed(0);
        let cancel = Cancellation::new();
        let keys = (0..50).map(|_| TransitionKey::new()).collect::<Vec<_>>();
        for (i, key) in keys.iter().enumerate() {
            store.put(key, &[i as u8], &cancel).unwrap();
        }
        for key in keys.iter().step_by(3) {
            store.delete(key, &cancel).unwrap();
        }

        let live = store.keys(&cancel).unwrap().into_iter().collect::<HashSet<_>>();
        for (i, key) in keys.iter().enumerate() {
            let expected = if i % 3 == 0 { None } else { Some(vec![i as u8]) };
            assert_eq!(store.get(key, &cancel).unwrap(), expected);
            assert_eq!(live.contains(key), i % 3 != 0);
        }
        assert_eq!(store.count(&cancel).unwrap(), live.len());
    }

    #[test]
    fn test_random_key_covers_all_keys() {
        let store = InMemoryStore::with_seed(7);
        let cancel = Cancellation::new();
        let keys = (0..4).map(|_| TransitionKey::new()).collect::<Vec<_>>();
        for key in keys.iter() {
            store.put(key, b"x", &cancel).unwrap();
        }

        let mut hits = HashMap::new();
        for _ in 0..4000 {
            let key = store.random_key(&cancel).unwrap().unwrap();
            *hits.entry(key).or_insert(0usize) += 1;
        }
        assert_eq!(hits.len(), 4);
        assert!(hits.values().all(|&n| n > 800), "{:?}", hits);
    }

    #[test]
    fn test_cancelled_call_fails() {
        let store = InMemoryStore::new();
        let cancel = Cancellation::new();
        cancel.cancel();
        assert_eq!(
            store.put(&TransitionKey::new(), b"x", &cancel),
            Err(ReplayBufferError::Cancelled)
        );
        assert_eq!(store.count(&Cancellation::new()).unwrap(), 0);
    }
}
