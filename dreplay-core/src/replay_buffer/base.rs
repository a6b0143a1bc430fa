//! Replay buffer whose transitions live in a key-value store.
use super::DistributedReplayBufferConfig;
use crate::{
    BincodeCodec, Cancellation, KeyValueStore, ReplayBufferError, Result, Transition,
    TransitionCodec, TransitionKey,
};
use log::{debug, info, trace, warn};
use serde::{de::DeserializeOwned, Serialize};
use std::{collections::HashSet, marker::PhantomData, thread, time::Duration};

/// Pause after the first draw that finds the store empty, doubled on each further one.
const EMPTY_DRAW_BACKOFF: Duration = Duration::from_millis(1);

/// Upper bound of the pause between draws on an empty store.
const MAX_EMPTY_DRAW_BACKOFF: Duration = Duration::from_millis(50);

/// A fixed-capacity replay buffer backed by a [`KeyValueStore`].
///
/// The buffer holds no transitions itself. Every stored transition is written
/// under a fresh [`TransitionKey`] to the store, and sampling draws random keys
/// from the store. Thus any number of buffers built on the same store namespace,
/// in any number of processes, share one pool of transitions.
///
/// All methods take `&self`. There is no lock inside the buffer; concurrent
/// callers rely on the atomicity of each store call. As a consequence:
///
/// * the number of transitions may exceed the capacity between a `put` of one
///   caller and the eviction pass of another, and converges back once the
///   writers are done;
/// * a key drawn by [`sample`](Self::sample) may be evicted before it is
///   fetched, in which case the draw is simply repeated;
/// * a transition stored concurrently with a sampling call may or may not be
///   visible to it.
///
/// Eviction picks victims uniformly at random with the same primitive as
/// sampling, so survivors are not necessarily the most recent transitions.
///
/// # Examples
///
/// ```
/// use dreplay_core::{
///     Cancellation, DistributedReplayBuffer, DistributedReplayBufferConfig, InMemoryStore,
///     Transition,
/// };
///
/// let config = DistributedReplayBufferConfig::default().capacity(3);
/// let buffer = DistributedReplayBuffer::<f32, i64, _>::build(&config, InMemoryStore::new())?;
/// let cancel = Cancellation::new();
///
/// for i in 0..5 {
///     buffer.store(&Transition::new(i as f32, i, i as f32 + 1.0, 1.0, false, false), &cancel)?;
/// }
/// assert_eq!(buffer.len(&cancel)?, 3);
///
/// let batch = buffer.sample(2, &cancel)?;
/// assert_eq!(batch.len(), 2);
/// # Ok::<(), dreplay_core::ReplayBufferError>(())
/// ```
pub struct DistributedReplayBuffer<O, A, S, C = BincodeCodec> {
    /// Handle of the backing store, released when the buffer is dropped.
    store: S,

    codec: C,

    /// Maximum number of transitions, `0` for unbounded.
    capacity: usize,

    /// Default sampling policy.
    allow_duplicates: bool,

    /// Draws per requested transition before a sampling call gives up, `0` for no limit.
    max_draws_per_item: usize,

    phantom: PhantomData<fn() -> (O, A)>,
}

impl<O, A, S> DistributedReplayBuffer<O, A, S, BincodeCodec>
where
    O: Serialize + DeserializeOwned,
    A: Serialize + DeserializeOwned,
    S: KeyValueStore,
{
    /// Builds a replay buffer on `store` with the default [`BincodeCodec`].
    pub fn build(config: &DistributedReplayBufferConfig, store: S) -> Result<Self> {
        Self::build_with_codec(config, store, BincodeCodec)
    }
}

impl<O, A, S, C> DistributedReplayBuffer<O, A, S, C>
where
    O: Serialize + DeserializeOwned,
    A: Serialize + DeserializeOwned,
    S: KeyValueStore,
    C: TransitionCodec,
{
    /// Builds a replay buffer on `store` encoding transitions with `codec`.
    pub fn build_with_codec(
        config: &DistributedReplayBufferConfig,
        store: S,
        codec: C,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            "Replay buffer: capacity={}, allow_duplicates={}, max_draws_per_item={}",
            config.capacity, config.allow_duplicates_in_batch_sampling, config.max_draws_per_item
        );

        Ok(Self {
            store,
            codec,
            capacity: config.capacity,
            allow_duplicates: config.allow_duplicates_in_batch_sampling,
            max_draws_per_item: config.max_draws_per_item,
            phantom: PhantomData,
        })
    }

    /// Maximum number of transitions, `0` for unbounded.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Default sampling policy of [`sample`](Self::sample).
    pub fn allow_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    /// The backing store.
    pub fn kv_store(&self) -> &S {
        &self.store
    }

    /// Stores a transition under a fresh key, then enforces the capacity.
    ///
    /// Returns the key of the stored transition. The transition may already have
    /// been evicted when this method returns.
    pub fn store(&self, tr: &Transition<O, A>, cancel: &Cancellation) -> Result<TransitionKey> {
        let key = self.put(tr, cancel)?;
        self.enforce_capacity(cancel)?;
        Ok(key)
    }

    /// Stores transitions under fresh keys with a single eviction pass at the end.
    ///
    /// If a put fails, the transitions written before it stay in the store and
    /// the eviction pass still runs for them, unless `cancel` has stopped. The
    /// error of the put is returned.
    pub fn store_many(
        &self,
        trs: &[Transition<O, A>],
        cancel: &Cancellation,
    ) -> Result<Vec<TransitionKey>> {
        let mut keys = Vec::with_capacity(trs.len());
        for tr in trs.iter() {
            match self.put(tr, cancel) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    if !keys.is_empty() {
                        if let Err(evict) = self.enforce_capacity(cancel) {
                            warn!(
                                "Eviction after a partial batch ({} of {} stored) failed: {}",
                                keys.len(),
                                trs.len(),
                                evict
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }
        self.enforce_capacity(cancel)?;
        Ok(keys)
    }

    fn put(&self, tr: &Transition<O, A>, cancel: &Cancellation) -> Result<TransitionKey> {
        // A key collision overwrites silently, v4 UUIDs make it negligible
        let key = TransitionKey::new();
        let blob = self.codec.encode(tr)?;
        self.store.put(&key, &blob, cancel)?;
        trace!("Stored transition {}", key);
        Ok(key)
    }

    /// Evicts random transitions while the store holds more than the capacity.
    ///
    /// Returns the number of evicted transitions. If the store runs out of keys
    /// while still over capacity, which only happens when another caller is
    /// deleting at the same time, the pass stops early without error.
    pub fn enforce_capacity(&self, cancel: &Cancellation) -> Result<usize> {
        if self.capacity == 0 {
            return Ok(0);
        }

        let mut evicted = 0;
        loop {
            cancel.check()?;
            let count = self.store.count(cancel)?;
            if count <= self.capacity {
                break;
            }
            match self.store.random_key(cancel)? {
                Some(key) => {
                    self.store.delete(&key, cancel)?;
                    trace!("Evicted transition {}", key);
                    evicted += 1;
                }
                None => {
                    warn!(
                        "Store emptied during eviction (count={}, capacity={}), stopping early",
                        count, self.capacity
                    );
                    break;
                }
            }
        }

        if evicted > 0 {
            debug!("Evicted {} transitions", evicted);
        }
        Ok(evicted)
    }

    /// Samples `n` distinct transitions with the configured sampling policy.
    ///
    /// See [`sample_with`](Self::sample_with).
    pub fn sample(&self, n: usize, cancel: &Cancellation) -> Result<Vec<Transition<O, A>>> {
        self.sample_with(n, self.allow_duplicates, cancel)
    }

    /// Samples `n` transitions stored under distinct keys.
    ///
    /// Keys are drawn at random from the store until `n` distinct keys have been
    /// fetched. Different keys may hold equal transitions. The order of the
    /// returned transitions carries no meaning.
    ///
    /// If `allow_duplicates` is `false` and the store holds fewer than `n`
    /// transitions, fails with [`ReplayBufferError::InsufficientData`] without
    /// drawing. Otherwise the draw loop runs until it has collected `n`
    /// transitions, waiting for producers if needed (draws on an empty store
    /// are spaced by a backoff of up to 50 ms), and stops with
    /// [`ReplayBufferError::DrawLimitExceeded`] after `n * max_draws_per_item`
    /// draws or with the error of `cancel`. No partial batch is returned.
    pub fn sample_with(
        &self,
        n: usize,
        allow_duplicates: bool,
        cancel: &Cancellation,
    ) -> Result<Vec<Transition<O, A>>> {
        if n == 0 {
            return Ok(vec![]);
        }

        if !allow_duplicates {
            let available = self.store.count(cancel)?;
            if available < n {
                return Err(ReplayBufferError::InsufficientData {
                    requested: n,
                    available,
                });
            }
        }

        let max_draws = n.saturating_mul(self.max_draws_per_item);
        let mut fetched = HashSet::with_capacity(n);
        let mut batch = Vec::with_capacity(n);
        let mut draws = 0;
        let mut misses = 0;
        let mut backoff = EMPTY_DRAW_BACKOFF;

        while batch.len() < n {
            cancel.check()?;
            if self.max_draws_per_item != 0 && draws >= max_draws {
                return Err(ReplayBufferError::DrawLimitExceeded {
                    requested: n,
                    collected: batch.len(),
                    draws,
                });
            }
            draws += 1;

            let key = match self.store.random_key(cancel)? {
                Some(key) => {
                    backoff = EMPTY_DRAW_BACKOFF;
                    key
                }
                None => {
                    trace!("No transition in store, drawing again in {:?}", backoff);
                    let pause = match cancel.remaining() {
                        Some(remaining) => remaining.min(backoff),
                        None => backoff,
                    };
                    thread::sleep(pause);
                    backoff = (backoff * 2).min(MAX_EMPTY_DRAW_BACKOFF);
                    continue;
                }
            };
            if fetched.contains(&key) {
                continue;
            }

            match self.store.get(&key, cancel)? {
                Some(blob) => {
                    batch.push(self.codec.decode(&blob)?);
                    fetched.insert(key);
                }
                None => {
                    // Evicted or removed between the draw and the fetch
                    trace!("Transition {} vanished before fetch", key);
                    misses += 1;
                }
            }
        }

        debug!(
            "Sampled {} transitions in {} draws ({} fetch misses)",
            n, draws, misses
        );
        Ok(batch)
    }

    /// Fetches the transition stored under `key`, `None` if it is not in the store.
    pub fn get(
        &self,
        key: &TransitionKey,
        cancel: &Cancellation,
    ) -> Result<Option<Transition<O, A>>> {
        match self.store.get(key, cancel)? {
            Some(blob) => Ok(Some(self.codec.decode(&blob)?)),
            None => Ok(None),
        }
    }

    /// Removes the transition stored under `key`. Does nothing if it is absent.
    pub fn remove(&self, key: &TransitionKey, cancel: &Cancellation) -> Result<()> {
        self.store.delete(key, cancel)
    }

    /// Removes all transitions of the buffer's namespace.
    pub fn clear(&self, cancel: &Cancellation) -> Result<()> {
        info!("Clearing replay buffer");
        self.store.clear(cancel)
    }

    /// Number of transitions in the store. Each call is a round trip to the store.
    pub fn len(&self, cancel: &Cancellation) -> Result<usize> {
        self.store.count(cancel)
    }

    /// Returns `true` if the store holds no transition.
    pub fn is_empty(&self, cancel: &Cancellation) -> Result<bool> {
        Ok(self.len(cancel)? == 0)
    }

    /// Mean reward over all transitions in the store.
    ///
    /// # Warning
    ///
    /// This fetches and decodes every transition of the namespace. Use it for
    /// diagnostics, not in a training loop.
    pub fn mean_reward(&self, cancel: &Cancellation) -> Result<f64> {
        let keys = self.store.keys(cancel)?;
        let mut sum = 0f64;
        let mut n = 0usize;

        for key in keys.iter() {
            cancel.check()?;
            // Keys removed since the scan are skipped
            if let Some(blob) = self.store.get(key, cancel)? {
                let tr: Transition<O, A> = self.codec.decode(&blob)?;
                sum += tr.reward as f64;
                n += 1;
            }
        }

        if n == 0 {
            Err(ReplayBufferError::EmptyBuffer)
        } else {
            Ok(sum / n as f64)
        }
    }
}
