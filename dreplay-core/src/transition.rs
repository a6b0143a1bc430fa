//! Transitions and their keys.
use crate::{ReplayBufferError, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use uuid::Uuid;

/// A transition `(o_t, a_t, o_t+1, r_t)` with episode flags and auxiliary information.
///
/// The replay buffer treats a transition as an opaque payload. The only field it
/// reads is [`Transition::reward`], for
/// [`DistributedReplayBuffer::mean_reward`](crate::DistributedReplayBuffer::mean_reward).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition<O, A> {
    /// Observation `o_t`.
    pub obs: O,

    /// Action `a_t`.
    pub act: A,

    /// Next observation `o_t+1`.
    pub next_obs: O,

    /// Reward `r_t`.
    pub reward: f32,

    /// Flag denoting if the episode is terminated at `o_t+1`.
    pub is_terminated: bool,

    /// Flag denoting if the episode is truncated at `o_t+1`.
    pub is_truncated: bool,

    /// Auxiliary scalar information emitted by the environment.
    pub info: BTreeMap<String, f64>,
}

impl<O, A> Transition<O, A> {
    /// Constructs a transition without auxiliary information.
    pub fn new(
        obs: O,
        act: A,
        next_obs: O,
        reward: f32,
        is_terminated: bool,
        is_truncated: bool,
    ) -> Self {
        Self {
            obs,
            act,
            next_obs,
            reward,
            is_terminated,
            is_truncated,
            info: BTreeMap::new(),
        }
    }

    /// Adds an entry of auxiliary information.
    pub fn with_info(mut self, key: impl Into<String>, value: f64) -> Self {
        self.info.insert(key.into(), value);
        self
    }

    /// Terminated or truncated.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.is_terminated || self.is_truncated
    }
}

/// Unique key of a stored transition.
///
/// Keys are random (UUID v4). They carry no ordering, so nothing about recency
/// or insertion order can be derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionKey(Uuid);

impl TransitionKey {
    /// Mints a fresh random key.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransitionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TransitionKey {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for TransitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TransitionKey {
    type Err = ReplayBufferError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ReplayBufferError::InvalidKey(format!("{}: {}", s, e)))
    }
}
