//! Cancellation and deadlines for remote calls.
//!
//! Every call to a [`KeyValueStore`](crate::KeyValueStore) is a potentially
//! blocking round trip, and the draw loops of the replay buffer have no natural
//! upper bound. A [`Cancellation`] handle is passed through all of them so that a
//! caller can stop an operation from another thread or bound it by a deadline.
use crate::{ReplayBufferError, Result};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Shared stop flag with an optional deadline.
///
/// Clones share the stop flag, so [`Cancellation::cancel`] on any clone stops
/// every operation holding another clone.
///
/// ```
/// use dreplay_core::Cancellation;
/// use std::time::Duration;
///
/// let cancel = Cancellation::with_timeout(Duration::from_secs(1));
/// assert!(cancel.check().is_ok());
///
/// cancel.clone().cancel();
/// assert!(cancel.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    stop: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// Creates a handle without deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Creates a handle with the given deadline.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Returns a handle sharing the stop flag with a (possibly) tighter deadline.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(d) if d < deadline => d,
            _ => deadline,
        };
        Self {
            stop: self.stop.clone(),
            deadline: Some(deadline),
        }
    }

    /// Raises the stop flag.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if the stop flag was raised.
    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` if the deadline has passed.
    pub fn is_expired(&self) -> bool {
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Time left until the deadline, `None` without deadline.
    ///
    /// Returns `Some(Duration::ZERO)` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails with [`ReplayBufferError::Cancelled`] or
    /// [`ReplayBufferError::DeadlineExceeded`] if the operation must stop.
    ///
    /// Cancellation takes precedence over the deadline.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ReplayBufferError::Cancelled)
        } else if self.is_expired() {
            Err(ReplayBufferError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let cancel = Cancellation::new();
        let other = cancel.clone();
        assert!(cancel.check().is_ok());

        thread::spawn(move || other.cancel()).join().unwrap();
        assert_eq!(cancel.check(), Err(ReplayBufferError::Cancelled));
    }

    #[test]
    fn test_deadline() {
        let cancel = Cancellation::with_deadline(Instant::now());
        assert!(cancel.is_expired());
        assert_eq!(cancel.remaining(), Some(Duration::ZERO));
        assert_eq!(cancel.check(), Err(ReplayBufferError::DeadlineExceeded));

        // Cancellation wins over an expired deadline
        cancel.cancel();
        assert_eq!(cancel.check(), Err(ReplayBufferError::Cancelled));

        let cancel = Cancellation::new();
        assert_eq!(cancel.remaining(), None);
        assert!(!cancel.is_expired());
    }

    #[test]
    fn test_child_keeps_tighter_deadline() {
        let parent = Cancellation::with_timeout(Duration::from_millis(10));
        let child = parent.child_with_timeout(Duration::from_secs(3600));
        assert_eq!(child.deadline(), parent.deadline());

        let parent = Cancellation::new();
        let child = parent.child_with_timeout(Duration::from_secs(3600));
        assert!(child.deadline().is_some());

        parent.cancel();
        assert!(child.is_cancelled());
    }
}
