//! Observable session state

use tokio::sync::watch;

use crate::types::PlaybackState;

/// Current [`PlaybackState`] with change notifications
///
/// Synchronous on the writer side so it can be driven from the consumer
/// thread; observers await changes through a `watch` receiver.
#[derive(Debug)]
pub struct StateContainer {
    tx: watch::Sender<PlaybackState>,
}

impl StateContainer {
    /// Create a container in the `Uninitialized` state
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(PlaybackState::default());
        Self { tx }
    }

    /// Get current state
    #[must_use]
    pub fn get(&self) -> PlaybackState {
        *self.tx.borrow()
    }

    /// Subscribe to state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.tx.subscribe()
    }

    /// Replace the state, returning the previous one
    ///
    /// Subscribers are only woken when the value actually changes.
    pub fn set(&self, new: PlaybackState) -> PlaybackState {
        let mut old = new;
        self.tx.send_if_modified(|state| {
            old = *state;
            *state = new;
            old != new
        });
        old
    }

    /// Apply `f` atomically and return the new state
    pub fn update<F>(&self, f: F) -> PlaybackState
    where
        F: FnOnce(PlaybackState) -> PlaybackState,
    {
        let mut result = PlaybackState::default();
        self.tx.send_if_modified(|state| {
            let new = f(*state);
            let changed = new != *state;
            *state = new;
            result = new;
            changed
        });
        result
    }
}

impl Default for StateContainer {
    fn default() -> Self {
        Self::new()
    }
}
