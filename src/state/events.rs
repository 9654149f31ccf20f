//! Event bus for session events

use tokio::sync::broadcast;

use crate::types::PlaybackState;

/// Session events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    // Lifecycle events
    /// State machine transition
    StateChanged {
        /// Previous state
        old: PlaybackState,
        /// New state
        new: PlaybackState,
    },

    // Volume events
    /// Volume changed
    VolumeChanged {
        /// New volume, 0-100
        volume: u8,
    },
    /// Mute toggled
    MuteChanged {
        /// New mute state
        muted: bool,
    },

    // Data path events
    /// A producer chunk was discarded because the ring was over threshold
    DataDropped {
        /// Bytes discarded
        bytes: usize,
    },
    /// The sink refused a frame
    SinkError {
        /// Error text
        message: String,
    },
    /// The sink failed fatally and the session entered `Error`
    Fault {
        /// Error text
        message: String,
    },
}

/// Event bus for distributing events
#[derive(Debug)]
pub struct EventBus {
    /// Broadcast sender
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a new event bus
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    /// Subscribe to events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event
    pub fn emit(&self, event: SessionEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    /// Get subscriber count
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event filter for selective subscription
pub struct EventFilter {
    rx: broadcast::Receiver<SessionEvent>,
    filter: Box<dyn Fn(&SessionEvent) -> bool + Send>,
}

impl EventFilter {
    /// Create a filtered event receiver
    pub fn new<F>(bus: &EventBus, filter: F) -> Self
    where
        F: Fn(&SessionEvent) -> bool + Send + 'static,
    {
        Self {
            rx: bus.subscribe(),
            filter: Box::new(filter),
        }
    }

    /// Receive next matching event
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if (self.filter)(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Filter for state transitions only
    #[must_use]
    pub fn state_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| matches!(e, SessionEvent::StateChanged { .. }))
    }

    /// Filter for sink errors and faults
    #[must_use]
    pub fn error_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| {
            matches!(e, SessionEvent::SinkError { .. } | SessionEvent::Fault { .. })
        })
    }
}
