//! State management and events

mod container;
mod events;
#[cfg(test)]
mod tests;

pub use container::StateContainer;
pub use events::{EventBus, EventFilter, SessionEvent};
