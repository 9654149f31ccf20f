use std::time::Duration;

use super::*;
use crate::types::PlaybackState;

#[test]
fn test_container_set_returns_previous() {
    let container = StateContainer::new();
    assert_eq!(container.get(), PlaybackState::Uninitialized);

    assert_eq!(container.set(PlaybackState::Initialized), PlaybackState::Uninitialized);
    assert_eq!(container.set(PlaybackState::Playing), PlaybackState::Initialized);
    assert_eq!(container.get(), PlaybackState::Playing);
}

#[test]
fn test_container_update() {
    let container = StateContainer::new();
    container.set(PlaybackState::Playing);

    let new = container.update(|s| {
        if s == PlaybackState::Playing {
            PlaybackState::Paused
        } else {
            s
        }
    });
    assert_eq!(new, PlaybackState::Paused);
}

#[tokio::test]
async fn test_container_notifies_subscribers() {
    let container = StateContainer::new();
    let mut rx = container.subscribe();

    container.set(PlaybackState::Initialized);
    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*rx.borrow_and_update(), PlaybackState::Initialized);

    // Same value does not wake
    container.set(PlaybackState::Initialized);
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn test_event_bus() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 1);

    bus.emit(SessionEvent::VolumeChanged { volume: 42 });
    assert_eq!(
        rx.recv().await.unwrap(),
        SessionEvent::VolumeChanged { volume: 42 }
    );
}

#[tokio::test]
async fn test_event_filter() {
    let bus = EventBus::new();
    let mut filter = EventFilter::state_events(&bus);

    bus.emit(SessionEvent::DataDropped { bytes: 10 });
    bus.emit(SessionEvent::StateChanged {
        old: PlaybackState::Initialized,
        new: PlaybackState::Playing,
    });

    let event = filter.recv().await.unwrap();
    assert!(matches!(
        event,
        SessionEvent::StateChanged {
            new: PlaybackState::Playing,
            ..
        }
    ));
}

#[test]
fn test_emit_without_subscribers() {
    let bus = EventBus::default();
    bus.emit(SessionEvent::MuteChanged { muted: true });
    assert_eq!(bus.subscriber_count(), 0);
}
