use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::{FORMAT, config, samples, session};
use crate::audio::SampleRange;
use crate::error::AudioError;
use crate::output::{AudioSink, OutputKind, SinkError, SinkRegistry};
use crate::player::{ControlCommand, PlaybackSession};
use crate::state::SessionEvent;
use crate::testing::RecordingSink;
use crate::types::{PlaybackState, SessionConfig};

#[test]
fn test_lifecycle() {
    let (session, monitor) = session();
    assert_eq!(session.state(), PlaybackState::Uninitialized);

    session.init(config()).unwrap();
    assert_eq!(session.state(), PlaybackState::Initialized);
    assert_eq!(session.format(), Some(FORMAT));
    assert_eq!(session.output_kind(), Some(OutputKind::Notify));

    session.start().unwrap();
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(monitor.starts(), 1);

    session.pause().unwrap();
    assert_eq!(session.state(), PlaybackState::Paused);
    session.resume().unwrap();
    assert_eq!(session.state(), PlaybackState::Playing);

    session.stop().unwrap();
    assert_eq!(session.state(), PlaybackState::Initialized);
    assert_eq!(monitor.stops(), 1);

    session.cleanup();
    assert_eq!(session.state(), PlaybackState::Uninitialized);
    assert_eq!(monitor.cleanups(), 1);
    assert_eq!(session.format(), None);
}

#[test]
fn test_double_init_rejected() {
    let (session, _monitor) = session();
    session.init(config()).unwrap();
    assert!(matches!(
        session.init(config()),
        Err(AudioError::AlreadyInitialized { .. })
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let (session, _monitor) = session();
    let config = SessionConfig::builder()
        .output(OutputKind::Notify)
        .filter_weight(11)
        .build();

    assert!(matches!(
        session.init(config),
        Err(AudioError::InvalidArgument { .. })
    ));
    assert_eq!(session.state(), PlaybackState::Uninitialized);
}

#[test]
fn test_operations_before_init() {
    let (session, _monitor) = session();

    assert!(matches!(session.start(), Err(AudioError::NotInitialized { .. })));
    assert!(matches!(session.write(&[0, 0]), Err(AudioError::NotInitialized { .. })));
    assert!(matches!(session.pause(), Err(AudioError::InvalidState { .. })));
    assert!(matches!(session.resume(), Err(AudioError::InvalidState { .. })));
    session.stop().unwrap();
    assert_eq!(session.free_space(), 0);
    assert_eq!(session.buffered(), 0);
}

#[test]
fn test_pause_and_resume_require_matching_state() {
    let (session, _monitor) = session();
    session.init(config()).unwrap();

    assert!(matches!(session.pause(), Err(AudioError::InvalidState { .. })));
    assert!(matches!(session.resume(), Err(AudioError::InvalidState { .. })));

    session.start().unwrap();
    // Starting twice is a no-op
    session.start().unwrap();
    assert!(matches!(session.resume(), Err(AudioError::InvalidState { .. })));
}

#[test]
fn test_empty_write_rejected() {
    let (session, _monitor) = session();
    session.init(config()).unwrap();
    assert!(matches!(session.write(&[]), Err(AudioError::InvalidArgument { .. })));
}

#[test]
fn test_writes_above_threshold_are_dropped() {
    let (session, _monitor) = session();
    let mut events = session.events();
    session
        .init(
            SessionConfig::builder()
                .output(OutputKind::Notify)
                .format(FORMAT)
                .buffer_capacity(100)
                .build(),
        )
        .unwrap();

    assert_eq!(session.write(&[1; 80]).unwrap(), 80);
    // 80 > 75% of 100
    assert_eq!(session.write(&[1; 10]).unwrap(), 0);
    assert_eq!(session.buffered(), 80);

    let stats = session.producer_stats();
    assert_eq!(stats.bytes_accepted, 80);
    assert_eq!(stats.bytes_dropped, 10);
    assert_eq!(stats.chunks_dropped, 1);

    let mut dropped = false;
    while let Ok(event) = events.try_recv() {
        dropped |= matches!(event, SessionEvent::DataDropped { bytes: 10 });
    }
    assert!(dropped);
}

#[test]
fn test_write_at_threshold_is_accepted() {
    let (session, _monitor) = session();
    session
        .init(
            SessionConfig::builder()
                .output(OutputKind::Notify)
                .format(FORMAT)
                .buffer_capacity(100)
                .build(),
        )
        .unwrap();

    assert_eq!(session.write(&[1; 75]).unwrap(), 75);
    // Exactly at the threshold still writes what fits
    assert_eq!(session.write(&[1; 40]).unwrap(), 25);
    assert_eq!(session.producer_stats().short_writes, 1);
    assert_eq!(session.free_space(), 0);
}

#[test]
fn test_full_ring_write_times_out() {
    let (session, _monitor) = session();
    session
        .init(
            SessionConfig::builder()
                .output(OutputKind::Notify)
                .format(FORMAT)
                .buffer_capacity(100)
                .drop_threshold_percent(100)
                .build(),
        )
        .unwrap();
    session.write(&[0; 100]).unwrap();

    let start = Instant::now();
    assert_eq!(session.write_timeout(&[0; 2], Duration::from_millis(30)).unwrap(), 0);
    assert!(start.elapsed() >= Duration::from_millis(25));

    let start = Instant::now();
    assert_eq!(session.write_timeout(&[0; 2], Duration::ZERO).unwrap(), 0);
    assert!(start.elapsed() < Duration::from_millis(20));
}

#[test]
fn test_stop_discards_buffered_audio() {
    let (session, monitor) = session();
    session.init(config()).unwrap();
    monitor.set_ready(false);
    session.write(&[0; 64]).unwrap();
    session.start().unwrap();
    session.pause().unwrap();

    session.write(&[0; 64]).unwrap();
    session.stop().unwrap();
    assert_eq!(session.buffered(), 0);
    assert_eq!(session.state(), PlaybackState::Initialized);
}

#[test]
fn test_volume() {
    let (session, monitor) = session();
    let mut events = session.events();
    session.init(config()).unwrap();
    assert_eq!(session.volume(), 100);

    assert!(matches!(
        session.set_volume(101),
        Err(AudioError::InvalidArgument { .. })
    ));
    session.set_volume(35).unwrap();
    assert_eq!(session.volume(), 35);
    assert_eq!(monitor.volumes(), vec![35]);

    let mut changed = false;
    while let Ok(event) = events.try_recv() {
        changed |= matches!(event, SessionEvent::VolumeChanged { volume: 35 });
    }
    assert!(changed);
}

#[test]
fn test_control_commands() {
    let (session, _monitor) = session();
    session.init(config()).unwrap();

    session.apply_control(ControlCommand::Play).unwrap();
    assert_eq!(session.state(), PlaybackState::Playing);
    session.apply_control(ControlCommand::Pause).unwrap();
    assert_eq!(session.state(), PlaybackState::Paused);
    // Pause while paused is ignored
    session.apply_control(ControlCommand::Pause).unwrap();
    session.apply_control(ControlCommand::Play).unwrap();
    assert_eq!(session.state(), PlaybackState::Playing);
    session.apply_control(ControlCommand::Stop).unwrap();
    assert_eq!(session.state(), PlaybackState::Initialized);
}

#[test]
fn test_mute_restores_volume() {
    let (session, _monitor) = session();
    let mut events = session.events();
    session.init(config()).unwrap();
    session.set_volume(60).unwrap();

    session.apply_control(ControlCommand::Mute).unwrap();
    assert_eq!(session.volume(), 0);
    assert!(session.is_muted());
    // Muting twice keeps the saved volume
    session.apply_control(ControlCommand::Mute).unwrap();

    session.apply_control(ControlCommand::Unmute).unwrap();
    assert_eq!(session.volume(), 60);
    assert!(!session.is_muted());

    let mutes: Vec<bool> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|e| match e {
            SessionEvent::MuteChanged { muted } => Some(muted),
            _ => None,
        })
        .collect();
    assert_eq!(mutes, vec![true, false]);
}

#[test]
fn test_set_volume_cancels_mute() {
    let (session, _monitor) = session();
    session.init(config()).unwrap();
    session.apply_control(ControlCommand::Mute).unwrap();

    session.apply_control(ControlCommand::SetVolume(20)).unwrap();
    assert!(!session.is_muted());
    session.apply_control(ControlCommand::Unmute).unwrap();
    assert_eq!(session.volume(), 20);
}

#[test]
fn test_unsupported_output() {
    let (session, _monitor) = session();
    let config = SessionConfig::builder().output(OutputKind::Tone).format(FORMAT).build();

    assert!(matches!(session.init(config), Err(AudioError::Unsupported { .. })));
    assert_eq!(session.state(), PlaybackState::Uninitialized);
}

#[test]
fn test_backend_init_failure_enters_error() {
    let fail = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&fail);
    let registry = SinkRegistry::new().register(OutputKind::Notify, move |_format| {
        if flag.load(Ordering::Relaxed) {
            return Err(SinkError::Fault("adapter missing".to_string()));
        }
        let (sink, _monitor) = RecordingSink::new(OutputKind::Notify, SampleRange::Signed, false);
        Ok(Box::new(sink) as Box<dyn AudioSink>)
    });
    let session = PlaybackSession::new(registry);

    assert!(matches!(session.init(config()), Err(AudioError::BackendFault { .. })));
    assert_eq!(session.state(), PlaybackState::Error);

    // Only cleanup leaves Error
    fail.store(false, Ordering::Relaxed);
    assert!(matches!(session.init(config()), Err(AudioError::InvalidState { .. })));
    session.cleanup();
    session.init(config()).unwrap();
    assert_eq!(session.state(), PlaybackState::Initialized);
}

#[test]
fn test_start_fault_enters_error() {
    let (session, monitor) = session();
    session.init(config()).unwrap();
    monitor.fail_start(SinkError::Fault("gone".to_string()));

    assert!(matches!(session.start(), Err(AudioError::BackendFault { .. })));
    assert_eq!(session.state(), PlaybackState::Error);
    assert!(matches!(session.write(&[0, 0]), Err(AudioError::InvalidState { .. })));
    assert!(matches!(session.start(), Err(AudioError::InvalidState { .. })));

    // Stop in Error stays in Error
    session.stop().unwrap();
    assert_eq!(session.state(), PlaybackState::Error);
}

#[test]
fn test_start_refusal_keeps_state() {
    let (session, monitor) = session();
    session.init(config()).unwrap();
    monitor.fail_start(SinkError::Busy);

    assert!(matches!(session.start(), Err(AudioError::Sink(SinkError::Busy))));
    assert_eq!(session.state(), PlaybackState::Initialized);
    session.start().unwrap();
}

#[test]
fn test_state_watch_sees_transitions() {
    let (session, _monitor) = session();
    let rx = session.subscribe();
    session.init(config()).unwrap();
    assert_eq!(*rx.borrow(), PlaybackState::Initialized);
}

#[test]
fn test_cleanup_is_idempotent() {
    let (session, monitor) = session();
    session.init(config()).unwrap();
    session.start().unwrap();
    session.write(&samples(&[1, 2, 3])).unwrap();

    session.cleanup();
    session.cleanup();
    assert_eq!(monitor.cleanups(), 1);
    assert_eq!(session.state(), PlaybackState::Uninitialized);

    // Reusable after cleanup
    session.init(config()).unwrap();
    session.start().unwrap();
    thread::sleep(Duration::from_millis(20));
    session.cleanup();
}

#[test]
fn test_shared_between_threads() {
    let (session, monitor) = session();
    session.init(config()).unwrap();
    session.start().unwrap();
    let session = Arc::new(session);

    let producer = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            for _ in 0..20 {
                while session.write(&[0u8; 32]).unwrap() == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        })
    };
    producer.join().unwrap();

    thread::sleep(Duration::from_millis(100));
    assert_eq!(session.producer_stats().bytes_accepted, 640);
    assert!(monitor.frame_count() > 0);
}
