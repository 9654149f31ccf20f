//! Playback session: the state machine in front of one output sink

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use super::consumer::{ConsumerStats, Counters, PlaybackConsumer, ProducerStats};
use super::control::ControlCommand;
use crate::audio::{AudioFormat, BoundedByteBuffer};
use crate::error::{AudioError, Result};
use crate::output::{AudioSink, OutputKind, SinkError, SinkRegistry};
use crate::state::{EventBus, SessionEvent, StateContainer};
use crate::types::{PlaybackState, SessionConfig};

/// State shared with the consumer thread
pub(crate) struct Shared {
    pub(crate) state: StateContainer,
    pub(crate) events: EventBus,
    pub(crate) counters: Counters,
    volume: AtomicU8,
    running: AtomicBool,
}

impl Shared {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }

    /// Set the state, logging and publishing actual changes; returns the old state
    pub(crate) fn transition(&self, new: PlaybackState) -> PlaybackState {
        let old = self.state.set(new);
        if old != new {
            tracing::info!("Playback state: {} -> {}", old, new);
            self.events.emit(SessionEvent::StateChanged { old, new });
        }
        old
    }
}

/// Resources that exist between init and cleanup
pub(crate) struct Pipeline {
    pub(crate) config: SessionConfig,
    pub(crate) buffer: BoundedByteBuffer,
    pub(crate) sink: Mutex<Box<dyn AudioSink>>,
}

impl Pipeline {
    fn sink(&self) -> MutexGuard<'_, Box<dyn AudioSink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct Control {
    pipeline: Option<Arc<Pipeline>>,
    consumer: Option<JoinHandle<()>>,
    /// Volume to restore on unmute
    muted_volume: Option<u8>,
}

/// Streaming playback into one output backend
///
/// Producers push PCM bytes with [`write`](Self::write); a dedicated consumer
/// thread drains the ring at the sample rate and drives the sink chosen at
/// [`init`](Self::init). All methods take `&self` so a session can be shared
/// between a producer, a control layer and observers behind an `Arc`.
///
/// | From | Call | To |
/// |---|---|---|
/// | Uninitialized | `init` | Initialized |
/// | Initialized, Paused | `start` | Playing |
/// | Playing, Paused | `stop` | Initialized |
/// | Playing | `pause` | Paused |
/// | Paused | `resume` | Playing |
/// | any | `cleanup` | Uninitialized |
/// | any | sink fault | Error |
pub struct PlaybackSession {
    registry: SinkRegistry,
    shared: Arc<Shared>,
    control: Mutex<Control>,
}

impl PlaybackSession {
    /// Create an uninitialized session that can build sinks from `registry`
    #[must_use]
    pub fn new(registry: SinkRegistry) -> Self {
        Self {
            registry,
            shared: Arc::new(Shared {
                state: StateContainer::new(),
                events: EventBus::new(),
                counters: Counters::default(),
                volume: AtomicU8::new(0),
                running: AtomicBool::new(false),
            }),
            control: Mutex::new(Control::default()),
        }
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn invalid_state(&self, message: impl Into<String>) -> AudioError {
        AudioError::InvalidState {
            message: message.into(),
            current_state: self.state().to_string(),
        }
    }

    fn pipeline(&self) -> Result<Arc<Pipeline>> {
        self.control()
            .pipeline
            .clone()
            .ok_or(AudioError::NotInitialized {
                component: "playback session",
            })
    }

    /// Build the sink and ring for `config`
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a malformed config
    /// - `Unsupported` if no backend is registered for the output kind
    /// - `BackendFault` if the backend fails to initialize; the session
    ///   enters `Error`
    /// - `AlreadyInitialized` unless the session is uninitialized
    pub fn init(&self, config: SessionConfig) -> Result<()> {
        let mut control = self.control();
        match self.state() {
            PlaybackState::Uninitialized => {}
            PlaybackState::Error => {
                return Err(self.invalid_state("cleanup required after a fault"));
            }
            _ => {
                return Err(AudioError::AlreadyInitialized {
                    component: "playback session",
                });
            }
        }

        config.validate()?;

        let sink = match self.registry.build(config.output, config.format) {
            Ok(sink) => sink,
            Err(e @ AudioError::BackendFault { .. }) => {
                tracing::error!("Output init failed: {}", e);
                self.shared.transition(PlaybackState::Error);
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let buffer = BoundedByteBuffer::new(config.buffer_capacity)?;

        self.shared.counters.reset();
        self.shared
            .volume
            .store(config.initial_volume, Ordering::Relaxed);
        control.muted_volume = None;

        tracing::info!(
            "Playback session initialized: {} output, {}, {} byte ring",
            config.output,
            config.format,
            config.buffer_capacity
        );

        control.pipeline = Some(Arc::new(Pipeline {
            config,
            buffer,
            sink: Mutex::new(sink),
        }));
        self.shared.transition(PlaybackState::Initialized);
        Ok(())
    }

    /// Begin or continue playback
    ///
    /// Starting while already playing is a no-op.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before init, `InvalidState` in `Error`, and
    /// `BackendFault` (entering `Error`) if the sink cannot start.
    pub fn start(&self) -> Result<()> {
        let mut control = self.control();
        let pipeline = match self.state() {
            PlaybackState::Playing => return Ok(()),
            PlaybackState::Uninitialized => {
                return Err(AudioError::NotInitialized {
                    component: "playback session",
                });
            }
            PlaybackState::Error => return Err(self.invalid_state("cannot start after a fault")),
            PlaybackState::Initialized | PlaybackState::Paused => control
                .pipeline
                .clone()
                .ok_or(AudioError::NotInitialized {
                    component: "playback session",
                })?,
        };

        if let Err(e) = pipeline.sink().start() {
            return Err(self.sink_failure(e));
        }

        if control.consumer.is_none() {
            self.shared.running.store(true, Ordering::Release);
            let consumer = PlaybackConsumer::new(Arc::clone(&self.shared), Arc::clone(&pipeline));
            let handle = std::thread::Builder::new()
                .name("playback-consumer".to_string())
                .spawn(move || consumer.run())
                .map_err(|e| {
                    self.shared.running.store(false, Ordering::Release);
                    AudioError::BackendFault {
                        message: format!("failed to spawn consumer thread: {e}"),
                    }
                })?;
            control.consumer = Some(handle);
        }

        self.shared.transition(PlaybackState::Playing);
        Ok(())
    }

    /// Stop playback and discard buffered audio
    ///
    /// Always succeeds; a no-op when nothing is playing.
    ///
    /// # Errors
    ///
    /// Never returns an error; the `Result` keeps the control API uniform.
    pub fn stop(&self) -> Result<()> {
        let control = self.control();
        let state = self.state();
        let Some(pipeline) = control.pipeline.clone() else {
            return Ok(());
        };

        if let Err(e) = pipeline.sink().stop() {
            tracing::warn!("Sink stop failed: {}", e);
        }
        pipeline.buffer.clear();

        if matches!(state, PlaybackState::Playing | PlaybackState::Paused) {
            self.shared.transition(PlaybackState::Initialized);
        }
        Ok(())
    }

    /// Suspend playback, keeping buffered audio
    ///
    /// # Errors
    ///
    /// `InvalidState` unless playing.
    pub fn pause(&self) -> Result<()> {
        let _control = self.control();
        if self.state() != PlaybackState::Playing {
            return Err(self.invalid_state("pause requires playing"));
        }
        self.shared.transition(PlaybackState::Paused);
        Ok(())
    }

    /// Continue after [`pause`](Self::pause)
    ///
    /// # Errors
    ///
    /// `InvalidState` unless paused.
    pub fn resume(&self) -> Result<()> {
        let _control = self.control();
        if self.state() != PlaybackState::Paused {
            return Err(self.invalid_state("resume requires paused"));
        }
        self.shared.transition(PlaybackState::Playing);
        Ok(())
    }

    /// Release the consumer, sink and ring; safe from any state
    pub fn cleanup(&self) {
        let mut control = self.control();

        self.shared.running.store(false, Ordering::Release);
        if let Some(pipeline) = &control.pipeline {
            pipeline.buffer.close();
        }
        if let Some(handle) = control.consumer.take() {
            if handle.join().is_err() {
                tracing::error!("Consumer thread panicked");
            }
        }
        if let Some(pipeline) = control.pipeline.take() {
            pipeline.sink().cleanup();
        }
        control.muted_volume = None;

        if self.shared.transition(PlaybackState::Uninitialized) != PlaybackState::Uninitialized {
            tracing::info!("Playback session cleaned up");
        }
    }

    /// Queue PCM bytes, waiting up to the configured write timeout for space
    ///
    /// Returns the bytes accepted. When the ring is above the drop threshold
    /// the whole chunk is discarded and 0 is returned.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for empty input, `NotInitialized` before init and
    /// `InvalidState` after a fault.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let pipeline = self.writable_pipeline(data)?;
        let timeout = pipeline.config.write_timeout;
        Ok(self.write_into(&pipeline, data, timeout))
    }

    /// [`write`](Self::write) with an explicit wait; `Duration::ZERO` never blocks
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub fn write_timeout(&self, data: &[u8], timeout: Duration) -> Result<usize> {
        let pipeline = self.writable_pipeline(data)?;
        Ok(self.write_into(&pipeline, data, timeout))
    }

    fn writable_pipeline(&self, data: &[u8]) -> Result<Arc<Pipeline>> {
        if data.is_empty() {
            return Err(AudioError::invalid_argument("data", "empty write"));
        }
        let pipeline = self.pipeline()?;
        if self.state() == PlaybackState::Error {
            return Err(self.invalid_state("write after a fault"));
        }
        Ok(pipeline)
    }

    fn write_into(&self, pipeline: &Pipeline, data: &[u8], timeout: Duration) -> usize {
        let counters = &self.shared.counters;
        let used = pipeline.buffer.size_used();

        if used > pipeline.config.drop_threshold_bytes() {
            Counters::add(&counters.bytes_dropped, data.len());
            let dropped = Counters::bump(&counters.chunks_dropped);
            tracing::debug!(
                "Ring at {}/{} bytes, dropped {} byte chunk ({} dropped so far)",
                used,
                pipeline.buffer.capacity(),
                data.len(),
                dropped
            );
            self.shared
                .events
                .emit(SessionEvent::DataDropped { bytes: data.len() });
            return 0;
        }

        let written = pipeline.buffer.write_blocking(data, timeout);
        Counters::add(&counters.bytes_accepted, written);
        if written < data.len() {
            Counters::bump(&counters.short_writes);
            tracing::trace!("Short write: {}/{} bytes", written, data.len());
        }
        written
    }

    /// Set volume, 0-100
    ///
    /// # Errors
    ///
    /// `InvalidArgument` above 100; `BackendFault` if the sink faults.
    pub fn set_volume(&self, volume: u8) -> Result<()> {
        if volume > 100 {
            return Err(AudioError::invalid_argument(
                "volume",
                format!("{volume} is above 100"),
            ));
        }
        let pipeline = self.control().pipeline.clone();
        self.apply_volume(pipeline.as_deref(), volume)
    }

    fn apply_volume(&self, pipeline: Option<&Pipeline>, volume: u8) -> Result<()> {
        let old = self.shared.volume.swap(volume, Ordering::Relaxed);
        if let Some(pipeline) = pipeline {
            let result = pipeline.sink().set_volume(volume);
            if let Err(e) = result {
                return Err(self.sink_failure(e));
            }
        }
        if old != volume {
            tracing::debug!("Volume {} -> {}", old, volume);
            self.shared
                .events
                .emit(SessionEvent::VolumeChanged { volume });
        }
        Ok(())
    }

    /// Map a control record onto the state machine
    ///
    /// Play starts or resumes, pause only acts while playing, mute remembers
    /// the volume that unmute restores.
    ///
    /// # Errors
    ///
    /// Whatever the mapped operation returns.
    pub fn apply_control(&self, command: ControlCommand) -> Result<()> {
        tracing::debug!("Control command: {:?}", command);
        match command {
            ControlCommand::Play => match self.state() {
                PlaybackState::Paused => self.resume(),
                _ => self.start(),
            },
            ControlCommand::Pause => match self.state() {
                PlaybackState::Playing => self.pause(),
                _ => Ok(()),
            },
            ControlCommand::Stop => self.stop(),
            ControlCommand::SetVolume(volume) => {
                self.control().muted_volume = None;
                self.set_volume(volume)
            }
            ControlCommand::Mute => {
                let pipeline = {
                    let mut control = self.control();
                    if control.muted_volume.is_some() {
                        return Ok(());
                    }
                    control.muted_volume = Some(self.volume());
                    control.pipeline.clone()
                };
                self.apply_volume(pipeline.as_deref(), 0)?;
                self.shared.events.emit(SessionEvent::MuteChanged { muted: true });
                Ok(())
            }
            ControlCommand::Unmute => {
                let (restore, pipeline) = {
                    let mut control = self.control();
                    (control.muted_volume.take(), control.pipeline.clone())
                };
                let Some(volume) = restore else {
                    return Ok(());
                };
                self.apply_volume(pipeline.as_deref(), volume)?;
                self.shared.events.emit(SessionEvent::MuteChanged { muted: false });
                Ok(())
            }
        }
    }

    /// Turn a sink error into a session error, entering `Error` when fatal
    fn sink_failure(&self, err: SinkError) -> AudioError {
        if err.is_fatal() {
            tracing::error!("Sink fault: {}", err);
            self.shared.transition(PlaybackState::Error);
            self.shared.events.emit(SessionEvent::Fault {
                message: err.to_string(),
            });
        } else {
            tracing::warn!("Sink error: {}", err);
        }
        err.into()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.shared.state.get()
    }

    /// Observe state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.shared.state.subscribe()
    }

    /// Subscribe to session events
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Event bus, for filtered subscriptions
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.shared.events
    }

    /// Current volume, 0-100
    #[must_use]
    pub fn volume(&self) -> u8 {
        self.shared.volume()
    }

    /// Check if a mute is in effect
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.control().muted_volume.is_some()
    }

    /// Ring space in bytes; 0 before init
    #[must_use]
    pub fn free_space(&self) -> usize {
        self.pipeline().map_or(0, |p| p.buffer.space_available())
    }

    /// Ring fill in bytes; 0 before init
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pipeline().map_or(0, |p| p.buffer.size_used())
    }

    /// Space reported by the sink; 0 before init
    #[must_use]
    pub fn sink_free_space(&self) -> usize {
        self.pipeline().map_or(0, |p| p.sink().free_space())
    }

    /// Stream format, once initialized
    #[must_use]
    pub fn format(&self) -> Option<AudioFormat> {
        self.pipeline().ok().map(|p| p.config.format)
    }

    /// Active output backend, once initialized
    #[must_use]
    pub fn output_kind(&self) -> Option<OutputKind> {
        self.pipeline().ok().map(|p| p.config.output)
    }

    /// Active configuration, once initialized
    #[must_use]
    pub fn config(&self) -> Option<SessionConfig> {
        self.pipeline().ok().map(|p| p.config.clone())
    }

    /// Consumer counters since init
    #[must_use]
    pub fn stats(&self) -> ConsumerStats {
        self.shared.counters.consumer()
    }

    /// Producer counters since init
    #[must_use]
    pub fn producer_stats(&self) -> ProducerStats {
        self.shared.counters.producer()
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("state", &self.state())
            .field("volume", &self.volume())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
