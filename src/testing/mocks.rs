//! In-memory stand-ins for output hardware

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::audio::SampleRange;
use crate::output::{AudioSink, NotifyTransport, OutputKind, PwmChannel, SinkError, SinkRegistry};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One frame as the sink received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFrame {
    /// Arrival time
    pub at: Instant,
    /// Transformed frame bytes
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
struct MonitorState {
    frames: Vec<RecordedFrame>,
    starts: usize,
    stops: usize,
    cleanups: usize,
    volumes: Vec<u8>,
    ready: bool,
    write_failures: VecDeque<SinkError>,
    start_failure: Option<SinkError>,
}

/// Test-side handle onto a [`RecordingSink`]
#[derive(Debug, Clone)]
pub struct SinkMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl Default for SinkMonitor {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState {
                frames: Vec::new(),
                starts: 0,
                stops: 0,
                cleanups: 0,
                volumes: Vec::new(),
                ready: true,
                write_failures: VecDeque::new(),
                start_failure: None,
            })),
        }
    }
}

impl SinkMonitor {
    /// Frames recorded so far
    #[must_use]
    pub fn frames(&self) -> Vec<RecordedFrame> {
        lock(&self.state).frames.clone()
    }

    /// Number of frames recorded
    #[must_use]
    pub fn frame_count(&self) -> usize {
        lock(&self.state).frames.len()
    }

    /// All recorded bytes, concatenated
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        lock(&self.state)
            .frames
            .iter()
            .flat_map(|f| f.bytes.iter().copied())
            .collect()
    }

    /// Calls to `start`
    #[must_use]
    pub fn starts(&self) -> usize {
        lock(&self.state).starts
    }

    /// Calls to `stop`
    #[must_use]
    pub fn stops(&self) -> usize {
        lock(&self.state).stops
    }

    /// Calls to `cleanup`
    #[must_use]
    pub fn cleanups(&self) -> usize {
        lock(&self.state).cleanups
    }

    /// Volumes pushed to the sink, in order
    #[must_use]
    pub fn volumes(&self) -> Vec<u8> {
        lock(&self.state).volumes.clone()
    }

    /// Toggle readiness; frames are skipped while not ready
    pub fn set_ready(&self, ready: bool) {
        lock(&self.state).ready = ready;
    }

    /// Fail the next write with `error`; queued failures apply in order
    pub fn fail_next_write(&self, error: SinkError) {
        lock(&self.state).write_failures.push_back(error);
    }

    /// Fail the next `start` with `error`
    pub fn fail_start(&self, error: SinkError) {
        lock(&self.state).start_failure = Some(error);
    }

    /// Forget recorded frames
    pub fn clear(&self) {
        lock(&self.state).frames.clear();
    }
}

/// Sink that records every frame with its arrival time
#[derive(Debug)]
pub struct RecordingSink {
    kind: OutputKind,
    range: SampleRange,
    smoothing: bool,
    monitor: SinkMonitor,
}

impl RecordingSink {
    /// Create a sink and the monitor that observes it
    #[must_use]
    pub fn new(kind: OutputKind, range: SampleRange, smoothing: bool) -> (Self, SinkMonitor) {
        let monitor = SinkMonitor::default();
        (Self::with_monitor(kind, range, smoothing, monitor.clone()), monitor)
    }

    /// Create a sink reporting to an existing monitor
    #[must_use]
    pub fn with_monitor(
        kind: OutputKind,
        range: SampleRange,
        smoothing: bool,
        monitor: SinkMonitor,
    ) -> Self {
        Self {
            kind,
            range,
            smoothing,
            monitor,
        }
    }
}

impl AudioSink for RecordingSink {
    fn kind(&self) -> OutputKind {
        self.kind
    }

    fn sample_range(&self) -> SampleRange {
        self.range
    }

    fn wants_smoothing(&self) -> bool {
        self.smoothing
    }

    fn is_ready(&self) -> bool {
        lock(&self.monitor.state).ready
    }

    fn start(&mut self) -> Result<(), SinkError> {
        let mut state = lock(&self.monitor.state);
        if let Some(error) = state.start_failure.take() {
            return Err(error);
        }
        state.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        lock(&self.monitor.state).stops += 1;
        Ok(())
    }

    fn write(&mut self, frame: &[u8]) -> Result<usize, SinkError> {
        let mut state = lock(&self.monitor.state);
        if let Some(error) = state.write_failures.pop_front() {
            return Err(error);
        }
        state.frames.push(RecordedFrame {
            at: Instant::now(),
            bytes: frame.to_vec(),
        });
        Ok(frame.len())
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), SinkError> {
        lock(&self.monitor.state).volumes.push(volume);
        Ok(())
    }

    fn free_space(&self) -> usize {
        usize::MAX
    }

    fn cleanup(&mut self) {
        lock(&self.monitor.state).cleanups += 1;
    }
}

/// Registry whose `kind` backend is a [`RecordingSink`] sharing one monitor
#[must_use]
pub fn recording_registry(
    kind: OutputKind,
    range: SampleRange,
    smoothing: bool,
) -> (SinkRegistry, SinkMonitor) {
    let monitor = SinkMonitor::default();
    let shared = monitor.clone();
    let registry = SinkRegistry::new().register(kind, move |_format| {
        Ok(Box::new(RecordingSink::with_monitor(
            kind,
            range,
            smoothing,
            shared.clone(),
        )) as Box<dyn AudioSink>)
    });
    (registry, monitor)
}

/// PWM channel that records programmed pulses
#[derive(Debug)]
pub struct MockPwm {
    ready: AtomicBool,
    pulses: Mutex<Vec<(u32, u32)>>,
    failure: Mutex<Option<SinkError>>,
}

impl Default for MockPwm {
    fn default() -> Self {
        Self {
            ready: AtomicBool::new(true),
            pulses: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }
}

impl MockPwm {
    /// Create a ready channel
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle device readiness
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    /// Fail every `set_pulse` with `error` until cleared with `None`
    pub fn set_failure(&self, error: Option<SinkError>) {
        *lock(&self.failure) = error;
    }

    /// `(period_ns, pulse_ns)` pairs programmed so far
    #[must_use]
    pub fn pulses(&self) -> Vec<(u32, u32)> {
        lock(&self.pulses).clone()
    }

    /// Most recent pulse
    #[must_use]
    pub fn last_pulse(&self) -> Option<(u32, u32)> {
        lock(&self.pulses).last().copied()
    }
}

impl PwmChannel for MockPwm {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    fn set_pulse(&self, period_ns: u32, pulse_ns: u32) -> Result<(), SinkError> {
        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }
        lock(&self.pulses).push((period_ns, pulse_ns));
        Ok(())
    }
}

/// Notification link that records payloads
#[derive(Debug)]
pub struct MockNotifier {
    connected: AtomicBool,
    subscribed: AtomicBool,
    busy: AtomicBool,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self {
            connected: AtomicBool::new(true),
            subscribed: AtomicBool::new(true),
            busy: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl MockNotifier {
    /// Create a connected, subscribed link
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the connection
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Toggle the peer subscription
    pub fn set_subscribed(&self, subscribed: bool) {
        self.subscribed.store(subscribed, Ordering::Relaxed);
    }

    /// Make every notify report `Busy`
    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Relaxed);
    }

    /// Payloads sent so far
    #[must_use]
    pub fn sent(&self) -> Vec<Vec<u8>> {
        lock(&self.sent).clone()
    }

    /// Total bytes sent
    #[must_use]
    pub fn sent_bytes(&self) -> usize {
        lock(&self.sent).iter().map(Vec::len).sum()
    }
}

impl NotifyTransport for MockNotifier {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Relaxed)
    }

    fn notify(&self, payload: &[u8]) -> Result<(), SinkError> {
        if !self.is_connected() {
            return Err(SinkError::NotConnected);
        }
        if self.busy.load(Ordering::Relaxed) {
            return Err(SinkError::Busy);
        }
        lock(&self.sent).push(payload.to_vec());
        Ok(())
    }
}
