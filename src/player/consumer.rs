//! Real-time consumer: ring -> transform -> sink, paced by the sample clock

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use super::session::{Pipeline, Shared};
use crate::audio::{FramePacer, FrameTransform};
use crate::state::SessionEvent;
use crate::types::PlaybackState;

/// Starvation ticks between log lines
const STARVATION_LOG_EVERY: u64 = 100;
/// Sink errors between log lines
const SINK_ERROR_LOG_EVERY: u64 = 100;

/// Consumer counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Frames handed to the sink successfully
    pub frames_emitted: u64,
    /// Bounded reads that returned no data while playing
    pub starved_ticks: u64,
    /// Non-fatal sink refusals
    pub sink_errors: u64,
    /// Times pacing fell behind and restarted
    pub late_frames: u64,
}

/// Producer-side counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Bytes placed in the ring
    pub bytes_accepted: u64,
    /// Bytes discarded by the overflow policy
    pub bytes_dropped: u64,
    /// Chunks discarded by the overflow policy
    pub chunks_dropped: u64,
    /// Writes that only partially fit
    pub short_writes: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) frames_emitted: AtomicU64,
    pub(crate) starved_ticks: AtomicU64,
    pub(crate) sink_errors: AtomicU64,
    pub(crate) late_frames: AtomicU64,
    pub(crate) bytes_accepted: AtomicU64,
    pub(crate) bytes_dropped: AtomicU64,
    pub(crate) chunks_dropped: AtomicU64,
    pub(crate) short_writes: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn consumer(&self) -> ConsumerStats {
        ConsumerStats {
            frames_emitted: self.frames_emitted.load(Ordering::Relaxed),
            starved_ticks: self.starved_ticks.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            late_frames: self.late_frames.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn producer(&self) -> ProducerStats {
        ProducerStats {
            bytes_accepted: self.bytes_accepted.load(Ordering::Relaxed),
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
            short_writes: self.short_writes.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.frames_emitted,
            &self.starved_ticks,
            &self.sink_errors,
            &self.late_frames,
            &self.bytes_accepted,
            &self.bytes_dropped,
            &self.chunks_dropped,
            &self.short_writes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Outcome of handing one frame to the sink
enum Emit {
    Delivered,
    Skipped,
    Refused,
    Fatal,
}

/// Body of the consumer thread
pub(crate) struct PlaybackConsumer {
    shared: Arc<Shared>,
    pipeline: Arc<Pipeline>,
    transform: FrameTransform,
    pacer: FramePacer,
    /// One input frame, possibly partially filled
    frame: Vec<u8>,
    filled: usize,
    out: Vec<u8>,
    was_playing: bool,
}

impl PlaybackConsumer {
    pub(crate) fn new(shared: Arc<Shared>, pipeline: Arc<Pipeline>) -> Self {
        let config = &pipeline.config;
        let (range, smoothing) = {
            let sink = pipeline.sink.lock().unwrap_or_else(PoisonError::into_inner);
            (sink.sample_range(), sink.wants_smoothing())
        };
        let transform = FrameTransform::new(
            config.format,
            range,
            smoothing.then_some(config.filter_weight),
        );
        let pacer = FramePacer::new(config.format.sample_rate, config.max_lag);
        let frame = vec![0u8; config.format.bytes_per_frame()];
        let out = Vec::with_capacity(transform.output_frame_bytes());

        Self {
            shared,
            pipeline,
            transform,
            pacer,
            frame,
            filled: 0,
            out,
            was_playing: false,
        }
    }

    /// Run until the session shuts down or the sink faults
    pub(crate) fn run(mut self) {
        tracing::debug!(
            "Consumer started: {}, interval {:?}",
            self.pipeline.config.format,
            self.pacer.sample_interval()
        );

        while self.shared.is_running() {
            match self.shared.state.get() {
                PlaybackState::Playing => {}
                PlaybackState::Error | PlaybackState::Uninitialized => break,
                idle => {
                    if idle == PlaybackState::Initialized {
                        // Stopped: a partial frame belongs to the discarded stream
                        self.filled = 0;
                    }
                    self.was_playing = false;
                    std::thread::sleep(self.pipeline.config.idle_poll_interval);
                    continue;
                }
            }

            if !self.was_playing {
                self.pacer.reset();
                self.was_playing = true;
            }

            if !self.fill_frame() {
                continue;
            }

            match self.emit() {
                Emit::Fatal => break,
                Emit::Delivered | Emit::Skipped | Emit::Refused => {}
            }

            self.pacer.advance();
            let late_before = self.pacer.late_frames();
            self.pacer.wait();
            if self.pacer.late_frames() > late_before {
                Counters::bump(&self.shared.counters.late_frames);
            }
        }

        tracing::debug!("Consumer exiting: {:?}", self.shared.counters.consumer());
    }

    /// Bounded read towards one complete frame; true once complete
    fn fill_frame(&mut self) -> bool {
        let n = self.pipeline.buffer.read_blocking(
            &mut self.frame[self.filled..],
            self.pipeline.config.frame_read_timeout,
        );

        if n == 0 {
            let ticks = Counters::bump(&self.shared.counters.starved_ticks);
            if ticks % STARVATION_LOG_EVERY == 1 {
                tracing::debug!("Consumer starved ({} ticks)", ticks);
            }
            return false;
        }

        self.filled += n;
        if self.filled < self.frame.len() {
            return false;
        }
        self.filled = 0;
        true
    }

    fn emit(&mut self) -> Emit {
        self.out.clear();
        let volume = self.shared.volume();
        self.transform.process(&self.frame, volume, &mut self.out);

        let result = {
            let mut sink = self
                .pipeline
                .sink
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !sink.is_ready() {
                return Emit::Skipped;
            }
            sink.write(&self.out)
        };

        match result {
            Ok(_) => {
                Counters::bump(&self.shared.counters.frames_emitted);
                Emit::Delivered
            }
            Err(e) if e.is_fatal() => {
                tracing::error!("Sink fault, stopping playback: {}", e);
                self.shared.transition(PlaybackState::Error);
                self.shared.events.emit(SessionEvent::Fault {
                    message: e.to_string(),
                });
                Emit::Fatal
            }
            Err(e) => {
                let errors = Counters::bump(&self.shared.counters.sink_errors);
                if errors % SINK_ERROR_LOG_EVERY == 1 {
                    tracing::warn!("Sink refused frame ({} so far): {}", errors, e);
                    self.shared.events.emit(SessionEvent::SinkError {
                        message: e.to_string(),
                    });
                }
                Emit::Refused
            }
        }
    }
}
