//! Wall-clock pacing of sample frames

use std::time::{Duration, Instant};

/// Below this remaining time the pacer spins instead of sleeping
pub const SPIN_THRESHOLD: Duration = Duration::from_millis(1);

/// Schedules frame emission against the sample rate
///
/// Deadlines are computed from an anchor as `anchor + n / rate`, so rounding
/// never accumulates across frames. When the caller falls more than
/// `max_lag` behind, the schedule is re-anchored at the current time rather
/// than bursting to catch up.
#[derive(Debug, Clone)]
pub struct FramePacer {
    sample_rate: u32,
    anchor: Instant,
    /// Frames scheduled since the anchor
    frames: u64,
    max_lag: Duration,
    late_frames: u64,
}

impl FramePacer {
    /// Create a pacer anchored at the current time
    ///
    /// A zero `sample_rate` is treated as 1 Hz.
    #[must_use]
    pub fn new(sample_rate: u32, max_lag: Duration) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            anchor: Instant::now(),
            frames: 0,
            max_lag,
            late_frames: 0,
        }
    }

    /// Nominal spacing of frames, truncated to whole microseconds
    #[must_use]
    pub fn sample_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.sample_rate))
    }

    /// Sample rate being paced
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Deadline of the next frame
    #[must_use]
    pub fn next_deadline(&self) -> Instant {
        self.anchor + self.offset_of(self.frames)
    }

    /// Frames counted as late since creation
    #[must_use]
    pub fn late_frames(&self) -> u64 {
        self.late_frames
    }

    fn offset_of(&self, frames: u64) -> Duration {
        Duration::from_nanos(frames.saturating_mul(1_000_000_000) / u64::from(self.sample_rate))
    }

    /// Re-anchor the schedule at the current time
    pub fn reset(&mut self) {
        self.anchor = Instant::now();
        self.frames = 0;
    }

    /// Account for one emitted frame
    pub fn advance(&mut self) {
        self.frames += 1;
    }

    /// Block until the next deadline
    ///
    /// Sleeps for the bulk of the remaining time and spins through the last
    /// [`SPIN_THRESHOLD`]. Returns immediately when already past the deadline.
    pub fn wait(&mut self) {
        let deadline = self.next_deadline();
        let now = Instant::now();

        if now >= deadline {
            let lag = now - deadline;
            if lag > self.max_lag {
                self.late_frames += 1;
                tracing::trace!("Pacer {:?} behind schedule, re-anchoring", lag);
                self.reset();
            }
            return;
        }

        let remaining = deadline - now;
        if remaining > SPIN_THRESHOLD {
            std::thread::sleep(remaining - SPIN_THRESHOLD);
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}
