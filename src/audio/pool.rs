//! Fixed pool of pre-allocated byte buffers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, Result};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Pool dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of buffers
    pub count: usize,
    /// Size of each buffer in bytes
    pub size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            count: 4,
            size: 2048,
        }
    }
}

impl PoolConfig {
    /// Validate the dimensions
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if either dimension is zero.
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(AudioError::invalid_argument("count", "pool needs at least one buffer"));
        }
        if self.size == 0 {
            return Err(AudioError::invalid_argument("size", "buffer size must be non-zero"));
        }
        Ok(())
    }
}

/// Per-buffer marker bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BufferFlags(u8);

impl BufferFlags {
    /// No flags set
    pub const NONE: Self = Self(0);
    /// Last buffer of a stream
    pub const END_OF_STREAM: Self = Self(0x01);
    /// Data was lost before this buffer
    pub const DISCONTINUITY: Self = Self(0x02);
    /// Payload is compressed (never produced by this crate)
    pub const COMPRESSED: Self = Self(0x04);

    /// Check whether all bits in `other` are set
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits in `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits in `other`
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Raw bit value
    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Check if no bits are set
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for BufferFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Pool counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers in the pool
    pub total: usize,
    /// Buffers ready to be acquired
    pub free: usize,
    /// Buffers currently checked out
    pub in_use: usize,
    /// Successful acquisitions since init
    pub allocated: u64,
    /// Releases since init
    pub freed: u64,
    /// Acquisitions that returned no buffer
    pub allocation_failures: u64,
}

struct PoolState {
    /// `None` while the slot is checked out
    slots: Vec<Option<Box<[u8]>>>,
    buffer_size: usize,
    initialized: bool,
    /// Bumped by cleanup so handles from a previous lifetime are rejected
    generation: u64,
    next_sequence: u64,
    allocated: u64,
    freed: u64,
    allocation_failures: u64,
}

impl PoolState {
    fn has_free(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }
}

struct PoolInner {
    id: u64,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Zero `data` and put it back into `slot`; false if the handle is stale
    fn return_slot(&self, slot: usize, generation: u64, mut data: Box<[u8]>) -> bool {
        data.fill(0);

        let mut state = self.lock();
        if !state.initialized || state.generation != generation {
            return false;
        }
        match state.slots.get_mut(slot) {
            Some(entry @ None) => {
                *entry = Some(data);
                state.freed += 1;
            }
            _ => return false,
        }
        drop(state);

        self.available.notify_one();
        true
    }
}

/// Fixed set of equally sized buffers handed out as owned [`PooledBuffer`]s
///
/// All storage is allocated by [`init`](Self::init). A checked-out buffer is
/// owned by exactly one caller; dropping it returns it to the pool. Cloning the
/// pool yields another handle to the same slots.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Create an uninitialized pool
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(PoolState {
                    slots: Vec::new(),
                    buffer_size: 0,
                    initialized: false,
                    generation: 0,
                    next_sequence: 0,
                    allocated: 0,
                    freed: 0,
                    allocation_failures: 0,
                }),
                available: Condvar::new(),
            }),
        }
    }

    /// Create and initialize a pool in one step
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for zero dimensions.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        let pool = Self::new();
        pool.init(config.count, config.size)?;
        Ok(pool)
    }

    /// Allocate `count` buffers of `size` bytes
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInitialized` on double init and `InvalidArgument` for
    /// zero dimensions.
    pub fn init(&self, count: usize, size: usize) -> Result<()> {
        PoolConfig { count, size }.validate()?;

        let mut state = self.inner.lock();
        if state.initialized {
            return Err(AudioError::AlreadyInitialized {
                component: "buffer pool",
            });
        }

        state.slots = (0..count)
            .map(|_| Some(vec![0u8; size].into_boxed_slice()))
            .collect();
        state.buffer_size = size;
        state.initialized = true;
        state.next_sequence = 0;
        state.allocated = 0;
        state.freed = 0;
        state.allocation_failures = 0;

        tracing::info!("Buffer pool initialized: {} buffers of {} bytes", count, size);
        Ok(())
    }

    /// Check if the pool has been initialized
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    /// Size of each buffer, 0 before init
    pub fn buffer_size(&self) -> usize {
        self.inner.lock().buffer_size
    }

    /// Check out a buffer, waiting up to `timeout` for one to be released
    ///
    /// Returns `None` on timeout or before init; both count as an allocation
    /// failure.
    pub fn acquire(&self, timeout: Duration) -> Option<PooledBuffer> {
        let state = self.inner.lock();
        let (mut state, _) = self
            .inner
            .available
            .wait_timeout_while(state, timeout, |s| s.initialized && !s.has_free())
            .unwrap_or_else(PoisonError::into_inner);

        if !state.initialized {
            state.allocation_failures += 1;
            tracing::warn!("Buffer acquire on uninitialized pool");
            return None;
        }

        let Some(slot) = state.slots.iter().position(Option::is_some) else {
            state.allocation_failures += 1;
            tracing::debug!(
                "Buffer pool exhausted after {:?} ({} failures)",
                timeout,
                state.allocation_failures
            );
            return None;
        };

        let data = state.slots[slot].take()?;
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.allocated += 1;
        let generation = state.generation;
        drop(state);

        tracing::trace!("Acquired buffer {} (seq {})", slot, sequence);

        Some(PooledBuffer {
            data,
            used: 0,
            sequence,
            timestamp: Instant::now(),
            flags: BufferFlags::NONE,
            slot,
            generation,
            pool: Arc::clone(&self.inner),
        })
    }

    /// Return a buffer to the pool, zeroing its contents
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the buffer was acquired from another pool
    /// or before the last [`cleanup`](Self::cleanup).
    pub fn release(&self, mut buffer: PooledBuffer) -> Result<()> {
        if !Arc::ptr_eq(&self.inner, &buffer.pool) {
            tracing::warn!(
                "Rejected buffer from pool {} released into pool {}",
                buffer.pool.id,
                self.inner.id
            );
            return Err(AudioError::invalid_argument(
                "buffer",
                "buffer does not belong to this pool",
            ));
        }

        let data = std::mem::take(&mut buffer.data);
        if self.inner.return_slot(buffer.slot, buffer.generation, data) {
            tracing::trace!("Released buffer {}", buffer.slot);
            Ok(())
        } else {
            Err(AudioError::invalid_argument(
                "buffer",
                "buffer predates the last pool cleanup",
            ))
        }
    }

    /// Get counters
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        let total = state.slots.len();
        #[allow(clippy::cast_possible_truncation)]
        let in_use = state.allocated.saturating_sub(state.freed) as usize;
        PoolStats {
            total,
            free: total.saturating_sub(in_use),
            in_use,
            allocated: state.allocated,
            freed: state.freed,
            allocation_failures: state.allocation_failures,
        }
    }

    /// Drop all storage and return to the uninitialized state
    ///
    /// Buffers still checked out stay valid for their holders but are not
    /// taken back. Blocked acquirers wake and fail. Safe on a pool that was
    /// never initialized.
    pub fn cleanup(&self) {
        let mut state = self.inner.lock();
        if state.initialized {
            let outstanding = state.allocated.saturating_sub(state.freed);
            if outstanding > 0 {
                tracing::debug!("Buffer pool cleanup with {} buffers outstanding", outstanding);
            }
            tracing::info!("Buffer pool cleaned up");
        }
        state.slots.clear();
        state.buffer_size = 0;
        state.initialized = false;
        state.generation += 1;
        state.allocated = 0;
        state.freed = 0;
        state.allocation_failures = 0;
        drop(state);

        self.inner.available.notify_all();
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("id", &self.inner.id)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Buffer checked out of a [`BufferPool`]
///
/// Holds `used` valid bytes at the front of a fixed-size slice. Returned to
/// its pool when dropped.
pub struct PooledBuffer {
    data: Box<[u8]>,
    used: usize,
    sequence: u64,
    timestamp: Instant,
    flags: BufferFlags,
    slot: usize,
    generation: u64,
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    /// Total size in bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Valid bytes held
    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes that can still be appended
    #[must_use]
    pub fn free_space(&self) -> usize {
        self.capacity() - self.used
    }

    /// Check if no bytes are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Check if no more bytes fit
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.used == self.capacity()
    }

    /// The valid bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.used]
    }

    /// Append as much of `input` as fits
    pub fn write(&mut self, input: &[u8]) -> usize {
        let n = input.len().min(self.free_space());
        self.data[self.used..self.used + n].copy_from_slice(&input[..n]);
        self.used += n;
        n
    }

    /// Unused tail of the buffer, for filling in place before [`commit`](Self::commit)
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.used..]
    }

    /// Mark `n` bytes of the spare region as valid; returns the bytes committed
    pub fn commit(&mut self, n: usize) -> usize {
        let n = n.min(self.free_space());
        self.used += n;
        n
    }

    /// Consume bytes from the front, shifting the remainder down
    pub fn read(&mut self, output: &mut [u8]) -> usize {
        let n = output.len().min(self.used);
        output[..n].copy_from_slice(&self.data[..n]);
        self.data.copy_within(n..self.used, 0);
        self.used -= n;
        n
    }

    /// Discard contents and flags
    pub fn clear(&mut self) {
        self.used = 0;
        self.flags = BufferFlags::NONE;
    }

    /// Acquisition sequence number, increasing per pool
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When the buffer was acquired
    #[must_use]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Current flags
    #[must_use]
    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// Replace flags
    pub fn set_flags(&mut self, flags: BufferFlags) {
        self.flags = flags;
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if self.data.is_empty() {
            return;
        }
        let data = std::mem::take(&mut self.data);
        if !self.pool.return_slot(self.slot, self.generation, data) {
            tracing::trace!("Discarded stale buffer {}", self.slot);
        }
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("slot", &self.slot)
            .field("sequence", &self.sequence)
            .field("used", &self.used)
            .field("capacity", &self.data.len())
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
