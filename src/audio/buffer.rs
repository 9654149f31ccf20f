//! Bounded byte ring shared between a producer and a real-time consumer

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{AudioError, Result};

/// Ring indices and storage, only touched with the lock held
struct RingState {
    /// Buffer storage
    data: Box<[u8]>,
    /// Next write offset
    head: usize,
    /// Next read offset
    tail: usize,
    /// Bytes currently held
    count: usize,
    /// Set by [`BoundedByteBuffer::close`]; blocked callers return immediately
    closed: bool,
}

impl RingState {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn space(&self) -> usize {
        self.capacity() - self.count
    }

    fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    /// Copy as much of `input` as fits, splitting at the physical end
    fn push(&mut self, input: &[u8]) -> usize {
        let to_write = input.len().min(self.space());
        if to_write == 0 {
            return 0;
        }

        let capacity = self.capacity();
        let first_part = (capacity - self.head).min(to_write);
        let second_part = to_write - first_part;

        self.data[self.head..self.head + first_part].copy_from_slice(&input[..first_part]);
        if second_part > 0 {
            self.data[..second_part].copy_from_slice(&input[first_part..to_write]);
        }

        self.head = (self.head + to_write) % capacity;
        self.count += to_write;
        debug_assert!(self.count <= capacity, "ring count overflow");

        to_write
    }

    /// Copy out up to `output.len()` bytes in FIFO order
    fn pop(&mut self, output: &mut [u8]) -> usize {
        let to_read = output.len().min(self.count);
        if to_read == 0 {
            return 0;
        }

        let capacity = self.capacity();
        let first_part = (capacity - self.tail).min(to_read);
        let second_part = to_read - first_part;

        output[..first_part].copy_from_slice(&self.data[self.tail..self.tail + first_part]);
        if second_part > 0 {
            output[first_part..to_read].copy_from_slice(&self.data[..second_part]);
        }

        self.tail = (self.tail + to_read) % capacity;
        self.count -= to_read;

        to_read
    }

    fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}

/// Fixed-capacity byte ring with blocking and non-blocking transfer
///
/// A mutex guards the indices and two condition variables separate the two
/// kinds of waiter, so a write only wakes readers and a read only wakes
/// writers. Every transfer is partial: a write into a nearly full ring copies
/// what fits and reports the count, it never fails.
///
/// Safe to share between any number of producers and consumers behind an
/// `Arc`; FIFO order holds per buffer.
pub struct BoundedByteBuffer {
    state: Mutex<RingState>,
    /// Signalled when bytes are consumed
    not_full: Condvar,
    /// Signalled when bytes are produced
    not_empty: Condvar,
    capacity: usize,
}

impl BoundedByteBuffer {
    /// Create a ring with freshly allocated storage
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_storage(vec![0u8; capacity])
    }

    /// Create a ring over caller-supplied storage; its length is the capacity
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `storage` is empty.
    pub fn with_storage(storage: impl Into<Box<[u8]>>) -> Result<Self> {
        let data = storage.into();
        if data.is_empty() {
            return Err(AudioError::invalid_argument(
                "capacity",
                "ring buffer capacity must be non-zero",
            ));
        }
        let capacity = data.len();
        tracing::debug!("Ring buffer initialized: capacity={}", capacity);

        Ok(Self {
            state: Mutex::new(RingState {
                data,
                head: 0,
                tail: 0,
                count: 0,
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        })
    }

    fn lock(&self) -> MutexGuard<'_, RingState> {
        // Indices are only updated after a copy completes, so a poisoned
        // guard still holds a consistent ring.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Write without waiting
    ///
    /// Returns the number of bytes copied, 0 if the ring is full.
    pub fn write(&self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }
        let written = self.lock().push(data);
        if written > 0 {
            self.not_empty.notify_one();
        }
        written
    }

    /// Write, waiting up to `timeout` for space if the ring is completely full
    ///
    /// Returns 0 on timeout or when the ring has been closed.
    pub fn write_blocking(&self, data: &[u8], timeout: Duration) -> usize {
        if data.is_empty() {
            return 0;
        }

        let guard = self.lock();
        let (mut guard, wait) = self
            .not_full
            .wait_timeout_while(guard, timeout, |ring| ring.is_full() && !ring.closed)
            .unwrap_or_else(PoisonError::into_inner);

        if guard.closed || (wait.timed_out() && guard.is_full()) {
            return 0;
        }

        let written = guard.push(data);
        drop(guard);
        if written > 0 {
            self.not_empty.notify_one();
        }
        written
    }

    /// Read without waiting
    ///
    /// Returns the number of bytes copied into `output`, 0 if the ring is empty.
    pub fn read(&self, output: &mut [u8]) -> usize {
        if output.is_empty() {
            return 0;
        }
        let read = self.lock().pop(output);
        if read > 0 {
            self.not_full.notify_one();
        }
        read
    }

    /// Read, waiting up to `timeout` for data if the ring is empty
    ///
    /// Returns 0 on timeout or when the ring has been closed.
    pub fn read_blocking(&self, output: &mut [u8], timeout: Duration) -> usize {
        if output.is_empty() {
            return 0;
        }

        let guard = self.lock();
        let (mut guard, wait) = self
            .not_empty
            .wait_timeout_while(guard, timeout, |ring| ring.count == 0 && !ring.closed)
            .unwrap_or_else(PoisonError::into_inner);

        if guard.closed || (wait.timed_out() && guard.count == 0) {
            return 0;
        }

        let read = guard.pop(output);
        drop(guard);
        if read > 0 {
            self.not_full.notify_one();
        }
        read
    }

    /// Get free space in bytes
    pub fn space_available(&self) -> usize {
        self.lock().space()
    }

    /// Get current fill level in bytes
    pub fn size_used(&self) -> usize {
        self.lock().count
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.lock().count == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    /// Fill level as a percentage of capacity
    pub fn fill_percent(&self) -> usize {
        self.size_used() * 100 / self.capacity
    }

    /// Discard all data and wake every writer waiting for space
    pub fn clear(&self) {
        self.lock().reset();
        self.not_full.notify_all();
        tracing::debug!("Ring buffer cleared");
    }

    /// Discard all data and release every blocked reader and writer
    ///
    /// Blocking calls return 0 until [`reopen`](Self::reopen) is called.
    pub fn close(&self) {
        {
            let mut ring = self.lock();
            ring.reset();
            ring.closed = true;
        }
        self.not_full.notify_all();
        self.not_empty.notify_all();
        tracing::debug!("Ring buffer closed");
    }

    /// Accept blocking calls again after [`close`](Self::close)
    pub fn reopen(&self) {
        self.lock().closed = false;
    }

    /// Check if the ring has been closed
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl std::fmt::Debug for BoundedByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring = self.lock();
        f.debug_struct("BoundedByteBuffer")
            .field("capacity", &self.capacity)
            .field("head", &ring.head)
            .field("tail", &ring.tail)
            .field("count", &ring.count)
            .field("closed", &ring.closed)
            .finish()
    }
}
