//! Bounded byte queue shared between interrupt and thread context
//!
//! Every access takes a critical section internally, so callers on either
//! side never lock explicitly. Overflow is non-fatal: the byte is dropped
//! and counted.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;
use heapless::Deque;

/// Returned when a byte is pushed into a full queue
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFull;

impl core::fmt::Display for QueueFull {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("byte queue full")
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for QueueFull {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "QueueFull");
    }
}

/// Fixed-capacity FIFO of bytes
pub struct ByteQueue<const N: usize> {
    inner: Mutex<RefCell<Deque<u8, N>>>,
    dropped: Mutex<Cell<u32>>,
}

impl<const N: usize> ByteQueue<N> {
    /// Create an empty queue, usable in a `static`
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deque::new())),
            dropped: Mutex::new(Cell::new(0)),
        }
    }

    /// Capacity in bytes
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Append a byte; on a full queue the byte is dropped and counted
    ///
    /// # Errors
    ///
    /// Returns [`QueueFull`] if no space was left.
    pub fn push(&self, byte: u8) -> Result<(), QueueFull> {
        critical_section::with(|cs| {
            if self.inner.borrow_ref_mut(cs).push_back(byte).is_ok() {
                Ok(())
            } else {
                let dropped = self.dropped.borrow(cs);
                dropped.set(dropped.get().saturating_add(1));
                Err(QueueFull)
            }
        })
    }

    /// Remove the oldest byte
    pub fn pop(&self) -> Option<u8> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).pop_front())
    }

    /// Append as many bytes of `data` as fit in one critical section
    ///
    /// Returns the number of bytes accepted. Bytes that did not fit are
    /// not counted as dropped; the caller still owns them.
    pub fn extend(&self, data: &[u8]) -> usize {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow_ref_mut(cs);
            let mut accepted = 0;
            for &byte in data {
                if queue.push_back(byte).is_err() {
                    break;
                }
                accepted += 1;
            }
            accepted
        })
    }

    /// Bytes currently queued
    #[must_use]
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).len())
    }

    /// Free space in bytes
    #[must_use]
    pub fn free(&self) -> usize {
        N - self.len()
    }

    /// Whether the queue holds no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).is_empty())
    }

    /// Discard all queued bytes (the drop counter is kept)
    pub fn clear(&self) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).clear());
    }

    /// Number of bytes dropped because the queue was full
    #[must_use]
    pub fn dropped(&self) -> u32 {
        critical_section::with(|cs| self.dropped.borrow(cs).get())
    }
}

impl<const N: usize> Default for ByteQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
