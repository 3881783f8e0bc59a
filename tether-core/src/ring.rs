//! Lock-free single-producer/single-consumer byte ring
//!
//! Backing storage is a fixed `[u8; N]` with two free-running cursors:
//! `head` counts bytes ever written, `tail` counts bytes ever read. The
//! number of used bytes is `head - tail` (wrapping), so all `N` slots are
//! usable. `N` must be a power of two so the cursors can wrap at
//! `usize::MAX` without breaking the slot mapping.
//!
//! The producer owns `head`, the consumer owns `tail`. Each side writes or
//! reads the data first and publishes its cursor last with a release store;
//! the other side loads it with acquire. That is the whole hand-off, no lock
//! is involved, so one side can live in an interrupt handler.

#![allow(unsafe_code)]

use core::cell::UnsafeCell;
use core::ptr;

use portable_atomic::{AtomicUsize, Ordering};

/// Fixed-capacity byte ring shared by one producer and one consumer
pub struct RingBuffer<const N: usize> {
    storage: UnsafeCell<[u8; N]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: slot contents are only touched through `Producer` and `Consumer`.
// The producer writes slots in `[head, tail + N)`, the consumer reads slots in
// `[tail, head)`; the ranges are disjoint and cursors are exchanged with
// release/acquire ordering. Obtaining more than one handle per role requires
// `unsafe` or `&mut self`.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    const VALID_CAPACITY: () = assert!(
        N.is_power_of_two(),
        "ring capacity must be a power of two"
    );

    /// Create an empty ring
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CAPACITY;

        Self {
            storage: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Total number of bytes the ring can hold
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of bytes waiting to be consumed
    ///
    /// A snapshot: from the producer side the true value can only be lower,
    /// from the consumer side only higher.
    pub fn len(&self) -> usize {
        // Tail first: it never passes head, so the difference cannot underflow.
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// Number of bytes that can still be written
    pub fn free(&self) -> usize {
        N - self.len()
    }

    /// Check if nothing is waiting to be consumed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if no byte can be written
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Drop all content and rewind both cursors
    pub fn clear(&mut self) {
        // SAFETY: `&mut self` excludes every handle.
        unsafe { self.reset() }
    }

    /// Split into the producer and consumer handles
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let ring = &*self;
        (Producer { ring }, Consumer { ring })
    }

    /// Obtain the producer handle through a shared reference
    ///
    /// # Safety
    ///
    /// No other `Producer` for this ring may be used while the returned one
    /// is alive, from any execution context.
    pub unsafe fn producer(&self) -> Producer<'_, N> {
        Producer { ring: self }
    }

    /// Obtain the consumer handle through a shared reference
    ///
    /// # Safety
    ///
    /// No other `Consumer` for this ring may be used while the returned one
    /// is alive, from any execution context.
    pub unsafe fn consumer(&self) -> Consumer<'_, N> {
        Consumer { ring: self }
    }

    /// Drop all content and rewind both cursors through a shared reference
    ///
    /// # Safety
    ///
    /// No producer or consumer operation may be in progress or start before
    /// this returns, e.g. because the interrupt on the other side is disarmed.
    pub unsafe fn reset(&self) {
        self.tail.store(0, Ordering::Release);
        self.head.store(0, Ordering::Release);
    }

    fn slot(&self, cursor: usize) -> *mut u8 {
        // Power-of-two capacity: masking is the modulo.
        self.storage.get().cast::<u8>().wrapping_add(cursor & (N - 1))
    }
}

/// Writing end of a [`RingBuffer`]
pub struct Producer<'a, const N: usize> {
    ring: &'a RingBuffer<N>,
}

impl<'a, const N: usize> Producer<'a, N> {
    /// Number of bytes that can still be written
    pub fn free(&self) -> usize {
        self.ring.free()
    }

    /// Number of bytes not yet consumed
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Check if nothing is waiting to be consumed
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Append one byte
    ///
    /// Returns `false` when the ring is full.
    pub fn push(&mut self, byte: u8) -> bool {
        let head = self.ring.head.load(Ordering::Relaxed);
        let tail = self.ring.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) == N {
            return false;
        }

        // SAFETY: the slot at `head` is outside the consumer's `[tail, head)`.
        unsafe { self.ring.slot(head).write(byte) };
        self.ring.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// Append as many bytes of `data` as fit
    ///
    /// Returns the number of bytes copied.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let head = self.ring.head.load(Ordering::Relaxed);
        let tail = self.ring.tail.load(Ordering::Acquire);
        let count = data.len().min(N - head.wrapping_sub(tail));

        let start = head & (N - 1);
        let (front, back) = data[..count].split_at(count.min(N - start));

        // SAFETY: both runs lie in `[head, head + count)`, which is free space
        // the consumer does not read until `head` is published below.
        unsafe {
            ptr::copy_nonoverlapping(front.as_ptr(), self.ring.slot(head), front.len());
            ptr::copy_nonoverlapping(back.as_ptr(), self.ring.slot(0), back.len());
        }
        self.ring.head.store(head.wrapping_add(count), Ordering::Release);
        count
    }
}

/// Reading end of a [`RingBuffer`]
pub struct Consumer<'a, const N: usize> {
    ring: &'a RingBuffer<N>,
}

impl<'a, const N: usize> Consumer<'a, N> {
    /// Number of bytes waiting to be consumed
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Check if nothing is waiting to be consumed
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Remove the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        let head = self.ring.head.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        // SAFETY: the slot at `tail` was published by the producer and is not
        // rewritten until `tail` moves past it.
        let byte = unsafe { self.ring.slot(tail).read() };
        self.ring.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(byte)
    }

    /// Move up to `buf.len()` of the oldest bytes into `buf`
    ///
    /// Returns the number of bytes copied.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        let head = self.ring.head.load(Ordering::Acquire);
        let count = buf.len().min(head.wrapping_sub(tail));

        let start = tail & (N - 1);
        let (front, back) = buf[..count].split_at_mut(count.min(N - start));

        // SAFETY: both runs lie in `[tail, tail + count)`, published data the
        // producer does not overwrite until `tail` is published below.
        unsafe {
            ptr::copy_nonoverlapping(self.ring.slot(tail), front.as_mut_ptr(), front.len());
            ptr::copy_nonoverlapping(self.ring.slot(0), back.as_mut_ptr(), back.len());
        }
        self.ring.tail.store(tail.wrapping_add(count), Ordering::Release);
        count
    }
}
