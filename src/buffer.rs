//! Bounded single-producer/single-consumer byte buffer.
//!
//! Each buffer owns a fixed ring of bytes guarded by one mutex, with a
//! `not_empty` condition for the consumer and a `not_full` condition for the
//! producer. Closing the buffer stops further puts but leaves queued bytes
//! available, so the consumer drains everything before seeing end-of-stream.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{PipelineError, Result};

/// Ring state. Only touched while holding the buffer lock.
#[derive(Debug)]
struct Ring {
    slots: Box<[u8]>,
    head: usize,
    tail: usize,
    count: usize,
    closed: bool,
}

impl Ring {
    fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    fn push(&mut self, byte: u8) {
        self.slots[self.tail] = byte;
        self.tail = (self.tail + 1) % self.slots.len();
        self.count += 1;
    }

    fn pop(&mut self) -> u8 {
        let byte = self.slots[self.head];
        self.head = (self.head + 1) % self.slots.len();
        self.count -= 1;
        byte
    }
}

/// A closable FIFO of bytes shared between one producer and one consumer.
#[derive(Debug)]
pub struct BoundedBuffer {
    name: &'static str,
    ring: Mutex<Ring>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl BoundedBuffer {
    /// Create an empty buffer holding at most `capacity` bytes.
    pub fn new(name: &'static str, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::InvalidCapacity {
                buffer: name,
                capacity,
            });
        }
        Ok(Self {
            name,
            ring: Mutex::new(Ring {
                slots: vec![0; capacity].into_boxed_slice(),
                head: 0,
                tail: 0,
                count: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    /// Number of bytes currently queued.
    pub fn len(&self) -> usize {
        self.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Enqueue one byte, blocking while the buffer is full.
    ///
    /// Fails with [`PipelineError::ClosedSink`] if the buffer is closed,
    /// including when it gets closed while this call is waiting for space.
    pub fn put(&self, byte: u8) -> Result<()> {
        let mut ring = self.lock();
        loop {
            if ring.closed {
                return Err(PipelineError::ClosedSink { buffer: self.name });
            }
            if !ring.is_full() {
                break;
            }
            ring = self
                .not_full
                .wait(ring)
                .unwrap_or_else(PoisonError::into_inner);
        }
        ring.push(byte);
        drop(ring);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue the oldest byte, blocking while the buffer is empty and open.
    ///
    /// Returns `None` once the buffer is closed and fully drained.
    pub fn get(&self) -> Option<u8> {
        let mut ring = self.lock();
        while ring.count == 0 && !ring.closed {
            ring = self
                .not_empty
                .wait(ring)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if ring.count == 0 {
            return None;
        }
        let byte = ring.pop();
        drop(ring);
        self.not_full.notify_one();
        Some(byte)
    }

    /// Mark the buffer closed and wake every waiter. Idempotent.
    pub fn close(&self) {
        let mut ring = self.lock();
        if !ring.closed {
            log::debug!("buffer {} closed with {} queued", self.name, ring.count);
        }
        ring.closed = true;
        drop(ring);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Consume and discard bytes until end-of-stream. Returns how many were dropped.
    pub fn drain(&self) -> usize {
        let mut dropped = 0;
        while self.get().is_some() {
            dropped += 1;
        }
        dropped
    }

    // Ring updates never leave the state half-written, so a poisoned lock is
    // still safe to use.
    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Closes the wrapped buffer when dropped, on every exit path of a producer.
pub struct CloseOnDrop<'a>(pub &'a BoundedBuffer);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}
