// SPDX-License-Identifier: GPL-3.0-only

//! The two queues of the frame exchange protocol
//!
//! `PendingQueue` is touched from the producer tick (timer context) and
//! from the client's queue/stop calls (thread context). Its lock is held
//! only across a single push or pop: no I/O, no payload copying, no
//! allocation beyond deque growth. That keeps the critical section
//! bounded to a handful of pointer moves, which is the userspace
//! equivalent of the irq-safe spinlock discipline this queue replaces.
//!
//! `CompletedQueue` is the device-to-client completion path. The client
//! parks on its condvar with a bounded timeout; the producer pushes and
//! notifies. Closing the queue wakes every waiter so nobody blocks past
//! stream teardown.

use super::types::DequeuedFrame;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// FIFO of buffer indices currently queued to the device for filling
#[derive(Default)]
pub struct PendingQueue {
    queue: Mutex<VecDeque<u32>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a buffer index; the device now owns that buffer
    pub fn push(&self, index: u32) {
        self.queue.lock().unwrap().push_back(index);
    }

    /// Pop the oldest queued index; `None` when the queue is empty
    pub fn pop(&self) -> Option<u32> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Remove and return every queued index (stream teardown)
    pub fn drain(&self) -> Vec<u32> {
        self.queue.lock().unwrap().drain(..).collect()
    }

    /// Number of buffers waiting to be filled
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }
}

/// Outcome of waiting on the completion path
#[derive(Debug)]
pub enum WaitOutcome {
    /// A buffer completed
    Frame(DequeuedFrame),
    /// Nothing completed within the timeout; not an error
    TimedOut,
    /// The queue was closed while waiting (stream stopped)
    Closed,
}

struct CompletedInner {
    frames: VecDeque<DequeuedFrame>,
    open: bool,
}

/// Completion queue from the producer to the client
pub struct CompletedQueue {
    inner: Mutex<CompletedInner>,
    ready: Condvar,
}

impl Default for CompletedQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletedQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CompletedInner {
                frames: VecDeque::new(),
                open: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Open the queue for a new streaming session, discarding leftovers
    pub fn open(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.frames.clear();
        inner.open = true;
    }

    /// Close the queue and wake every waiter
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.open = false;
        inner.frames.clear();
        drop(inner);
        self.ready.notify_all();
    }

    /// Push a completed frame and wake one waiter
    pub fn push(&self, frame: DequeuedFrame) {
        let mut inner = self.inner.lock().unwrap();
        inner.frames.push_back(frame);
        drop(inner);
        self.ready.notify_one();
    }

    /// Block until a frame completes, the timeout elapses, or the queue
    /// closes
    pub fn wait_pop(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().unwrap();

        loop {
            if let Some(frame) = inner.frames.pop_front() {
                return WaitOutcome::Frame(frame);
            }
            if !inner.open {
                return WaitOutcome::Closed;
            }

            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }

            let (guard, _timed_out) = self.ready.wait_timeout(inner, deadline - now).unwrap();
            inner = guard;
        }
    }
}
