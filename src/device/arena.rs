// SPDX-License-Identifier: GPL-3.0-only

//! Buffer arena: the fixed set of shared frame buffers
//!
//! The arena models the memory-mapped buffer pool as N slots indexed by
//! integer handle. Each slot carries an explicit state tag, and every
//! payload access checks the tag first, so a buffer can never be read
//! and written by both sides at once. Transferring ownership means
//! flipping the tag at an enqueue/dequeue boundary, never copying the
//! payload.

use super::types::{BufferState, DeviceError, DeviceResult};
use std::sync::{Arc, Mutex};

/// Mapping granularity; buffer capacities are rounded up to this
const PAGE_SIZE: usize = 4096;

/// Round a byte length up to the next page boundary
pub(crate) fn page_align(len: usize) -> usize {
    len.div_ceil(PAGE_SIZE) * PAGE_SIZE
}

struct Slot {
    state: BufferState,
    bytes_used: usize,
    data: Box<[u8]>,
}

/// One shared frame buffer
///
/// Freshly allocated buffers start out `Dequeued` (owned by the client),
/// matching the driver convention that buffers belong to the requester
/// until queued.
pub struct FrameBuffer {
    index: u32,
    slot: Mutex<Slot>,
}

impl FrameBuffer {
    fn new(index: u32, capacity: usize) -> Self {
        Self {
            index,
            slot: Mutex::new(Slot {
                state: BufferState::Dequeued,
                bytes_used: 0,
                data: vec![0u8; capacity].into_boxed_slice(),
            }),
        }
    }

    /// Index of this buffer within its arena
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Capacity of the underlying region in bytes
    pub fn capacity(&self) -> usize {
        self.slot.lock().unwrap().data.len()
    }

    /// Current ownership state
    pub fn state(&self) -> BufferState {
        self.slot.lock().unwrap().state
    }

    /// Bytes of valid payload; meaningful only while `Filled` or `Dequeued`
    pub fn bytes_used(&self) -> usize {
        self.slot.lock().unwrap().bytes_used
    }

    /// Queue transition: hand the buffer to the device as empty.
    ///
    /// Accepts `Dequeued` (the normal requeue path) and `Error` (a buffer
    /// returned without payload during teardown being queued again).
    pub(crate) fn make_empty(&self) -> DeviceResult<()> {
        let mut slot = self.slot.lock().unwrap();
        match slot.state {
            BufferState::Dequeued | BufferState::Error => {
                slot.state = BufferState::Empty;
                slot.bytes_used = 0;
                Ok(())
            }
            other => Err(DeviceError::InvalidState(format!(
                "cannot queue buffer {} while {}",
                self.index, other
            ))),
        }
    }

    /// Producer transition: write a payload and mark the buffer filled.
    ///
    /// Only the device may call this, and only on a buffer it owns.
    pub(crate) fn fill(&self, payload: &[u8]) -> DeviceResult<usize> {
        let mut slot = self.slot.lock().unwrap();
        if slot.state != BufferState::Empty {
            return Err(DeviceError::InvalidState(format!(
                "cannot fill buffer {} while {}",
                self.index, slot.state
            )));
        }
        if payload.len() > slot.data.len() {
            return Err(DeviceError::InvalidState(format!(
                "payload of {} bytes exceeds buffer {} capacity {}",
                payload.len(),
                self.index,
                slot.data.len()
            )));
        }
        slot.data[..payload.len()].copy_from_slice(payload);
        slot.bytes_used = payload.len();
        slot.state = BufferState::Filled;
        Ok(payload.len())
    }

    /// Dequeue transition: transfer a filled buffer to the client
    pub(crate) fn mark_dequeued(&self) -> DeviceResult<()> {
        let mut slot = self.slot.lock().unwrap();
        if slot.state != BufferState::Filled {
            return Err(DeviceError::InvalidState(format!(
                "cannot dequeue buffer {} while {}",
                self.index, slot.state
            )));
        }
        slot.state = BufferState::Dequeued;
        Ok(())
    }

    /// Teardown transition: the device returns a still-queued buffer
    /// without a payload
    pub(crate) fn mark_error(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.state = BufferState::Error;
        slot.bytes_used = 0;
    }

    /// Unmap the buffer; no operation is defined afterwards
    pub(crate) fn release(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.state = BufferState::Released;
        slot.bytes_used = 0;
    }

    /// Read the payload of a buffer the client owns.
    ///
    /// The closure runs with the slot locked, so the device cannot
    /// regain the buffer until the read is finished; requeue only after
    /// this returns.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> DeviceResult<R> {
        let slot = self.slot.lock().unwrap();
        if slot.state != BufferState::Dequeued {
            return Err(DeviceError::InvalidState(format!(
                "cannot read buffer {} while {}",
                self.index, slot.state
            )));
        }
        Ok(f(&slot.data[..slot.bytes_used]))
    }
}

/// Client-side handle to one mapped buffer
///
/// Holding the handle keeps the mapping alive; the payload stays valid
/// between `map` and pool release.
#[derive(Clone)]
pub struct MappedBuffer {
    buffer: Arc<FrameBuffer>,
    capacity: usize,
}

impl MappedBuffer {
    pub(crate) fn new(buffer: Arc<FrameBuffer>) -> Self {
        let capacity = buffer.capacity();
        Self { buffer, capacity }
    }

    /// Index of the mapped buffer
    pub fn index(&self) -> u32 {
        self.buffer.index()
    }

    /// Capacity of the mapped region in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Read the payload; see [`FrameBuffer::read`]
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> DeviceResult<R> {
        self.buffer.read(f)
    }
}

impl std::fmt::Debug for MappedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedBuffer")
            .field("index", &self.index())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Fixed set of frame buffers allocated for one stream session
pub struct BufferArena {
    slots: Vec<Arc<FrameBuffer>>,
}

impl BufferArena {
    /// Allocate `count` buffers of `capacity` bytes each (page aligned)
    pub(crate) fn new(count: u32, capacity: usize) -> Self {
        let capacity = page_align(capacity);
        let slots = (0..count)
            .map(|index| Arc::new(FrameBuffer::new(index, capacity)))
            .collect();
        Self { slots }
    }

    /// Number of buffers in the arena
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the arena holds no buffers
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Look up a buffer by index
    pub(crate) fn get(&self, index: u32) -> DeviceResult<&Arc<FrameBuffer>> {
        self.slots
            .get(index as usize)
            .ok_or(DeviceError::InvalidBuffer(index))
    }

    /// Snapshot of every slot's state, for diagnostics and tests
    pub fn states(&self) -> Vec<BufferState> {
        self.slots.iter().map(|slot| slot.state()).collect()
    }

    /// Mark every slot released
    pub(crate) fn release_all(&self) {
        for slot in &self.slots {
            slot.release();
        }
    }
}
