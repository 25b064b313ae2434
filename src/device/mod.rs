// SPDX-License-Identifier: GPL-3.0-only

//! Device control surface and the simulated capture device
//!
//! This module defines the contract between a capture client and a
//! video capture device as a trait, plus the in-process virtual device
//! implementing it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │ CaptureStreamController  │  ← client-side state machine
//! └────────────┬─────────────┘
//!              │
//!              ▼
//! ┌──────────────────────────┐
//! │   CaptureDevice trait    │  ← format / buffer / stream / control calls
//! └────────────┬─────────────┘
//!              │
//!              ▼
//! ┌──────────────────────────┐     ┌────────────────┐
//! │      VirtualDevice       │ ──▶ │ frame producer │  ← 30 Hz tick thread
//! └──────────────────────────┘     └────────────────┘
//! ```
//!
//! Buffers move between the two sides through the pending queue (client
//! to device, empty) and the completed queue (device to client, filled).
//! Ownership of a buffer's payload transfers at those two boundaries and
//! nowhere else.

pub mod arena;
pub mod patterns;
pub(crate) mod producer;
pub mod queues;
pub mod types;
pub mod virtual_device;

pub use arena::{BufferArena, FrameBuffer, MappedBuffer};
pub use types::{
    BufferState, CAP_READ_WRITE, CAP_STREAMING, CAP_VIDEO_CAPTURE, Capability, ControlId,
    ControlInfo, DequeuedFrame, DeviceError, DeviceResult, FieldOrder, FormatDesc, FrameFormat,
    FrameSize, FrameStatus, PixelEncoding,
};
pub use virtual_device::VirtualDevice;

use std::time::Duration;

/// Control surface of a video capture device
///
/// Calls are synchronous; only [`dequeue_buffer`](Self::dequeue_buffer)
/// blocks, and it is bounded by its timeout. Implementations must be
/// safe to share across threads: the streaming loop and the control
/// channel both hold the same device.
pub trait CaptureDevice: Send + Sync {
    // ===== Negotiation =====

    /// Query the device's capability bitset
    fn query_capability(&self) -> DeviceResult<Capability>;

    /// Enumerate supported pixel encodings
    fn formats(&self) -> Vec<FormatDesc>;

    /// Enumerate discrete frame sizes for an encoding
    fn frame_sizes(&self, encoding: PixelEncoding) -> Vec<FrameSize>;

    /// Get the current stream format
    fn format(&self) -> DeviceResult<FrameFormat>;

    /// Propose a stream format
    ///
    /// The device may clamp the proposal and returns the values it
    /// actually applied; the caller must treat the reply as
    /// authoritative. Rejected with [`DeviceError::Busy`] once buffers
    /// are allocated.
    fn set_format(&self, requested: &FrameFormat) -> DeviceResult<FrameFormat>;

    // ===== Buffer lifecycle =====

    /// Request `count` mappable buffers; returns the granted count
    ///
    /// The device may grant a different count than requested. A count of
    /// zero releases any existing allocation.
    fn request_buffers(&self, count: u32) -> DeviceResult<u32>;

    /// Map one granted buffer into the caller
    fn map_buffer(&self, index: u32) -> DeviceResult<MappedBuffer>;

    /// Release every allocated buffer
    ///
    /// Rejected while streaming; mappings become invalid afterwards.
    fn release_buffers(&self) -> DeviceResult<()>;

    /// Queue a buffer to the device as empty, transferring ownership
    fn queue_buffer(&self, index: u32) -> DeviceResult<()>;

    /// Wait up to `timeout` for a filled buffer and take ownership of it
    ///
    /// `Ok(None)` means nothing completed within the timeout, which is
    /// not an error.
    fn dequeue_buffer(&self, timeout: Duration) -> DeviceResult<Option<DequeuedFrame>>;

    // ===== Streaming =====

    /// Start frame production
    fn stream_on(&self) -> DeviceResult<()>;

    /// Stop frame production synchronously and return still-queued
    /// buffers to their owners without payloads
    fn stream_off(&self) -> DeviceResult<()>;

    // ===== Controls =====

    /// Query the range of an adjustable property
    fn query_control(&self, id: ControlId) -> DeviceResult<ControlInfo>;

    /// Read the current value of a property
    fn control(&self, id: ControlId) -> DeviceResult<i32>;

    /// Write a property value; the device clamps into the valid range
    /// and returns the value actually applied
    fn set_control(&self, id: ControlId, value: i32) -> DeviceResult<i32>;
}
