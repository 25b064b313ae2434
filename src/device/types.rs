// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the device control surface

use serde::{Deserialize, Serialize};
use std::fmt;

// ===== Capability flags =====

/// Device can capture video frames
pub const CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
/// Device supports the read/write I/O path
pub const CAP_READ_WRITE: u32 = 0x0100_0000;
/// Device supports streaming I/O (queue/dequeue of mapped buffers)
pub const CAP_STREAMING: u32 = 0x0400_0000;

/// Result of a capability query
#[derive(Debug, Clone)]
pub struct Capability {
    /// Driver name
    pub driver: String,
    /// Human-readable device name
    pub card: String,
    /// Capability bitset (`CAP_*` flags)
    pub capabilities: u32,
}

impl Capability {
    /// Check whether the device can capture video
    pub fn has_video_capture(&self) -> bool {
        self.capabilities & CAP_VIDEO_CAPTURE != 0
    }

    /// Check whether the device supports streaming I/O
    pub fn has_streaming(&self) -> bool {
        self.capabilities & CAP_STREAMING != 0
    }

    /// Check whether the device supports read/write I/O
    pub fn has_read_write(&self) -> bool {
        self.capabilities & CAP_READ_WRITE != 0
    }
}

// ===== Formats =====

/// Pixel encoding of exchanged frames
///
/// Frames are opaque byte blobs to this crate; the encoding only matters
/// for negotiation and for naming output artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PixelEncoding {
    /// Motion-JPEG compressed frames
    #[default]
    Mjpg,
}

impl PixelEncoding {
    /// FourCC code of the encoding
    pub fn fourcc(&self) -> &'static str {
        match self {
            PixelEncoding::Mjpg => "MJPG",
        }
    }

    /// File extension for frames saved in this encoding
    pub fn file_extension(&self) -> &'static str {
        match self {
            PixelEncoding::Mjpg => "jpg",
        }
    }
}

impl fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fourcc())
    }
}

/// Interlacing of exchanged frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldOrder {
    /// Caller does not care; device picks
    #[default]
    Any,
    /// Frames are whole progressive images
    Progressive,
}

impl fmt::Display for FieldOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldOrder::Any => write!(f, "any"),
            FieldOrder::Progressive => write!(f, "progressive"),
        }
    }
}

/// Negotiated stream format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFormat {
    pub encoding: PixelEncoding,
    pub width: u32,
    pub height: u32,
    pub field: FieldOrder,
    /// Worst-case frame size in bytes; filled in by the device on
    /// `set_format`, may be zero in a client proposal
    pub size_image: u32,
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.encoding)
    }
}

/// One entry of the device's format enumeration
#[derive(Debug, Clone)]
pub struct FormatDesc {
    pub index: u32,
    pub encoding: PixelEncoding,
    pub description: String,
}

/// One discrete frame size supported for an encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ===== Buffer lifecycle =====

/// Ownership state of one buffer slot
///
/// The state tag is the ownership record: a buffer is owned by exactly
/// one side at any instant, and every access checks the tag before
/// touching the payload. Transfers happen only at the enqueue/dequeue
/// boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Owned by the device, awaiting fill
    Empty,
    /// Owned by the device, payload ready for client pickup
    Filled,
    /// Owned by the client, payload being consumed
    Dequeued,
    /// Returned by the device without a valid payload (stream teardown)
    Error,
    /// Unmapped; the pool has been destroyed
    Released,
}

impl fmt::Display for BufferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferState::Empty => write!(f, "empty"),
            BufferState::Filled => write!(f, "filled"),
            BufferState::Dequeued => write!(f, "dequeued"),
            BufferState::Error => write!(f, "error"),
            BufferState::Released => write!(f, "released"),
        }
    }
}

/// Completion status reported with a dequeued buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Payload is valid
    Done,
    /// Buffer was returned without a payload
    Error,
}

/// Result of a dequeue operation: which buffer completed and how much
/// of it the producer filled
#[derive(Debug, Clone, Copy)]
pub struct DequeuedFrame {
    pub index: u32,
    pub bytes_used: usize,
    pub status: FrameStatus,
}

// ===== Controls =====

/// Identifier of an adjustable device property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlId {
    Brightness,
    Contrast,
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlId::Brightness => write!(f, "brightness"),
            ControlId::Contrast => write!(f, "contrast"),
        }
    }
}

/// Range information for a control
#[derive(Debug, Clone)]
pub struct ControlInfo {
    pub id: ControlId,
    pub name: String,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
}

// ===== Errors =====

/// Result type for device control surface operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Error types for device control surface operations
#[derive(Debug, Clone)]
pub enum DeviceError {
    /// Requested encoding or buffer type is not supported
    UnsupportedFormat(String),
    /// Operation conflicts with the current session (e.g. format change
    /// while buffers are allocated)
    Busy,
    /// Buffer index outside the allocated pool
    InvalidBuffer(u32),
    /// Buffer is not in a state that permits the operation
    InvalidState(String),
    /// No buffers are allocated, or a request granted zero buffers
    NoBuffers,
    /// Mapping a buffer into the client failed
    MapFailed(String),
    /// Streaming is not active
    NotStreaming,
    /// The device does not expose the requested control
    NoSuchControl(ControlId),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            DeviceError::Busy => write!(f, "Device is busy"),
            DeviceError::InvalidBuffer(index) => write!(f, "Invalid buffer index {}", index),
            DeviceError::InvalidState(msg) => write!(f, "Invalid buffer state: {}", msg),
            DeviceError::NoBuffers => write!(f, "No buffers allocated"),
            DeviceError::MapFailed(msg) => write!(f, "Failed to map buffer: {}", msg),
            DeviceError::NotStreaming => write!(f, "Device is not streaming"),
            DeviceError::NoSuchControl(id) => write!(f, "No such control: {}", id),
        }
    }
}

impl std::error::Error for DeviceError {}
