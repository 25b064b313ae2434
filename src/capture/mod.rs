// SPDX-License-Identifier: GPL-3.0-only

//! Client side of the frame exchange protocol
//!
//! The controller owns the session: it negotiates a format, maps the
//! buffer pool, pre-rolls every buffer, and then cycles each one through
//! dequeue → sink → requeue until cancelled. The optional control
//! channel adjusts a device property on its own thread, sharing nothing
//! with the frame path beyond the cancellation token.

pub mod control_channel;
pub mod controller;
pub mod pool;
pub mod sink;

pub use control_channel::{ControlChannel, ControlEvent};
pub use controller::{CaptureStreamController, StreamPhase};
pub use pool::BufferPool;
pub use sink::{FileSink, FrameSink, MemorySink};
