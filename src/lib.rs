// SPDX-License-Identifier: GPL-3.0-only

//! vcam - a virtual video capture device and its streaming client
//!
//! This library implements both halves of a zero-copy frame exchange
//! protocol: a simulated capture device producing synthetic frames on a
//! timer, and a capture client that negotiates a format, maps a pool of
//! shared buffers, and cycles them through the queue/dequeue ownership
//! transfer.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`device`]: The control surface trait and the virtual device
//! - [`capture`]: Client-side session controller, buffer pool, sinks
//! - [`cancel`]: Cancellation token shared by loops and signal handlers
//! - [`loop_thread`]: Owned-thread run loops used on both sides
//! - [`errors`]: Error taxonomy of the client and the CLI
//! - [`constants`]: Protocol defaults

pub mod cancel;
pub mod capture;
pub mod constants;
pub mod device;
pub mod errors;
pub mod loop_thread;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use capture::{BufferPool, CaptureStreamController, ControlEvent, FileSink, StreamPhase};
pub use device::{CaptureDevice, ControlId, FrameFormat, PixelEncoding, VirtualDevice};
pub use errors::{AppError, AppResult};
