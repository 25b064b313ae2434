// SPDX-License-Identifier: GPL-3.0-only

//! Protocol-wide constants

use std::time::Duration;

// ===== Client defaults =====

/// Resolution the capture client proposes during format negotiation.
/// The device may clamp this to whatever it actually supports.
pub const DESIRED_WIDTH: u32 = 1280;
pub const DESIRED_HEIGHT: u32 = 768;

/// Number of buffers the client asks for by default
pub const DESIRED_BUFFER_COUNT: u32 = 32;

/// How long the streaming loop waits for a filled buffer before giving
/// the cancellation token a chance to be observed
pub const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Poll interval of the control channel's input loop
pub const CONTROL_POLL_INTERVAL: Duration = Duration::from_millis(1000);

// ===== Virtual device geometry =====

/// Native resolution of the virtual capture device
pub const NATIVE_WIDTH: u32 = 800;
pub const NATIVE_HEIGHT: u32 = 600;

/// Image size advertised by the device (2 bytes per pixel worst case
/// for the compressed payloads it produces)
pub const NATIVE_IMAGE_SIZE: u32 = NATIVE_WIDTH * NATIVE_HEIGHT * 2;

/// Fewest buffers the device will operate with; a smaller request is
/// rounded up to this count
pub const MIN_DEVICE_BUFFERS: u32 = 8;

/// Largest buffer grant the device will hand out
pub const MAX_DEVICE_BUFFERS: u32 = 32;

// ===== Frame production =====

/// Frame production rate of the virtual device (ticks per second)
pub const PRODUCER_TICK_HZ: u32 = 30;

/// Interval between producer ticks (30 Hz)
pub const PRODUCER_TICK_INTERVAL: Duration =
    Duration::from_nanos(1_000_000_000 / PRODUCER_TICK_HZ as u64);

/// Ticks each canned frame stays on screen before rotating to the next
pub const TICKS_PER_PATTERN: u32 = 60;

/// Full rotation period of the three canned frames
pub const PATTERN_CYCLE_TICKS: u32 = 3 * TICKS_PER_PATTERN;

// ===== Controls =====

/// Brightness range exposed by the virtual device
pub const BRIGHTNESS_MIN: i32 = 0;
pub const BRIGHTNESS_MAX: i32 = 255;
pub const BRIGHTNESS_STEP: i32 = 1;
pub const BRIGHTNESS_DEFAULT: i32 = 128;
