// SPDX-License-Identifier: GPL-3.0-only

//! Canned synthetic frames produced by the virtual device
//!
//! Three deterministic payloads rotate on a fixed schedule: each stays
//! current for 60 ticks, giving a 180-tick cycle (6 seconds at 30 Hz).
//! The payloads carry JPEG start/end markers so saved artifacts look
//! like the compressed frames a real camera would deliver, but nothing
//! in this crate ever decodes them.

use crate::constants::TICKS_PER_PATTERN;

/// Exact payload sizes of the three canned frames, in rotation order
pub const PATTERN_LENGTHS: [usize; 3] = [8230, 8265, 8267];

/// JPEG start-of-image marker
const SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker
const EOI: [u8; 2] = [0xFF, 0xD9];

/// One synthetic frame payload
pub struct CannedFrame {
    pub name: &'static str,
    pub data: Vec<u8>,
}

impl CannedFrame {
    fn generate(name: &'static str, seed: u8, len: usize) -> Self {
        let mut data = Vec::with_capacity(len);
        data.extend_from_slice(&SOI);

        // Deterministic filler derived from the seed; 0xFF is avoided in
        // the body so the end marker stays unique.
        let body_len = len - SOI.len() - EOI.len();
        let mut value = seed;
        for _ in 0..body_len {
            value = value.wrapping_mul(31).wrapping_add(seed);
            data.push(if value == 0xFF { 0x00 } else { value });
        }

        data.extend_from_slice(&EOI);
        debug_assert_eq!(data.len(), len);

        Self { name, data }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The rotating set of canned frames
pub struct PatternSet {
    frames: [CannedFrame; 3],
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternSet {
    pub fn new() -> Self {
        Self {
            frames: [
                CannedFrame::generate("red", 0x11, PATTERN_LENGTHS[0]),
                CannedFrame::generate("green", 0x47, PATTERN_LENGTHS[1]),
                CannedFrame::generate("blue", 0x83, PATTERN_LENGTHS[2]),
            ],
        }
    }

    /// Frame current at the given producer tick
    pub fn frame_for_tick(&self, tick: u32) -> &CannedFrame {
        let slot = (tick / TICKS_PER_PATTERN) as usize % self.frames.len();
        &self.frames[slot]
    }

    /// All frames in rotation order
    pub fn frames(&self) -> &[CannedFrame] {
        &self.frames
    }
}
