// SPDX-License-Identifier: GPL-3.0-only

//! Device-side frame producer
//!
//! A periodic tick (30 Hz) pulls the oldest queued-but-empty buffer,
//! copies the current canned payload into it, and hands it to the
//! completion path. An empty pending queue means a slow client; the tick
//! is simply skipped and the production opportunity is lost, never
//! queued up.
//!
//! The tick touches the pending queue only through its push/pop
//! interface, so the queue lock is never held across the payload copy.

use super::arena::BufferArena;
use super::patterns::PatternSet;
use super::queues::{CompletedQueue, PendingQueue};
use super::types::{DequeuedFrame, FrameStatus};
use crate::constants::{PATTERN_CYCLE_TICKS, PRODUCER_TICK_INTERVAL};
use crate::loop_thread::{LoopAction, LoopController};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Everything one producer thread needs, snapshotted at stream start
pub(crate) struct ProducerContext {
    pub arena: Arc<BufferArena>,
    pub pending: Arc<PendingQueue>,
    pub completed: Arc<CompletedQueue>,
    pub patterns: Arc<PatternSet>,
}

/// Run one production tick: fill at most one buffer.
///
/// Returns what was handed to the completion path, or `None` if no
/// buffer was queued.
pub(crate) fn run_tick(ctx: &ProducerContext, tick: u32) -> Option<DequeuedFrame> {
    let index = ctx.pending.pop()?;
    let pattern = ctx.patterns.frame_for_tick(tick);

    let filled = ctx
        .arena
        .get(index)
        .and_then(|buffer| buffer.fill(&pattern.data));

    let frame = match filled {
        Ok(bytes_used) => {
            trace!(index, bytes_used, pattern = pattern.name, "Frame produced");
            DequeuedFrame {
                index,
                bytes_used,
                status: FrameStatus::Done,
            }
        }
        Err(e) => {
            // A queued buffer we cannot write is returned without a
            // payload, like a plane whose mapping went away.
            warn!(index, error = %e, "Failed to fill queued buffer");
            if let Ok(buffer) = ctx.arena.get(index) {
                buffer.mark_error();
            }
            DequeuedFrame {
                index,
                bytes_used: 0,
                status: FrameStatus::Error,
            }
        }
    };

    ctx.completed.push(frame);
    Some(frame)
}

/// Arm the production timer: a thread ticking at 30 Hz until stopped
pub(crate) fn spawn(ctx: ProducerContext) -> LoopController {
    debug!(buffers = ctx.arena.len(), "Arming frame producer");

    let mut tick: u32 = 0;
    let mut deadline = Instant::now() + PRODUCER_TICK_INTERVAL;

    LoopController::spawn("frame-producer", move || {
        let now = Instant::now();
        if now < deadline {
            thread::sleep(deadline - now);
        }
        // Rearm relative to the current tick, like a periodic timer
        deadline = Instant::now() + PRODUCER_TICK_INTERVAL;

        run_tick(&ctx, tick);
        tick = (tick + 1) % PATTERN_CYCLE_TICKS;

        LoopAction::Continue
    })
}
