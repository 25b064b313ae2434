// SPDX-License-Identifier: GPL-3.0-only

//! The simulated capture device
//!
//! Implements the full control surface over an in-process buffer arena.
//! Frame production runs on a 30 Hz tick thread armed by `stream_on`
//! and disarmed synchronously by `stream_off`, which then drains the
//! pending queue so no buffer stays queued to a stopped device.

use super::CaptureDevice;
use super::arena::{BufferArena, MappedBuffer};
use super::patterns::PatternSet;
use super::producer::{self, ProducerContext};
use super::queues::{CompletedQueue, PendingQueue, WaitOutcome};
use super::types::{
    BufferState, CAP_READ_WRITE, CAP_STREAMING, CAP_VIDEO_CAPTURE, Capability, ControlId,
    ControlInfo, DequeuedFrame, DeviceError, DeviceResult, FieldOrder, FormatDesc, FrameFormat,
    FrameSize, FrameStatus, PixelEncoding,
};
use crate::constants::{
    BRIGHTNESS_DEFAULT, BRIGHTNESS_MAX, BRIGHTNESS_MIN, BRIGHTNESS_STEP, MAX_DEVICE_BUFFERS,
    MIN_DEVICE_BUFFERS, NATIVE_HEIGHT, NATIVE_IMAGE_SIZE, NATIVE_WIDTH,
};
use crate::loop_thread::LoopController;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Format the virtual device natively produces; every proposal is
/// clamped to this
fn native_format() -> FrameFormat {
    FrameFormat {
        encoding: PixelEncoding::Mjpg,
        width: NATIVE_WIDTH,
        height: NATIVE_HEIGHT,
        field: FieldOrder::Progressive,
        size_image: NATIVE_IMAGE_SIZE,
    }
}

struct StreamState {
    format: FrameFormat,
    arena: Option<Arc<BufferArena>>,
    producer: Option<LoopController>,
    streaming: bool,
}

struct ControlState {
    info: ControlInfo,
    current: i32,
}

/// In-process virtual capture device
///
/// One stream session at a time: format negotiation, buffer allocation,
/// and streaming all operate on the same session state under one lock.
/// The pending and completed queues live outside that lock so the
/// producer tick never contends with control calls.
pub struct VirtualDevice {
    state: Mutex<StreamState>,
    pending: Arc<PendingQueue>,
    completed: Arc<CompletedQueue>,
    patterns: Arc<PatternSet>,
    controls: Mutex<Vec<ControlState>>,
}

impl Default for VirtualDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualDevice {
    pub fn new() -> Self {
        let brightness = ControlState {
            info: ControlInfo {
                id: ControlId::Brightness,
                name: "Brightness".to_string(),
                minimum: BRIGHTNESS_MIN,
                maximum: BRIGHTNESS_MAX,
                step: BRIGHTNESS_STEP,
                default_value: BRIGHTNESS_DEFAULT,
            },
            current: BRIGHTNESS_DEFAULT,
        };

        Self {
            state: Mutex::new(StreamState {
                format: native_format(),
                arena: None,
                producer: None,
                streaming: false,
            }),
            pending: Arc::new(PendingQueue::new()),
            completed: Arc::new(CompletedQueue::new()),
            patterns: Arc::new(PatternSet::new()),
            controls: Mutex::new(vec![brightness]),
        }
    }

    /// Snapshot of every allocated buffer's state; empty without an
    /// allocation. Diagnostics only.
    pub fn buffer_states(&self) -> Vec<BufferState> {
        let state = self.state.lock().unwrap();
        state
            .arena
            .as_ref()
            .map(|arena| arena.states())
            .unwrap_or_default()
    }

    /// Number of buffers currently queued for filling
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Release the allocation with the session lock already held
    fn release_locked(&self, state: &mut StreamState) {
        // Stale indices must not survive into a future allocation
        let dropped = self.pending.drain();
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "Dropping stale pending buffers");
        }
        self.completed.close();

        if let Some(arena) = state.arena.take() {
            arena.release_all();
            debug!(count = arena.len(), "Buffer arena released");
        }
    }

    /// Drive one production tick directly, bypassing the timer.
    /// Deterministic test hook.
    #[cfg(test)]
    pub(crate) fn tick_once(&self, tick: u32) -> Option<DequeuedFrame> {
        let arena = self.state.lock().unwrap().arena.clone()?;
        let ctx = ProducerContext {
            arena,
            pending: Arc::clone(&self.pending),
            completed: Arc::clone(&self.completed),
            patterns: Arc::clone(&self.patterns),
        };
        producer::run_tick(&ctx, tick)
    }
}

impl CaptureDevice for VirtualDevice {
    fn query_capability(&self) -> DeviceResult<Capability> {
        Ok(Capability {
            driver: "vcam".to_string(),
            card: "virtual video".to_string(),
            capabilities: CAP_VIDEO_CAPTURE | CAP_STREAMING | CAP_READ_WRITE,
        })
    }

    fn formats(&self) -> Vec<FormatDesc> {
        vec![FormatDesc {
            index: 0,
            encoding: PixelEncoding::Mjpg,
            description: "Motion-JPEG".to_string(),
        }]
    }

    fn frame_sizes(&self, encoding: PixelEncoding) -> Vec<FrameSize> {
        match encoding {
            PixelEncoding::Mjpg => vec![FrameSize {
                width: NATIVE_WIDTH,
                height: NATIVE_HEIGHT,
            }],
        }
    }

    fn format(&self) -> DeviceResult<FrameFormat> {
        Ok(self.state.lock().unwrap().format.clone())
    }

    fn set_format(&self, requested: &FrameFormat) -> DeviceResult<FrameFormat> {
        let mut state = self.state.lock().unwrap();

        if state.arena.is_some() {
            return Err(DeviceError::Busy);
        }

        // Single supported encoding; anything else is refused rather
        // than silently converted
        match requested.encoding {
            PixelEncoding::Mjpg => {}
        }

        let accepted = native_format();
        if requested.width != accepted.width || requested.height != accepted.height {
            debug!(
                requested = %requested,
                accepted = %accepted,
                "Clamped proposed format to native geometry"
            );
        }
        state.format = accepted.clone();
        Ok(accepted)
    }

    fn request_buffers(&self, count: u32) -> DeviceResult<u32> {
        let mut state = self.state.lock().unwrap();

        if state.streaming {
            return Err(DeviceError::Busy);
        }

        // A zero-count request releases the allocation, mirroring the
        // buffer-request convention of real capture drivers
        if count == 0 {
            self.release_locked(&mut state);
            return Ok(0);
        }

        // Re-requesting replaces any previous allocation
        if state.arena.is_some() {
            self.release_locked(&mut state);
        }

        let granted = count.clamp(MIN_DEVICE_BUFFERS, MAX_DEVICE_BUFFERS);
        let arena = Arc::new(BufferArena::new(granted, state.format.size_image as usize));
        state.arena = Some(arena);

        info!(requested = count, granted, "Buffers allocated");
        Ok(granted)
    }

    fn map_buffer(&self, index: u32) -> DeviceResult<MappedBuffer> {
        let state = self.state.lock().unwrap();
        let arena = state.arena.as_ref().ok_or(DeviceError::NoBuffers)?;
        let buffer = arena.get(index)?;

        if buffer.state() == BufferState::Released {
            return Err(DeviceError::MapFailed(format!(
                "buffer {} is already released",
                index
            )));
        }

        Ok(MappedBuffer::new(Arc::clone(buffer)))
    }

    fn release_buffers(&self) -> DeviceResult<()> {
        let mut state = self.state.lock().unwrap();

        if state.streaming {
            return Err(DeviceError::Busy);
        }

        self.release_locked(&mut state);
        Ok(())
    }

    fn queue_buffer(&self, index: u32) -> DeviceResult<()> {
        let state = self.state.lock().unwrap();
        let arena = state.arena.as_ref().ok_or(DeviceError::NoBuffers)?;

        arena.get(index)?.make_empty()?;
        self.pending.push(index);
        Ok(())
    }

    fn dequeue_buffer(&self, timeout: Duration) -> DeviceResult<Option<DequeuedFrame>> {
        let arena = {
            let state = self.state.lock().unwrap();
            if !state.streaming {
                return Err(DeviceError::NotStreaming);
            }
            state.arena.clone().ok_or(DeviceError::NoBuffers)?
        };

        // Park outside the session lock so control calls and the
        // producer keep running while we wait
        match self.completed.wait_pop(timeout) {
            WaitOutcome::TimedOut => Ok(None),
            WaitOutcome::Closed => Err(DeviceError::NotStreaming),
            WaitOutcome::Frame(frame) => {
                if frame.status == FrameStatus::Done {
                    arena.get(frame.index)?.mark_dequeued()?;
                }
                Ok(Some(frame))
            }
        }
    }

    fn stream_on(&self) -> DeviceResult<()> {
        let mut state = self.state.lock().unwrap();

        if state.streaming {
            debug!("Stream already running");
            return Ok(());
        }
        let arena = state.arena.clone().ok_or(DeviceError::NoBuffers)?;

        self.completed.open();
        let ctx = ProducerContext {
            arena,
            pending: Arc::clone(&self.pending),
            completed: Arc::clone(&self.completed),
            patterns: Arc::clone(&self.patterns),
        };
        state.producer = Some(producer::spawn(ctx));
        state.streaming = true;

        info!("Stream started");
        Ok(())
    }

    fn stream_off(&self) -> DeviceResult<()> {
        let (mut producer, arena) = {
            let mut state = self.state.lock().unwrap();

            if !state.streaming {
                return Err(DeviceError::NotStreaming);
            }
            state.streaming = false;
            (state.producer.take(), state.arena.clone())
        };

        // Disarm the timer before touching the queues: once the join
        // returns, no tick can race the drain below
        if let Some(controller) = producer.as_mut() {
            controller.stop();
        }

        let drained = self.pending.drain();
        if let Some(arena) = arena {
            for index in &drained {
                match arena.get(*index) {
                    Ok(buffer) => buffer.mark_error(),
                    Err(e) => warn!(index, error = %e, "Stale index in pending queue"),
                }
            }
        }
        self.completed.close();

        info!(drained = drained.len(), "Stream stopped");
        Ok(())
    }

    fn query_control(&self, id: ControlId) -> DeviceResult<ControlInfo> {
        let controls = self.controls.lock().unwrap();
        controls
            .iter()
            .find(|c| c.info.id == id)
            .map(|c| c.info.clone())
            .ok_or(DeviceError::NoSuchControl(id))
    }

    fn control(&self, id: ControlId) -> DeviceResult<i32> {
        let controls = self.controls.lock().unwrap();
        controls
            .iter()
            .find(|c| c.info.id == id)
            .map(|c| c.current)
            .ok_or(DeviceError::NoSuchControl(id))
    }

    fn set_control(&self, id: ControlId, value: i32) -> DeviceResult<i32> {
        let mut controls = self.controls.lock().unwrap();
        let control = controls
            .iter_mut()
            .find(|c| c.info.id == id)
            .ok_or(DeviceError::NoSuchControl(id))?;

        let applied = value.clamp(control.info.minimum, control.info.maximum);
        if applied != value {
            debug!(
                control = %id,
                requested = value,
                applied,
                "Control value was clamped"
            );
        }
        control.current = applied;
        Ok(applied)
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        // A producer thread must never outlive its arena
        let producer = self.state.lock().unwrap().producer.take();
        if let Some(mut controller) = producer {
            controller.stop();
        }
    }
}
