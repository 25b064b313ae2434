// SPDX-License-Identifier: GPL-3.0-only

//! Capture stream controller
//!
//! Client-side state machine driving one stream session:
//!
//! ```text
//! Idle → FormatSet → BuffersAllocated → Streaming → Stopped
//! ```
//!
//! Negotiation adopts whatever format the device replies with. Every
//! mapped buffer is pre-rolled as empty before streaming starts. The
//! streaming loop waits for a filled buffer with a bounded timeout, so
//! cancellation is observed within one interval even when no frames
//! arrive. `stop` is idempotent and reachable from every error path;
//! it tears down in the one order that is safe: control channel first,
//! then the stream, then the mappings.

use super::control_channel::{ControlChannel, ControlEvent};
use super::pool::BufferPool;
use super::sink::FrameSink;
use crate::cancel::CancelToken;
use crate::constants::DEQUEUE_TIMEOUT;
use crate::device::{CaptureDevice, ControlId, DequeuedFrame, FrameFormat, FrameStatus};
use crate::errors::{CaptureError, CaptureResult};
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

/// Phase of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    FormatSet,
    BuffersAllocated,
    Streaming,
    Stopped,
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamPhase::Idle => write!(f, "idle"),
            StreamPhase::FormatSet => write!(f, "format-set"),
            StreamPhase::BuffersAllocated => write!(f, "buffers-allocated"),
            StreamPhase::Streaming => write!(f, "streaming"),
            StreamPhase::Stopped => write!(f, "stopped"),
        }
    }
}

/// Drives one stream session against one capture device
pub struct CaptureStreamController {
    device: Arc<dyn CaptureDevice>,
    sink: Box<dyn FrameSink>,
    cancel: CancelToken,
    phase: StreamPhase,
    format: Option<FrameFormat>,
    pool: Option<BufferPool>,
    control_channel: Option<ControlChannel>,
    frames_consumed: u64,
}

impl CaptureStreamController {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        sink: Box<dyn FrameSink>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            device,
            sink,
            cancel,
            phase: StreamPhase::Idle,
            format: None,
            pool: None,
            control_channel: None,
            frames_consumed: 0,
        }
    }

    /// Current session phase
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Format in effect after negotiation
    pub fn format(&self) -> Option<&FrameFormat> {
        self.format.as_ref()
    }

    /// Frames consumed so far in this session
    pub fn frames_consumed(&self) -> u64 {
        self.frames_consumed
    }

    fn expect_phase(&self, expected: StreamPhase, operation: &str) -> CaptureResult<()> {
        if self.phase != expected {
            return Err(CaptureError::Session(format!(
                "{} requires phase {}, session is {}",
                operation, expected, self.phase
            )));
        }
        Ok(())
    }

    /// Verify capabilities and negotiate the stream format
    ///
    /// The device's reply is authoritative: a clamped resolution is
    /// adopted as-is, never retried with alternatives.
    pub fn negotiate_format(&mut self, requested: &FrameFormat) -> CaptureResult<()> {
        self.expect_phase(StreamPhase::Idle, "format negotiation")?;

        let caps = self
            .device
            .query_capability()
            .map_err(|e| CaptureError::Negotiation(e.to_string()))?;
        if !caps.has_video_capture() {
            return Err(CaptureError::Negotiation(format!(
                "{} is not a video capture device",
                caps.card
            )));
        }
        if !caps.has_streaming() {
            return Err(CaptureError::Negotiation(format!(
                "{} does not support streaming I/O",
                caps.card
            )));
        }

        let supported = self
            .device
            .formats()
            .iter()
            .any(|desc| desc.encoding == requested.encoding);
        if !supported {
            return Err(CaptureError::Negotiation(format!(
                "device does not enumerate {}",
                requested.encoding
            )));
        }

        let accepted = self
            .device
            .set_format(requested)
            .map_err(|e| CaptureError::Negotiation(e.to_string()))?;
        info!(requested = %requested, accepted = %accepted, "Format negotiated");

        self.format = Some(accepted);
        self.phase = StreamPhase::FormatSet;
        Ok(())
    }

    /// Request and map the buffer pool
    pub fn allocate_buffers(&mut self, count: u32) -> CaptureResult<()> {
        self.expect_phase(StreamPhase::FormatSet, "buffer allocation")?;

        let pool = BufferPool::request(Arc::clone(&self.device), count)?;
        self.pool = Some(pool);
        self.phase = StreamPhase::BuffersAllocated;
        Ok(())
    }

    /// Pre-roll all buffers, start the stream, and optionally attach a
    /// control channel fed by `control_events`
    pub fn start(&mut self, control_events: Option<Receiver<ControlEvent>>) -> CaptureResult<()> {
        self.expect_phase(StreamPhase::BuffersAllocated, "stream start")?;

        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| CaptureError::Session("no buffer pool".to_string()))?;

        // Pre-roll: every buffer queued as empty before streaming
        for buffer in pool.buffers() {
            self.device
                .queue_buffer(buffer.index())
                .map_err(|e| CaptureError::Resource(e.to_string()))?;
        }
        debug!(count = pool.len(), "Buffers pre-rolled");

        self.device
            .stream_on()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        if let Some(events) = control_events {
            // A missing control is benign: spawn returns None and the
            // session streams without the channel
            self.control_channel = ControlChannel::spawn(
                Arc::clone(&self.device),
                ControlId::Brightness,
                events,
                self.cancel.clone(),
            );
        }

        self.phase = StreamPhase::Streaming;
        info!("Capture session streaming");
        Ok(())
    }

    /// Run the streaming loop until cancellation or `frame_limit`
    ///
    /// A dequeue timeout means no data was ready and the loop simply
    /// continues; any other dequeue or requeue failure is fatal and the
    /// caller must run [`stop`](Self::stop).
    pub fn run(&mut self, frame_limit: Option<u64>) -> CaptureResult<()> {
        self.expect_phase(StreamPhase::Streaming, "streaming loop")?;

        while !self.cancel.is_cancelled() {
            if let Some(limit) = frame_limit {
                if self.frames_consumed >= limit {
                    info!(frames = self.frames_consumed, "Frame limit reached");
                    break;
                }
            }

            match self.device.dequeue_buffer(DEQUEUE_TIMEOUT) {
                Ok(Some(frame)) => self.consume(frame)?,
                Ok(None) => {
                    // No frame ready within the timeout; not an error
                    debug!("Dequeue timed out, continuing");
                }
                Err(e) => {
                    return Err(CaptureError::Stream(format!("dequeue failed: {}", e)));
                }
            }
        }

        Ok(())
    }

    /// Consume one dequeued buffer: sink the payload, then requeue.
    ///
    /// The requeue happens strictly after the sink write returns, so the
    /// device cannot see the buffer as empty while its payload is still
    /// being read.
    fn consume(&mut self, frame: DequeuedFrame) -> CaptureResult<()> {
        if frame.status == FrameStatus::Error {
            warn!(index = frame.index, "Buffer completed without payload, requeuing");
            self.device
                .queue_buffer(frame.index)
                .map_err(|e| CaptureError::Stream(e.to_string()))?;
            return Ok(());
        }

        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| CaptureError::Session("no buffer pool".to_string()))?;
        let buffer = pool.get(frame.index).ok_or_else(|| {
            CaptureError::Stream(format!("device completed unmapped buffer {}", frame.index))
        })?;

        let sink = &mut self.sink;
        buffer
            .read(|payload| sink.write_frame(payload))
            .map_err(|e| CaptureError::Stream(e.to_string()))?
            .map_err(|e| CaptureError::Sink(e.to_string()))?;

        self.device
            .queue_buffer(frame.index)
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        self.frames_consumed += 1;
        Ok(())
    }

    /// Stop the session and release everything; idempotent
    ///
    /// Teardown order is load-bearing: the control channel is joined
    /// first (no thread may hold the device handle past this point),
    /// then production is disarmed and drained, and only then are the
    /// buffers unmapped, so a buffer the device might still write to is
    /// never unmapped.
    pub fn stop(&mut self) -> CaptureResult<()> {
        if self.phase == StreamPhase::Stopped {
            debug!("Session already stopped");
            return Ok(());
        }
        info!("Stopping capture session");

        if let Some(channel) = self.control_channel.take() {
            channel.stop();
        }

        match self.device.stream_off() {
            Ok(()) => info!("Stream stopped"),
            Err(crate::device::DeviceError::NotStreaming) => {
                // Stopping a session that never started is a no-op
                debug!("Stream was not running");
            }
            Err(e) => warn!(error = %e, "Stream stop failed, continuing teardown"),
        }

        if let Some(mut pool) = self.pool.take() {
            pool.release();
        }

        self.phase = StreamPhase::Stopped;
        info!(frames = self.frames_consumed, "Capture session stopped");
        Ok(())
    }
}

impl Drop for CaptureStreamController {
    fn drop(&mut self) {
        if self.phase != StreamPhase::Stopped {
            debug!("Controller dropped mid-session, stopping");
            if let Err(e) = self.stop() {
                warn!(error = %e, "Failed to stop session on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::sink::MemorySink;
    use crate::device::VirtualDevice;
    use crate::device::patterns::PATTERN_LENGTHS;

    fn controller(
        device: Arc<VirtualDevice>,
        cancel: CancelToken,
    ) -> (CaptureStreamController, MemorySink) {
        let sink = MemorySink::new();
        let handle = sink.clone();
        let controller = CaptureStreamController::new(device, Box::new(sink), cancel);
        (controller, handle)
    }

    fn desired_format() -> FrameFormat {
        FrameFormat {
            encoding: crate::device::PixelEncoding::Mjpg,
            width: 1280,
            height: 768,
            field: crate::device::FieldOrder::Any,
            size_image: 0,
        }
    }

    #[test]
    fn test_negotiation_adopts_device_reply() {
        let device = Arc::new(VirtualDevice::new());
        let (mut ctrl, _sink) = controller(device, CancelToken::new());

        ctrl.negotiate_format(&desired_format()).unwrap();
        let format = ctrl.format().unwrap();
        assert_eq!((format.width, format.height), (800, 600));
        assert_eq!(ctrl.phase(), StreamPhase::FormatSet);
    }

    #[test]
    fn test_phase_enforcement() {
        let device = Arc::new(VirtualDevice::new());
        let (mut ctrl, _sink) = controller(device, CancelToken::new());

        // Allocation before negotiation is refused
        assert!(ctrl.allocate_buffers(32).is_err());
        // Start before allocation is refused
        assert!(ctrl.start(None).is_err());
        // Run before start is refused
        assert!(ctrl.run(None).is_err());
    }

    #[test]
    fn test_session_consumes_frames() {
        let device = Arc::new(VirtualDevice::new());
        let (mut ctrl, sink) = controller(device.clone(), CancelToken::new());

        ctrl.negotiate_format(&desired_format()).unwrap();
        ctrl.allocate_buffers(32).unwrap();
        ctrl.start(None).unwrap();
        ctrl.run(Some(3)).unwrap();
        ctrl.stop().unwrap();

        assert_eq!(ctrl.frames_consumed(), 3);
        let frames = sink.frames();
        assert_eq!(frames.len(), 3);
        // The stream opens on the first canned payload
        assert_eq!(frames[0].len(), PATTERN_LENGTHS[0]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let device = Arc::new(VirtualDevice::new());
        let (mut ctrl, _sink) = controller(device.clone(), CancelToken::new());

        ctrl.negotiate_format(&desired_format()).unwrap();
        ctrl.allocate_buffers(8).unwrap();
        ctrl.start(None).unwrap();

        ctrl.stop().unwrap();
        assert_eq!(ctrl.phase(), StreamPhase::Stopped);
        assert!(device.buffer_states().is_empty());

        // Second stop is a no-op success
        ctrl.stop().unwrap();
        assert_eq!(ctrl.phase(), StreamPhase::Stopped);
    }

    #[test]
    fn test_stop_before_start_is_clean() {
        let device = Arc::new(VirtualDevice::new());
        let (mut ctrl, _sink) = controller(device.clone(), CancelToken::new());

        ctrl.negotiate_format(&desired_format()).unwrap();
        ctrl.allocate_buffers(8).unwrap();

        // Stream never started: stream_off is benign, pool still freed
        ctrl.stop().unwrap();
        assert!(device.buffer_states().is_empty());
    }

    #[test]
    fn test_cancellation_exits_run() {
        let device = Arc::new(VirtualDevice::new());
        let cancel = CancelToken::new();
        let (mut ctrl, _sink) = controller(device, cancel.clone());

        ctrl.negotiate_format(&desired_format()).unwrap();
        ctrl.allocate_buffers(8).unwrap();
        ctrl.start(None).unwrap();

        cancel.cancel();
        // Already-tripped token: the loop exits without waiting a full
        // timeout interval
        let started = std::time::Instant::now();
        ctrl.run(None).unwrap();
        assert!(started.elapsed() < DEQUEUE_TIMEOUT);

        ctrl.stop().unwrap();
    }
}
