// SPDX-License-Identifier: GPL-3.0-only

//! Control channel: device property adjustment alongside streaming
//!
//! Runs on its own thread for the lifetime of a streaming session and
//! talks only to the device's property surface, never to the frame
//! queue; the two are disjoint resources. Input events arrive on a
//! channel; the loop polls it once per second so the cancellation token
//! is observed within one interval.

use crate::cancel::CancelToken;
use crate::constants::CONTROL_POLL_INTERVAL;
use crate::device::{CaptureDevice, ControlId, DeviceResult};
use crate::loop_thread::{LoopAction, LoopController};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use tracing::{debug, info, warn};

/// Requested property adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Raise the property by one step
    Increase,
    /// Lower the property by one step
    Decrease,
}

/// Handle to the running control channel thread
pub struct ControlChannel {
    controller: LoopController,
}

impl ControlChannel {
    /// Spawn the channel for one control of one device
    ///
    /// Queries the control's range up front; if the device does not
    /// expose the control, no thread is spawned and `None` is returned.
    /// Streaming proceeds without the channel; the failure is benign.
    ///
    /// The adjustment step is a tenth of the control's range. Each event
    /// does a read-modify-write clamped into `[minimum, maximum]`; this
    /// channel is the property's only writer, so the sequence needs no
    /// extra locking.
    pub fn spawn(
        device: Arc<dyn CaptureDevice>,
        id: ControlId,
        events: Receiver<ControlEvent>,
        cancel: CancelToken,
    ) -> Option<Self> {
        let info = match device.query_control(id) {
            Ok(info) => info,
            Err(e) => {
                warn!(control = %id, error = %e, "Control unavailable, channel not started");
                return None;
            }
        };

        let step = ((info.maximum - info.minimum) / 10).max(1);
        let (minimum, maximum) = (info.minimum, info.maximum);
        info!(control = %id, minimum, maximum, step, "Control channel started");

        let controller = LoopController::spawn("control-channel", move || {
            if cancel.is_cancelled() {
                return LoopAction::Stop;
            }

            match events.recv_timeout(CONTROL_POLL_INTERVAL) {
                Ok(event) => {
                    match adjust(device.as_ref(), id, event, step, minimum, maximum) {
                        Ok(value) => {
                            debug!(control = %id, value, "Control adjusted");
                            LoopAction::Continue
                        }
                        Err(e) => {
                            // A failing property call ends the channel,
                            // not the stream
                            warn!(control = %id, error = %e, "Control adjustment failed");
                            LoopAction::Stop
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => LoopAction::Continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Control event source closed");
                    LoopAction::Stop
                }
            }
        });

        Some(Self { controller })
    }

    /// Check if the channel thread is still alive
    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Stop the channel and join its thread
    ///
    /// Must be called before the buffer pool is released so no channel
    /// thread holds the device handle past teardown.
    pub fn stop(mut self) {
        self.controller.stop();
    }
}

/// One read-modify-write of the property, clamped to its range
fn adjust(
    device: &dyn CaptureDevice,
    id: ControlId,
    event: ControlEvent,
    step: i32,
    minimum: i32,
    maximum: i32,
) -> DeviceResult<i32> {
    let current = device.control(id)?;
    let target = match event {
        ControlEvent::Increase => current.saturating_add(step),
        ControlEvent::Decrease => current.saturating_sub(step),
    };
    device.set_control(id, target.clamp(minimum, maximum))
}
