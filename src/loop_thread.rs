// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for run loops
//!
//! Both long-running threads in this crate, the device-side frame
//! producer and the client-side control channel, share the same shape:
//! a named worker thread repeating one iteration until asked to stop.
//! This module provides that shape once, with consistent logging and a
//! cancellation token as the stop signal.

use crate::cancel::CancelToken;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a run loop executing in a separate thread
///
/// The provided closure is called repeatedly until it returns
/// [`LoopAction::Stop`] or the controller's stop token trips. Dropping
/// the controller stops and joins the thread.
pub struct LoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_token: CancelToken,
    /// Name for logging
    name: String,
}

impl LoopController {
    /// Start a new run loop in a separate thread
    ///
    /// # Arguments
    ///
    /// * `name` - A descriptive name for the loop (used in logging)
    /// * `loop_fn` - A closure that performs one iteration of the loop
    pub fn spawn<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_token = CancelToken::new();
        let token = stop_token.clone();
        let thread_name = name.to_string();

        info!(name = %name, "Starting run loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %thread_name, "Run loop thread started");

            loop {
                // Check stop signal first
                if token.is_cancelled() {
                    debug!(name = %thread_name, "Stop signal received");
                    break;
                }

                match loop_fn() {
                    LoopAction::Continue => {}
                    LoopAction::Stop => {
                        debug!(name = %thread_name, "Loop requested stop");
                        break;
                    }
                }
            }

            info!(name = %thread_name, "Run loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_token,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting for the thread to finish
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting run loop stop");
        self.stop_token.cancel();
    }

    /// Stop the loop and wait for the thread to finish
    ///
    /// This is the synchronous disarm: when it returns, no further
    /// iteration can run.
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending a stop signal
    ///
    /// Useful if the loop stops itself via `LoopAction::Stop`.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for run loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Run loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Run loop thread finished");
            }
        }
    }
}

impl Drop for LoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "LoopController dropped, stopping loop");
            self.stop();
        }
    }
}
