// SPDX-License-Identifier: GPL-3.0-only

//! Client-side buffer pool
//!
//! Requests a buffer allocation from the device and maps every granted
//! buffer. The pool owns the mappings: they stay valid until `release`,
//! which is idempotent and also runs on drop so no exit path can leak
//! the device's exclusive buffer allocation.

use crate::device::{CaptureDevice, MappedBuffer};
use crate::errors::{CaptureError, CaptureResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The mapped buffers of one stream session
pub struct BufferPool {
    device: Arc<dyn CaptureDevice>,
    buffers: Vec<MappedBuffer>,
    released: bool,
}

impl BufferPool {
    /// Request `count` buffers and map whatever the device grants
    ///
    /// A zero grant is fatal. A partial grant is accepted and the session
    /// proceeds with the granted count, though a single buffer cannot
    /// overlap fill and drain, so that case is logged loudly.
    pub fn request(device: Arc<dyn CaptureDevice>, count: u32) -> CaptureResult<Self> {
        let granted = device
            .request_buffers(count)
            .map_err(|e| CaptureError::Resource(e.to_string()))?;

        if granted == 0 {
            return Err(CaptureError::Resource(
                "device granted zero buffers".to_string(),
            ));
        }
        if granted == 1 {
            warn!("Single-buffer grant: fill and drain cannot overlap");
        }
        info!(requested = count, granted, "Mapping buffer pool");

        let mut buffers = Vec::with_capacity(granted as usize);
        for index in 0..granted {
            match device.map_buffer(index) {
                Ok(mapped) => buffers.push(mapped),
                Err(e) => {
                    // Mapping failure is always fatal; give back what
                    // was already acquired before bailing out
                    warn!(index, error = %e, "Buffer mapping failed, releasing pool");
                    drop(buffers);
                    if let Err(release_err) = device.release_buffers() {
                        warn!(error = %release_err, "Release after failed mapping also failed");
                    }
                    return Err(CaptureError::Resource(format!(
                        "failed to map buffer {}: {}",
                        index, e
                    )));
                }
            }
        }

        debug!(count = buffers.len(), "Buffer pool mapped");
        Ok(Self {
            device,
            buffers,
            released: false,
        })
    }

    /// Number of mapped buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// True if the pool holds no mappings
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Look up a mapped buffer by device index
    pub fn get(&self, index: u32) -> Option<&MappedBuffer> {
        self.buffers.get(index as usize)
    }

    /// Iterate over all mapped buffers
    pub fn buffers(&self) -> impl Iterator<Item = &MappedBuffer> {
        self.buffers.iter()
    }

    /// Unmap everything and free the device allocation; idempotent
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let count = self.buffers.len();
        self.buffers.clear();

        if let Err(e) = self.device.release_buffers() {
            warn!(error = %e, "Device refused buffer release");
        } else {
            info!(count, "Buffer pool released");
        }
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        if !self.released {
            debug!("Buffer pool dropped without explicit release");
            self.release();
        }
    }
}
