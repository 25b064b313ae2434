// SPDX-License-Identifier: GPL-3.0-only

//! Cancellation token shared between the streaming loop, the control
//! channel, and the signal handler.
//!
//! The token is the only inter-thread signal: a setter flips a flag, and
//! long-running loops observe it once per poll interval. No ordering is
//! promised beyond "eventually observed", which is all the loops need.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable cancellation flag
///
/// Cheap to clone (an `Arc` bump); all clones observe the same flag.
/// Signal handlers may call `cancel()` directly since it only stores an
/// atomic and never touches buffers or locks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, untripped token
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token; idempotent
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether the token has been tripped
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
