// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture client and the command-line surface

use crate::device::DeviceError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for capture-session operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture session errors
    Capture(CaptureError),
    /// Device control surface errors outside a session
    Device(DeviceError),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Capture-session errors, grouped by the failure taxonomy of the
/// streaming protocol: negotiation and resource failures abort before or
/// during setup, stream failures abort an active session. Wait timeouts
/// are not errors and never surface here.
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// Capability or format negotiation failed
    Negotiation(String),
    /// Buffer allocation or mapping failed
    Resource(String),
    /// A control call failed while streaming
    Stream(String),
    /// Writing a frame to the sink failed
    Sink(String),
    /// Operation called in the wrong session phase
    Session(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Device(e) => write!(f, "Device error: {}", e),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Negotiation(msg) => write!(f, "Format negotiation failed: {}", msg),
            CaptureError::Resource(msg) => write!(f, "Buffer setup failed: {}", msg),
            CaptureError::Stream(msg) => write!(f, "Streaming failed: {}", msg),
            CaptureError::Sink(msg) => write!(f, "Frame sink failed: {}", msg),
            CaptureError::Session(msg) => write!(f, "Invalid session state: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CaptureError {}

// Conversions from sub-errors to AppError
impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<DeviceError> for AppError {
    fn from(err: DeviceError) -> Self {
        AppError::Device(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}
