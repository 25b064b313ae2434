// SPDX-License-Identifier: GPL-3.0-only

//! Frame sinks
//!
//! Dequeued payloads are written to a sink before the buffer is handed
//! back to the device. The sink is deliberately dumb: it receives raw
//! bytes and never interprets them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Destination for dequeued frame payloads
pub trait FrameSink: Send {
    /// Persist one frame payload
    fn write_frame(&mut self, payload: &[u8]) -> io::Result<()>;

    /// Number of frames written so far
    fn frames_written(&self) -> u64;
}

/// Writes each frame to a numbered file in one directory
///
/// Files are named `image_0000.jpg`, `image_0001.jpg`, … with the
/// extension taken from the negotiated encoding.
pub struct FileSink {
    dir: PathBuf,
    extension: String,
    next_index: u64,
}

impl FileSink {
    /// Create the sink, creating `dir` if needed
    pub fn new(dir: &Path, extension: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
            next_index: 0,
        })
    }

    /// Directory the sink writes into
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_path(&self) -> PathBuf {
        self.dir
            .join(format!("image_{:04}.{}", self.next_index, self.extension))
    }
}

impl FrameSink for FileSink {
    fn write_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        let path = self.next_path();
        fs::write(&path, payload)?;
        self.next_index += 1;
        debug!(path = %path.display(), bytes = payload.len(), "Frame saved");
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.next_index
    }
}

/// Collects frames in memory; used by tests
#[derive(Clone, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap().clone()
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        self.frames.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames.lock().unwrap().len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_sink_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("vcam-sink-test-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn test_file_sink_numbering() {
        let dir = temp_sink_dir("numbering");
        let _ = fs::remove_dir_all(&dir);

        let mut sink = FileSink::new(&dir, "jpg").unwrap();
        sink.write_frame(b"first").unwrap();
        sink.write_frame(b"second").unwrap();

        assert_eq!(sink.frames_written(), 2);
        assert_eq!(fs::read(dir.join("image_0000.jpg")).unwrap(), b"first");
        assert_eq!(fs::read(dir.join("image_0001.jpg")).unwrap(), b"second");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_sink_creates_directory() {
        let dir = temp_sink_dir("mkdir").join("nested");
        let _ = fs::remove_dir_all(dir.parent().unwrap());

        let sink = FileSink::new(&dir, "jpg").unwrap();
        assert!(sink.dir().is_dir());

        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_memory_sink_records_payloads() {
        let mut sink = MemorySink::new();
        let handle = sink.clone();

        sink.write_frame(b"abc").unwrap();
        sink.write_frame(b"defg").unwrap();

        let frames = handle.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], b"abc");
        assert_eq!(frames[1], b"defg");
    }
}
