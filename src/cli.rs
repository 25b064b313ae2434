// SPDX-License-Identifier: GPL-3.0-only

//! Command-line entry points

use chrono::Local;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use vcam::device::{FieldOrder, FrameFormat, PixelEncoding};
use vcam::{
    AppError, AppResult, CancelToken, CaptureDevice, CaptureStreamController, ControlEvent,
    ControlId, FileSink, VirtualDevice,
};

/// Stream frames from the virtual device into numbered image files
pub fn run_stream(
    buffers: u32,
    width: u32,
    height: u32,
    output: Option<PathBuf>,
    count: Option<u64>,
    controls: bool,
) -> AppResult<()> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| AppError::Other(format!("Failed to install signal handler: {}", e)))?;

    let requested = FrameFormat {
        encoding: PixelEncoding::Mjpg,
        width,
        height,
        field: FieldOrder::Any,
        size_image: 0,
    };

    let dir = output.unwrap_or_else(default_capture_dir);
    let sink = FileSink::new(&dir, requested.encoding.file_extension())?;
    println!("Saving frames to {}", dir.display());

    let device = Arc::new(VirtualDevice::new());
    let mut controller = CaptureStreamController::new(device, Box::new(sink), cancel.clone());

    let session = (|| {
        controller.negotiate_format(&requested)?;
        controller.allocate_buffers(buffers)?;

        let events = if controls {
            println!("Brightness control active: type u + Enter to raise, d + Enter to lower");
            Some(spawn_control_input())
        } else {
            None
        };
        controller.start(events)?;

        println!("Streaming... (press Ctrl+C to stop)");
        controller.run(count)
    })();

    // The stop sequence runs on success and on every failure path
    let stop_result = controller.stop();
    session?;
    stop_result?;

    println!("Captured {} frames", controller.frames_consumed());
    Ok(())
}

/// List supported formats and their frame sizes
pub fn list_formats() -> AppResult<()> {
    let device = VirtualDevice::new();

    for desc in device.formats() {
        println!("Format {}: {} ({})", desc.index, desc.encoding, desc.description);
        for (index, size) in device.frame_sizes(desc.encoding).iter().enumerate() {
            println!("  size {}: {}", index, size);
        }
    }
    Ok(())
}

/// Print the device's capability bitset
pub fn show_info() -> AppResult<()> {
    let device = VirtualDevice::new();
    let caps = device.query_capability()?;

    println!("Driver:  {}", caps.driver);
    println!("Card:    {}", caps.card);
    println!("Caps:    0x{:08x}", caps.capabilities);
    println!("  video capture: {}", yes_no(caps.has_video_capture()));
    println!("  streaming:     {}", yes_no(caps.has_streaming()));
    println!("  read/write:    {}", yes_no(caps.has_read_write()));
    Ok(())
}

/// Query or adjust the brightness control once
pub fn adjust_controls(set: Option<i32>, up: bool, down: bool) -> AppResult<()> {
    let device = VirtualDevice::new();
    let info = device.query_control(ControlId::Brightness)?;
    let step = ((info.maximum - info.minimum) / 10).max(1);

    if let Some(value) = set {
        let applied = device.set_control(ControlId::Brightness, value)?;
        println!("{} set to {}", info.name, applied);
    } else if up || down {
        let current = device.control(ControlId::Brightness)?;
        let target = if up {
            current.saturating_add(step)
        } else {
            current.saturating_sub(step)
        };
        let applied =
            device.set_control(ControlId::Brightness, target.clamp(info.minimum, info.maximum))?;
        println!("{}: {} -> {}", info.name, current, applied);
    } else {
        let current = device.control(ControlId::Brightness)?;
        println!(
            "{}: {} (range {}..={}, step {}, default {})",
            info.name, current, info.minimum, info.maximum, info.step, info.default_value
        );
    }
    Ok(())
}

/// Forward stdin lines as control events: `u` raises, `d` lowers
fn spawn_control_input() -> Receiver<ControlEvent> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let event = match line.trim() {
                "u" | "U" => ControlEvent::Increase,
                "d" | "D" => ControlEvent::Decrease,
                _ => continue,
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    });

    rx
}

/// Default folder name under the pictures directory
const DEFAULT_SAVE_FOLDER: &str = "vcam";

/// Default output directory: a timestamped session folder
fn default_capture_dir() -> PathBuf {
    let base = dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    base.join(DEFAULT_SAVE_FOLDER)
        .join(format!("capture_{}", timestamp))
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
