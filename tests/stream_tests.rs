// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end capture session scenarios

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use vcam::capture::MemorySink;
use vcam::device::patterns::PATTERN_LENGTHS;
use vcam::device::{FieldOrder, FrameFormat, PixelEncoding};
use vcam::{
    CancelToken, CaptureDevice, CaptureStreamController, ControlEvent, ControlId, StreamPhase,
    VirtualDevice,
};

fn desired_format() -> FrameFormat {
    FrameFormat {
        encoding: PixelEncoding::Mjpg,
        width: 1280,
        height: 768,
        field: FieldOrder::Any,
        size_image: 0,
    }
}

fn session(
    device: Arc<VirtualDevice>,
    cancel: CancelToken,
) -> (CaptureStreamController, MemorySink) {
    let sink = MemorySink::new();
    let handle = sink.clone();
    let controller = CaptureStreamController::new(device, Box::new(sink), cancel);
    (controller, handle)
}

#[test]
fn test_full_session_captures_frames() {
    let device = Arc::new(VirtualDevice::new());
    let (mut controller, sink) = session(device.clone(), CancelToken::new());

    controller.negotiate_format(&desired_format()).unwrap();
    assert_eq!(
        controller.format().map(|f| (f.width, f.height)),
        Some((800, 600))
    );

    controller.allocate_buffers(32).unwrap();
    controller.start(None).unwrap();
    controller.run(Some(5)).unwrap();
    controller.stop().unwrap();

    assert_eq!(controller.frames_consumed(), 5);
    assert_eq!(controller.phase(), StreamPhase::Stopped);

    let frames = sink.frames();
    assert_eq!(frames.len(), 5);
    // The session opens on the first canned payload
    assert_eq!(frames[0].len(), PATTERN_LENGTHS[0]);
    // Early frames all come from the first pattern slot (60 ticks each)
    for frame in &frames {
        assert_eq!(frame.len(), PATTERN_LENGTHS[0]);
    }

    // Teardown freed the device allocation
    assert!(device.buffer_states().is_empty());
}

#[test]
fn test_consumed_never_exceeds_produced() {
    let device = Arc::new(VirtualDevice::new());
    let (mut controller, sink) = session(device, CancelToken::new());

    controller.negotiate_format(&desired_format()).unwrap();
    controller.allocate_buffers(8).unwrap();
    controller.start(None).unwrap();

    let limit = 4;
    controller.run(Some(limit)).unwrap();
    controller.stop().unwrap();

    // One frame per tick at most, one sink write per consumed frame
    assert_eq!(controller.frames_consumed(), limit);
    assert_eq!(sink.frames().len() as u64, controller.frames_consumed());
}

#[test]
fn test_double_stop_is_noop() {
    let device = Arc::new(VirtualDevice::new());
    let (mut controller, _sink) = session(device.clone(), CancelToken::new());

    controller.negotiate_format(&desired_format()).unwrap();
    controller.allocate_buffers(8).unwrap();
    controller.start(None).unwrap();
    controller.run(Some(1)).unwrap();

    controller.stop().unwrap();
    let states_after_first = device.buffer_states().len();

    controller.stop().unwrap();
    assert_eq!(device.buffer_states().len(), states_after_first);
    assert_eq!(controller.phase(), StreamPhase::Stopped);
}

#[test]
fn test_cancellation_mid_wait_exits_within_interval() {
    let device = Arc::new(VirtualDevice::new());
    let cancel = CancelToken::new();
    let (mut controller, _sink) = session(device, cancel.clone());

    controller.negotiate_format(&desired_format()).unwrap();
    controller.allocate_buffers(8).unwrap();
    controller.start(None).unwrap();

    // Trip the token from another thread while the loop is waiting
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        cancel.cancel();
    });

    let started = Instant::now();
    controller.run(None).unwrap();
    let elapsed = started.elapsed();

    // One poll interval plus scheduling slack
    assert!(
        elapsed < Duration::from_millis(1500),
        "loop took {:?} to observe cancellation",
        elapsed
    );

    canceller.join().unwrap();
    controller.stop().unwrap();
}

#[test]
fn test_stop_without_start_is_clean() {
    let device = Arc::new(VirtualDevice::new());
    let (mut controller, _sink) = session(device.clone(), CancelToken::new());

    controller.negotiate_format(&desired_format()).unwrap();
    controller.allocate_buffers(8).unwrap();

    // stream_off never ran; the stop sequence must still release
    controller.stop().unwrap();
    assert_eq!(controller.phase(), StreamPhase::Stopped);
    assert!(device.buffer_states().is_empty());
}

#[test]
fn test_control_channel_adjusts_during_stream() {
    let device = Arc::new(VirtualDevice::new());
    let (mut controller, _sink) = session(device.clone(), CancelToken::new());

    controller.negotiate_format(&desired_format()).unwrap();
    controller.allocate_buffers(8).unwrap();

    let (tx, rx) = mpsc::channel();
    controller.start(Some(rx)).unwrap();

    // Flood increases; however many get processed before teardown, the
    // value can never escape the control's range
    for _ in 0..30 {
        tx.send(ControlEvent::Increase).unwrap();
    }

    controller.run(Some(3)).unwrap();
    controller.stop().unwrap();

    let brightness = device.control(ControlId::Brightness).unwrap();
    assert!((128..=255).contains(&brightness));
}
