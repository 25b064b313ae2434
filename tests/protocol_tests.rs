// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the device control surface and buffer pool

use std::sync::Arc;
use std::time::Duration;
use vcam::BufferPool;
use vcam::device::patterns::PATTERN_LENGTHS;
use vcam::device::{
    BufferState, CaptureDevice, ControlId, DeviceError, FieldOrder, FrameFormat, FrameStatus,
    PixelEncoding, VirtualDevice,
};

fn proposal(width: u32, height: u32) -> FrameFormat {
    FrameFormat {
        encoding: PixelEncoding::Mjpg,
        width,
        height,
        field: FieldOrder::Any,
        size_image: 0,
    }
}

#[test]
fn test_negotiation_clamps_resolution() {
    let device = VirtualDevice::new();

    let accepted = device.set_format(&proposal(1280, 768)).unwrap();
    assert_eq!((accepted.width, accepted.height), (800, 600));
    assert!(accepted.size_image > 0);

    // The reply is authoritative and persisted
    assert_eq!(device.format().unwrap(), accepted);
}

#[test]
fn test_format_change_rejected_after_allocation() {
    let device = VirtualDevice::new();
    device.set_format(&proposal(1280, 768)).unwrap();
    device.request_buffers(32).unwrap();

    let before = device.format().unwrap();
    match device.set_format(&proposal(640, 480)) {
        Err(DeviceError::Busy) => {}
        other => panic!("expected Busy, got {:?}", other),
    }
    // No change was applied
    assert_eq!(device.format().unwrap(), before);
}

#[test]
fn test_pool_maps_and_releases_exact_grant() {
    for (requested, expected) in [(1u32, 8usize), (8, 8), (20, 20), (32, 32), (100, 32)] {
        let device = Arc::new(VirtualDevice::new());
        let mut pool = BufferPool::request(device.clone(), requested).unwrap();

        assert_eq!(pool.len(), expected, "request {}", requested);
        assert_eq!(device.buffer_states().len(), expected);

        pool.release();
        assert!(device.buffer_states().is_empty(), "request {}", requested);

        // Releasing again changes nothing
        pool.release();
        assert!(device.buffer_states().is_empty());
    }
}

#[test]
fn test_first_filled_buffer_is_index_zero() {
    let device = Arc::new(VirtualDevice::new());
    device.set_format(&proposal(1280, 768)).unwrap();
    let granted = device.request_buffers(32).unwrap();
    assert_eq!(granted, 32);

    let mapped: Vec<_> = (0..granted)
        .map(|i| device.map_buffer(i).unwrap())
        .collect();
    for buffer in &mapped {
        device.queue_buffer(buffer.index()).unwrap();
    }

    device.stream_on().unwrap();
    let frame = device
        .dequeue_buffer(Duration::from_millis(1000))
        .unwrap()
        .expect("first tick should fill a buffer");
    device.stream_off().unwrap();

    // Pre-roll order is FIFO, so the first completion is buffer 0 with
    // the first canned payload
    assert_eq!(frame.index, 0);
    assert_eq!(frame.status, FrameStatus::Done);
    assert_eq!(frame.bytes_used, PATTERN_LENGTHS[0]);

    // The mapped view agrees with the reported byte count, and the
    // payload is framed like a compressed image
    let (len, head) = mapped[0]
        .read(|payload| (payload.len(), [payload[0], payload[1]]))
        .unwrap();
    assert_eq!(len, frame.bytes_used);
    assert_eq!(head, [0xFF, 0xD8]);

    device.release_buffers().unwrap();
}

#[test]
fn test_requeued_buffer_reappears_filled() {
    let device = VirtualDevice::new();
    device.request_buffers(8).unwrap();
    device.queue_buffer(0).unwrap();
    device.stream_on().unwrap();

    let first = device
        .dequeue_buffer(Duration::from_millis(1000))
        .unwrap()
        .expect("queued buffer should fill");
    assert_eq!(first.index, 0);

    // Round-trip: requeue the same buffer and it fills again
    device.queue_buffer(0).unwrap();
    let second = device
        .dequeue_buffer(Duration::from_millis(1000))
        .unwrap()
        .expect("requeued buffer should fill again");
    assert_eq!(second.index, 0);

    device.stream_off().unwrap();
    device.release_buffers().unwrap();
}

#[test]
fn test_filled_set_disjoint_from_producer_writes() {
    let device = VirtualDevice::new();
    device.request_buffers(8).unwrap();
    for index in 0..8 {
        device.queue_buffer(index).unwrap();
    }
    device.stream_on().unwrap();

    let frame = device
        .dequeue_buffer(Duration::from_millis(1000))
        .unwrap()
        .expect("a buffer should fill");

    // The dequeued buffer is client-owned; no state may call it Empty
    // or Filled while the client holds it
    let states = device.buffer_states();
    assert_eq!(states[frame.index as usize], BufferState::Dequeued);

    device.stream_off().unwrap();
}

#[test]
fn test_stop_with_no_queued_buffers_reports_no_errors() {
    let device = VirtualDevice::new();
    device.request_buffers(8).unwrap();
    device.stream_on().unwrap();
    device.stream_off().unwrap();

    assert_eq!(device.pending_len(), 0);
    assert!(
        device
            .buffer_states()
            .iter()
            .all(|s| *s != BufferState::Error)
    );
}

#[test]
fn test_stop_drains_queued_buffers() {
    let device = VirtualDevice::new();
    device.request_buffers(8).unwrap();
    // Queue everything but never start the timer, then release: the
    // queue must be drained so no stale index survives
    for index in 0..8 {
        device.queue_buffer(index).unwrap();
    }
    assert_eq!(device.pending_len(), 8);

    device.release_buffers().unwrap();
    assert_eq!(device.pending_len(), 0);
}

#[test]
fn test_dequeue_times_out_without_production() {
    let device = VirtualDevice::new();
    device.request_buffers(8).unwrap();
    device.stream_on().unwrap();

    // Nothing queued: the wait must time out benignly
    let outcome = device.dequeue_buffer(Duration::from_millis(100)).unwrap();
    assert!(outcome.is_none());

    device.stream_off().unwrap();
}

#[test]
fn test_control_write_always_in_range() {
    let device = VirtualDevice::new();
    let info = device.query_control(ControlId::Brightness).unwrap();

    for value in [i32::MIN, -1000, 0, 128, 255, 1000, i32::MAX] {
        let applied = device.set_control(ControlId::Brightness, value).unwrap();
        assert!(applied >= info.minimum && applied <= info.maximum);
        assert_eq!(device.control(ControlId::Brightness).unwrap(), applied);
    }
}
