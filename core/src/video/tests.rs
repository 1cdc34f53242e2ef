use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;

use super::double_buffer::FrameDoubleBuffer;
use super::fanout::{FrameFanout, FrameSink};
use crate::core::{EmulatorCore, FrameFormat};
use crate::error::ConfigError;
use crate::test_utils::ScriptedCore;

fn small_format() -> FrameFormat {
    FrameFormat::new(4, 3)
}

#[test]
fn rejects_zero_dimensions_and_short_stride() {
    assert!(matches!(
        FrameDoubleBuffer::new(FrameFormat::new(0, 3)),
        Err(ConfigError::ZeroFrameDimensions { .. })
    ));
    assert!(matches!(
        FrameDoubleBuffer::new(FrameFormat::with_stride(4, 3, 8)),
        Err(ConfigError::StrideTooSmall { .. })
    ));
}

#[test]
fn writable_slot_is_never_the_ready_slot() {
    let buffer = FrameDoubleBuffer::new(small_format()).unwrap();
    for _ in 0..5 {
        let ready = buffer.latest().slot();
        let guard = buffer.acquire_writable().unwrap();
        assert_ne!(guard.slot(), ready);
        guard.commit().unwrap();
    }
}

#[test]
fn commit_makes_the_written_slot_readable() {
    let buffer = FrameDoubleBuffer::new(small_format()).unwrap();
    let mut guard = buffer.acquire_writable().unwrap();
    let slot = guard.slot();
    guard.frame_mut().pixels_mut().fill(0xAB);
    let meta = guard.commit().unwrap();
    assert_eq!(meta.slot, slot);
    assert_eq!(meta.generation, 1);

    let frame = buffer.latest();
    assert_eq!(frame.slot(), slot);
    assert!(frame.pixels().iter().all(|&b| b == 0xAB));
    assert_eq!(frame.generation(), 1);
}

#[test]
fn generations_increase_monotonically() {
    let buffer = FrameDoubleBuffer::new(small_format()).unwrap();
    for expected in 1..=10u64 {
        let guard = buffer.acquire_writable().unwrap();
        let meta = guard.commit().unwrap();
        assert_eq!(meta.generation, expected);
        assert_eq!(buffer.generation(), expected);
    }
}

#[test]
fn dropping_the_guard_without_commit_keeps_the_old_frame() {
    let buffer = FrameDoubleBuffer::new(small_format()).unwrap();
    let mut guard = buffer.acquire_writable().unwrap();
    guard.frame_mut().pixels_mut().fill(0x11);
    guard.commit().unwrap();

    let mut abandoned = buffer.acquire_writable().unwrap();
    abandoned.frame_mut().pixels_mut().fill(0x22);
    drop(abandoned);

    assert!(buffer.latest().pixels().iter().all(|&b| b == 0x11));
    assert_eq!(buffer.generation(), 1);
}

#[test]
fn only_one_write_guard_at_a_time() {
    let buffer = FrameDoubleBuffer::new(small_format()).unwrap();
    let first = buffer.acquire_writable().unwrap();
    assert!(buffer.acquire_writable().is_none());
    drop(first);
    assert!(buffer.acquire_writable().is_some());
}

#[test]
fn retire_refuses_new_writes_and_voids_inflight_commits() {
    let buffer = FrameDoubleBuffer::new(small_format()).unwrap();
    let guard = buffer.acquire_writable().unwrap();
    buffer.retire();
    assert!(guard.commit().is_none());
    assert!(buffer.acquire_writable().is_none());
    // Reads still work against whatever was last committed.
    assert_eq!(buffer.latest().generation(), 0);
}

/// A reader hammering `latest()` while the writer commits frames filled with
/// a single byte value must never observe a torn (mixed-byte) frame.
#[test]
fn concurrent_reader_never_sees_a_torn_frame() {
    let format = FrameFormat::new(32, 32);
    let buffer = FrameDoubleBuffer::new(format).unwrap();
    let reader_buffer = buffer.clone();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let reader = thread::spawn(move || {
        let mut last_generation = 0u64;
        while done_rx.try_recv().is_err() {
            let frame = reader_buffer.latest();
            let pixels = frame.pixels();
            let first = pixels[0];
            assert!(
                pixels.iter().all(|&b| b == first),
                "torn frame at generation {}",
                frame.generation()
            );
            assert!(frame.generation() >= last_generation, "generation went backwards");
            last_generation = frame.generation();
        }
    });

    for i in 0..2000u64 {
        let mut guard = loop {
            // The only contention is our own reader holding the slot.
            match buffer.acquire_writable() {
                Some(guard) => break guard,
                None => thread::yield_now(),
            }
        };
        guard.frame_mut().pixels_mut().fill((i % 251) as u8);
        guard.commit().unwrap();
    }

    done_tx.send(()).unwrap();
    reader.join().unwrap();
}

#[test]
fn fanout_publishes_to_every_registered_sink() {
    let mut core = ScriptedCore::new(4, 3);
    let fanout = FrameFanout::new();

    let sink_a = FrameSink::new(FrameDoubleBuffer::new(core.frame_format()).unwrap());
    let sink_b = FrameSink::new(FrameDoubleBuffer::new(core.frame_format()).unwrap());
    fanout.register(&sink_a);
    fanout.register(&sink_b);

    core.step_frame(&[0; 4]).unwrap();
    assert_eq!(fanout.publish(&core), 2);

    let expected = core.fill_byte();
    for sink in [&sink_a, &sink_b] {
        let frame = sink.buffer().latest();
        assert_eq!(frame.generation(), 1);
        assert!(frame.pixels().iter().all(|&b| b == expected));
    }
}

#[test]
fn fanout_notify_receives_commit_metadata() {
    let core = ScriptedCore::new(4, 3);
    let fanout = FrameFanout::new();
    let seen = Arc::new(AtomicU64::new(0));

    let seen_in_notify = seen.clone();
    let sink = FrameSink::with_notify(
        FrameDoubleBuffer::new(core.frame_format()).unwrap(),
        move |meta| {
            assert_eq!(meta.width, 4);
            assert_eq!(meta.height, 3);
            seen_in_notify.store(meta.generation, Ordering::SeqCst);
        },
    );
    fanout.register(&sink);

    fanout.publish(&core);
    fanout.publish(&core);
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn unregistered_sink_stops_receiving() {
    let core = ScriptedCore::new(4, 3);
    let fanout = FrameFanout::new();
    let sink = FrameSink::new(FrameDoubleBuffer::new(core.frame_format()).unwrap());
    let id = fanout.register(&sink);

    assert_eq!(fanout.publish(&core), 1);
    fanout.unregister(id);
    assert_eq!(fanout.publish(&core), 0);
    assert_eq!(sink.buffer().generation(), 1);
}

#[test]
fn dropped_sink_is_pruned_without_unregister() {
    let core = ScriptedCore::new(4, 3);
    let fanout = FrameFanout::new();
    let sink = FrameSink::new(FrameDoubleBuffer::new(core.frame_format()).unwrap());
    fanout.register(&sink);
    assert_eq!(fanout.consumer_count(), 1);

    drop(sink);
    assert_eq!(fanout.publish(&core), 0);
    assert_eq!(fanout.consumer_count(), 0);
}

#[test]
fn publish_with_no_consumers_is_a_noop() {
    let core = ScriptedCore::new(4, 3);
    let fanout = FrameFanout::new();
    assert_eq!(fanout.publish(&core), 0);
}

#[test]
fn copy_honors_destination_stride() {
    let mut core = ScriptedCore::new(4, 3);
    core.step_frame(&[0; 4]).unwrap();
    // Destination rows padded by 8 bytes beyond the pixel data.
    let format = FrameFormat::with_stride(4, 3, 4 * 4 + 8);
    let buffer = FrameDoubleBuffer::new(format).unwrap();
    let mut guard = buffer.acquire_writable().unwrap();
    {
        let frame = guard.frame_mut();
        core.copy_frame(frame.pixels_mut(), format.stride);
    }
    guard.commit().unwrap();

    let expected = core.fill_byte();
    let frame = buffer.latest();
    for row in frame.pixels().chunks(format.stride) {
        assert!(row[..16].iter().all(|&b| b == expected));
        assert!(row[16..].iter().all(|&b| b == 0));
    }
}
