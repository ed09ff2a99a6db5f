//! End-to-end runs of the motion pipeline against real AVI output
//!
//! Run with: cargo test --test scenarios

use crabmotion::config::MotionConfig;
use crabmotion::errors::{MotionError, Result};
use crabmotion::recording::{inspect_avi, next_free_index, AviWriter, SegmentRecorder};
use crabmotion::source::FrameSource;
use crabmotion::testing::{frame_with_block, solid_frame, FlakyWriter, ScriptedSource};
use crabmotion::{CameraFrame, MotionPipeline, RecordingController, StopReason};
use chrono::{Local, TimeZone};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

fn still() -> CameraFrame {
    solid_frame(WIDTH, HEIGHT, 20)
}

fn burst_a() -> CameraFrame {
    frame_with_block(WIDTH, HEIGHT, 20, 235, (16, 12, 24, 24))
}

fn burst_b() -> CameraFrame {
    frame_with_block(WIDTH, HEIGHT, 20, 235, (0, 0, 20, 20))
}

fn headless_config(buffer: u32) -> MotionConfig {
    let mut config = MotionConfig::default();
    config.detection.threshold = 200 * 255;
    config.recording.buffer_frames = buffer;
    config.preview.enabled = false;
    config
}

fn run_headless<S: FrameSource>(
    source: S,
    config: &MotionConfig,
    out: &Path,
) -> Result<crabmotion::RunSummary> {
    let mut pipeline = MotionPipeline::new(source, config);
    pipeline.attach(Box::new(SegmentRecorder::new(AviWriter::new(out, 30.0))));
    pipeline.run(&AtomicBool::new(false), None)
}

fn recordings(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.starts_with("recording_"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[test]
fn identical_frames_record_nothing() {
    let dir = tempdir().unwrap();
    let source = ScriptedSource::new().then_repeat(still(), 5);

    let summary = run_headless(source, &headless_config(15), dir.path()).unwrap();

    assert_eq!(summary.frames_processed, 5);
    assert_eq!(summary.motion_frames, 0);
    assert!(summary.sessions.is_empty());
    assert!(recordings(dir.path()).is_empty());
}

#[test]
fn single_burst_records_motion_plus_buffer() {
    let dir = tempdir().unwrap();
    let source = ScriptedSource::new()
        .then(still())
        .then(burst_a())
        .then_repeat(burst_a(), 20);

    let summary = run_headless(source, &headless_config(15), dir.path()).unwrap();

    assert_eq!(summary.stop_reason, StopReason::EndOfStream);
    assert_eq!(summary.sessions.len(), 1);
    assert_eq!(summary.sessions[0].index, 0);
    assert_eq!(summary.sessions[0].frames, 16);
    assert_eq!(recordings(dir.path()), vec!["recording_0000.avi"]);

    let info = inspect_avi(&dir.path().join("recording_0000.avi")).unwrap();
    assert_eq!(info.total_frames, 16);
    assert_eq!(info.indexed_frames, 16);
    assert!(info.riff_consistent);
}

#[test]
fn separated_bursts_record_numbered_segments() {
    let dir = tempdir().unwrap();
    let source = ScriptedSource::new()
        .then(still())
        .then(burst_a())
        .then_repeat(burst_a(), 20)
        .then(burst_b())
        .then_repeat(burst_b(), 20);

    let summary = run_headless(source, &headless_config(15), dir.path()).unwrap();

    assert_eq!(summary.sessions.len(), 2);
    assert_eq!(
        recordings(dir.path()),
        vec!["recording_0000.avi", "recording_0001.avi"]
    );
    for name in ["recording_0000.avi", "recording_0001.avi"] {
        let info = inspect_avi(&dir.path().join(name)).unwrap();
        assert_eq!(info.total_frames, 16);
        assert!(info.riff_consistent);
    }
}

#[test]
fn renewed_motion_extends_the_session() {
    let dir = tempdir().unwrap();
    // motion on the burst frame and again when the scene returns to still
    let source = ScriptedSource::new()
        .then(still())
        .then(burst_a())
        .then(burst_a())
        .then(still())
        .then_repeat(still(), 20);

    let summary = run_headless(source, &headless_config(15), dir.path()).unwrap();

    assert_eq!(summary.motion_frames, 2);
    assert_eq!(summary.sessions.len(), 1);
    // burst, one quiet frame, renewed motion, then a full fresh buffer
    assert_eq!(summary.sessions[0].frames, 3 + 15);
}

/// Raises the stop flag once `after` frames have been delivered
struct InterruptingSource {
    inner: ScriptedSource,
    stop: Arc<AtomicBool>,
    after: u64,
    delivered: u64,
}

impl FrameSource for InterruptingSource {
    fn next_frame(&mut self) -> Result<Option<CameraFrame>> {
        self.delivered += 1;
        if self.delivered == self.after {
            self.stop.store(true, Ordering::Relaxed);
        }
        self.inner.next_frame()
    }

    fn describe(&self) -> String {
        "interrupting source".to_string()
    }
}

#[test]
fn interrupt_while_recording_leaves_playable_file() {
    let dir = tempdir().unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let source = InterruptingSource {
        inner: ScriptedSource::new()
            .then(still())
            .then(burst_a())
            .then_repeat(burst_a(), 100),
        stop: stop.clone(),
        after: 6,
        delivered: 0,
    };

    let mut pipeline = MotionPipeline::new(source, &headless_config(15));
    pipeline.attach(Box::new(SegmentRecorder::new(AviWriter::new(dir.path(), 30.0))));
    let summary = pipeline.run(&stop, None).unwrap();

    assert_eq!(summary.stop_reason, StopReason::Stopped);
    assert_eq!(summary.frames_processed, 6);
    assert_eq!(summary.sessions.len(), 1);

    let info = inspect_avi(&dir.path().join("recording_0000.avi")).unwrap();
    assert_eq!(info.total_frames, 5);
    assert!(info.riff_consistent);
}

#[test]
fn end_of_stream_while_recording_finalizes_segment() {
    let dir = tempdir().unwrap();
    let source = ScriptedSource::new()
        .then(still())
        .then(burst_a())
        .then_repeat(burst_a(), 3);

    let summary = run_headless(source, &headless_config(15), dir.path()).unwrap();

    assert_eq!(summary.sessions.len(), 1);
    assert_eq!(summary.sessions[0].frames, 4);
    assert!(inspect_avi(&summary.sessions[0].path).unwrap().riff_consistent);
}

#[test]
fn writer_failure_only_ends_that_session() {
    let dir = tempdir().unwrap();
    let writer = FlakyWriter::new(AviWriter::new(dir.path(), 30.0)).fail_after_writes(3);
    let source = ScriptedSource::new()
        .then(still())
        .then(burst_a())
        .then_repeat(burst_a(), 20)
        .then(burst_b())
        .then_repeat(burst_b(), 5);

    let mut pipeline = MotionPipeline::new(source, &headless_config(15));
    pipeline.attach(Box::new(SegmentRecorder::new(writer)));
    let summary = pipeline.run(&AtomicBool::new(false), None).unwrap();

    // every frame was still analysed
    assert_eq!(summary.frames_processed, 28);
    assert_eq!(summary.motion_frames, 2);
    assert_eq!(summary.session_errors, 2);

    // the broken session keeps what was written and stays playable
    let info = inspect_avi(&dir.path().join("recording_0000.avi")).unwrap();
    assert_eq!(info.total_frames, 3);
    assert!(info.riff_consistent);
    // a write failure consumes the index
    assert!(dir.path().join("recording_0001.avi").exists());
}

#[test]
fn capture_failure_is_fatal_but_closes_segment() {
    let dir = tempdir().unwrap();
    let source = ScriptedSource::new()
        .then(still())
        .then(burst_a())
        .then(burst_a())
        .then_fail("device unplugged");

    let err = run_headless(source, &headless_config(15), dir.path()).unwrap_err();
    assert!(matches!(err, MotionError::CaptureFailed(_)));
    assert!(err.is_fatal());

    let info = inspect_avi(&dir.path().join("recording_0000.avi")).unwrap();
    assert_eq!(info.total_frames, 2);
    assert!(info.riff_consistent);
}

#[test]
fn timestamp_overlay_does_not_trigger_motion() {
    let dir = tempdir().unwrap();
    let start = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let frames = (0..10i64).map(|i| {
        solid_frame(320, 240, 90).with_timestamp(start + chrono::Duration::seconds(i))
    });

    let mut config = headless_config(15);
    config.detection.threshold = 0;
    config.preview.enabled = true;
    let summary =
        run_headless(ScriptedSource::from_frames(frames), &config, dir.path()).unwrap();

    assert_eq!(summary.motion_frames, 0);
    assert!(recordings(dir.path()).is_empty());
}

#[test]
fn numbering_continues_after_existing_recordings() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("recording_0003.avi"), b"older run").unwrap();
    let start = next_free_index(dir.path());
    assert_eq!(start, 4);

    let config = headless_config(2);
    let source = ScriptedSource::new()
        .then(still())
        .then(burst_a())
        .then_repeat(burst_a(), 4);
    let mut pipeline = MotionPipeline::new(source, &config)
        .with_controller(RecordingController::with_start_index(2, start));
    pipeline.attach(Box::new(SegmentRecorder::new(AviWriter::new(dir.path(), 30.0))));
    let summary = pipeline.run(&AtomicBool::new(false), None).unwrap();

    assert_eq!(summary.sessions.len(), 1);
    assert_eq!(summary.sessions[0].index, 4);
    assert!(dir.path().join("recording_0004.avi").exists());
}
