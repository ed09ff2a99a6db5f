//! MP4/H.264 segment output
//!
//! Run with: cargo test --test mp4_segments --features h264

use crabmotion::config::{MotionConfig, SegmentContainer};
use crabmotion::recording::{
    writer_for, H264Encoder, Mp4Writer, Segment, SegmentRecorder, SegmentWriter,
};
use crabmotion::testing::{frame_with_block, solid_frame, synthetic_video_frame, ScriptedSource};
use crabmotion::{FrameSize, MotionPipeline};
use proptest::prelude::*;
use std::sync::atomic::AtomicBool;
use tempfile::tempdir;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// INVARIANT: encoded frames are Annex B
    #[test]
    fn encoded_frames_are_annex_b(gray_level in any::<u8>()) {
        let mut encoder = H264Encoder::new(320, 240).unwrap();
        let encoded = encoder.encode_rgb(&vec![gray_level; 320 * 240 * 3]).unwrap();
        if !encoded.data.is_empty() {
            prop_assert!(
                encoded.data.starts_with(&[0, 0, 0, 1]) || encoded.data.starts_with(&[0, 0, 1])
            );
        }
    }
}

#[test]
fn odd_dimensions_are_rejected() {
    assert!(H264Encoder::new(321, 240).is_err());
}

#[test]
fn segment_is_written_and_finalized() {
    let dir = tempdir().unwrap();
    let mut writer = Mp4Writer::new(dir.path(), 30.0);
    let mut segment = writer.open_segment(0, FrameSize::new(64, 48)).unwrap();
    for n in 0..10 {
        segment.write_frame(&synthetic_video_frame(n, 64, 48)).unwrap();
    }
    let stats = segment.finish().unwrap();

    assert_eq!(stats.path, dir.path().join("recording_0000.mp4"));
    assert!(stats.frames > 0);
    assert!(std::fs::metadata(&stats.path).unwrap().len() > 0);
}

#[test]
fn pipeline_records_mp4_when_selected() {
    let dir = tempdir().unwrap();
    let mut config = MotionConfig::default();
    config.detection.threshold = 100 * 255;
    config.recording.buffer_frames = 3;
    config.recording.container = SegmentContainer::Mp4;
    config.recording.output_directory = dir.path().to_string_lossy().into_owned();
    config.preview.enabled = false;
    config.validate().unwrap();

    let moving = frame_with_block(64, 48, 0, 255, (16, 16, 24, 24));
    let source = ScriptedSource::new()
        .then(solid_frame(64, 48, 0))
        .then_repeat(moving, 6);

    let mut pipeline = MotionPipeline::new(source, &config);
    pipeline.attach(Box::new(SegmentRecorder::new(
        writer_for(&config.recording, config.recording.playback_fps(None)).unwrap(),
    )));
    let summary = pipeline.run(&AtomicBool::new(false), None).unwrap();

    assert_eq!(summary.sessions.len(), 1);
    assert!(dir.path().join("recording_0000.mp4").exists());
}
