//! CrabMotion: motion-triggered camera recording
//!
//! Frames are pulled one at a time from a [`FrameSource`], compared against a
//! blurred grayscale reference by the [`MotionDetector`], and fed through the
//! [`RecordingController`] state machine, which decides when a segment opens,
//! keeps recording through a trailing buffer, and closes. Attached
//! [`FrameConsumer`]s (the segment recorder and the optional preview) act on
//! those decisions.
//!
//! # Features
//! - Sliding-frame or accumulating-background differencing
//! - One `recording_NNNN.avi` (Motion-JPEG) file per motion event
//! - Live capture via nokhwa (`camera` feature), replay from image folders
//! - MP4/H.264 segments (`h264` feature)
//! - "Live" and "Motion" preview windows via OpenCV (`preview` feature)
//!
//! # Usage
//! ```rust,ignore
//! use crabmotion::{MotionConfig, MotionPipeline, SegmentRecorder, AviWriter};
//! use crabmotion::source::ImageSequenceSource;
//! use std::sync::atomic::AtomicBool;
//!
//! let config = MotionConfig::default();
//! let source = ImageSequenceSource::open("frames/")?;
//! let mut pipeline = MotionPipeline::new(source, &config);
//! pipeline.attach(Box::new(SegmentRecorder::new(AviWriter::new("output_files", 30.0))));
//! let summary = pipeline.run(&AtomicBool::new(false), None)?;
//! ```
pub mod config;
pub mod consumer;
pub mod controller;
pub mod detection;
pub mod errors;
pub mod overlay;
pub mod pipeline;
pub mod preview;
pub mod recording;
pub mod source;
pub mod types;

// Testing utilities - synthetic frames and scripted collaborators
pub mod testing;

// Re-exports for convenience
pub use config::MotionConfig;
pub use consumer::{FrameConsumer, FrameEvent};
pub use controller::{Decision, RecordingController};
pub use detection::MotionDetector;
pub use errors::{MotionError, Result};
pub use overlay::Overlay;
pub use pipeline::{MotionPipeline, RunSummary, StopReason};
pub use preview::PreviewSink;
pub use recording::{AviWriter, SegmentRecorder, SegmentStats, SegmentWriter};
pub use source::FrameSource;
pub use types::{CameraFrame, Detection, FrameSize, RecorderState};

/// Initialize logging; defaults to `RUST_LOG=crabmotion=info`
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabmotion=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        camera_support: cfg!(feature = "camera"),
        h264_support: cfg!(feature = "h264"),
        preview_window_support: cfg!(feature = "preview"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub camera_support: bool,
    pub h264_support: bool,
    pub preview_window_support: bool,
}
