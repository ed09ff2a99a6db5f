//! Segment recording for CrabMotion
//!
//! Each recording session becomes one file in the output directory, named
//! `recording_{index:04}.avi` (or `.mp4` with the `h264` feature):
//! - [`AviWriter`] writes Motion-JPEG AVI using the `image` JPEG encoder
//! - `Mp4Writer` encodes H.264 with openh264 and muxes with muxide
//!
//! # Example
//! ```rust,ignore
//! use crabmotion::recording::{AviWriter, SegmentRecorder};
//!
//! let recorder = SegmentRecorder::new(AviWriter::new("output_files", 30.0));
//! pipeline.attach(Box::new(recorder));
//! ```

mod avi;
#[cfg(feature = "h264")]
mod encoder;
#[cfg(feature = "h264")]
mod mp4;
mod recorder;
mod writer;

pub use avi::{inspect_avi, AviInfo, AviSegment, AviWriter};
#[cfg(feature = "h264")]
pub use encoder::{EncodedFrame, H264Encoder};
#[cfg(feature = "h264")]
pub use mp4::{Mp4Segment, Mp4Writer};
pub use recorder::SegmentRecorder;
pub use writer::{
    next_free_index, segment_file_name, segment_path, Segment, SegmentStats, SegmentWriter,
};

use crate::config::{RecordingConfig, SegmentContainer};
use crate::errors::{MotionError, Result};

/// Build the writer selected by `config.container`, stamping `fps` into
/// segment headers
pub fn writer_for(config: &RecordingConfig, fps: f64) -> Result<Box<dyn SegmentWriter>> {
    match config.container {
        SegmentContainer::Avi => Ok(Box::new(
            AviWriter::new(&config.output_directory, fps)
                .with_jpeg_quality(config.jpeg_quality),
        )),
        #[cfg(feature = "h264")]
        SegmentContainer::Mp4 => Ok(Box::new(Mp4Writer::new(
            &config.output_directory,
            fps,
        ))),
        #[cfg(not(feature = "h264"))]
        SegmentContainer::Mp4 => Err(MotionError::InvalidConfig(
            "MP4 segments require the `h264` feature".to_string(),
        )),
    }
}
