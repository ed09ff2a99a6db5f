//! Frame sources: live cameras and recorded image sequences
//!
//! The pipeline pulls frames one at a time through [`FrameSource`]. A source
//! reports end of stream with `Ok(None)`; any `Err` stops the run.

mod camera;
mod sequence;

pub use camera::CameraSource;
pub use sequence::{ImageSequenceSource, SEQUENCE_EXTENSIONS};

use crate::errors::Result;
use crate::types::CameraFrame;

pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> Result<Option<CameraFrame>>;

    /// Native frame rate, when the source knows it
    fn frame_rate(&self) -> Option<f64> {
        None
    }

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<CameraFrame>> {
        (**self).next_frame()
    }

    fn frame_rate(&self) -> Option<f64> {
        (**self).frame_rate()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
