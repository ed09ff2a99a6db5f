//! Frame consumer capability
//!
//! Everything that reacts to processed frames (segment recording, live
//! preview) implements [`FrameConsumer`]. Headless and preview runs share the
//! same detection and decision path and differ only in the consumers attached.

use crate::controller::Decision;
use crate::errors::Result;
use crate::recording::SegmentStats;
use crate::types::{CameraFrame, Detection, RecorderState};
use image::GrayImage;

/// Everything known about one frame after detection and decision
#[derive(Debug, Clone, Copy)]
pub struct FrameEvent<'a> {
    /// Frame as it should be written or shown (overlay already applied)
    pub frame: &'a CameraFrame,
    /// Frame exactly as captured and fed to the detector
    pub raw: &'a CameraFrame,
    pub detection: Detection,
    pub decision: Decision,
    /// Controller state after the decision
    pub state: RecorderState,
    /// Binarised difference mask, absent for the first frame
    pub mask: Option<&'a GrayImage>,
}

pub trait FrameConsumer {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn consume(&mut self, event: &FrameEvent<'_>) -> Result<()>;

    /// Release resources at shutdown; must finalize anything still open
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Drop any in-progress output after a session failure, best effort
    fn abort(&mut self) {}

    /// Segments this consumer finalized since the last call
    fn take_finished(&mut self) -> Vec<SegmentStats> {
        Vec::new()
    }
}
