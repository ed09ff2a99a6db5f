//! Segment recorder: the consumer that turns controller decisions into files

use super::writer::{Segment, SegmentStats, SegmentWriter};
use crate::consumer::{FrameConsumer, FrameEvent};
use crate::controller::Decision;
use crate::errors::{MotionError, Result};

/// Executes [`Decision`]s against a [`SegmentWriter`].
///
/// At most one segment is open at a time. A failed write aborts the open
/// segment (finalizing what was written, best effort) and surfaces the error.
pub struct SegmentRecorder<W: SegmentWriter> {
    writer: W,
    active: Option<Box<dyn Segment>>,
    finished: Vec<SegmentStats>,
    stamped: bool,
}

impl<W: SegmentWriter> SegmentRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            active: None,
            finished: Vec::new(),
            stamped: true,
        }
    }

    /// Write overlay-stamped frames (default) or the raw captured frames
    pub fn with_stamped_frames(mut self, stamped: bool) -> Self {
        self.stamped = stamped;
        self
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_index(&self) -> Option<u32> {
        self.active.as_ref().map(|s| s.index())
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Segments finalized since the last call
    pub fn take_finished(&mut self) -> Vec<SegmentStats> {
        std::mem::take(&mut self.finished)
    }

    /// Give up on the open segment without writing further frames
    pub fn abort(&mut self) {
        if let Some(segment) = self.active.take() {
            let path = segment.path().to_path_buf();
            match segment.finish() {
                Ok(stats) => log::warn!(
                    "Recording aborted: {:?} kept with {} frames",
                    path,
                    stats.frames
                ),
                Err(e) => log::warn!("Recording aborted: {:?} could not be finalized: {}", path, e),
            }
        }
    }

    fn open(&mut self, index: u32, event: &FrameEvent<'_>) -> Result<()> {
        if let Some(stale) = self.active.take() {
            log::warn!("Segment {} still open when {} was requested", stale.index(), index);
            self.finished.push(stale.finish()?);
        }

        let segment = self.writer.open_segment(index, event.raw.size())?;
        log::info!("Recording started: {:?}", segment.path());
        self.active = Some(segment);
        self.append(index, event)
    }

    fn append(&mut self, index: u32, event: &FrameEvent<'_>) -> Result<()> {
        let segment = self.active.as_mut().ok_or_else(|| {
            MotionError::write_failed(
                self.writer.output_directory(),
                format!("no open segment for session {}", index),
            )
        })?;

        let frame = if self.stamped { event.frame } else { event.raw };
        if let Err(e) = segment.write_frame(frame) {
            self.abort();
            return Err(e);
        }
        Ok(())
    }

    fn finish_active(&mut self) -> Result<()> {
        if let Some(segment) = self.active.take() {
            let stats = segment.finish()?;
            log::info!(
                "Recording stopped: {:?} ({} frames, {} bytes)",
                stats.path,
                stats.frames,
                stats.bytes_written
            );
            self.finished.push(stats);
        }
        Ok(())
    }
}

impl<W: SegmentWriter> FrameConsumer for SegmentRecorder<W> {
    fn name(&self) -> &str {
        "recorder"
    }

    fn consume(&mut self, event: &FrameEvent<'_>) -> Result<()> {
        match event.decision {
            Decision::Discard => Ok(()),
            Decision::Open { index } => self.open(index, event),
            Decision::Append { index } => self.append(index, event),
            Decision::AppendAndClose { index } => {
                self.append(index, event)?;
                self.finish_active()
            }
            Decision::Close { .. } => self.finish_active(),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.finish_active()
    }

    fn abort(&mut self) {
        SegmentRecorder::abort(self)
    }

    fn take_finished(&mut self) -> Vec<SegmentStats> {
        SegmentRecorder::take_finished(self)
    }
}

impl<W: SegmentWriter> Drop for SegmentRecorder<W> {
    fn drop(&mut self) {
        if let Err(e) = self.finish_active() {
            log::warn!("Failed to finalize open segment on drop: {}", e);
        }
    }
}
