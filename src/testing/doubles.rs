//! Scripted collaborators for driving the pipeline without hardware

use crate::errors::{MotionError, Result};
use crate::recording::{Segment, SegmentStats, SegmentWriter};
use crate::source::FrameSource;
use crate::types::{CameraFrame, FrameSize};
use std::cell::Cell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;

enum Step {
    Frame(CameraFrame),
    Fail(String),
}

/// Frame source that replays a fixed script, then reports end of stream
#[derive(Default)]
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    delivered: u64,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frames(frames: impl IntoIterator<Item = CameraFrame>) -> Self {
        let mut source = Self::new();
        for frame in frames {
            source = source.then(frame);
        }
        source
    }

    pub fn then(mut self, frame: CameraFrame) -> Self {
        self.steps.push_back(Step::Frame(frame));
        self
    }

    pub fn then_repeat(mut self, frame: CameraFrame, count: usize) -> Self {
        for _ in 0..count {
            self.steps.push_back(Step::Frame(frame.clone()));
        }
        self
    }

    /// The next read after the queued frames fails with `CaptureFailed`
    pub fn then_fail(mut self, reason: impl Into<String>) -> Self {
        self.steps.push_back(Step::Fail(reason.into()));
        self
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<CameraFrame>> {
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => {
                let sequence = self.delivered;
                self.delivered += 1;
                Ok(Some(frame.with_sequence(sequence)))
            }
            Some(Step::Fail(reason)) => Err(MotionError::CaptureFailed(reason)),
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        format!("scripted source ({} steps left)", self.steps.len())
    }
}

/// Wraps a writer and injects failures: refused opens or a failing write.
pub struct FlakyWriter<W: SegmentWriter> {
    inner: W,
    refuse_opens: u32,
    writes_left: Option<Rc<Cell<u64>>>,
}

impl<W: SegmentWriter> FlakyWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            refuse_opens: 0,
            writes_left: None,
        }
    }

    /// The first `count` segment opens fail with `CannotCreateFile`
    pub fn refuse_opens(mut self, count: u32) -> Self {
        self.refuse_opens = count;
        self
    }

    /// Every frame write after the first `count` (across segments) fails
    pub fn fail_after_writes(mut self, count: u64) -> Self {
        self.writes_left = Some(Rc::new(Cell::new(count)));
        self
    }
}

impl<W: SegmentWriter> SegmentWriter for FlakyWriter<W> {
    fn open_segment(&mut self, index: u32, size: FrameSize) -> Result<Box<dyn Segment>> {
        if self.refuse_opens > 0 {
            self.refuse_opens -= 1;
            return Err(MotionError::cannot_create(
                self.inner.output_directory(),
                "injected open failure",
            ));
        }
        let inner = self.inner.open_segment(index, size)?;
        Ok(Box::new(FlakySegment {
            inner,
            writes_left: self.writes_left.clone(),
        }))
    }

    fn output_directory(&self) -> &Path {
        self.inner.output_directory()
    }
}

struct FlakySegment {
    inner: Box<dyn Segment>,
    writes_left: Option<Rc<Cell<u64>>>,
}

impl Segment for FlakySegment {
    fn index(&self) -> u32 {
        self.inner.index()
    }

    fn path(&self) -> &Path {
        self.inner.path()
    }

    fn write_frame(&mut self, frame: &CameraFrame) -> Result<()> {
        if let Some(left) = &self.writes_left {
            if left.get() == 0 {
                return Err(MotionError::write_failed(self.inner.path(), "injected write failure"));
            }
            left.set(left.get() - 1);
        }
        self.inner.write_frame(frame)
    }

    fn frames_written(&self) -> u64 {
        self.inner.frames_written()
    }

    fn finish(self: Box<Self>) -> Result<SegmentStats> {
        self.inner.finish()
    }
}
