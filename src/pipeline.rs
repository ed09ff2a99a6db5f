//! The capture → detect → decide → consume loop
//!
//! [`MotionPipeline`] owns every piece of per-run state (reference frame,
//! active session, consumers), so independent pipelines never interfere.
//! Lifecycle: `new → process_frame* → shutdown`, or all of it via [`run`].
//!
//! [`run`]: MotionPipeline::run

use crate::config::MotionConfig;
use crate::consumer::{FrameConsumer, FrameEvent};
use crate::controller::{Decision, RecordingController};
use crate::detection::MotionDetector;
use crate::errors::{MotionError, Result};
use crate::overlay::Overlay;
use crate::recording::SegmentStats;
use crate::source::FrameSource;
use crate::types::{CameraFrame, Detection, RecorderState};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The source ran out of frames
    EndOfStream,
    /// The stop flag was raised (Ctrl-C or `q`)
    Stopped,
    /// `max_frames` were processed
    FrameLimit,
}

/// What happened during one [`MotionPipeline::run`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub motion_frames: u64,
    /// Every segment finalized during the run, in order
    pub sessions: Vec<SegmentStats>,
    pub session_errors: u64,
    pub stop_reason: StopReason,
}

/// Result of processing a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    pub detection: Detection,
    pub decision: Decision,
    pub state: RecorderState,
}

pub struct MotionPipeline<S: FrameSource> {
    source: S,
    detector: MotionDetector,
    controller: RecordingController,
    overlay: Overlay,
    consumers: Vec<Box<dyn FrameConsumer>>,
    frames_processed: u64,
    motion_frames: u64,
    session_errors: u64,
    sessions: Vec<SegmentStats>,
    shut_down: bool,
}

impl<S: FrameSource> MotionPipeline<S> {
    pub fn new(source: S, config: &MotionConfig) -> Self {
        let stamping = config.preview.enabled || config.recording.stamp_recordings;
        let overlay = if stamping {
            Overlay::new(config.preview.timestamp, config.preview.status)
        } else {
            Overlay::new(false, false)
        };

        Self {
            source,
            detector: MotionDetector::new(config.detection.clone()),
            controller: RecordingController::new(config.recording.buffer_frames),
            overlay,
            consumers: Vec::new(),
            frames_processed: 0,
            motion_frames: 0,
            session_errors: 0,
            sessions: Vec::new(),
            shut_down: false,
        }
    }

    /// Replace the controller, e.g. to continue numbering after existing files
    pub fn with_controller(mut self, controller: RecordingController) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn attach(&mut self, consumer: Box<dyn FrameConsumer>) {
        log::debug!("Attached consumer '{}'", consumer.name());
        self.consumers.push(consumer);
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn detector(&self) -> &MotionDetector {
        &self.detector
    }

    pub fn controller(&self) -> &RecordingController {
        &self.controller
    }

    /// Detect, decide and hand one frame to every consumer, in attach order.
    ///
    /// Only fatal errors are returned. A session error from a consumer aborts
    /// the open session at once; consumers later in the order then see the
    /// frame as discarded, with the standby overlay.
    pub fn process_frame(&mut self, frame: &CameraFrame) -> Result<FrameOutcome> {
        let detection = self.detector.detect(frame)?;
        let decision = self.controller.step(detection.motion);
        let state = self.controller.state();

        self.frames_processed += 1;
        if detection.motion {
            self.motion_frames += 1;
        }

        let mut decision = decision;
        let mut state = state;
        let mut stamped = self.stamp(frame, decision);
        let mut aborted = false;

        for i in 0..self.consumers.len() {
            let event = FrameEvent {
                frame: stamped.as_ref().unwrap_or(frame),
                raw: frame,
                detection,
                decision,
                state,
                mask: self.detector.last_mask(),
            };
            let Err(e) = self.consumers[i].consume(&event) else {
                continue;
            };
            if e.is_fatal() {
                return Err(e);
            }
            log::error!("Consumer '{}' failed: {}", self.consumers[i].name(), e);
            if !aborted {
                aborted = true;
                self.abort_session(&e, decision);
                decision = Decision::Discard;
                state = self.controller.state();
                stamped = self.stamp(frame, decision);
            }
        }
        self.collect_finished();

        Ok(FrameOutcome {
            detection,
            decision,
            state: self.controller.state(),
        })
    }

    fn stamp(&self, frame: &CameraFrame, decision: Decision) -> Option<CameraFrame> {
        self.overlay
            .is_enabled()
            .then(|| self.overlay.apply(frame, decision.writes_frame()))
    }

    fn abort_session(&mut self, error: &MotionError, decision: Decision) {
        self.session_errors += 1;
        // a segment that was never created gives its index back
        let reclaim = matches!(decision, Decision::Open { .. })
            && matches!(error, MotionError::CannotCreateFile { .. });
        if let Some(index) = decision.index() {
            log::error!("Recording session {} aborted: {}", index, error);
        }
        self.controller.abort_session(reclaim);
        for consumer in self.consumers.iter_mut() {
            consumer.abort();
        }
    }

    fn collect_finished(&mut self) {
        for consumer in self.consumers.iter_mut() {
            self.sessions.extend(consumer.take_finished());
        }
    }

    /// Pull frames until end of stream, `stop`, `max_frames` or a fatal error.
    ///
    /// The open segment is always finalized before this returns.
    pub fn run(&mut self, stop: &AtomicBool, max_frames: Option<u64>) -> Result<RunSummary> {
        log::info!("Watching {}", self.source.describe());

        let stop_reason = loop {
            if stop.load(Ordering::Relaxed) {
                break StopReason::Stopped;
            }
            if max_frames.is_some_and(|limit| self.frames_processed >= limit) {
                break StopReason::FrameLimit;
            }

            let step = match self.source.next_frame() {
                Ok(Some(frame)) => self.process_frame(&frame).map(Some),
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            };

            match step {
                Ok(Some(_)) => {}
                Ok(None) => break StopReason::EndOfStream,
                Err(e) => {
                    log::error!("Stopping after fatal error: {}", e);
                    self.shutdown_logged();
                    return Err(e);
                }
            }
        };

        self.shutdown_logged();
        log::info!(
            "Run finished ({:?}): {} frames, {} with motion, {} sessions",
            stop_reason,
            self.frames_processed,
            self.motion_frames,
            self.sessions.len()
        );

        Ok(RunSummary {
            frames_processed: self.frames_processed,
            motion_frames: self.motion_frames,
            sessions: self.sessions.clone(),
            session_errors: self.session_errors,
            stop_reason,
        })
    }

    fn shutdown_logged(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Shutdown incomplete: {}", e);
            self.session_errors += 1;
        }
    }

    /// Close the open session and every consumer. Safe to call twice.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        if let Some(Decision::Close { index }) = self.controller.finish() {
            log::info!("Closing session {} at shutdown", index);
        }

        let mut first_error = None;
        for consumer in self.consumers.iter_mut() {
            if let Err(e) = consumer.close() {
                log::error!("Consumer '{}' failed to close: {}", consumer.name(), e);
                first_error.get_or_insert(e);
            }
        }
        self.collect_finished();

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn sessions(&self) -> &[SegmentStats] {
        &self.sessions
    }
}

impl<S: FrameSource> Drop for MotionPipeline<S> {
    fn drop(&mut self) {
        self.shutdown_logged();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionConfig;
    use crate::recording::{AviWriter, SegmentRecorder};
    use crate::testing::{frame_with_block, solid_frame, FlakyWriter, ScriptedSource};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn config(buffer: u32) -> MotionConfig {
        let mut config = MotionConfig::default();
        config.detection.threshold = 100 * 255;
        config.recording.buffer_frames = buffer;
        config.preview.enabled = false;
        config
    }

    fn moving() -> CameraFrame {
        frame_with_block(64, 48, 0, 255, (16, 12, 24, 24))
    }

    #[test]
    fn test_idle_frames_are_discarded() {
        let mut pipeline = MotionPipeline::new(ScriptedSource::new(), &config(2));
        let outcome = pipeline.process_frame(&solid_frame(64, 48, 0)).unwrap();
        assert_eq!(outcome.decision, Decision::Discard);
        assert_eq!(outcome.state, RecorderState::Idle);
    }

    #[test]
    fn test_run_reports_summary() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::new()
            .then(solid_frame(64, 48, 0))
            .then(moving())
            .then_repeat(moving(), 5);

        let mut pipeline = MotionPipeline::new(source, &config(2));
        pipeline.attach(Box::new(SegmentRecorder::new(AviWriter::new(dir.path(), 30.0))));
        let summary = pipeline.run(&AtomicBool::new(false), None).unwrap();

        assert_eq!(summary.stop_reason, StopReason::EndOfStream);
        assert_eq!(summary.frames_processed, 7);
        assert_eq!(summary.motion_frames, 1);
        assert_eq!(summary.sessions.len(), 1);
        assert_eq!(summary.sessions[0].frames, 3);
    }

    #[test]
    fn test_stop_flag_and_frame_limit() {
        let source = ScriptedSource::new().then_repeat(solid_frame(8, 8, 0), 10);
        let mut pipeline = MotionPipeline::new(source, &config(2));
        let summary = pipeline.run(&AtomicBool::new(true), None).unwrap();
        assert_eq!(summary.stop_reason, StopReason::Stopped);
        assert_eq!(summary.frames_processed, 0);

        let source = ScriptedSource::new().then_repeat(solid_frame(8, 8, 0), 10);
        let mut pipeline = MotionPipeline::new(source, &config(2));
        let summary = pipeline.run(&AtomicBool::new(false), Some(4)).unwrap();
        assert_eq!(summary.stop_reason, StopReason::FrameLimit);
        assert_eq!(summary.frames_processed, 4);
    }

    #[test]
    fn test_open_failure_reclaims_index() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FlakyWriter::new(AviWriter::new(dir.path(), 30.0)).refuse_opens(1);
        let source = ScriptedSource::new()
            .then(solid_frame(64, 48, 0))
            .then(moving())
            .then(solid_frame(64, 48, 0))
            .then(moving());

        let mut pipeline = MotionPipeline::new(source, &config(0));
        pipeline.attach(Box::new(SegmentRecorder::new(writer)));
        let summary = pipeline.run(&AtomicBool::new(false), None).unwrap();

        assert_eq!(summary.session_errors, 1);
        // index 0 was never created, so the next session reuses it
        assert!(dir.path().join("recording_0000.avi").exists());
        assert!(!dir.path().join("recording_0001.avi").exists());
    }

    struct SeenBy(Rc<RefCell<Vec<(Decision, RecorderState)>>>);

    impl FrameConsumer for SeenBy {
        fn name(&self) -> &str {
            "seen"
        }

        fn consume(&mut self, event: &FrameEvent<'_>) -> Result<()> {
            self.0.borrow_mut().push((event.decision, event.state));
            Ok(())
        }
    }

    #[test]
    fn test_later_consumers_see_refused_open_as_discard() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FlakyWriter::new(AviWriter::new(dir.path(), 30.0)).refuse_opens(1);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let mut pipeline = MotionPipeline::new(ScriptedSource::new(), &config(0));
        pipeline.attach(Box::new(SegmentRecorder::new(writer)));
        pipeline.attach(Box::new(SeenBy(seen.clone())));

        pipeline.process_frame(&solid_frame(64, 48, 0)).unwrap();
        let outcome = pipeline.process_frame(&moving()).unwrap();

        assert_eq!(outcome.state, RecorderState::Idle);
        assert_eq!(
            seen.borrow().last(),
            Some(&(Decision::Discard, RecorderState::Idle))
        );
    }

    #[test]
    fn test_dimension_change_is_fatal() {
        let source = ScriptedSource::new()
            .then(solid_frame(64, 48, 0))
            .then(solid_frame(32, 24, 0));
        let mut pipeline = MotionPipeline::new(source, &config(2));
        let err = pipeline.run(&AtomicBool::new(false), None).unwrap_err();
        assert!(matches!(err, MotionError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut pipeline = MotionPipeline::new(ScriptedSource::new(), &config(2));
        pipeline.shutdown().unwrap();
        pipeline.shutdown().unwrap();
    }
}
