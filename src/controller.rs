//! Recording lifecycle state machine
//!
//! The controller decides, one frame at a time, whether a frame is dropped,
//! opens a new segment, extends the open segment or closes it. It performs
//! no I/O itself: consumers carry out the returned [`Decision`].

use crate::types::RecorderState;
use serde::{Deserialize, Serialize};

/// What to do with the frame that produced a motion result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Idle and no motion: the frame is not recorded
    Discard,
    /// Open segment `index` and write the frame as its first frame
    Open { index: u32 },
    /// Write the frame to the open segment
    Append { index: u32 },
    /// Write the frame, then finalize the segment
    AppendAndClose { index: u32 },
    /// Finalize the segment without writing a frame (shutdown)
    Close { index: u32 },
}

impl Decision {
    pub fn writes_frame(&self) -> bool {
        matches!(
            self,
            Decision::Open { .. } | Decision::Append { .. } | Decision::AppendAndClose { .. }
        )
    }

    pub fn closes_segment(&self) -> bool {
        matches!(self, Decision::AppendAndClose { .. } | Decision::Close { .. })
    }

    pub fn index(&self) -> Option<u32> {
        match *self {
            Decision::Discard => None,
            Decision::Open { index }
            | Decision::Append { index }
            | Decision::AppendAndClose { index }
            | Decision::Close { index } => Some(index),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveSession {
    index: u32,
    frames_written: u64,
    countdown: u32,
}

/// Owns the single active recording session and its trailing-buffer countdown.
#[derive(Debug, Clone)]
pub struct RecordingController {
    buffer_frames: u32,
    next_index: u32,
    sessions_opened: u64,
    session: Option<ActiveSession>,
}

impl RecordingController {
    pub fn new(buffer_frames: u32) -> Self {
        Self::with_start_index(buffer_frames, 0)
    }

    /// Start numbering sessions at `start_index` instead of 0
    pub fn with_start_index(buffer_frames: u32, start_index: u32) -> Self {
        Self {
            buffer_frames,
            next_index: start_index,
            sessions_opened: 0,
            session: None,
        }
    }

    /// Advance the state machine by one frame.
    pub fn step(&mut self, motion: bool) -> Decision {
        let buffer_frames = self.buffer_frames;

        let Some(session) = self.session.as_mut() else {
            if !motion {
                return Decision::Discard;
            }
            let index = self.next_index;
            self.next_index = self.next_index.saturating_add(1);
            self.sessions_opened += 1;
            self.session = Some(ActiveSession {
                index,
                frames_written: 1,
                countdown: buffer_frames,
            });
            log::debug!("session {} opened (countdown {})", index, buffer_frames);
            return Decision::Open { index };
        };

        session.frames_written += 1;
        let index = session.index;

        if motion {
            // motion restarts the grace period, it never accumulates
            session.countdown = buffer_frames;
            return Decision::Append { index };
        }

        session.countdown = session.countdown.saturating_sub(1);
        if session.countdown == 0 {
            log::debug!(
                "session {} closing after {} frames",
                index,
                session.frames_written
            );
            self.session = None;
            Decision::AppendAndClose { index }
        } else {
            Decision::Append { index }
        }
    }

    /// Close the open session at end of run, if any
    pub fn finish(&mut self) -> Option<Decision> {
        self.session
            .take()
            .map(|session| Decision::Close { index: session.index })
    }

    /// Drop the open session after a writer failure and return to idle.
    ///
    /// With `reclaim_index` the session's index is handed to the next session
    /// (used when the segment file was never created).
    pub fn abort_session(&mut self, reclaim_index: bool) {
        if let Some(session) = self.session.take() {
            log::debug!("session {} aborted", session.index);
            if reclaim_index && session.index.saturating_add(1) == self.next_index {
                self.next_index = session.index;
                self.sessions_opened = self.sessions_opened.saturating_sub(1);
            }
        }
    }

    pub fn state(&self) -> RecorderState {
        if self.session.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    /// Remaining trailing frames before the open session closes
    pub fn countdown(&self) -> Option<u32> {
        self.session.map(|s| s.countdown)
    }

    pub fn active_index(&self) -> Option<u32> {
        self.session.map(|s| s.index)
    }

    pub fn frames_in_session(&self) -> Option<u64> {
        self.session.map(|s| s.frames_written)
    }

    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened
    }

    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    pub fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }
}
