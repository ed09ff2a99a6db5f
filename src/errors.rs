use crate::types::FrameSize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the capture, detection and recording stages.
///
/// Session-level failures (`CannotCreateFile`, `WriteFailed`) only end the
/// recording they belong to. Everything else stops the run.
#[derive(Debug, Error)]
pub enum MotionError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Cannot create segment {path:?}: {reason}")]
    CannotCreateFile { path: PathBuf, reason: String },

    #[error("Write to segment {path:?} failed: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("Frame size changed mid-stream: expected {expected}, got {actual}")]
    DimensionMismatch { expected: FrameSize, actual: FrameSize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl MotionError {
    pub fn cannot_create(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MotionError::CannotCreateFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MotionError::WriteFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that are isolated to one recording session.
    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            MotionError::CannotCreateFile { .. } | MotionError::WriteFailed { .. }
        )
    }

    /// True for failures that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        !self.is_session_error()
    }
}

impl From<std::io::Error> for MotionError {
    fn from(e: std::io::Error) -> Self {
        MotionError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MotionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors_are_not_fatal() {
        let create = MotionError::cannot_create("out/recording_0000.avi", "disk full");
        let write = MotionError::write_failed("out/recording_0000.avi", "disk full");
        assert!(create.is_session_error());
        assert!(write.is_session_error());
        assert!(!create.is_fatal());
        assert!(!write.is_fatal());
    }

    #[test]
    fn test_device_errors_are_fatal() {
        let errors = vec![
            MotionError::DeviceUnavailable("camera 0".to_string()),
            MotionError::CaptureFailed("disconnected".to_string()),
            MotionError::DimensionMismatch {
                expected: FrameSize::new(640, 480),
                actual: FrameSize::new(320, 240),
            },
            MotionError::InvalidConfig("bad".to_string()),
        ];
        for error in errors {
            assert!(error.is_fatal(), "{error} should be fatal");
        }
    }

    #[test]
    fn test_display_messages() {
        let error = MotionError::DimensionMismatch {
            expected: FrameSize::new(640, 480),
            actual: FrameSize::new(320, 240),
        };
        assert_eq!(
            error.to_string(),
            "Frame size changed mid-stream: expected 640x480, got 320x240"
        );

        let error = MotionError::DeviceUnavailable("camera 3".to_string());
        assert_eq!(error.to_string(), "Camera unavailable: camera 3");
    }
}
