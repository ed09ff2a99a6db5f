use super::FrameSource;
use crate::errors::{MotionError, Result};
use crate::types::{CameraFrame, FrameSize};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// File extensions picked up from a replay directory (case-insensitive)
pub const SEQUENCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Replays still images from a directory in file-name order.
///
/// Every image must share the geometry of the first one.
pub struct ImageSequenceSource {
    directory: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
    size: Option<FrameSize>,
    frame_rate: Option<f64>,
    paced: bool,
    next_due: Option<Instant>,
}

impl ImageSequenceSource {
    pub fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        let entries = fs::read_dir(&directory).map_err(|e| {
            MotionError::DeviceUnavailable(format!("Cannot read {:?}: {}", directory, e))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_sequence_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(MotionError::DeviceUnavailable(format!(
                "No images found in {:?}",
                directory
            )));
        }

        log::info!("Replaying {} images from {:?}", files.len(), directory);
        Ok(Self {
            directory,
            files,
            position: 0,
            size: None,
            frame_rate: None,
            paced: false,
            next_due: None,
        })
    }

    /// Report a nominal frame rate to downstream writers
    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    /// Release frames at the nominal frame rate, like a live camera would
    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }

    fn wait_for_slot(&mut self) {
        let Some(fps) = self.frame_rate.filter(|fps| *fps > 0.0) else {
            return;
        };
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            thread::sleep(due - now);
        }
        self.next_due = Some(due.max(now) + Duration::from_secs_f64(1.0 / fps));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_sequence_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SEQUENCE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<CameraFrame>> {
        if self.position >= self.files.len() {
            return Ok(None);
        }
        if self.paced {
            self.wait_for_slot();
        }
        let path = &self.files[self.position];

        let image = image::open(path)
            .map_err(|e| MotionError::CaptureFailed(format!("Failed to decode {:?}: {}", path, e)))?
            .to_rgb8();
        let frame = CameraFrame::from_rgb_image(image, path.display().to_string())
            .with_sequence(self.position as u64);

        match self.size {
            None => self.size = Some(frame.size()),
            Some(expected) if expected != frame.size() => {
                return Err(MotionError::DimensionMismatch {
                    expected,
                    actual: frame.size(),
                });
            }
            Some(_) => {}
        }

        self.position += 1;
        Ok(Some(frame))
    }

    fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    fn describe(&self) -> String {
        format!("image sequence {:?} ({} frames)", self.directory, self.files.len())
    }
}
