//! Preview as JPEG snapshots
//!
//! [`PreviewSink`] refreshes two images every frame: `preview_live.jpg` (the
//! stamped frame) and `preview_motion.jpg` (the binarised difference mask).
//! Each file is written to a temporary name and renamed into place so an
//! image viewer polling the directory never reads a half-written file.

use crate::consumer::{FrameConsumer, FrameEvent};
use crate::errors::{MotionError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, GrayImage};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const LIVE_FILE: &str = "preview_live.jpg";
pub const MOTION_FILE: &str = "preview_motion.jpg";

const PREVIEW_QUALITY: u8 = 75;

/// Preview consumer; snapshot failures are logged, never returned
pub struct PreviewSink {
    directory: PathBuf,
    frames_shown: u64,
    failures: u64,
}

impl PreviewSink {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| MotionError::cannot_create(&directory, e))?;
        log::info!("Preview snapshots in {:?}", directory);
        Ok(Self {
            directory,
            frames_shown: 0,
            failures: 0,
        })
    }

    pub fn live_path(&self) -> PathBuf {
        self.directory.join(LIVE_FILE)
    }

    pub fn motion_path(&self) -> PathBuf {
        self.directory.join(MOTION_FILE)
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Refresh both snapshots from `event`
    pub fn show(&mut self, event: &FrameEvent<'_>) -> Result<()> {
        let frame = event.frame;
        write_jpeg_atomic(
            &self.live_path(),
            &frame.data,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )?;

        let blank;
        let mask = match event.mask {
            Some(mask) => mask,
            None => {
                blank = GrayImage::new(frame.width, frame.height);
                &blank
            }
        };
        write_jpeg_atomic(
            &self.motion_path(),
            mask.as_raw(),
            mask.width(),
            mask.height(),
            ExtendedColorType::L8,
        )?;

        self.frames_shown += 1;
        Ok(())
    }
}

impl FrameConsumer for PreviewSink {
    fn name(&self) -> &str {
        "preview"
    }

    fn consume(&mut self, event: &FrameEvent<'_>) -> Result<()> {
        if let Err(e) = self.show(event) {
            if self.failures == 0 {
                log::warn!("Preview update failed: {}", e);
            }
            self.failures += 1;
        }
        Ok(())
    }
}

fn write_jpeg_atomic(
    path: &Path,
    data: &[u8],
    width: u32,
    height: u32,
    color: ExtendedColorType,
) -> Result<()> {
    let temp = path.with_extension("jpg.tmp");
    let file = File::create(&temp).map_err(|e| MotionError::cannot_create(&temp, e))?;
    let mut out = BufWriter::new(file);

    JpegEncoder::new_with_quality(&mut out, PREVIEW_QUALITY)
        .encode(data, width, height, color)
        .map_err(|e| MotionError::write_failed(&temp, e))?;
    out.flush().map_err(|e| MotionError::write_failed(&temp, e))?;
    drop(out);

    fs::rename(&temp, path).map_err(|e| MotionError::write_failed(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Decision;
    use crate::testing::solid_frame;
    use crate::types::{Detection, RecorderState};

    #[test]
    fn test_writes_live_and_motion_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PreviewSink::new(dir.path().join("preview")).unwrap();
        let frame = solid_frame(32, 24, 90);
        let mask = GrayImage::from_pixel(32, 24, image::Luma([255]));

        let event = FrameEvent {
            frame: &frame,
            raw: &frame,
            detection: Detection::none(),
            decision: Decision::Discard,
            state: RecorderState::Idle,
            mask: Some(&mask),
        };
        sink.consume(&event).unwrap();
        sink.consume(&FrameEvent { mask: None, ..event }).unwrap();

        assert_eq!(sink.frames_shown(), 2);
        let live = image::open(sink.live_path()).unwrap();
        assert_eq!((live.width(), live.height()), (32, 24));
        assert!(image::open(sink.motion_path()).is_ok());
        assert!(!sink.live_path().with_extension("jpg.tmp").exists());
    }

    #[test]
    fn test_failures_do_not_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let preview_dir = dir.path().join("preview");
        let mut sink = PreviewSink::new(&preview_dir).unwrap();
        std::fs::remove_dir_all(&preview_dir).unwrap();

        let frame = solid_frame(8, 8, 0);
        let event = FrameEvent {
            frame: &frame,
            raw: &frame,
            detection: Detection::none(),
            decision: Decision::Discard,
            state: RecorderState::Idle,
            mask: None,
        };
        assert!(sink.show(&event).is_err());
        sink.consume(&event).unwrap();
        assert_eq!(sink.failures(), 1);
        assert_eq!(sink.frames_shown(), 0);
    }
}
