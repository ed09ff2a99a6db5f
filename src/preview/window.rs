//! Live preview windows through OpenCV highgui

use crate::consumer::{FrameConsumer, FrameEvent};
use crate::errors::{MotionError, Result};
use opencv::core::{Mat, Scalar, CV_8UC1, CV_8UC3};
use opencv::highgui;
use opencv::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const LIVE_WINDOW: &str = "Live";
pub const MOTION_WINDOW: &str = "Motion";

/// Milliseconds `wait_key` blocks per frame; also lets highgui repaint
const KEY_POLL_MS: i32 = 1;

/// Shows each frame in the "Live" and "Motion" windows and raises `stop`
/// when `q` is pressed
pub struct WindowPreview {
    stop: Arc<AtomicBool>,
    live: Mat,
    motion: Mat,
    frames_shown: u64,
    failures: u64,
}

impl WindowPreview {
    pub fn new(stop: Arc<AtomicBool>) -> Result<Self> {
        for name in [LIVE_WINDOW, MOTION_WINDOW] {
            highgui::named_window(name, highgui::WINDOW_AUTOSIZE).map_err(window_error)?;
        }
        log::info!("Preview windows open, press q in either to quit");

        Ok(Self {
            stop,
            live: Mat::default(),
            motion: Mat::default(),
            frames_shown: 0,
            failures: 0,
        })
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    pub fn show(&mut self, event: &FrameEvent<'_>) -> Result<()> {
        let frame = event.frame;
        let (rows, cols) = (frame.height as i32, frame.width as i32);

        reshape(&mut self.live, rows, cols, CV_8UC3)?;
        copy_rgb_as_bgr(self.live.data_bytes_mut().map_err(window_error)?, &frame.data);

        reshape(&mut self.motion, rows, cols, CV_8UC1)?;
        let mask = self.motion.data_bytes_mut().map_err(window_error)?;
        match event.mask {
            Some(m) if m.as_raw().len() == mask.len() => mask.copy_from_slice(m.as_raw()),
            _ => mask.fill(0),
        }

        highgui::imshow(LIVE_WINDOW, &self.live).map_err(window_error)?;
        highgui::imshow(MOTION_WINDOW, &self.motion).map_err(window_error)?;

        let key = highgui::wait_key(KEY_POLL_MS).map_err(window_error)?;
        if is_quit_key(key) {
            log::info!("Quit requested from preview window");
            self.stop.store(true, Ordering::Relaxed);
        }

        self.frames_shown += 1;
        Ok(())
    }
}

impl FrameConsumer for WindowPreview {
    fn name(&self) -> &str {
        "preview-window"
    }

    fn consume(&mut self, event: &FrameEvent<'_>) -> Result<()> {
        if let Err(e) = self.show(event) {
            if self.failures == 0 {
                log::warn!("Preview window update failed: {}", e);
            }
            self.failures += 1;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        highgui::destroy_all_windows().map_err(window_error)
    }
}

impl Drop for WindowPreview {
    fn drop(&mut self) {
        let _ = highgui::destroy_all_windows();
    }
}

fn reshape(mat: &mut Mat, rows: i32, cols: i32, typ: i32) -> Result<()> {
    if mat.rows() != rows || mat.cols() != cols || mat.typ() != typ {
        *mat = Mat::new_rows_cols_with_default(rows, cols, typ, Scalar::all(0.0))
            .map_err(window_error)?;
    }
    Ok(())
}

/// OpenCV stores colour images as BGR
fn copy_rgb_as_bgr(bgr: &mut [u8], rgb: &[u8]) {
    for (dst, src) in bgr.chunks_exact_mut(3).zip(rgb.chunks_exact(3)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    }
}

fn is_quit_key(key: i32) -> bool {
    key >= 0 && (key & 0xFF) as u8 == b'q'
}

fn window_error(e: opencv::Error) -> MotionError {
    MotionError::Io(format!("preview window: {}", e))
}
