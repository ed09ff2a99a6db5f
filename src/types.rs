//! Core data types shared by sources, the detector and the consumers

use chrono::{DateTime, Local};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame geometry in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One captured frame, packed RGB8, row-major
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Arrival order within the source, starting at 0
    pub sequence: u64,
    pub captured_at: DateTime<Local>,
    pub device_id: String,
}

impl CameraFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, device_id: String) -> Self {
        Self {
            data,
            width,
            height,
            sequence: 0,
            captured_at: Local::now(),
            device_id,
        }
    }

    pub fn from_rgb_image(image: RgbImage, device_id: String) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, device_id)
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_timestamp(mut self, captured_at: DateTime<Local>) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// Buffer length matches the declared geometry
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.size().pixels() * 3
    }

    /// Borrow-free copy as an `image` buffer
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// Outcome of comparing one frame against the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Detection {
    pub motion: bool,
    pub score: u64,
    pub changed_pixels: u64,
}

impl Detection {
    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderState {
    Idle,
    Recording,
}

impl RecorderState {
    pub fn is_recording(&self) -> bool {
        matches!(self, RecorderState::Recording)
    }
}
