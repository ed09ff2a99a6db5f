//! Segment writer traits and output naming

use crate::config::SegmentContainer;
use crate::errors::Result;
use crate::types::{CameraFrame, FrameSize};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SEGMENT_PREFIX: &str = "recording_";

/// Creates one output file per recording session
pub trait SegmentWriter {
    /// Create segment `index` inside the output directory (created if absent)
    fn open_segment(&mut self, index: u32, size: FrameSize) -> Result<Box<dyn Segment>>;

    fn output_directory(&self) -> &Path;
}

impl<W: SegmentWriter + ?Sized> SegmentWriter for Box<W> {
    fn open_segment(&mut self, index: u32, size: FrameSize) -> Result<Box<dyn Segment>> {
        (**self).open_segment(index, size)
    }

    fn output_directory(&self) -> &Path {
        (**self).output_directory()
    }
}

/// An open output file
pub trait Segment {
    fn index(&self) -> u32;

    fn path(&self) -> &Path;

    fn write_frame(&mut self, frame: &CameraFrame) -> Result<()>;

    fn frames_written(&self) -> u64;

    /// Flush and finalize the container so the file is playable
    fn finish(self: Box<Self>) -> Result<SegmentStats>;
}

/// Statistics returned after a segment is finalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub index: u32,
    pub path: PathBuf,
    pub frames: u64,
    pub bytes_written: u64,
    pub duration_secs: f64,
}

/// `recording_0007.avi` style file name for a segment index
pub fn segment_file_name(index: u32, container: SegmentContainer) -> String {
    format!("{}{:04}.{}", SEGMENT_PREFIX, index, container.extension())
}

pub fn segment_path(dir: &Path, index: u32, container: SegmentContainer) -> PathBuf {
    dir.join(segment_file_name(index, container))
}

/// First index after every `recording_NNNN.*` segment already in `dir`.
///
/// A missing directory yields 0.
pub fn next_free_index(dir: &Path) -> u32 {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    entries
        .flatten()
        .filter_map(|entry| parse_segment_index(&entry.file_name().to_string_lossy()))
        .max()
        .map(|highest| highest.saturating_add(1))
        .unwrap_or(0)
}

fn parse_segment_index(file_name: &str) -> Option<u32> {
    let rest = file_name.strip_prefix(SEGMENT_PREFIX)?;
    let (digits, extension) = rest.split_once('.')?;
    if !matches!(extension, "avi" | "mp4") || digits.is_empty() {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
