//! MP4/H.264 segments (openh264 encoder, muxide muxer)

use super::encoder::H264Encoder;
use super::writer::{segment_path, Segment, SegmentStats, SegmentWriter};
use crate::config::SegmentContainer;
use crate::errors::{MotionError, Result};
use crate::types::{CameraFrame, FrameSize};
use muxide::api::{Metadata, MuxerBuilder, VideoCodec};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

type Mp4Muxer = muxide::api::Muxer<BufWriter<File>>;

/// Writes `recording_NNNN.mp4` files
#[derive(Debug, Clone)]
pub struct Mp4Writer {
    directory: PathBuf,
    fps: f64,
}

impl Mp4Writer {
    pub fn new(directory: impl Into<PathBuf>, fps: f64) -> Self {
        Self {
            directory: directory.into(),
            fps,
        }
    }
}

impl SegmentWriter for Mp4Writer {
    fn open_segment(&mut self, index: u32, size: FrameSize) -> Result<Box<dyn Segment>> {
        let path = segment_path(&self.directory, index, SegmentContainer::Mp4);
        fs::create_dir_all(&self.directory).map_err(|e| MotionError::cannot_create(&path, e))?;

        let encoder = H264Encoder::new(size.width, size.height)
            .map_err(|e| MotionError::cannot_create(&path, e))?;
        let file = File::create(&path).map_err(|e| MotionError::cannot_create(&path, e))?;

        let metadata = Metadata::new()
            .with_title(&format!("Motion segment {}", index))
            .with_current_time();
        let muxer = MuxerBuilder::new(BufWriter::new(file))
            .video(VideoCodec::H264, size.width, size.height, self.fps)
            .with_fast_start(true)
            .with_metadata(metadata)
            .build()
            .map_err(|e| MotionError::cannot_create(&path, e))?;

        Ok(Box::new(Mp4Segment {
            index,
            path,
            size,
            encoder,
            muxer: Some(muxer),
            frame_duration_secs: 1.0 / self.fps,
            frames: 0,
        }))
    }

    fn output_directory(&self) -> &Path {
        &self.directory
    }
}

pub struct Mp4Segment {
    index: u32,
    path: PathBuf,
    size: FrameSize,
    encoder: H264Encoder,
    /// Taken on finalize
    muxer: Option<Mp4Muxer>,
    frame_duration_secs: f64,
    frames: u64,
}

impl Mp4Segment {
    fn finalize(&mut self) -> Result<SegmentStats> {
        let muxer = self
            .muxer
            .take()
            .ok_or_else(|| MotionError::write_failed(&self.path, "segment already finalized"))?;
        let stats = muxer
            .finish_with_stats()
            .map_err(|e| MotionError::write_failed(&self.path, e))?;

        Ok(SegmentStats {
            index: self.index,
            path: self.path.clone(),
            frames: stats.video_frames,
            bytes_written: stats.bytes_written,
            duration_secs: stats.duration_secs,
        })
    }
}

impl Segment for Mp4Segment {
    fn index(&self) -> u32 {
        self.index
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(&mut self, frame: &CameraFrame) -> Result<()> {
        if frame.size() != self.size {
            return Err(MotionError::DimensionMismatch {
                expected: self.size,
                actual: frame.size(),
            });
        }

        let encoded = self
            .encoder
            .encode_rgb(&frame.data)
            .map_err(|e| MotionError::write_failed(&self.path, e))?;
        if encoded.data.is_empty() {
            // encoder skipped the frame
            return Ok(());
        }

        let pts = self.frames as f64 * self.frame_duration_secs;
        let muxer = self
            .muxer
            .as_mut()
            .ok_or_else(|| MotionError::write_failed(&self.path, "segment already finalized"))?;
        muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| MotionError::write_failed(&self.path, e))?;

        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(mut self: Box<Self>) -> Result<SegmentStats> {
        self.finalize()
    }
}

impl Drop for Mp4Segment {
    fn drop(&mut self) {
        if self.muxer.is_some() {
            if let Err(e) = self.finalize() {
                log::warn!("Failed to finalize {:?} on drop: {}", self.path, e);
            }
        }
    }
}
