//! Motion-JPEG AVI segments
//!
//! Layout written (RIFF AVI 1.0):
//! ```text
//! RIFF 'AVI '
//!   LIST 'hdrl'
//!     avih
//!     LIST 'strl'
//!       strh ('vids' / 'MJPG')
//!       strf (BITMAPINFOHEADER)
//!   LIST 'movi'
//!     00dc <jpeg> ...
//!   idx1
//! ```
//! The header block has a fixed size. It is written with zero counts when the
//! segment opens and rewritten with the final counts on finish.
//!
//! RIFF sizes and idx1 offsets are 32-bit, so a segment never grows past
//! [`MAX_SEGMENT_BYTES`]. The frame that would cross the limit is refused with
//! `WriteFailed` and the file written so far stays playable.

use super::writer::{segment_path, Segment, SegmentStats, SegmentWriter};
use crate::config::SegmentContainer;
use crate::errors::{MotionError, Result};
use crate::types::{CameraFrame, FrameSize};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;
const FRAME_CHUNK_ID: &[u8; 4] = b"00dc";

/// Largest file an AVI 1.0 segment may grow to, idx1 included
pub const MAX_SEGMENT_BYTES: u64 = 1 << 30;

/// Bytes before the first frame chunk
const HEADER_LEN: u64 = 224;
/// File offset of the 'movi' fourcc; idx1 offsets are relative to it
const MOVI_FOURCC_OFFSET: u64 = HEADER_LEN - 4;

/// Writes `recording_NNNN.avi` files with Motion-JPEG video
#[derive(Debug, Clone)]
pub struct AviWriter {
    directory: PathBuf,
    fps: f64,
    jpeg_quality: u8,
    max_bytes: u64,
}

impl AviWriter {
    pub fn new(directory: impl Into<PathBuf>, fps: f64) -> Self {
        Self {
            directory: directory.into(),
            fps,
            jpeg_quality: 85,
            max_bytes: MAX_SEGMENT_BYTES,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Lower the per-segment size limit (never above [`MAX_SEGMENT_BYTES`])
    pub fn with_max_segment_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes.clamp(HEADER_LEN + 8, MAX_SEGMENT_BYTES);
        self
    }

    fn open_avi(&self, index: u32, size: FrameSize) -> Result<AviSegment> {
        let path = segment_path(&self.directory, index, SegmentContainer::Avi);
        fs::create_dir_all(&self.directory).map_err(|e| MotionError::cannot_create(&path, e))?;
        let file = File::create(&path).map_err(|e| MotionError::cannot_create(&path, e))?;

        let mut segment = AviSegment {
            index,
            path,
            out: BufWriter::new(file),
            size,
            fps: self.fps,
            jpeg_quality: self.jpeg_quality,
            max_bytes: self.max_bytes,
            index_entries: Vec::new(),
            position: 0,
            largest_chunk: 0,
            jpeg_buffer: Vec::new(),
            finished: false,
        };
        segment
            .write_header()
            .map_err(|e| MotionError::cannot_create(&segment.path, e))?;
        Ok(segment)
    }
}

impl SegmentWriter for AviWriter {
    fn open_segment(&mut self, index: u32, size: FrameSize) -> Result<Box<dyn Segment>> {
        Ok(Box::new(self.open_avi(index, size)?))
    }

    fn output_directory(&self) -> &Path {
        &self.directory
    }
}

struct IndexEntry {
    offset: u32,
    size: u32,
}

pub struct AviSegment {
    index: u32,
    path: PathBuf,
    out: BufWriter<File>,
    size: FrameSize,
    fps: f64,
    jpeg_quality: u8,
    max_bytes: u64,
    index_entries: Vec<IndexEntry>,
    /// End of the last complete chunk
    position: u64,
    largest_chunk: u32,
    jpeg_buffer: Vec<u8>,
    finished: bool,
}

impl AviSegment {
    fn write_header(&mut self) -> std::io::Result<()> {
        let header = header_bytes(
            self.size,
            self.fps,
            self.index_entries.len() as u32,
            self.largest_chunk,
            self.movi_payload_len(),
            self.riff_len(),
        );
        self.out.write_all(&header)?;
        self.position = self.position.max(header.len() as u64);
        Ok(())
    }

    /// Size field of LIST 'movi': the fourcc plus every chunk
    fn movi_payload_len(&self) -> u32 {
        (self.position.max(HEADER_LEN) - MOVI_FOURCC_OFFSET) as u32
    }

    /// Size field of the RIFF chunk once idx1 is appended
    fn riff_len(&self) -> u32 {
        let idx1 = 8 + 16 * self.index_entries.len() as u64;
        (self.position.max(HEADER_LEN) + idx1 - 8) as u32
    }

    fn encode_jpeg(&mut self, frame: &CameraFrame) -> Result<()> {
        self.jpeg_buffer.clear();
        let mut encoder = JpegEncoder::new_with_quality(&mut self.jpeg_buffer, self.jpeg_quality);
        encoder
            .encode(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)
            .map_err(|e| MotionError::write_failed(&self.path, format!("JPEG encoding: {}", e)))
    }

    /// File length once the pending JPEG chunk and its idx1 entry are added
    fn length_with_pending_chunk(&self) -> u64 {
        let chunk = 8 + self.jpeg_buffer.len() as u64 + self.jpeg_buffer.len() as u64 % 2;
        let idx1 = 8 + 16 * (self.index_entries.len() as u64 + 1);
        self.position.max(HEADER_LEN) + chunk + idx1
    }

    fn append_chunk(&mut self) -> std::io::Result<()> {
        let len = self.jpeg_buffer.len() as u32;
        let offset = (self.position - MOVI_FOURCC_OFFSET) as u32;

        self.out.write_all(FRAME_CHUNK_ID)?;
        self.out.write_all(&len.to_le_bytes())?;
        self.out.write_all(&self.jpeg_buffer)?;
        let mut written = 8 + len as u64;
        if len % 2 == 1 {
            self.out.write_all(&[0])?;
            written += 1;
        }

        self.position += written;
        self.largest_chunk = self.largest_chunk.max(len);
        self.index_entries.push(IndexEntry { offset, size: len });
        Ok(())
    }

    fn finalize(&mut self) -> std::io::Result<u64> {
        if self.finished {
            return Ok(self.position);
        }
        self.finished = true;

        // drop whatever a failed append left after the last complete chunk
        self.position = self.position.max(HEADER_LEN);
        self.out.seek(SeekFrom::Start(self.position))?;

        let mut idx1 = Vec::with_capacity(8 + 16 * self.index_entries.len());
        idx1.extend_from_slice(b"idx1");
        idx1.extend_from_slice(&((16 * self.index_entries.len()) as u32).to_le_bytes());
        for entry in &self.index_entries {
            idx1.extend_from_slice(FRAME_CHUNK_ID);
            idx1.extend_from_slice(&AVIIF_KEYFRAME.to_le_bytes());
            idx1.extend_from_slice(&entry.offset.to_le_bytes());
            idx1.extend_from_slice(&entry.size.to_le_bytes());
        }
        self.out.write_all(&idx1)?;
        let file_len = self.position + idx1.len() as u64;

        let header = header_bytes(
            self.size,
            self.fps,
            self.index_entries.len() as u32,
            self.largest_chunk,
            self.movi_payload_len(),
            self.riff_len(),
        );
        self.out.seek(SeekFrom::Start(0))?;
        self.out.write_all(&header)?;
        self.out.flush()?;
        self.out.get_ref().set_len(file_len)?;
        self.out.get_ref().sync_all()?;

        self.position = file_len;
        Ok(file_len)
    }
}

impl Segment for AviSegment {
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
        if self.finished {
            return Err(MotionError::write_failed(&self.path, "segment already finalized"));
        }

        self.encode_jpeg(frame)?;
        if self.length_with_pending_chunk() > self.max_bytes {
            return Err(MotionError::write_failed(
                &self.path,
                format!("segment would exceed {} bytes", self.max_bytes),
            ));
        }
        self.append_chunk()
            .map_err(|e| MotionError::write_failed(&self.path, e))
    }

    fn frames_written(&self) -> u64 {
        self.index_entries.len() as u64
    }

    fn finish(mut self: Box<Self>) -> Result<SegmentStats> {
        let bytes_written = self
            .finalize()
            .map_err(|e| MotionError::write_failed(&self.path, e))?;
        let frames = self.frames_written();

        Ok(SegmentStats {
            index: self.index,
            path: self.path.clone(),
            frames,
            bytes_written,
            duration_secs: frames as f64 / self.fps,
        })
    }
}

impl Drop for AviSegment {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.finalize() {
                log::warn!("Failed to finalize {:?} on drop: {}", self.path, e);
            }
        }
    }
}

fn header_bytes(
    size: FrameSize,
    fps: f64,
    total_frames: u32,
    largest_chunk: u32,
    movi_len: u32,
    riff_len: u32,
) -> Vec<u8> {
    let mut h = Vec::with_capacity(HEADER_LEN as usize);
    let (width, height) = (size.width, size.height);
    let rate = (fps * 1000.0).round().max(1.0) as u32;
    let micros_per_frame = (1_000_000.0 / fps).round() as u32;
    let max_bytes_per_sec = (largest_chunk as f64 * fps).ceil() as u32;

    let put = |h: &mut Vec<u8>, v: u32| h.extend_from_slice(&v.to_le_bytes());

    h.extend_from_slice(b"RIFF");
    put(&mut h, riff_len);
    h.extend_from_slice(b"AVI ");

    h.extend_from_slice(b"LIST");
    put(&mut h, 192);
    h.extend_from_slice(b"hdrl");

    h.extend_from_slice(b"avih");
    put(&mut h, 56);
    put(&mut h, micros_per_frame);
    put(&mut h, max_bytes_per_sec);
    put(&mut h, 0); // padding granularity
    put(&mut h, AVIF_HASINDEX);
    put(&mut h, total_frames);
    put(&mut h, 0); // initial frames
    put(&mut h, 1); // streams
    put(&mut h, largest_chunk);
    put(&mut h, width);
    put(&mut h, height);
    for _ in 0..4 {
        put(&mut h, 0);
    }

    h.extend_from_slice(b"LIST");
    put(&mut h, 116);
    h.extend_from_slice(b"strl");

    h.extend_from_slice(b"strh");
    put(&mut h, 56);
    h.extend_from_slice(b"vids");
    h.extend_from_slice(b"MJPG");
    put(&mut h, 0); // flags
    put(&mut h, 0); // priority + language
    put(&mut h, 0); // initial frames
    put(&mut h, 1000); // scale
    put(&mut h, rate);
    put(&mut h, 0); // start
    put(&mut h, total_frames);
    put(&mut h, largest_chunk);
    put(&mut h, u32::MAX); // quality: driver default
    put(&mut h, 0); // sample size
    h.extend_from_slice(&0u16.to_le_bytes());
    h.extend_from_slice(&0u16.to_le_bytes());
    h.extend_from_slice(&(width.min(u16::MAX as u32) as u16).to_le_bytes());
    h.extend_from_slice(&(height.min(u16::MAX as u32) as u16).to_le_bytes());

    h.extend_from_slice(b"strf");
    put(&mut h, 40);
    put(&mut h, 40);
    put(&mut h, width);
    put(&mut h, height);
    h.extend_from_slice(&1u16.to_le_bytes()); // planes
    h.extend_from_slice(&24u16.to_le_bytes()); // bit count
    h.extend_from_slice(b"MJPG");
    put(&mut h, width * height * 3);
    for _ in 0..4 {
        put(&mut h, 0);
    }

    h.extend_from_slice(b"LIST");
    put(&mut h, movi_len);
    h.extend_from_slice(b"movi");

    debug_assert_eq!(h.len() as u64, HEADER_LEN);
    h
}

/// Summary of a finalized AVI segment, read back from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AviInfo {
    pub size: FrameSize,
    /// Frame count declared in the main header
    pub total_frames: u32,
    /// Entries in the idx1 index
    pub indexed_frames: u32,
    /// RIFF size field agrees with the file length
    pub riff_consistent: bool,
}

/// Read back the headers of an AVI written by [`AviWriter`]
pub fn inspect_avi(path: &Path) -> Result<AviInfo> {
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .map_err(|e| MotionError::Io(format!("{:?}: {}", path, e)))?;

    let invalid = |what: &str| MotionError::Io(format!("{:?}: not a finalized AVI ({})", path, what));
    if bytes.len() < HEADER_LEN as usize || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"AVI " {
        return Err(invalid("missing RIFF header"));
    }

    let u32_at = |offset: usize| u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]);

    let riff_len = u32_at(4) as usize;
    let total_frames = u32_at(48);
    let width = u32_at(64);
    let height = u32_at(68);
    let movi_len = u32_at(216) as usize;

    let idx1_at = MOVI_FOURCC_OFFSET as usize + movi_len;
    if bytes.len() < idx1_at + 8 || &bytes[idx1_at..idx1_at + 4] != b"idx1" {
        return Err(invalid("missing idx1"));
    }
    let indexed_frames = u32_at(idx1_at + 4) / 16;

    Ok(AviInfo {
        size: FrameSize::new(width, height),
        total_frames,
        indexed_frames,
        riff_consistent: riff_len + 8 == bytes.len(),
    })
}
