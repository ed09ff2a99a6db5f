//! H.264 encoder wrapper using openh264

use crate::errors::{MotionError, Result};
use openh264::encoder::{Encoder, FrameType};
use openh264::formats::YUVBuffer;

/// H.264 encoder for one MP4 segment
pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl H264Encoder {
    /// Dimensions must be even for 4:2:0 chroma subsampling
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(MotionError::InvalidConfig(format!(
                "H.264 needs even, non-zero dimensions, got {}x{}",
                width, height
            )));
        }

        let encoder = Encoder::new()
            .map_err(|e| MotionError::Io(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            width,
            height,
            frame_count: 0,
        })
    }

    /// Encode one RGB8 frame into Annex B NAL units
    pub fn encode_rgb(&mut self, rgb: &[u8]) -> Result<EncodedFrame> {
        let expected = (self.width * self.height * 3) as usize;
        if rgb.len() != expected {
            return Err(MotionError::Io(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected,
                rgb.len()
            )));
        }

        let yuv = rgb_to_yuv420(rgb, self.width, self.height);
        let buffer = YUVBuffer::from_vec(yuv, self.width as usize, self.height as usize);

        let bitstream = self
            .encoder
            .encode(&buffer)
            .map_err(|e| MotionError::Io(format!("Encoding failed: {}", e)))?;

        self.frame_count += 1;
        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);

        Ok(EncodedFrame {
            data: bitstream.to_vec(),
            is_keyframe,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Annex B data (with start codes)
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

/// BT.601 RGB24 to planar YUV 4:2:0
fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for (row, line) in rgb.chunks_exact(w * 3).enumerate() {
        for (col, px) in line.chunks_exact(3).enumerate() {
            let (r, g, b) = (px[0] as i32, px[1] as i32, px[2] as i32);
            y_plane[row * w + col] = (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16).clamp(0, 255) as u8;

            if row % 2 == 0 && col % 2 == 0 {
                let uv = (row / 2) * (w / 2) + col / 2;
                u_plane[uv] = (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
                v_plane[uv] = (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
            }
        }
    }

    yuv
}
