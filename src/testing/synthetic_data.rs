//! Deterministic frames for exercising the detector offline

use crate::types::CameraFrame;

const SYNTHETIC_DEVICE: &str = "synthetic";

/// Uniform gray frame
pub fn solid_frame(width: u32, height: u32, value: u8) -> CameraFrame {
    CameraFrame::new(
        vec![value; (width * height * 3) as usize],
        width,
        height,
        SYNTHETIC_DEVICE.to_string(),
    )
}

/// Gray frame with one filled rectangle `(x, y, w, h)`, clipped to the frame
pub fn frame_with_block(
    width: u32,
    height: u32,
    background: u8,
    foreground: u8,
    block: (u32, u32, u32, u32),
) -> CameraFrame {
    let mut frame = solid_frame(width, height, background);
    let (bx, by, bw, bh) = block;
    for y in by..(by + bh).min(height) {
        for x in bx..(bx + bw).min(width) {
            let idx = ((y * width + x) * 3) as usize;
            frame.data[idx..idx + 3].fill(foreground);
        }
    }
    frame
}

/// Gradient that shifts with `frame_number`, so consecutive frames all differ
pub fn synthetic_video_frame(frame_number: u64, width: u32, height: u32) -> CameraFrame {
    let mut data = vec![0u8; (width * height * 3) as usize];
    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }
    CameraFrame::new(data, width, height, SYNTHETIC_DEVICE.to_string()).with_sequence(frame_number)
}
