//! Timestamp and status stamping for recorded and previewed frames
//!
//! The overlay is drawn on a copy after detection has run, so the text never
//! feeds back into the motion score.

use crate::types::CameraFrame;

pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
pub const RECORDING_LABEL: &str = "REC - MOVING";
pub const STANDBY_LABEL: &str = "STANDBY";

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const RECORDING_COLOR: [u8; 3] = [230, 30, 30];
const STANDBY_COLOR: [u8; 3] = [30, 200, 60];
const TEXT_COLOR: [u8; 3] = [255, 255, 255];
const BACKING_COLOR: [u8; 3] = [0, 0, 0];

/// 5x7 glyph rows, bit 4 is the leftmost column
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '/' => [0x01, 0x01, 0x02, 0x04, 0x08, 0x10, 0x10],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        _ => [0; 7],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlay {
    /// Capture time, bottom-right
    pub timestamp: bool,
    /// Recording/standby badge, top-left
    pub status: bool,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            timestamp: true,
            status: true,
        }
    }
}

impl Overlay {
    pub fn new(timestamp: bool, status: bool) -> Self {
        Self { timestamp, status }
    }

    pub fn is_enabled(&self) -> bool {
        self.timestamp || self.status
    }

    /// Stamped copy of `frame`; the input is left untouched
    pub fn apply(&self, frame: &CameraFrame, recording: bool) -> CameraFrame {
        let mut stamped = frame.clone();
        if !frame.is_valid() {
            return stamped;
        }

        let mut canvas = Canvas {
            data: &mut stamped.data,
            width: frame.width,
            height: frame.height,
            scale: (frame.height / 240).max(1),
        };
        let margin = 4 * canvas.scale;

        if self.status {
            let (label, color) = if recording {
                (RECORDING_LABEL, RECORDING_COLOR)
            } else {
                (STANDBY_LABEL, STANDBY_COLOR)
            };
            canvas.label(label, margin as i64, margin as i64, color);
        }

        if self.timestamp {
            let text = frame.captured_at.format(TIMESTAMP_FORMAT).to_string();
            let x = frame.width as i64 - canvas.text_width(&text) as i64 - margin as i64;
            let y = frame.height as i64 - canvas.text_height() as i64 - margin as i64;
            canvas.label(&text, x, y, TEXT_COLOR);
        }

        stamped
    }
}

struct Canvas<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    scale: u32,
}

impl Canvas<'_> {
    fn text_width(&self, text: &str) -> u32 {
        let chars = text.chars().count() as u32;
        (chars * (GLYPH_WIDTH + 1)).saturating_sub(1) * self.scale
    }

    fn text_height(&self) -> u32 {
        GLYPH_HEIGHT * self.scale
    }

    /// Text on a dark backing box with a one-unit pad
    fn label(&mut self, text: &str, x: i64, y: i64, color: [u8; 3]) {
        let pad = self.scale as i64;
        self.fill(
            x - pad,
            y - pad,
            self.text_width(text) as i64 + 2 * pad,
            self.text_height() as i64 + 2 * pad,
            BACKING_COLOR,
        );

        let advance = ((GLYPH_WIDTH + 1) * self.scale) as i64;
        for (i, c) in text.chars().enumerate() {
            self.glyph(c, x + i as i64 * advance, y, color);
        }
    }

    fn glyph(&mut self, c: char, x: i64, y: i64, color: [u8; 3]) {
        let scale = self.scale as i64;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0x10 >> col) != 0 {
                    self.fill(
                        x + col as i64 * scale,
                        y + row as i64 * scale,
                        scale,
                        scale,
                        color,
                    );
                }
            }
        }
    }

    /// Filled rectangle, clipped to the frame
    fn fill(&mut self, x: i64, y: i64, w: i64, h: i64, color: [u8; 3]) {
        let x0 = x.clamp(0, self.width as i64) as usize;
        let y0 = y.clamp(0, self.height as i64) as usize;
        let x1 = (x + w).clamp(0, self.width as i64) as usize;
        let y1 = (y + h).clamp(0, self.height as i64) as usize;
        let stride = self.width as usize * 3;

        for row in y0..y1 {
            for col in x0..x1 {
                let idx = row * stride + col * 3;
                self.data[idx..idx + 3].copy_from_slice(&color);
            }
        }
    }
}
