//! Frame-differencing motion detector

use super::reference::{ReferenceModel, MASK_ON};
use crate::config::DetectionConfig;
use crate::errors::{MotionError, Result};
use crate::types::{CameraFrame, Detection};
use image::{imageops, GrayImage, ImageBuffer, Rgb};

/// Score contributed by one changed pixel (the binarised mask value)
pub const CHANGED_PIXEL_WEIGHT: u64 = MASK_ON as u64;

/// Converts successive frames into a motion score and a motion decision.
///
/// Each frame is reduced to a blurred grayscale image and compared against
/// the reference model. Pixels whose absolute difference exceeds the noise
/// floor count as changed; the score is the weighted changed-pixel count and
/// motion is declared when it exceeds the configured threshold.
pub struct MotionDetector {
    config: DetectionConfig,
    reference: ReferenceModel,
    mask: Option<GrayImage>,
    frames_seen: u64,
}

impl MotionDetector {
    pub fn new(config: DetectionConfig) -> Self {
        let reference = ReferenceModel::new(config.strategy, config.background_alpha);
        Self {
            config,
            reference,
            mask: None,
            frames_seen: 0,
        }
    }

    /// Compare `frame` against the reference and fold it into the baseline.
    ///
    /// The first frame only seeds the reference and never reports motion.
    pub fn detect(&mut self, frame: &CameraFrame) -> Result<Detection> {
        if !frame.is_valid() {
            return Err(MotionError::CaptureFailed(format!(
                "frame {} has {} bytes, expected {} for {}",
                frame.sequence,
                frame.data.len(),
                frame.size().pixels() * 3,
                frame.size()
            )));
        }

        if let Some(expected) = self.reference.size() {
            if expected != frame.size() {
                return Err(MotionError::DimensionMismatch {
                    expected,
                    actual: frame.size(),
                });
            }
        }

        let current = self.prepare(frame)?;
        self.frames_seen += 1;

        if self.reference.is_empty() {
            self.reference.update(current);
            self.mask = None;
            log::debug!("Reference seeded from frame {} ({})", frame.sequence, frame.size());
            return Ok(Detection::none());
        }

        let mut mask = GrayImage::new(frame.width, frame.height);
        let changed_pixels = self
            .reference
            .compare(&current, self.config.noise_floor, &mut mask);
        self.reference.update(current);
        self.mask = Some(mask);

        let score = changed_pixels.saturating_mul(CHANGED_PIXEL_WEIGHT);
        let detection = Detection {
            motion: score > self.config.threshold,
            score,
            changed_pixels,
        };

        log::trace!(
            "frame {}: score={} changed={} motion={}",
            frame.sequence,
            score,
            changed_pixels,
            detection.motion
        );
        Ok(detection)
    }

    /// Grayscale + Gaussian smoothing so sensor noise does not register
    fn prepare(&self, frame: &CameraFrame) -> Result<GrayImage> {
        let rgb: ImageBuffer<Rgb<u8>, &[u8]> =
            ImageBuffer::from_raw(frame.width, frame.height, frame.data.as_slice()).ok_or_else(
                || MotionError::CaptureFailed(format!("frame {} is malformed", frame.sequence)),
            )?;
        let gray = imageops::grayscale(&rgb);
        Ok(imageops::blur(&gray, self.config.blur_sigma))
    }

    /// Forget the baseline; the next frame seeds a new one
    pub fn reset(&mut self) {
        self.reference.clear();
        self.mask = None;
    }

    pub fn has_reference(&self) -> bool {
        !self.reference.is_empty()
    }

    /// Binarised difference from the most recent comparison
    pub fn last_mask(&self) -> Option<&GrayImage> {
        self.mask.as_ref()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }
}
