//! Baseline models the detector compares incoming frames against

use crate::config::DetectionStrategy;
use crate::types::FrameSize;
use image::{GrayImage, Luma};

/// Value a changed pixel carries in the binarised mask
pub const MASK_ON: u8 = 255;

/// The single comparison baseline owned by a detector.
#[derive(Debug, Clone)]
pub enum ReferenceModel {
    /// Most recent frame only; replaced after every comparison
    Sliding { previous: Option<GrayImage> },
    /// Exponential running average of all frames seen
    Background {
        mean: Option<Vec<f32>>,
        size: FrameSize,
        alpha: f32,
    },
}

impl ReferenceModel {
    pub fn new(strategy: DetectionStrategy, alpha: f32) -> Self {
        match strategy {
            DetectionStrategy::Sliding => ReferenceModel::Sliding { previous: None },
            DetectionStrategy::AccumulatingBackground => ReferenceModel::Background {
                mean: None,
                size: FrameSize::new(0, 0),
                alpha: alpha.clamp(f32::EPSILON, 1.0),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ReferenceModel::Sliding { previous } => previous.is_none(),
            ReferenceModel::Background { mean, .. } => mean.is_none(),
        }
    }

    /// Geometry of the stored baseline, if any
    pub fn size(&self) -> Option<FrameSize> {
        match self {
            ReferenceModel::Sliding { previous } => previous
                .as_ref()
                .map(|img| FrameSize::new(img.width(), img.height())),
            ReferenceModel::Background { mean, size, .. } => mean.as_ref().map(|_| *size),
        }
    }

    pub fn clear(&mut self) {
        match self {
            ReferenceModel::Sliding { previous } => *previous = None,
            ReferenceModel::Background { mean, .. } => *mean = None,
        }
    }

    /// Binarise |current - baseline| into `mask` and return the changed-pixel count.
    ///
    /// The caller guarantees `current` and `mask` match the baseline geometry.
    pub fn compare(&self, current: &GrayImage, noise_floor: u8, mask: &mut GrayImage) -> u64 {
        let mut changed = 0u64;
        match self {
            ReferenceModel::Sliding { previous: Some(previous) } => {
                for ((cur, prev), out) in current
                    .pixels()
                    .zip(previous.pixels())
                    .zip(mask.pixels_mut())
                {
                    if cur.0[0].abs_diff(prev.0[0]) > noise_floor {
                        *out = Luma([MASK_ON]);
                        changed += 1;
                    }
                }
            }
            ReferenceModel::Background { mean: Some(mean), .. } => {
                for ((cur, bg), out) in current.pixels().zip(mean.iter()).zip(mask.pixels_mut()) {
                    let bg = bg.round().clamp(0.0, 255.0) as u8;
                    if cur.0[0].abs_diff(bg) > noise_floor {
                        *out = Luma([MASK_ON]);
                        changed += 1;
                    }
                }
            }
            _ => {}
        }
        changed
    }

    /// Fold `current` into the baseline
    pub fn update(&mut self, current: GrayImage) {
        match self {
            ReferenceModel::Sliding { previous } => *previous = Some(current),
            ReferenceModel::Background { mean, size, alpha } => {
                let alpha = *alpha;
                if let Some(existing) = mean.as_mut() {
                    for (m, px) in existing.iter_mut().zip(current.pixels()) {
                        *m = (1.0 - alpha) * *m + alpha * px.0[0] as f32;
                    }
                } else {
                    *size = FrameSize::new(current.width(), current.height());
                    *mean = Some(current.pixels().map(|p| p.0[0] as f32).collect());
                }
            }
        }
    }
}
