//! Motion detection by frame differencing
//!
//! # Example
//! ```rust,ignore
//! use crabmotion::detection::MotionDetector;
//! use crabmotion::config::DetectionConfig;
//!
//! let mut detector = MotionDetector::new(DetectionConfig::default());
//! let detection = detector.detect(&frame)?;
//! if detection.motion {
//!     println!("motion, score {}", detection.score);
//! }
//! ```

mod detector;
mod reference;

pub use detector::{MotionDetector, CHANGED_PIXEL_WEIGHT};
pub use reference::{ReferenceModel, MASK_ON};
