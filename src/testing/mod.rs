//! Testing utilities for CrabMotion
//!
//! Synthetic frames and scripted collaborators, so the detector, controller
//! and recorder can be exercised without a camera.

pub mod doubles;
pub mod synthetic_data;

pub use doubles::{FlakyWriter, ScriptedSource};
pub use synthetic_data::{frame_with_block, solid_frame, synthetic_video_frame};
