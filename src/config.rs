//! Configuration management for CrabMotion
//!
//! Provides loading, saving and validation of the detector, recorder,
//! camera and preview settings. Every section falls back to its defaults,
//! so a partial TOML file is a valid configuration.

use crate::errors::MotionError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Segment playback rate when neither the config nor the source names one
pub const DEFAULT_RECORDING_FPS: f64 = 30.0;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub recording: RecordingConfig,
    pub preview: PreviewConfig,
}

/// Capture device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture device index
    pub device_id: u32,
    /// Requested resolution [width, height]; device default when unset
    pub resolution: Option<[u32; 2]>,
    /// Requested frame rate; device default when unset
    pub fps: Option<u32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            resolution: None,
            fps: None,
        }
    }
}

/// How the detector maintains its comparison baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    /// Compare each frame to its immediate predecessor
    Sliding,
    /// Compare each frame to a running-average background
    AccumulatingBackground,
}

impl Default for DetectionStrategy {
    fn default() -> Self {
        DetectionStrategy::Sliding
    }
}

/// Frame differencing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Aggregate score above which motion is declared (lower = more sensitive)
    pub threshold: u64,
    /// Per-pixel absolute difference a pixel must exceed to count as changed
    pub noise_floor: u8,
    /// Gaussian smoothing applied before differencing
    pub blur_sigma: f32,
    pub strategy: DetectionStrategy,
    /// Background learning rate for `AccumulatingBackground`
    pub background_alpha: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 200_000,
            noise_floor: 25,
            blur_sigma: 2.0,
            strategy: DetectionStrategy::Sliding,
            background_alpha: 0.05,
        }
    }
}

/// Output container for recorded segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentContainer {
    /// RIFF AVI with Motion-JPEG video
    Avi,
    /// MP4 with H.264 video (requires the `h264` feature)
    Mp4,
}

impl SegmentContainer {
    pub fn extension(&self) -> &'static str {
        match self {
            SegmentContainer::Avi => "avi",
            SegmentContainer::Mp4 => "mp4",
        }
    }
}

impl Default for SegmentContainer {
    fn default() -> Self {
        SegmentContainer::Avi
    }
}

/// Segment recording settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Frames still recorded after motion stops
    pub buffer_frames: u32,
    pub output_directory: String,
    /// Playback rate written into segment headers. `None` follows the
    /// source's native rate, or [`DEFAULT_RECORDING_FPS`] when it has none.
    pub fps: Option<f64>,
    pub container: SegmentContainer,
    /// JPEG quality for Motion-JPEG frames (1-100)
    pub jpeg_quality: u8,
    /// Start numbering after the highest existing `recording_NNNN` file
    pub continue_numbering: bool,
    /// Burn the timestamp overlay into recorded frames
    pub stamp_recordings: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            buffer_frames: 15,
            output_directory: "output_files".to_string(),
            fps: None,
            container: SegmentContainer::Avi,
            jpeg_quality: 85,
            continue_numbering: true,
            stamp_recordings: true,
        }
    }
}

impl RecordingConfig {
    /// Rate stamped into segment headers: the configured rate, else the
    /// source's native rate, else [`DEFAULT_RECORDING_FPS`]
    pub fn playback_fps(&self, source_rate: Option<f64>) -> f64 {
        self.fps
            .or(source_rate.filter(|fps| *fps > 0.0))
            .unwrap_or(DEFAULT_RECORDING_FPS)
    }
}

/// Live preview settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub enabled: bool,
    /// Draw the wall-clock timestamp
    pub timestamp: bool,
    /// Draw the recording/standby badge
    pub status: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timestamp: true,
            status: true,
        }
    }
}

impl MotionConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, MotionError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            MotionError::InvalidConfig(format!("Failed to read config file: {}", e))
        })?;

        let config: MotionConfig = toml::from_str(&contents).map_err(|e| {
            MotionError::InvalidConfig(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), MotionError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    MotionError::Io(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            MotionError::InvalidConfig(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string)
            .map_err(|e| MotionError::Io(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabmotion.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if let Some([w, h]) = self.camera.resolution {
            if w == 0 || h == 0 {
                return Err("Invalid camera resolution".to_string());
            }
        }
        if let Some(fps) = self.camera.fps {
            if fps == 0 || fps > 240 {
                return Err("Invalid camera FPS (must be 1-240)".to_string());
            }
        }

        if !(self.detection.blur_sigma > 0.0) {
            return Err("Blur sigma must be positive".to_string());
        }
        if !(self.detection.background_alpha > 0.0 && self.detection.background_alpha <= 1.0) {
            return Err("Background alpha must be in (0.0, 1.0]".to_string());
        }

        if self.recording.output_directory.trim().is_empty() {
            return Err("Output directory must not be empty".to_string());
        }
        if let Some(fps) = self.recording.fps {
            if !(fps > 0.0 && fps <= 240.0) {
                return Err("Recording FPS must be between 0 and 240".to_string());
            }
        }
        if self.recording.jpeg_quality == 0 || self.recording.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }
        if self.recording.container == SegmentContainer::Mp4 && !cfg!(feature = "h264") {
            return Err("MP4 segments require the `h264` feature".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MotionConfig::default();
        assert_eq!(config.camera.device_id, 0);
        assert_eq!(config.detection.threshold, 200_000);
        assert_eq!(config.recording.buffer_frames, 15);
        assert_eq!(config.recording.output_directory, "output_files");
        assert_eq!(config.recording.container, SegmentContainer::Avi);
        assert_eq!(config.detection.strategy, DetectionStrategy::Sliding);
        assert!(config.preview.enabled);
    }

    #[test]
    fn test_config_validation() {
        let config = MotionConfig::default();
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.detection.blur_sigma = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.detection.background_alpha = 1.5;
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.recording.jpeg_quality = 0;
        assert!(bad.validate().is_err());

        let mut bad = config;
        bad.recording.output_directory = "  ".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nested").join("crabmotion.toml");

        let mut config = MotionConfig::default();
        config.detection.threshold = 90_000;
        config.recording.buffer_frames = 4;
        config.camera.resolution = Some([640, 480]);
        config.save_to_file(&config_path).unwrap();

        let loaded = MotionConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("partial.toml");
        fs::write(
            &config_path,
            "[detection]\nthreshold = 5000\nstrategy = \"accumulating_background\"\n",
        )
        .unwrap();

        let loaded = MotionConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.detection.threshold, 5000);
        assert_eq!(loaded.detection.noise_floor, 25);
        assert_eq!(
            loaded.detection.strategy,
            DetectionStrategy::AccumulatingBackground
        );
        assert_eq!(loaded.recording.buffer_frames, 15);
    }

    #[test]
    fn test_config_toml_format() {
        let toml_string = toml::to_string_pretty(&MotionConfig::default()).unwrap();
        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[detection]"));
        assert!(toml_string.contains("[recording]"));
        assert!(toml_string.contains("[preview]"));
        assert!(toml_string.contains("buffer_frames"));
        assert!(toml_string.contains("container = \"avi\""));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = MotionConfig::load_from_file("nonexistent_crabmotion.toml");
        assert_eq!(result.unwrap().recording.fps, None);
    }

    #[test]
    fn test_playback_fps_prefers_explicit_rate() {
        let mut recording = RecordingConfig::default();
        assert_eq!(recording.playback_fps(None), DEFAULT_RECORDING_FPS);
        assert_eq!(recording.playback_fps(Some(15.0)), 15.0);
        assert_eq!(recording.playback_fps(Some(0.0)), DEFAULT_RECORDING_FPS);

        recording.fps = Some(25.0);
        assert_eq!(recording.playback_fps(Some(15.0)), 25.0);
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bad.toml");
        fs::write(&config_path, "[detection\nthreshold = ").unwrap();
        let result = MotionConfig::load_from_file(&config_path);
        assert!(matches!(result, Err(MotionError::InvalidConfig(_))));
    }
}
