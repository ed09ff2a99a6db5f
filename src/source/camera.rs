use super::FrameSource;
use crate::config::CameraConfig;
use crate::errors::Result;
use crate::types::CameraFrame;

#[cfg(feature = "camera")]
use crate::errors::MotionError;
#[cfg(feature = "camera")]
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
    Camera,
};

/// Live capture device opened through nokhwa
#[cfg(feature = "camera")]
pub struct CameraSource {
    camera: Camera,
    device_id: String,
    sequence: u64,
}

#[cfg(feature = "camera")]
impl CameraSource {
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let format_type = match (config.resolution, config.fps) {
            (None, None) => RequestedFormatType::AbsoluteHighestFrameRate,
            (resolution, fps) => {
                let [width, height] = resolution.unwrap_or([640, 480]);
                RequestedFormatType::Closest(CameraFormat::new(
                    Resolution::new(width, height),
                    FrameFormat::MJPEG,
                    fps.unwrap_or(30),
                ))
            }
        };
        let requested = RequestedFormat::new::<RgbFormat>(format_type);

        let mut camera = Camera::new(CameraIndex::Index(config.device_id), requested).map_err(
            |e| {
                MotionError::DeviceUnavailable(format!(
                    "Failed to open camera {}: {}",
                    config.device_id, e
                ))
            },
        )?;
        camera.open_stream().map_err(|e| {
            MotionError::DeviceUnavailable(format!("Failed to start stream: {}", e))
        })?;

        let format = camera.camera_format();
        log::info!(
            "Opened camera {} at {}x{} @ {} fps",
            config.device_id,
            format.resolution().width_x,
            format.resolution().height_y,
            format.frame_rate()
        );

        Ok(Self {
            camera,
            device_id: config.device_id.to_string(),
            sequence: 0,
        })
    }
}

#[cfg(feature = "camera")]
impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<CameraFrame>> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| MotionError::CaptureFailed(format!("Failed to capture frame: {}", e)))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| MotionError::CaptureFailed(format!("Failed to decode frame: {}", e)))?;

        let (width, height) = (decoded.width(), decoded.height());
        let frame = CameraFrame::new(decoded.into_raw(), width, height, self.device_id.clone())
            .with_sequence(self.sequence);
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn frame_rate(&self) -> Option<f64> {
        Some(self.camera.camera_format().frame_rate() as f64)
    }

    fn describe(&self) -> String {
        format!("camera {}", self.device_id)
    }
}

#[cfg(feature = "camera")]
impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Failed to stop camera stream: {}", e);
        }
    }
}

/// Placeholder when built without the `camera` feature; opening always fails
#[cfg(not(feature = "camera"))]
pub struct CameraSource {
    _private: (),
}

#[cfg(not(feature = "camera"))]
impl CameraSource {
    pub fn open(config: &CameraConfig) -> Result<Self> {
        Err(crate::errors::MotionError::DeviceUnavailable(format!(
            "Camera {} unavailable: built without camera support (enable the `camera` feature)",
            config.device_id
        )))
    }
}

#[cfg(not(feature = "camera"))]
impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<CameraFrame>> {
        Ok(None)
    }

    fn describe(&self) -> String {
        "camera (unsupported)".to_string()
    }
}
