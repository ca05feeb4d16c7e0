//! Real webcam backend via `nokhwa` (feature `camera`).

use std::time::{SystemTime, UNIX_EPOCH};

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::info;

use crate::{CameraError, CaptureDevice, DeviceFactory, VideoFrame};

/// A webcam opened through nokhwa's native platform backend.
pub struct NokhwaDevice {
    camera: Camera,
    index: u32,
    sequence: u32,
}

impl CaptureDevice for NokhwaDevice {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::ReadFailed(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::ReadFailed(e.to_string()))?;

        self.sequence = self.sequence.wrapping_add(1);
        let (width, height) = decoded.dimensions();
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        Ok(VideoFrame::new(
            decoded.into_raw(),
            width,
            height,
            timestamp_ns,
            self.sequence,
        ))
    }

    fn is_open(&self) -> bool {
        self.camera.is_stream_open()
    }

    fn index(&self) -> u32 {
        self.index
    }
}

impl Drop for NokhwaDevice {
    fn drop(&mut self) {
        // Best effort; the OS reclaims the handle either way.
        let _ = self.camera.stop_stream();
    }
}

/// Opens [`NokhwaDevice`]s by platform camera index.
#[derive(Default)]
pub struct NokhwaFactory;

impl NokhwaFactory {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceFactory for NokhwaFactory {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, CameraError> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
            CameraError::Open {
                index,
                reason: e.to_string(),
            }
        })?;
        camera.open_stream().map_err(|e| CameraError::Open {
            index,
            reason: e.to_string(),
        })?;

        info!("Opened webcam at index {}", index);
        Ok(Box::new(NokhwaDevice {
            camera,
            index,
            sequence: 0,
        }))
    }
}
