//! Capture-device abstraction.
//!
//! The [`CameraManager`](crate::CameraManager) never touches hardware
//! directly; it opens devices through a [`DeviceFactory`] and reads
//! frames through [`CaptureDevice`]. Releasing a device is dropping it.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::{CameraError, VideoFrame};

/// An open capture device. Exclusively owned by the camera manager.
pub trait CaptureDevice: Send {
    /// Capture a single frame.
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Whether the device still reports itself open.
    fn is_open(&self) -> bool;

    /// Device index this handle was opened at.
    fn index(&self) -> u32;
}

/// Opens capture devices by index.
pub trait DeviceFactory: Send + Sync {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, CameraError>;
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Synthetic device producing deterministic pattern frames.
///
/// Used by the default (no `camera` feature) build and by tests; the
/// pattern is a moving gradient so consecutive frames differ.
pub struct SyntheticDevice {
    index: u32,
    width: u32,
    height: u32,
    sequence: u32,
    open: bool,
}

impl SyntheticDevice {
    pub fn new(index: u32, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
            sequence: 0,
            open: true,
        }
    }
}

impl CaptureDevice for SyntheticDevice {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if !self.open {
            return Err(CameraError::ReadFailed("device closed".to_string()));
        }
        self.sequence = self.sequence.wrapping_add(1);

        let mut data = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = (x ^ y).wrapping_add(self.sequence) as u8;
                data.extend_from_slice(&[v, v.wrapping_mul(2), v.wrapping_mul(3)]);
            }
        }

        Ok(VideoFrame::new(
            data,
            self.width,
            self.height,
            now_ns(),
            self.sequence,
        ))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn index(&self) -> u32 {
        self.index
    }
}

/// Factory for [`SyntheticDevice`]. Always succeeds on index 0.
pub struct SyntheticFactory {
    width: u32,
    height: u32,
}

impl SyntheticFactory {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for SyntheticFactory {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl DeviceFactory for SyntheticFactory {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, CameraError> {
        if index != 0 {
            return Err(CameraError::Open {
                index,
                reason: "synthetic backend only exposes index 0".to_string(),
            });
        }
        tracing::info!("Opened synthetic capture device at index 0");
        Ok(Box::new(SyntheticDevice::new(index, self.width, self.height)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_device_sequences_frames() {
        let mut dev = SyntheticDevice::new(0, 8, 8);
        assert!(dev.is_open());

        let a = dev.read_frame().unwrap();
        let b = dev.read_frame().unwrap();
        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 2);
        assert_eq!(a.data.len(), 8 * 8 * 3);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_synthetic_factory_only_index_zero() {
        let factory = SyntheticFactory::default();
        assert!(factory.open(0).is_ok());
        assert!(matches!(
            factory.open(1),
            Err(CameraError::Open { index: 1, .. })
        ));
    }
}
