//! Webcam Capture Library
//!
//! Provides a trait-based capture-device abstraction and the
//! [`CameraManager`], which serializes all access to the single physical
//! camera across concurrent callers:
//! - Device probing across indices 0..=4
//! - Explicit Idle/Releasing/Active lifecycle
//! - Automatic release on mid-stream read failure
//!
//! Real hardware capture goes through `nokhwa` behind the `camera`
//! feature; the default build ships a synthetic device for tests and
//! headless development.

pub mod device;
pub mod frame;
pub mod manager;

#[cfg(feature = "camera")]
pub mod nokhwa_backend;

pub use device::{CaptureDevice, DeviceFactory, SyntheticDevice, SyntheticFactory};
pub use frame::VideoFrame;
pub use manager::{CameraManager, Lifecycle};

#[cfg(feature = "camera")]
pub use nokhwa_backend::NokhwaFactory;

use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("no capture device could be opened (probed indices 0..={0})")]
    Unavailable(u32),

    #[error("failed to open device {index}: {reason}")]
    Open { index: u32, reason: String },

    #[error("device opened but failed to produce an initial frame")]
    InitialReadFailed,

    #[error("frame read failed: {0}")]
    ReadFailed(String),

    #[error("camera is not active")]
    NotActive,
}
