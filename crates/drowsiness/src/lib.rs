//! Drowsiness Detection
//!
//! Per-frame drowsiness analysis over webcam frames:
//! - Eye-aspect-ratio (EAR) computation from facial landmarks
//! - Debounced drowsiness state machine (consecutive-frame counter)
//! - Frame pipeline: mirror, detect, classify, annotate
//!
//! Landmark extraction and classification are collaborators behind the
//! [`LandmarkExtractor`] and [`Classifier`] traits, with tract-onnx
//! production implementations that degrade to a "no model" mode when
//! unconfigured.

pub mod classifier;
pub mod config;
pub mod ear;
pub mod landmarks;
pub mod pipeline;
pub mod state;

pub use classifier::{Classifier, OnnxClassifier};
pub use config::DrowsinessConfig;
pub use ear::eye_aspect_ratio;
pub use landmarks::{FaceLandmarks, LandmarkExtractor, OnnxFaceMesh};
pub use pipeline::FramePipeline;
pub use state::{
    DrowsinessSnapshot, DrowsinessStatus, DrowsinessTracker, FrameEvaluation, Prediction,
};

use thiserror::Error;

/// Drowsiness analysis error types
#[derive(Error, Debug)]
pub enum DrowsinessError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Landmark extraction failed: {0}")]
    Extraction(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}
