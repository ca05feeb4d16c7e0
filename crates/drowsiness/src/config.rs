//! Drowsiness detection configuration

use serde::{Deserialize, Serialize};

/// Drowsiness detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrowsinessConfig {
    /// Classifier probability above which a frame counts as drowsy
    pub drowsy_prob_threshold: f32,

    /// Consecutive drowsy frames required before the alarm fires
    pub consecutive_drowsy_frames: u32,

    /// EAR below which the eyes count as closed (blink flag)
    pub blink_ear_threshold: f32,

    /// Face-mesh presence score threshold
    pub face_confidence: f32,

    /// Path to the face-mesh ONNX model (mock mode when unset)
    pub face_model_path: Option<String>,

    /// Path to the drowsiness classifier ONNX model (no-model mode when unset)
    pub classifier_model_path: Option<String>,
}

impl Default for DrowsinessConfig {
    fn default() -> Self {
        Self {
            drowsy_prob_threshold: 0.6,
            consecutive_drowsy_frames: 10,
            blink_ear_threshold: 0.2,
            face_confidence: 0.5,
            face_model_path: None,
            classifier_model_path: None,
        }
    }
}
