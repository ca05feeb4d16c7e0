//! Drowsiness state machine.
//!
//! Turns noisy per-frame classifications into a debounced alert: the
//! alarm requires `consecutive_drowsy_frames` classifier-positive
//! frames in a row, and a single non-drowsy (or faceless) frame fully
//! resets the streak.

use serde::{Deserialize, Serialize};

use crate::DrowsinessConfig;

/// Per-frame detection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrowsinessStatus {
    #[serde(rename = "No Face")]
    NoFace,
    #[serde(rename = "Drowsy")]
    Drowsy,
    #[serde(rename = "Non Drowsy")]
    NonDrowsy,
    #[serde(rename = "No Model")]
    NoModel,
    #[serde(rename = "Eyes Closed (No Model)")]
    EyesClosedNoModel,
    #[serde(rename = "Eyes Open (No Model)")]
    EyesOpenNoModel,
    #[serde(rename = "Prediction Error")]
    PredictionError,
    #[default]
    #[serde(rename = "Video Off")]
    VideoOff,
}

/// Snapshot of the last processed frame, served by status queries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DrowsinessSnapshot {
    pub ear: f32,
    pub blink: u8,
    pub status: DrowsinessStatus,
    pub probability: f32,
    pub alarm_on: bool,
}

/// Classifier outcome for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prediction {
    /// No classifier model is configured.
    Unavailable,
    /// Probability of the drowsy class.
    Probability(f32),
    /// The classifier failed on this frame.
    Failed,
}

/// Everything the state machine consumes per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameEvaluation {
    NoFace,
    Face {
        ear: f32,
        blink: u8,
        prediction: Prediction,
    },
}

/// Consecutive-frame debounce over per-frame evaluations.
#[derive(Debug)]
pub struct DrowsinessTracker {
    drowsy_prob_threshold: f32,
    consecutive_drowsy_frames: u32,
    blink_ear_threshold: f32,
    counter: u32,
    snapshot: DrowsinessSnapshot,
}

impl DrowsinessTracker {
    pub fn new(config: &DrowsinessConfig) -> Self {
        Self {
            drowsy_prob_threshold: config.drowsy_prob_threshold,
            consecutive_drowsy_frames: config.consecutive_drowsy_frames,
            blink_ear_threshold: config.blink_ear_threshold,
            counter: 0,
            snapshot: DrowsinessSnapshot::default(),
        }
    }

    /// Apply one frame's evaluation and return the updated snapshot.
    pub fn update(&mut self, eval: FrameEvaluation) -> DrowsinessSnapshot {
        // Alarm defaults to off each frame; only a completed streak
        // turns it (back) on.
        let mut alarm_on = false;

        let (ear, blink, probability, status) = match eval {
            FrameEvaluation::NoFace => {
                self.counter = 0;
                (0.0, 0, 0.0, DrowsinessStatus::NoFace)
            }
            FrameEvaluation::Face {
                ear,
                blink,
                prediction,
            } => match prediction {
                Prediction::Unavailable => {
                    self.counter = 0;
                    let status = if ear < self.blink_ear_threshold {
                        DrowsinessStatus::EyesClosedNoModel
                    } else {
                        DrowsinessStatus::EyesOpenNoModel
                    };
                    (ear, blink, 0.0, status)
                }
                Prediction::Failed => {
                    self.counter = 0;
                    (ear, blink, 0.0, DrowsinessStatus::PredictionError)
                }
                Prediction::Probability(p) => {
                    if p > self.drowsy_prob_threshold {
                        self.counter += 1;
                        if self.counter >= self.consecutive_drowsy_frames {
                            alarm_on = true;
                        }
                        (ear, blink, p, DrowsinessStatus::Drowsy)
                    } else {
                        self.counter = 0;
                        (ear, blink, p, DrowsinessStatus::NonDrowsy)
                    }
                }
            },
        };

        self.snapshot = DrowsinessSnapshot {
            ear,
            blink,
            status,
            probability,
            alarm_on,
        };
        self.snapshot
    }

    /// Last snapshot, non-mutating.
    pub fn snapshot(&self) -> DrowsinessSnapshot {
        self.snapshot
    }

    /// Current consecutive-drowsy streak length.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Reset to defaults (camera stopped).
    pub fn reset(&mut self) {
        self.counter = 0;
        self.snapshot = DrowsinessSnapshot::default();
    }
}
