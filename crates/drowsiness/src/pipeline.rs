//! Frame pipeline: mirror, detect, classify, annotate.

use std::sync::Mutex;

use camera_capture::VideoFrame;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use tracing::warn;

use crate::{
    eye_aspect_ratio, Classifier, DrowsinessConfig, DrowsinessError, DrowsinessSnapshot,
    DrowsinessTracker, FrameEvaluation, LandmarkExtractor, OnnxClassifier, OnnxFaceMesh,
    Prediction,
};

const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const ALARM_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const ALARM_BORDER_PX: u32 = 4;

/// Orchestrates one tick of drowsiness analysis per pulled frame.
///
/// Stateless apart from the tracker, which sits behind its own lock,
/// independent of the camera manager's.
pub struct FramePipeline {
    extractor: Box<dyn LandmarkExtractor>,
    classifier: Option<Box<dyn Classifier>>,
    tracker: Mutex<DrowsinessTracker>,
    blink_ear_threshold: f32,
    face_model_loaded: bool,
}

impl FramePipeline {
    /// Compose a pipeline from explicit collaborators (used by tests).
    pub fn new(
        config: &DrowsinessConfig,
        extractor: Box<dyn LandmarkExtractor>,
        classifier: Option<Box<dyn Classifier>>,
    ) -> Self {
        Self {
            extractor,
            classifier,
            tracker: Mutex::new(DrowsinessTracker::new(config)),
            blink_ear_threshold: config.blink_ear_threshold,
            face_model_loaded: true,
        }
    }

    /// Build the production pipeline from configured model paths.
    ///
    /// Missing paths put the corresponding collaborator in "no model"
    /// mode rather than failing startup.
    pub fn from_config(config: &DrowsinessConfig) -> Result<Self, DrowsinessError> {
        let extractor = OnnxFaceMesh::new(config.face_model_path.as_deref(), config.face_confidence)?;
        let face_model_loaded = extractor.is_loaded();

        let classifier: Option<Box<dyn Classifier>> = match &config.classifier_model_path {
            Some(path) => Some(Box::new(OnnxClassifier::load(path)?)),
            None => {
                warn!("No classifier model configured; running without drowsiness probabilities");
                None
            }
        };

        Ok(Self {
            extractor: Box::new(extractor),
            classifier,
            tracker: Mutex::new(DrowsinessTracker::new(config)),
            blink_ear_threshold: config.blink_ear_threshold,
            face_model_loaded,
        })
    }

    /// Process one frame: returns the annotated mirror image and the
    /// updated snapshot.
    pub fn process_frame(
        &self,
        frame: &VideoFrame,
    ) -> Result<(VideoFrame, DrowsinessSnapshot), DrowsinessError> {
        let img = frame.to_image().ok_or_else(|| {
            DrowsinessError::ImageProcessing("frame buffer does not match dimensions".to_string())
        })?;

        // Mirror for a natural selfie view; detection runs on the
        // mirrored image so overlays line up.
        let mut canvas = image::imageops::flip_horizontal(&img);
        let mirrored =
            VideoFrame::from_image(canvas.clone(), frame.timestamp_ns, frame.sequence);

        let landmarks = match self.extractor.detect(&mirrored) {
            Ok(l) => l,
            Err(e) => {
                warn!("Landmark extraction failed: {e}");
                None
            }
        };

        let eval = match landmarks.and_then(|l| l.eye_points(frame.width, frame.height)) {
            None => FrameEvaluation::NoFace,
            Some((left, right)) => {
                for &(x, y) in left.iter().chain(right.iter()) {
                    draw_filled_circle_mut(&mut canvas, (x as i32, y as i32), 1, LANDMARK_COLOR);
                }

                let ear = (eye_aspect_ratio(&left) + eye_aspect_ratio(&right)) / 2.0;
                let blink = u8::from(ear < self.blink_ear_threshold);

                let prediction = match &self.classifier {
                    None => Prediction::Unavailable,
                    Some(classifier) => match classifier.predict_proba(ear, blink) {
                        Ok(p) => Prediction::Probability(p),
                        Err(e) => {
                            warn!("Classifier prediction failed: {e}");
                            Prediction::Failed
                        }
                    },
                };

                FrameEvaluation::Face {
                    ear,
                    blink,
                    prediction,
                }
            }
        };

        let snapshot = self
            .tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .update(eval);

        if snapshot.alarm_on {
            draw_alarm_border(&mut canvas);
        }

        Ok((
            VideoFrame::from_image(canvas, frame.timestamp_ns, frame.sequence),
            snapshot,
        ))
    }

    /// Last snapshot, non-mutating.
    pub fn snapshot(&self) -> DrowsinessSnapshot {
        self.tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .snapshot()
    }

    /// Reset detection state (camera stopped).
    pub fn reset(&self) {
        self.tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .reset();
    }

    /// Whether a real face-mesh model is loaded.
    pub fn face_model_loaded(&self) -> bool {
        self.face_model_loaded
    }

    /// Whether a classifier model is loaded.
    pub fn classifier_loaded(&self) -> bool {
        self.classifier.is_some()
    }
}

fn draw_alarm_border(canvas: &mut RgbImage) {
    let (w, h) = canvas.dimensions();
    for inset in 0..ALARM_BORDER_PX.min(w / 2).min(h / 2) {
        let rect = Rect::at(inset as i32, inset as i32).of_size(w - 2 * inset, h - 2 * inset);
        draw_hollow_rect_mut(canvas, rect, ALARM_COLOR);
    }
}
