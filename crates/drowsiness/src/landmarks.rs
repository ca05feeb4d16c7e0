//! Facial landmarks and the landmark-extractor collaborator.

use camera_capture::VideoFrame;
use image::imageops::FilterType;
use tract_onnx::prelude::*;
use tracing::{info, warn};

use crate::DrowsinessError;

/// Face-mesh indices of the six left-eye landmarks (EAR ordering).
pub const LEFT_EYE_IDX: [usize; 6] = [33, 160, 158, 133, 153, 144];

/// Face-mesh indices of the six right-eye landmarks (EAR ordering).
pub const RIGHT_EYE_IDX: [usize; 6] = [263, 387, 385, 362, 380, 373];

/// Face-mesh model input edge length.
const MESH_INPUT_SIZE: u32 = 192;

/// One detected face as normalized (x, y) landmark points.
#[derive(Debug, Clone)]
pub struct FaceLandmarks {
    /// Points in [0, 1] image coordinates.
    pub points: Vec<(f32, f32)>,
}

impl FaceLandmarks {
    /// Scale the six-point eye landmark sets to pixel coordinates.
    ///
    /// Returns `None` when the landmark set is too small to contain the
    /// eye indices.
    pub fn eye_points(
        &self,
        width: u32,
        height: u32,
    ) -> Option<([(f32, f32); 6], [(f32, f32); 6])> {
        let max_idx = RIGHT_EYE_IDX.iter().max().copied().unwrap_or(0);
        if self.points.len() <= max_idx {
            return None;
        }

        let scale = |i: usize| {
            let (x, y) = self.points[i];
            (x * width as f32, y * height as f32)
        };
        let left = LEFT_EYE_IDX.map(scale);
        let right = RIGHT_EYE_IDX.map(scale);
        Some((left, right))
    }
}

/// Landmark-extractor collaborator: zero or one face per frame.
pub trait LandmarkExtractor: Send + Sync {
    fn detect(&self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DrowsinessError>;
}

/// Face-mesh extractor backed by a tract-onnx model.
///
/// The model takes a 192x192 RGB frame and emits 468 landmarks plus a
/// face-present score. Without a configured model path the extractor
/// runs in mock mode and reports no face.
pub struct OnnxFaceMesh {
    plan: Option<TypedSimplePlan<TypedModel>>,
    min_confidence: f32,
}

impl OnnxFaceMesh {
    pub fn new(model_path: Option<&str>, min_confidence: f32) -> Result<Self, DrowsinessError> {
        let plan = match model_path {
            Some(path) => {
                info!("Loading face-mesh model from {}", path);
                let plan = tract_onnx::onnx()
                    .model_for_path(path)
                    .map_err(|e| DrowsinessError::ModelLoad(e.to_string()))?
                    .with_input_fact(
                        0,
                        InferenceFact::dt_shape(
                            f32::datum_type(),
                            tvec!(1, MESH_INPUT_SIZE as i64, MESH_INPUT_SIZE as i64, 3),
                        ),
                    )
                    .map_err(|e| DrowsinessError::ModelLoad(e.to_string()))?
                    .into_optimized()
                    .map_err(|e| DrowsinessError::ModelLoad(e.to_string()))?
                    .into_runnable()
                    .map_err(|e| DrowsinessError::ModelLoad(e.to_string()))?;
                Some(plan)
            }
            None => {
                warn!("No face-mesh model configured; landmark extraction reports no face");
                None
            }
        };

        Ok(Self {
            plan,
            min_confidence,
        })
    }

    /// Whether a real model is loaded (as opposed to mock mode).
    pub fn is_loaded(&self) -> bool {
        self.plan.is_some()
    }
}

/// Face-mesh presence scores come out as logits; fold them to [0, 1].
fn presence_score(raw: f32) -> f32 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        1.0 / (1.0 + (-raw).exp())
    }
}

impl LandmarkExtractor for OnnxFaceMesh {
    fn detect(&self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DrowsinessError> {
        let Some(plan) = &self.plan else {
            return Ok(None);
        };

        let img = frame.to_image().ok_or_else(|| {
            DrowsinessError::ImageProcessing("frame buffer does not match dimensions".to_string())
        })?;
        let resized = image::imageops::resize(
            &img,
            MESH_INPUT_SIZE,
            MESH_INPUT_SIZE,
            FilterType::Triangle,
        );

        let input: Tensor = tract_ndarray::Array4::from_shape_fn(
            (1, MESH_INPUT_SIZE as usize, MESH_INPUT_SIZE as usize, 3),
            |(_, y, x, c)| resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
        )
        .into();

        let outputs = plan
            .run(tvec!(input.into()))
            .map_err(|e| DrowsinessError::Extraction(e.to_string()))?;

        // Outputs are identified by element count: a single scalar is
        // the presence score, a 3N vector the landmark coordinates.
        let mut score = None;
        let mut coords: Option<Vec<f32>> = None;
        for output in &outputs {
            let view = output
                .to_array_view::<f32>()
                .map_err(|e| DrowsinessError::Extraction(e.to_string()))?;
            match view.len() {
                1 => score = view.iter().next().copied(),
                n if n % 3 == 0 && n >= 18 => coords = Some(view.iter().copied().collect()),
                _ => {}
            }
        }

        let coords = coords.ok_or_else(|| {
            DrowsinessError::Extraction("model produced no landmark output".to_string())
        })?;
        if let Some(raw) = score {
            if presence_score(raw) < self.min_confidence {
                return Ok(None);
            }
        }

        let size = MESH_INPUT_SIZE as f32;
        let points = coords
            .chunks_exact(3)
            .map(|p| (p[0] / size, p[1] / size))
            .collect();
        Ok(Some(FaceLandmarks { points }))
    }
}
