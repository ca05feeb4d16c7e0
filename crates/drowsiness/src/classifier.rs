//! Drowsiness-classifier collaborator.

use tract_onnx::prelude::*;
use tracing::info;

use crate::DrowsinessError;

/// Binary drowsiness classifier over the per-frame feature vector.
pub trait Classifier: Send + Sync {
    /// Probability of the drowsy class for `(ear, blink)`.
    fn predict_proba(&self, ear: f32, blink: u8) -> Result<f32, DrowsinessError>;
}

/// Classifier backed by a tract-onnx model (the trained SVM exported to
/// ONNX). Input is a `[1, 2]` tensor of `(ear, blink)`; the last model
/// output carries the two class probabilities.
#[derive(Debug)]
pub struct OnnxClassifier {
    plan: TypedSimplePlan<TypedModel>,
}

impl OnnxClassifier {
    pub fn load(path: &str) -> Result<Self, DrowsinessError> {
        info!("Loading drowsiness classifier from {}", path);
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| DrowsinessError::ModelLoad(e.to_string()))?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 2)))
            .map_err(|e| DrowsinessError::ModelLoad(e.to_string()))?
            .into_optimized()
            .map_err(|e| DrowsinessError::ModelLoad(e.to_string()))?
            .into_runnable()
            .map_err(|e| DrowsinessError::ModelLoad(e.to_string()))?;
        Ok(Self { plan })
    }
}

impl Classifier for OnnxClassifier {
    fn predict_proba(&self, ear: f32, blink: u8) -> Result<f32, DrowsinessError> {
        if !ear.is_finite() {
            return Err(DrowsinessError::Prediction(format!(
                "non-finite EAR feature: {ear}"
            )));
        }

        let input: Tensor = tract_ndarray::arr2(&[[ear, blink as f32]]).into();
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| DrowsinessError::Prediction(e.to_string()))?;

        let probs = outputs
            .last()
            .ok_or_else(|| DrowsinessError::Prediction("model produced no outputs".to_string()))?
            .to_array_view::<f32>()
            .map_err(|e| DrowsinessError::Prediction(e.to_string()))?;

        let flat: Vec<f32> = probs.iter().copied().collect();
        match flat.as_slice() {
            [_, drowsy, ..] => Ok(*drowsy),
            _ => Err(DrowsinessError::Prediction(format!(
                "expected two class probabilities, got {} values",
                flat.len()
            ))),
        }
    }
}
