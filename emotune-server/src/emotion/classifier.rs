//! Emotion classification
//!
//! A frozen 7-class image classifier. Output order is fixed:
//! `[angry, disgust, fear, happy, neutral, sad, surprise]`.

use emotune_common::config::{ClassifierConfig, TensorLayout};
use emotune_common::Emotion;
use ndarray::{Array3, ArrayD, Axis};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Model artifact missing or not loadable
    #[error("Failed to load classifier model: {0}")]
    Load(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    /// Model produced the wrong number of class probabilities
    #[error("Classifier returned {actual} scores, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
}

/// Maps a preprocessed `(1, 128, 128)` image to per-class probabilities
///
/// Implementations block; callers run them on the blocking pool.
pub trait EmotionClassifier: Send + Sync {
    fn predict(&self, input: &Array3<f32>) -> Result<Vec<f32>, ClassifierError>;
}

/// Pick the most probable label; ties go to the lowest index
///
/// NaN or infinite scores are an inference failure.
pub fn top_label(scores: &[f32]) -> Result<Emotion, ClassifierError> {
    if scores.len() != Emotion::COUNT {
        return Err(ClassifierError::OutputShape {
            expected: Emotion::COUNT,
            actual: scores.len(),
        });
    }
    if let Some(i) = scores.iter().position(|s| !s.is_finite()) {
        return Err(ClassifierError::Inference(format!(
            "non-finite score {} at index {}",
            scores[i], i
        )));
    }

    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = i;
        }
    }

    Emotion::from_index(best).ok_or(ClassifierError::OutputShape {
        expected: Emotion::COUNT,
        actual: scores.len(),
    })
}

/// Run `classifier` on the blocking pool and return the predicted label
pub async fn classify(
    classifier: Arc<dyn EmotionClassifier>,
    input: Array3<f32>,
) -> Result<Emotion, ClassifierError> {
    let scores = tokio::task::spawn_blocking(move || classifier.predict(&input))
        .await
        .map_err(|e| ClassifierError::Inference(format!("inference task failed: {}", e)))??;

    let label = top_label(&scores)?;
    debug!(?scores, %label, "Classified image");
    Ok(label)
}

/// Shape a `(1, H, W)` image the way the model's input expects it
pub fn model_input(input: &Array3<f32>, layout: TensorLayout) -> ArrayD<f32> {
    match layout {
        TensorLayout::Nhw => input.clone().into_dyn(),
        TensorLayout::Nhwc => input.clone().insert_axis(Axis(3)).into_dyn(),
    }
}

/// ONNX Runtime backed classifier
///
/// `Session::run` needs exclusive access, so concurrent requests queue on
/// the mutex.
pub struct OnnxEmotionClassifier {
    session: Mutex<Session>,
    input_name: String,
    layout: TensorLayout,
}

impl OnnxEmotionClassifier {
    /// Load the model named in `config`
    pub fn load(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let path = &config.model_path;
        if !path.exists() {
            return Err(ClassifierError::Load(format!(
                "model not found: {}",
                path.display()
            )));
        }

        info!("Loading emotion model from {}", path.display());

        let session = Session::builder()
            .map_err(|e| ClassifierError::Load(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ClassifierError::Load(e.to_string()))?
            .with_intra_threads(config.intra_threads.max(1))
            .map_err(|e| ClassifierError::Load(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| ClassifierError::Load(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            session: Mutex::new(session),
            input_name: config.input_name.clone(),
            layout: config.layout,
        })
    }

    fn run(&self, input: ArrayD<f32>) -> Result<Vec<f32>, ClassifierError> {
        let tensor = Tensor::from_array(input)
            .map_err(|e| ClassifierError::Inference(format!("tensor creation: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::Inference("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| ClassifierError::Inference("model produced no output".to_string()))?;

        let (_shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("output extraction: {}", e)))?;

        Ok(data.to_vec())
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn predict(&self, input: &Array3<f32>) -> Result<Vec<f32>, ClassifierError> {
        self.run(model_input(input, self.layout))
    }
}
