//! Image classification and the verdict policy.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ScanError};
use crate::extract::GRID_DIM;
use crate::inference::BinaryModel;
use crate::tensor::{tensor_len, ImageInput, InputTensor};

pub const DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Benign,
    Malicious,
}

impl Verdict {
    /// Malicious only when `score` is strictly above `threshold`.
    pub fn from_score(score: f32, threshold: f32) -> Self {
        if score > threshold {
            Verdict::Malicious
        } else {
            Verdict::Benign
        }
    }

    pub fn is_malicious(self) -> bool {
        self == Verdict::Malicious
    }
}

/// Verdict assigned when an image cannot be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Fail open: keep scanning and treat the package as benign.
    #[default]
    Benign,
    /// Fail closed: flag the package.
    Malicious,
}

impl FailurePolicy {
    pub fn verdict(self) -> Verdict {
        match self {
            FailurePolicy::Benign => Verdict::Benign,
            FailurePolicy::Malicious => Verdict::Malicious,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSettings {
    /// Model input size in pixels.
    pub input_width: u32,
    pub input_height: u32,
    pub threshold: f32,
    pub on_error: FailurePolicy,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            input_width: GRID_DIM,
            input_height: GRID_DIM,
            threshold: DEFAULT_THRESHOLD,
            on_error: FailurePolicy::Benign,
        }
    }
}

impl ClassifierSettings {
    pub fn input_len(&self) -> usize {
        tensor_len(self.input_width, self.input_height)
    }
}

/// Outcome of classifying one image.
///
/// `error` is set when the verdict came from the [`FailurePolicy`] rather
/// than from a model score.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub verdict: Verdict,
    pub score: Option<f32>,
    pub error: Option<String>,
}

pub struct Classifier {
    model: Box<dyn BinaryModel>,
    settings: ClassifierSettings,
}

impl Classifier {
    pub fn new(model: Box<dyn BinaryModel>, settings: ClassifierSettings) -> Self {
        Self { model, settings }
    }

    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    /// `true` when the encoded image is classified as malicious.
    pub fn classify(&self, image_bytes: &[u8]) -> bool {
        self.evaluate(ImageInput::Encoded(image_bytes))
            .verdict
            .is_malicious()
    }

    /// Same as [`Classifier::classify`] for an already-decoded image.
    pub fn classify_image(&self, image: &image::DynamicImage) -> bool {
        self.evaluate(ImageInput::Decoded(image))
            .verdict
            .is_malicious()
    }

    /// Classify one image. Never fails: errors resolve through the
    /// configured [`FailurePolicy`].
    pub fn evaluate(&self, input: ImageInput<'_>) -> Classification {
        match self.score(input) {
            Ok(score) => {
                let verdict = Verdict::from_score(score, self.settings.threshold);
                debug!(score, ?verdict, "classified image");
                Classification {
                    verdict,
                    score: Some(score),
                    error: None,
                }
            }
            Err(e) => {
                let verdict = self.settings.on_error.verdict();
                warn!(error = %e, ?verdict, "classification failed, applying failure policy");
                Classification {
                    verdict,
                    score: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// The tensor the model would see for `input`.
    pub fn prepare(&self, input: ImageInput<'_>) -> Result<InputTensor> {
        InputTensor::from_input(input, self.settings.input_width, self.settings.input_height)
    }

    /// Raw model score for `input`. A non-finite score is an inference
    /// failure, not a result.
    pub fn score(&self, input: ImageInput<'_>) -> Result<f32> {
        let tensor = self.prepare(input)?;
        let score = self.model.predict(&tensor)?;
        if !score.is_finite() {
            return Err(ScanError::Inference(format!("model returned {score}")));
        }
        Ok(score)
    }
}
