//! Model loading and inference via the `ort` crate.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use ndarray::Array2;
use ort::session::Session;
use ort::value::TensorRef;
use tracing::info;

use crate::error::{Result, ScanError};
use crate::tensor::InputTensor;

/// A pretrained binary classifier: one tensor in, one score out.
///
/// Implementations are shared read-only across a scan, so `predict` takes
/// `&self`.
pub trait BinaryModel: Send + Sync {
    /// Score in `[0.0, 1.0]`; higher means more likely malicious.
    fn predict(&self, input: &InputTensor) -> Result<f32>;
}

pub struct OnnxModel {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_len: usize,
}

impl OnnxModel {
    /// Load an ONNX model expecting a `[1, input_len]` float input.
    ///
    /// Any failure here means the scanner is unavailable.
    pub fn load(model_path: &Path, input_len: usize) -> Result<Self> {
        Self::build(model_path, input_len).map_err(|e| ScanError::ScannerUnavailable {
            path: model_path.to_path_buf(),
            reason: format!("{e:#}"),
        })
    }

    fn build(model_path: &Path, input_len: usize) -> anyhow::Result<Self> {
        let session = Session::builder()?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .context("reading model file")?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| anyhow!("model declares no inputs"))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| anyhow!("model declares no outputs"))?;

        info!(
            path = %model_path.display(),
            %input_name,
            %output_name,
            input_len,
            "model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_len,
        })
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }
}

impl BinaryModel for OnnxModel {
    /// Input shape: (input_len,) -> reshaped to (1, input_len) for batch dim.
    fn predict(&self, input: &InputTensor) -> Result<f32> {
        if input.len() != self.input_len {
            return Err(ScanError::TensorShape {
                expected: self.input_len,
                actual: input.len(),
            });
        }

        let batch = Array2::from_shape_vec((1, input.len()), input.as_slice().to_vec())
            .map_err(|e| ScanError::Inference(e.to_string()))?;
        let input_tensor =
            TensorRef::from_array_view(&batch).map_err(|e| ScanError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ScanError::Inference(format!("lock error: {e}")))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| ScanError::Inference(e.to_string()))?;

        let output_array = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| ScanError::Inference(e.to_string()))?;
        let score = output_array
            .iter()
            .next()
            .copied()
            .ok_or_else(|| ScanError::Inference("model produced an empty output".into()))?;

        Ok(score)
    }
}
