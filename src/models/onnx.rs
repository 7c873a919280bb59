use crate::models::{ModelDescriptor, ProbabilityModel};
use crate::utils::error::TriageError;
use crate::{Config, Result};
use ndarray::Array4;
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;

/// 基于 ONNX Runtime 的分类模型
///
/// `Session::run` 需要可变借用，因此用互斥锁串行化推理调用。
pub struct OnnxModel {
    session: Mutex<Session>,
    input_name: String,
    output_name: String, // 动态发现的输出名称
}

impl OnnxModel {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = &config.model_path;

        if !model_path.exists() {
            return Err(TriageError::ModelLoad(format!(
                "Classification model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading classification model from: {}", model_path.display());

        let level = match config.onnx_config.optimization_level {
            i32::MIN..=0 => GraphOptimizationLevel::Disable,
            1 => GraphOptimizationLevel::Level1,
            2 => GraphOptimizationLevel::Level2,
            _ => GraphOptimizationLevel::Level3,
        };

        let session = Session::builder()
            .map_err(load_error)?
            .with_optimization_level(level)
            .map_err(load_error)?
            .with_intra_threads(config.onnx_config.intra_threads)
            .map_err(load_error)?
            .commit_from_file(model_path)
            .map_err(load_error)?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => {
                return Err(TriageError::ModelLoad(
                    "Classification model has no inputs".to_string(),
                ))
            }
        };

        // 动态发现输出名称
        let output_name = match session.outputs.first() {
            Some(output) => output.name.clone(),
            None => {
                return Err(TriageError::ModelLoad(
                    "Classification model has no outputs".to_string(),
                ))
            }
        };

        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Classification output[{}]: '{}'", i, output.name);
        }
        tracing::info!(
            "Classification model ready: input='{}', output='{}'",
            input_name,
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

fn load_error<E: std::fmt::Display>(err: E) -> TriageError {
    TriageError::ModelLoad(err.to_string())
}

impl ProbabilityModel for OnnxModel {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let input_tensor =
            Tensor::from_array(input).map_err(|e| TriageError::Inference(e.to_string()))?;

        let predictions = {
            let mut session = self.session.lock();
            let outputs = session
                .run(inputs![self.input_name.as_str() => input_tensor])
                .map_err(|e| TriageError::Inference(e.to_string()))?;

            match outputs.get(self.output_name.as_str()) {
                Some(output) => output
                    .try_extract_array::<f32>()
                    .map_err(|e| TriageError::Inference(e.to_string()))?
                    .into_owned(),
                None => {
                    let available_outputs: Vec<String> =
                        outputs.keys().map(|s| s.to_string()).collect();
                    return Err(TriageError::Inference(format!(
                        "Classification output '{}' not found. Available outputs: {:?}",
                        self.output_name, available_outputs
                    )));
                }
            }
        };

        // 期望 (1, num_classes)
        let shape = predictions.shape().to_vec();
        if shape.len() != 2 || shape[0] != 1 {
            return Err(TriageError::Inference(format!(
                "Expected classification output of shape [1, N], got {:?}",
                shape
            )));
        }

        Ok(predictions.iter().copied().collect())
    }

    fn describe(&self) -> ModelDescriptor {
        ModelDescriptor {
            backend: "onnxruntime".to_string(),
            input_name: self.input_name.clone(),
            output_name: self.output_name.clone(),
        }
    }
}
