use crate::image::INPUT_SHAPE;
use crate::models::NUM_CLASSES;
use crate::triage::ClassProbabilities;
use crate::utils::error::TriageError;
use crate::Result;
use ndarray::{Array, Array4, Dimension, Ix4};
use serde::Serialize;
use std::sync::Arc;

/// 推理后端抽象：输入 [1, 128, 128, 3] 张量，输出各类别分数
///
/// 实现必须可被多线程同时调用；不可重入的运行时需自行串行化。
pub trait ProbabilityModel: Send + Sync {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>>;

    fn describe(&self) -> ModelDescriptor;
}

/// 模型元信息（用于 /api/info 和日志）
#[derive(Debug, Clone, Serialize)]
pub struct ModelDescriptor {
    pub backend: String,
    pub input_name: String,
    pub output_name: String,
}

/// 脑部影像四分类器
pub struct Classifier {
    model: Arc<dyn ProbabilityModel>,
}

impl Classifier {
    pub fn new(model: Arc<dyn ProbabilityModel>) -> Self {
        Self { model }
    }

    /// 推理，返回按 CLASS_LABELS 顺序排列的概率
    pub fn infer<D: Dimension>(&self, tensor: Array<f32, D>) -> Result<ClassProbabilities> {
        if tensor.shape() != INPUT_SHAPE {
            return Err(TriageError::ShapeMismatch {
                expected: INPUT_SHAPE.to_vec(),
                actual: tensor.shape().to_vec(),
            });
        }

        let input = tensor
            .into_dimensionality::<Ix4>()
            .map_err(|e| TriageError::Internal(format!("tensor rank conversion failed: {}", e)))?;

        let scores = self.model.predict(input)?;
        if scores.len() != NUM_CLASSES {
            return Err(TriageError::Inference(format!(
                "model produced {} scores, expected {}",
                scores.len(),
                NUM_CLASSES
            )));
        }

        Ok(ClassProbabilities::new(scores))
    }

    pub fn descriptor(&self) -> ModelDescriptor {
        self.model.describe()
    }
}
