use crate::models::{CLASS_LABELS, NO_TUMOR_CLASS, NUM_CLASSES};
use crate::triage::Diagnosis;
use crate::utils::error::TriageError;
use crate::Result;

/// 把类别概率转换为诊断标签与置信度字符串
pub struct DiagnosisResolver;

impl DiagnosisResolver {
    pub fn resolve(probabilities: &[f32]) -> Result<Diagnosis> {
        if probabilities.len() != NUM_CLASSES {
            return Err(TriageError::InvalidVector(format!(
                "expected {} probabilities, got {}",
                NUM_CLASSES,
                probabilities.len()
            )));
        }

        if let Some(bad) = probabilities.iter().find(|p| !p.is_finite()) {
            return Err(TriageError::InvalidVector(format!(
                "non-finite probability: {}",
                bad
            )));
        }

        let (index, max_prob) = Self::argmax(probabilities);
        let class_name = CLASS_LABELS[index];

        let label = if class_name == NO_TUMOR_CLASS {
            "No Tumor".to_string()
        } else {
            format!("Tumor: {}", class_name)
        };

        Ok(Diagnosis::new(index, label, Self::format_confidence(max_prob)))
    }

    /// 最大值下标，并列时取最小下标
    fn argmax(values: &[f32]) -> (usize, f32) {
        let mut max_idx = 0;
        let mut max_prob = values[0];

        for (i, &prob) in values.iter().enumerate().skip(1) {
            if prob > max_prob {
                max_prob = prob;
                max_idx = i;
            }
        }

        (max_idx, max_prob)
    }

    /// 百分比保留两位小数：按 f64 精确值就近舍入（与 `{:.2}` 一致），不截断
    pub fn format_confidence(probability: f32) -> String {
        format!("{:.2}%", f64::from(probability) * 100.0)
    }
}
