use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 单次推理输出的类别概率，顺序与 CLASS_LABELS 一致
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilities(Vec<f32>);

impl ClassProbabilities {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// 患者信息，均为自由文本，不做校验
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// 诊断结果：标签与格式化后的置信度
///
/// 只能由 `DiagnosisResolver` 构造，保证标签来自固定类别表。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    class_index: usize,
    label: String,
    confidence_percent: String,
}

impl Diagnosis {
    pub(crate) fn new(class_index: usize, label: String, confidence_percent: String) -> Self {
        Self {
            class_index,
            label,
            confidence_percent,
        }
    }

    pub fn class_index(&self) -> usize {
        self.class_index
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence_percent(&self) -> &str {
        &self.confidence_percent
    }
}

/// 待写入的病例记录（id 与时间戳由存储层分配）
#[derive(Debug, Clone, PartialEq)]
pub struct CaseRecordInput {
    pub patient: PatientMeta,
    pub image_ref: String,
    pub diagnosis: Diagnosis,
}

impl CaseRecordInput {
    pub fn new(patient: PatientMeta, image_ref: impl Into<String>, diagnosis: Diagnosis) -> Self {
        Self {
            patient,
            image_ref: image_ref.into(),
            diagnosis,
        }
    }
}

/// 已持久化的病例记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: Uuid,
    pub patient_name: Option<String>,
    pub patient_age: Option<String>,
    pub patient_phone: Option<String>,
    pub image_ref: String,
    pub diagnosis_label: String,
    pub confidence_percent: String,
    pub created_at: DateTime<Utc>,
}

impl CaseRecord {
    /// 除 id / created_at 外是否与输入一致
    pub fn matches_input(&self, input: &CaseRecordInput) -> bool {
        self.patient_name == input.patient.name
            && self.patient_age == input.patient.age
            && self.patient_phone == input.patient.phone
            && self.image_ref == input.image_ref
            && self.diagnosis_label == input.diagnosis.label()
            && self.confidence_percent == input.diagnosis.confidence_percent()
    }
}
