pub mod diagnosis;
pub mod pipeline;
pub mod types;

pub use diagnosis::DiagnosisResolver;
pub use pipeline::{TriagePipeline, TriageTimeouts};
pub use types::{CaseRecord, CaseRecordInput, ClassProbabilities, Diagnosis, PatientMeta};
