pub mod classifier;
pub mod labels;
pub mod manager;
pub mod onnx;

pub use classifier::{Classifier, ModelDescriptor, ProbabilityModel};
pub use labels::{CLASS_LABELS, NO_TUMOR_CLASS, NUM_CLASSES};
pub use manager::{ModelManager, ModelStats};
pub use onnx::OnnxModel;

// Re-export convenience functions from manager
pub use manager::get_classifier;
