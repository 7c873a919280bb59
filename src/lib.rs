pub mod config;
pub mod image;
pub mod models;
pub mod storage;
pub mod triage;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use triage::{CaseRecord, TriagePipeline};
pub use utils::error::TriageError;

pub type Result<T> = std::result::Result<T, TriageError>;
