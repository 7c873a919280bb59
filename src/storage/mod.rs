pub mod files;
pub mod records;

pub use files::{ImageStore, LocalImageStore};
pub use records::CaseRecordStore;
