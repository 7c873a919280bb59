pub mod deadline;
pub mod error;

pub use deadline::{with_timeout, Deadline};
