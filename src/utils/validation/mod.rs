//! Validation helpers shared by the pipelines

pub mod tensor;

pub use tensor::{TensorValidator, MAX_DIMENSION};
