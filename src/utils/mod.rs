//! Pixel and tensor transforms shared by the pipelines

pub mod postprocessing;
pub mod preprocessing;
pub mod validation;

pub use postprocessing::ImagePostprocessor;
pub use preprocessing::{ImagePreprocessor, PreprocessingOptions};
pub use validation::TensorValidator;
