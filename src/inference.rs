//! Inference backend abstraction

use crate::{
    config::InferenceConfig,
    error::Result,
    models::ModelInfo,
    types::{RawImage, SegmentationMask},
};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// An external model reached through a fixed NHWC tensor contract
///
/// Upscalers accept `[1, H, W, 3]` and return `[1, H*s, W*s, 3]`; segmenters
/// return `[1, H', W', 1]`. Backends whose model is NCHW convert internally.
pub trait InferenceBackend: Send {
    /// Load the model and prepare a session
    ///
    /// Returns the model load time on first initialization, `None` when the
    /// backend was already initialized.
    ///
    /// # Errors
    /// - `ModelUnavailable` when the model file cannot be read or compiled
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>>;

    /// Run inference on an NHWC input tensor
    ///
    /// # Errors
    /// - `ModelUnavailable` if not initialized or the model fails to execute
    /// - `ShapeMismatch` if the output cannot be read as an NHWC tensor
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Expected NHWC input shape
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Expected NHWC output shape
    fn output_shape(&self) -> (usize, usize, usize, usize);

    /// Get model information for this backend
    ///
    /// # Errors
    /// - Backend not initialized
    fn get_model_info(&self) -> Result<ModelInfo>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}

/// Produces a foreground confidence mask for an image
///
/// The mask carries its own resolution, which may differ from the image's.
pub trait Segmenter: Send {
    /// Prepare the underlying model, returning its load time on first call
    ///
    /// # Errors
    /// - `ModelUnavailable` when the model cannot be loaded
    fn initialize(&mut self, _config: &InferenceConfig) -> Result<Option<Duration>> {
        Ok(None)
    }

    /// # Errors
    /// - `InvalidInput` for empty images
    /// - `ModelUnavailable` when the underlying model fails
    fn segment(&mut self, image: &RawImage) -> Result<SegmentationMask>;

    /// Name reported in result metadata
    fn name(&self) -> String {
        "segmenter".to_string()
    }
}
