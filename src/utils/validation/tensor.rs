//! Tensor validation utilities
//!
//! Centralized checks for NHWC tensor shapes, buffer lengths and image
//! dimensions.

use crate::error::{FilterError, Result};
use ndarray::Array4;

/// Largest accepted side length for input images
pub const MAX_DIMENSION: u32 = 16384;

/// Validator for tensor operations and shape validation
pub struct TensorValidator;

impl TensorValidator {
    /// Validate tensor shape matches expected NHWC dimensions
    pub fn validate_tensor_shape(
        tensor: &Array4<f32>,
        expected_shape: (usize, usize, usize, usize),
    ) -> Result<()> {
        let actual = tensor.dim();
        if actual != expected_shape {
            let (n, h, w, c) = expected_shape;
            return Err(FilterError::shape_mismatch(format!(
                "Tensor shape mismatch. Expected [{}, {}, {}, {}], got [{}, {}, {}, {}]",
                n, h, w, c, actual.0, actual.1, actual.2, actual.3
            )));
        }
        Ok(())
    }

    /// Validate batch size 1 and the given channel count
    pub fn validate_single_batch(tensor: &Array4<f32>, channels: usize) -> Result<()> {
        let (batch, _, _, actual_channels) = tensor.dim();
        if batch != 1 || actual_channels != channels {
            return Err(FilterError::shape_mismatch(format!(
                "Tensor must have batch size 1 and {} channel(s), got batch {} with {}",
                channels, batch, actual_channels
            )));
        }
        Ok(())
    }

    /// Validate a flat `what` buffer holds exactly `width * height * channels` values
    pub fn validate_buffer_length(
        what: &str,
        len: usize,
        width: u32,
        height: u32,
        channels: usize,
    ) -> Result<()> {
        let dims = [height as usize, width as usize, channels];
        if len != dims.iter().product::<usize>() {
            return Err(FilterError::buffer_length_mismatch(what, len, &dims));
        }
        Ok(())
    }

    /// Validate image dimensions are within reasonable bounds
    pub fn validate_image_dimensions(width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(FilterError::invalid_input(format!(
                "Image has zero-sized dimensions {}x{}",
                width, height
            )));
        }

        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(FilterError::invalid_input(format!(
                "Image dimensions too large: {}x{}. Maximum: {}x{}",
                width, height, MAX_DIMENSION, MAX_DIMENSION
            )));
        }

        Ok(())
    }

    /// Validate a resize target
    pub fn validate_target_size(width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(FilterError::invalid_config(format!(
                "Target size must be non-zero, got {}x{}",
                width, height
            )));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(FilterError::invalid_config(format!(
                "Target size {}x{} exceeds maximum {}",
                width, height, MAX_DIMENSION
            )));
        }
        Ok(())
    }

    /// Validate `output` is `input` times one integer factor on both axes
    ///
    /// Returns the factor.
    pub fn validate_scale_factor(input: (u32, u32), output: (u32, u32)) -> Result<u32> {
        let (in_w, in_h) = input;
        let (out_w, out_h) = output;
        if in_w == 0 || in_h == 0 {
            return Err(FilterError::shape_mismatch("Model input has zero size"));
        }
        if out_w % in_w != 0 || out_h % in_h != 0 || out_w / in_w != out_h / in_h || out_w == 0 {
            return Err(FilterError::shape_mismatch(format!(
                "Model output {}x{} is not an integer multiple of input {}x{}",
                out_w, out_h, in_w, in_h
            )));
        }
        Ok(out_w / in_w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn test_validate_tensor_shape() {
        let tensor = Array::zeros((1, 256, 256, 3));
        assert!(TensorValidator::validate_tensor_shape(&tensor, (1, 256, 256, 3)).is_ok());

        assert!(matches!(
            TensorValidator::validate_tensor_shape(&tensor, (1, 256, 256, 1)),
            Err(FilterError::ShapeMismatch(_))
        ));
        assert!(TensorValidator::validate_tensor_shape(&tensor, (2, 256, 256, 3)).is_err());
    }

    #[test]
    fn test_validate_single_batch() {
        let mask = Array::zeros((1, 64, 64, 1));
        assert!(TensorValidator::validate_single_batch(&mask, 1).is_ok());
        assert!(TensorValidator::validate_single_batch(&mask, 3).is_err());

        let batch = Array::zeros((2, 64, 64, 1));
        assert!(TensorValidator::validate_single_batch(&batch, 1).is_err());
    }

    #[test]
    fn test_validate_buffer_length() {
        assert!(TensorValidator::validate_buffer_length("Tensor", 1000 * 3, 25, 40, 3).is_ok());
        assert!(TensorValidator::validate_buffer_length("Mask", 999, 25, 40, 1).is_err());

        let message = TensorValidator::validate_buffer_length("Mask", 1001, 25, 40, 1)
            .unwrap_err()
            .to_string();
        assert!(message.contains("Mask"), "message was {}", message);
    }

    #[test]
    fn test_validate_image_dimensions() {
        assert!(TensorValidator::validate_image_dimensions(1920, 1080).is_ok());

        assert!(matches!(
            TensorValidator::validate_image_dimensions(0, 100),
            Err(FilterError::InvalidInput(_))
        ));
        assert!(TensorValidator::validate_image_dimensions(100, 0).is_err());
        assert!(TensorValidator::validate_image_dimensions(20000, 1080).is_err());
    }

    #[test]
    fn test_validate_target_size() {
        assert!(TensorValidator::validate_target_size(128, 128).is_ok());
        assert!(matches!(
            TensorValidator::validate_target_size(0, 128),
            Err(FilterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_scale_factor() {
        assert_eq!(
            TensorValidator::validate_scale_factor((128, 128), (512, 512)).unwrap(),
            4
        );
        assert_eq!(TensorValidator::validate_scale_factor((64, 32), (64, 32)).unwrap(), 1);

        assert!(TensorValidator::validate_scale_factor((128, 128), (500, 500)).is_err());
        assert!(TensorValidator::validate_scale_factor((128, 128), (512, 256)).is_err());
        assert!(TensorValidator::validate_scale_factor((128, 128), (0, 0)).is_err());
    }
}
