//! Model specifications and loading

use crate::error::{FilterError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Memory layout of the model's native input and output tensors
///
/// The pipeline always speaks NHWC; backends convert at their boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[batch, height, width, channels]`
    #[default]
    Nhwc,
    /// `[batch, channels, height, width]`
    Nchw,
}

/// External model file plus the tensor contract it honours
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Name used in logs and result metadata
    pub name: String,

    /// Path to the ONNX model file
    pub path: PathBuf,

    /// Model input `(width, height)`
    pub input_size: (u32, u32),

    /// Integer factor between input and output resolution
    pub scale: u32,

    /// Channels per output pixel: 3 for upscalers, 1 for segmenters
    pub output_channels: usize,

    #[serde(default)]
    pub layout: TensorLayout,
}

impl ModelSpec {
    /// RealESRGAN x4plus contract: 128x128 RGB in, 512x512 RGB out
    pub fn esrgan_x4<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            name: "realesrgan-x4plus".to_string(),
            path: path.into(),
            input_size: (128, 128),
            scale: 4,
            output_channels: 3,
            layout: TensorLayout::Nhwc,
        }
    }

    /// Selfie segmentation contract: 256x256 RGB in, 256x256 confidence out
    pub fn selfie_segmenter<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            name: "selfie-segmenter".to_string(),
            path: path.into(),
            input_size: (256, 256),
            scale: 1,
            output_channels: 1,
            layout: TensorLayout::Nhwc,
        }
    }

    #[must_use]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
        self.input_size = (width, height);
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Check that the contract describes a usable model
    ///
    /// # Errors
    /// - `InvalidConfig` for a zero-sized input, zero scale or zero output channels
    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.input_size;
        if width == 0 || height == 0 {
            return Err(FilterError::invalid_config(format!(
                "Model '{}' has zero-sized input {}x{}",
                self.name, width, height
            )));
        }
        if self.scale == 0 {
            return Err(FilterError::config_value_error("model scale", self.scale, "1 or more"));
        }
        if self.output_channels == 0 {
            return Err(FilterError::config_value_error(
                "model output channels",
                self.output_channels,
                "1 or more",
            ));
        }
        Ok(())
    }

    /// NHWC input shape `[1, H, W, 3]`
    #[must_use]
    pub fn input_shape(&self) -> (usize, usize, usize, usize) {
        let (width, height) = self.input_size;
        (1, height as usize, width as usize, 3)
    }

    /// NHWC output shape `[1, H*scale, W*scale, C]`
    #[must_use]
    pub fn output_shape(&self) -> (usize, usize, usize, usize) {
        let (width, height) = self.input_size;
        let scale = self.scale as usize;
        (
            1,
            height as usize * scale,
            width as usize * scale,
            self.output_channels,
        )
    }

    /// Short label for logs
    #[must_use]
    pub fn display_name(&self) -> String {
        let file = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}:{}", self.name, file)
    }

    /// Read the model file into memory
    ///
    /// # Errors
    /// - `ModelUnavailable` if the file is missing, unreadable or empty
    pub fn load_bytes(&self) -> Result<Vec<u8>> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            FilterError::model_error_with_context(
                "read",
                &self.path,
                &e.to_string(),
                &["check the model path", "export the model to ONNX"],
            )
        })?;
        if bytes.is_empty() {
            return Err(FilterError::model_error_with_context(
                "read",
                &self.path,
                "file is empty",
                &[],
            ));
        }
        log::debug!(
            "Read model {} ({:.2} MB)",
            self.display_name(),
            bytes.len() as f64 / (1024.0 * 1024.0)
        );
        Ok(bytes)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Model information and metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: usize,
    /// NHWC, as seen by the pipeline
    pub input_shape: (usize, usize, usize, usize),
    /// NHWC, as seen by the pipeline
    pub output_shape: (usize, usize, usize, usize),
    pub layout: TensorLayout,
}

impl ModelInfo {
    #[must_use]
    pub fn from_spec(spec: &ModelSpec, size_bytes: usize) -> Self {
        Self {
            name: spec.name.clone(),
            size_bytes,
            input_shape: spec.input_shape(),
            output_shape: spec.output_shape(),
            layout: spec.layout,
        }
    }
}
