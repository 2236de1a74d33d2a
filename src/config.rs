//! Configuration types for enhancement and background removal

use crate::{
    error::{FilterError, Result},
    models::ModelSpec,
    types::TensorRange,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

/// Execution provider options for inference backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl std::str::FromStr for ExecutionProvider {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(FilterError::invalid_config(format!(
                "Unknown execution provider '{}'. Use auto, cpu, cuda or coreml",
                other
            ))),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG (no transparency)
    Jpeg,
    /// WebP with alpha channel transparency
    WebP,
    /// TIFF with alpha channel transparency and lossless compression
    Tiff,
    /// Raw RGBA8 pixel data (4 bytes per pixel)
    Rgba8,
}

/// How the postprocessor interprets the value range of model output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputRange {
    /// Per-pixel detection: a triple with any negative component is read as `[-1, 1]`
    #[default]
    Auto,
    /// The model always emits this range
    Fixed(TensorRange),
}

/// Settings handed to an inference backend at initialization
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads (0 = auto)
    pub inter_threads: usize,
}

impl InferenceConfig {
    /// Intra-op threads set to `threads`, inter-op to half of it
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads;
        self.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }
}

/// Configuration for the enhancement pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    /// Super-resolution model to load
    pub model_spec: ModelSpec,

    /// Center the image on a square canvas before resizing to the model input
    pub pad_to_square: bool,

    /// Canvas color used for square padding
    pub padding_color: [u8; 3],

    /// Range the input tensor is normalised into
    pub input_range: TensorRange,

    /// Range interpretation of the model output
    pub output_range: OutputRange,

    /// Crop the upscaled square back to the original aspect ratio
    pub restore_aspect: bool,

    pub inference: InferenceConfig,

    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            model_spec: ModelSpec::esrgan_x4("models/RealESRGAN_x4plus.onnx"),
            pad_to_square: true,
            padding_color: [0, 0, 0],
            input_range: TensorRange::ZeroToOne,
            output_range: OutputRange::Auto,
            restore_aspect: true,
            inference: InferenceConfig::default(),
            output_format: OutputFormat::Jpeg,
            jpeg_quality: 95,
        }
    }
}

impl EnhancementConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use filterkit::{EnhancementConfig, OutputFormat};
    ///
    /// let config = EnhancementConfig::builder()
    ///     .pad_to_square(false)
    ///     .output_format(OutputFormat::Png)
    ///     .build()
    ///     .unwrap();
    /// assert!(!config.pad_to_square);
    /// ```
    #[must_use]
    pub fn builder() -> EnhancementConfigBuilder {
        EnhancementConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - JPEG quality above 100
    /// - Invalid model specification
    pub fn validate(&self) -> Result<()> {
        validate_quality(self.jpeg_quality)?;
        self.model_spec.validate()?;
        if self.model_spec.output_channels != 3 {
            return Err(FilterError::config_value_error(
                "enhancement model output channels",
                self.model_spec.output_channels,
                "3",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration, missing fields take defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        parse_json::<Self>(json).and_then(|config| {
            config.validate()?;
            Ok(config)
        })
    }

    /// Read a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = read_config_file(path.as_ref())?;
        Self::from_json_str(&json)
    }
}

/// Builder for `EnhancementConfig`
#[derive(Debug, Default)]
pub struct EnhancementConfigBuilder {
    config: EnhancementConfig,
}

impl EnhancementConfigBuilder {
    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    #[must_use]
    pub fn pad_to_square(mut self, pad: bool) -> Self {
        self.config.pad_to_square = pad;
        self
    }

    #[must_use]
    pub fn padding_color(mut self, color: [u8; 3]) -> Self {
        self.config.padding_color = color;
        self
    }

    #[must_use]
    pub fn input_range(mut self, range: TensorRange) -> Self {
        self.config.input_range = range;
        self
    }

    #[must_use]
    pub fn output_range(mut self, range: OutputRange) -> Self {
        self.config.output_range = range;
        self
    }

    #[must_use]
    pub fn restore_aspect(mut self, restore: bool) -> Self {
        self.config.restore_aspect = restore;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.inference.execution_provider = provider;
        self
    }

    /// Set both intra and inter threads (0 = auto)
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.inference = self.config.inference.with_threads(threads);
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Stored as given; out-of-range values are rejected by `build`
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - JPEG quality above 100
    /// - Model specification with zero-sized input, zero scale or non-RGB output
    pub fn build(self) -> Result<EnhancementConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration for the background removal pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Segmentation model to load
    pub model_spec: ModelSpec,

    /// Range the segmenter input is normalised into
    pub input_range: TensorRange,

    /// Resize the composite back to the input dimensions
    pub restore_original_size: bool,

    pub inference: InferenceConfig,

    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            model_spec: ModelSpec::selfie_segmenter("models/selfie_segmenter.onnx"),
            input_range: TensorRange::ZeroToOne,
            restore_original_size: false,
            inference: InferenceConfig::default(),
            output_format: OutputFormat::Png,
            jpeg_quality: 90,
        }
    }
}

impl RemovalConfig {
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - JPEG quality above 100
    /// - Invalid model specification or a model that does not emit one channel
    pub fn validate(&self) -> Result<()> {
        validate_quality(self.jpeg_quality)?;
        self.model_spec.validate()?;
        if self.model_spec.output_channels != 1 {
            return Err(FilterError::config_value_error(
                "segmentation model output channels",
                self.model_spec.output_channels,
                "1",
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        parse_json::<Self>(json).and_then(|config| {
            config.validate()?;
            Ok(config)
        })
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = read_config_file(path.as_ref())?;
        Self::from_json_str(&json)
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    #[must_use]
    pub fn input_range(mut self, range: TensorRange) -> Self {
        self.config.input_range = range;
        self
    }

    #[must_use]
    pub fn restore_original_size(mut self, restore: bool) -> Self {
        self.config.restore_original_size = restore;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.inference.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.inference = self.config.inference.with_threads(threads);
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn validate_quality(jpeg_quality: u8) -> Result<()> {
    if jpeg_quality > 100 {
        return Err(FilterError::config_value_error(
            "JPEG quality",
            jpeg_quality,
            "0-100",
        ));
    }
    Ok(())
}

fn parse_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json)
        .map_err(|e| FilterError::invalid_config(format!("Malformed JSON configuration: {}", e)))
}

fn read_config_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| FilterError::file_io_error("read configuration", path, &e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhancement_defaults() {
        let config = EnhancementConfig::default();
        assert!(config.pad_to_square);
        assert!(config.restore_aspect);
        assert_eq!(config.padding_color, [0, 0, 0]);
        assert_eq!(config.jpeg_quality, 95);
        assert_eq!(config.output_range, OutputRange::Auto);
        assert_eq!(config.model_spec.input_size, (128, 128));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_removal_defaults() {
        let config = RemovalConfig::default();
        assert!(!config.restore_original_size);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert_eq!(config.model_spec.output_channels, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_bad_quality() {
        let result = EnhancementConfig::builder().jpeg_quality(150).build();
        assert!(matches!(result, Err(FilterError::InvalidConfig(_))));

        let result = RemovalConfig::builder().jpeg_quality(101).build();
        assert!(matches!(result, Err(FilterError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_rejects_mismatched_model() {
        let result = RemovalConfig::builder()
            .model_spec(ModelSpec::esrgan_x4("esrgan.onnx"))
            .build();
        assert!(result.is_err());

        let result = EnhancementConfig::builder()
            .model_spec(ModelSpec::selfie_segmenter("selfie.onnx"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_num_threads_split() {
        let config = EnhancementConfig::builder().num_threads(8).build().unwrap();
        assert_eq!(config.inference.intra_threads, 8);
        assert_eq!(config.inference.inter_threads, 4);

        let config = RemovalConfig::builder().num_threads(1).build().unwrap();
        assert_eq!(config.inference.inter_threads, 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EnhancementConfig::from_json_str(
            r#"{ "pad_to_square": false, "output_range": { "fixed": "minus_one_to_one" } }"#,
        )
        .unwrap();
        assert!(!config.pad_to_square);
        assert_eq!(
            config.output_range,
            OutputRange::Fixed(TensorRange::MinusOneToOne)
        );
        assert_eq!(config.jpeg_quality, 95);
    }

    #[test]
    fn test_json_validation_and_errors() {
        assert!(RemovalConfig::from_json_str(r#"{ "jpeg_quality": 200 }"#).is_err());
        assert!(matches!(
            RemovalConfig::from_json_str("{ not json"),
            Err(FilterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("removal.json");
        let original = RemovalConfig::builder()
            .restore_original_size(true)
            .output_format(OutputFormat::WebP)
            .build()
            .unwrap();
        std::fs::write(&path, serde_json::to_string_pretty(&original).unwrap()).unwrap();

        let loaded = RemovalConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, original);

        assert!(matches!(
            RemovalConfig::from_json_file(dir.path().join("missing.json")),
            Err(FilterError::Io(_))
        ));
    }

    #[test]
    fn test_execution_provider_parsing() {
        assert_eq!("CUDA".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Cuda);
        assert_eq!(ExecutionProvider::CoreMl.to_string(), "coreml");
        assert!("tpu".parse::<ExecutionProvider>().is_err());
    }
}
