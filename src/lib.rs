#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # filterkit
//!
//! Photo enhancement and background replacement pipelines built around two
//! external models: a super-resolution upscaler and a foreground segmenter.
//!
//! ## Features
//!
//! - **Enhancement**: pad to square, run an integer-factor upscaler, crop back
//!   to the original aspect ratio
//! - **Background replacement**: segment, mask, composite over a transparent,
//!   solid colour, blurred or image background
//! - **Multiple Backends**: Tract (pure Rust, default) and ONNX Runtime
//!   (feature `onnx`), plus a deterministic mock for tests and dry runs
//! - **Observable sessions**: immutable state snapshots published over a
//!   `tokio::sync::watch` channel
//! - **CLI Integration**: `filterkit` binary behind the `cli` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use filterkit::{enhance, BackendType, EnhancementConfig, ModelSpec, ImageIOService};
//!
//! # fn example() -> filterkit::Result<()> {
//! let config = EnhancementConfig::builder()
//!     .model_spec(ModelSpec::esrgan_x4("models/RealESRGAN_x4plus.onnx"))
//!     .build()?;
//! let image = ImageIOService::load_image("photo.jpg")?;
//! let result = enhance(&image, &config, BackendType::Tract)?;
//! result.save("photo_x4.jpg", config.output_format, config.jpeg_quality)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Background replacement
//!
//! ```rust,no_run
//! use filterkit::{remove_background_from_bytes, BackendType, BackgroundSpec, RemovalConfig};
//!
//! # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
//! let config = RemovalConfig::default();
//! let background = BackgroundSpec::Blur { radius: 20.0 };
//! let result =
//!     remove_background_from_bytes(&upload, &config, &background, BackendType::Tract).await?;
//! let png = result.to_bytes(config.output_format, config.jpeg_quality)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): pure Rust backend
//! - `onnx`: ONNX Runtime backend with CUDA / `CoreML` providers
//! - `cli` (default): command-line interface and tracing subscriber
//! - `webp-support` (default): WebP output
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod segmentation;
pub mod services;
pub mod session;
pub mod state;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use backends::MockBackend;
#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;
#[cfg(feature = "tract")]
pub use backends::TractBackend;
pub use config::{
    EnhancementConfig, EnhancementConfigBuilder, ExecutionProvider, InferenceConfig,
    OutputFormat, OutputRange, RemovalConfig, RemovalConfigBuilder,
};
pub use error::{FilterError, Result};
pub use inference::{InferenceBackend, Segmenter};
pub use models::{ModelInfo, ModelSpec, TensorLayout};
pub use processor::{
    BackendFactory, BackendType, BackgroundRemovalProcessor, DefaultBackendFactory,
    EnhancementProcessor,
};
pub use segmentation::ModelSegmenter;
pub use services::{AlphaCompositor, BackgroundSynthesizer, ImageIOService, OutputFormatHandler};
pub use session::{EnhancementSession, RemovalSession};
pub use state::{EnhancementState, JobStatus, RemovalState, StateStore};
pub use types::{
    BackgroundSpec, FilterOperation, FilterResult, MaskStatistics, NormalizedTensor,
    ProcessingMetadata, ProcessingTimings, RawImage, SegmentationMask, TensorRange,
};
pub use utils::{ImagePostprocessor, ImagePreprocessor, PreprocessingOptions, TensorValidator};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Enhance an image with a freshly created backend
///
/// Blocks for the duration of model loading and inference.
///
/// # Examples
///
/// ```rust
/// use filterkit::{enhance, BackendType, EnhancementConfig, RawImage};
/// use image::Rgba;
///
/// let image = RawImage::filled(100, 50, Rgba([30, 60, 90, 255]));
/// let result = enhance(&image, &EnhancementConfig::default(), BackendType::Mock).unwrap();
/// assert_eq!(result.dimensions(), (512, 256));
/// ```
pub fn enhance(
    image: &RawImage,
    config: &EnhancementConfig,
    backend_type: BackendType,
) -> Result<FilterResult> {
    let mut processor =
        EnhancementProcessor::with_factory(config.clone(), &DefaultBackendFactory, backend_type)?;
    processor.enhance(image)
}

/// Replace the background of an image with a freshly created segmenter
pub fn remove_background(
    image: &RawImage,
    config: &RemovalConfig,
    background: &BackgroundSpec,
    backend_type: BackendType,
) -> Result<FilterResult> {
    let mut processor = BackgroundRemovalProcessor::with_factory(
        config.clone(),
        &DefaultBackendFactory,
        backend_type,
    )?;
    processor.remove_background(image, background)
}

async fn spawn_pipeline<F>(job: F) -> Result<FilterResult>
where
    F: FnOnce() -> Result<FilterResult> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| FilterError::internal(format!("Processing task failed: {}", e)))?
}

/// Enhance an encoded image (JPEG, PNG, WebP, TIFF)
///
/// Decoding and inference run on a blocking worker.
///
/// # Errors
/// - `InvalidInput` when the bytes are empty or cannot be decoded
/// - Any pipeline error from [`enhance`]
pub async fn enhance_from_bytes(
    image_bytes: &[u8],
    config: &EnhancementConfig,
    backend_type: BackendType,
) -> Result<FilterResult> {
    let bytes = image_bytes.to_vec();
    let config = config.clone();
    spawn_pipeline(move || {
        let image = ImageIOService::decode(&bytes)?;
        enhance(&image, &config, backend_type)
    })
    .await
}

/// Replace the background of an encoded image
///
/// # Errors
/// - `InvalidInput` when the bytes are empty or cannot be decoded
/// - Any pipeline error from [`remove_background`]
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &RemovalConfig,
    background: &BackgroundSpec,
    backend_type: BackendType,
) -> Result<FilterResult> {
    let bytes = image_bytes.to_vec();
    let config = config.clone();
    let background = background.clone();
    spawn_pipeline(move || {
        let image = ImageIOService::decode(&bytes)?;
        remove_background(&image, &config, &background, backend_type)
    })
    .await
}
