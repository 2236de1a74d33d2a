//! Enhancement and background removal processors
//!
//! Each processor owns one model collaborator and runs its pipeline as a
//! linear sequence of pure transforms. Backends are created through a
//! [`BackendFactory`] so callers and tests can swap inference engines.

use crate::{
    backends::MockBackend,
    config::{EnhancementConfig, RemovalConfig},
    error::{FilterError, Result},
    inference::{InferenceBackend, Segmenter},
    models::ModelSpec,
    segmentation::ModelSegmenter,
    services::{AlphaCompositor, BackgroundSynthesizer},
    types::{
        BackgroundSpec, FilterOperation, FilterResult, NormalizedTensor, ProcessingMetadata,
        ProcessingTimings, RawImage,
    },
    utils::{ImagePostprocessor, ImagePreprocessor, PreprocessingOptions, TensorValidator},
};
use instant::Instant;
use log::{debug, info};
use std::fmt;
use std::str::FromStr;
use tracing::{instrument, span, Level};

/// Backend type enumeration for runtime selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendType {
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Deterministic stand-in, no model file required
    Mock,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tract => write!(f, "tract"),
            Self::Onnx => write!(f, "onnx"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for BackendType {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tract" => Ok(Self::Tract),
            "onnx" => Ok(Self::Onnx),
            "mock" => Ok(Self::Mock),
            other => Err(FilterError::invalid_config(format!(
                "Unknown backend '{}'. Use tract, onnx or mock",
                other
            ))),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend for `spec`
    ///
    /// # Errors
    /// - `InvalidConfig` when the backend type is not compiled in
    fn create_backend(
        &self,
        backend_type: BackendType,
        spec: &ModelSpec,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Factory for the backends enabled by crate features
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        spec: &ModelSpec,
    ) -> Result<Box<dyn InferenceBackend>> {
        debug!("Creating {} backend for {}", backend_type, spec.display_name());
        match backend_type {
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::new(spec.clone()))),
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::new(spec.clone()))),
            BackendType::Mock => Ok(Box::new(MockBackend::for_spec(spec))),
            #[allow(unreachable_patterns)]
            other => Err(FilterError::invalid_config(format!(
                "Backend '{}' is not available in this build. Enable the '{}' feature",
                other, other
            ))),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        backends.push(BackendType::Mock);
        backends
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Super-resolution pipeline: preprocess, infer, postprocess, crop
pub struct EnhancementProcessor {
    config: EnhancementConfig,
    backend: Box<dyn InferenceBackend>,
    pending_load_ms: u64,
}

impl EnhancementProcessor {
    /// Wrap an already created backend
    #[must_use]
    pub fn new(config: EnhancementConfig, backend: Box<dyn InferenceBackend>) -> Self {
        Self {
            config,
            backend,
            pending_load_ms: 0,
        }
    }

    /// Create the backend for `config.model_spec` through a factory
    pub fn with_factory(
        config: EnhancementConfig,
        factory: &dyn BackendFactory,
        backend_type: BackendType,
    ) -> Result<Self> {
        config.validate()?;
        let backend = factory.create_backend(backend_type, &config.model_spec)?;
        Ok(Self::new(config, backend))
    }

    #[must_use]
    pub fn config(&self) -> &EnhancementConfig {
        &self.config
    }

    /// Load the model if not done yet
    ///
    /// # Errors
    /// - `ModelUnavailable` when the model cannot be loaded
    pub fn initialize(&mut self) -> Result<()> {
        if self.backend.is_initialized() {
            return Ok(());
        }
        info!("Initializing enhancement processor");
        if let Some(load_time) = self.backend.initialize(&self.config.inference)? {
            self.pending_load_ms = load_time.as_millis() as u64;
        }
        Ok(())
    }

    /// Upscale `image` by the model's factor
    ///
    /// The result has the original aspect ratio when the input was padded and
    /// `restore_aspect` is set; otherwise it is the model's square output.
    ///
    /// # Errors
    /// - `InvalidInput` for empty images
    /// - `ModelUnavailable` when the model cannot load or run
    /// - `ShapeMismatch` when the model output violates its contract
    #[instrument(
        skip(self, image),
        fields(dimensions = %format!("{}x{}", image.width(), image.height()))
    )]
    pub fn enhance(&mut self, image: &RawImage) -> Result<FilterResult> {
        TensorValidator::validate_image_dimensions(image.width(), image.height())?;
        self.initialize()?;

        let total_start = Instant::now();
        let mut timings = ProcessingTimings {
            model_load_ms: std::mem::take(&mut self.pending_load_ms),
            ..ProcessingTimings::default()
        };
        let original_dimensions = image.dimensions();

        info!(
            "🎯 Enhancing {}x{} image",
            original_dimensions.0, original_dimensions.1
        );

        let input_tensor = {
            let _span = span!(Level::DEBUG, "preprocessing").entered();
            let start = Instant::now();
            let (_, height, width, channels) = self.backend.input_shape();
            if channels != 3 {
                return Err(FilterError::shape_mismatch(format!(
                    "Enhancement model must take 3 input channels, declares {}",
                    channels
                )));
            }
            let target_size = (
                u32::try_from(width).map_err(|_| FilterError::shape_mismatch("Model input too wide"))?,
                u32::try_from(height).map_err(|_| FilterError::shape_mismatch("Model input too tall"))?,
            );
            let options = PreprocessingOptions {
                target_size,
                pad_to_square: self.config.pad_to_square,
                padding_color: self.config.padding_color,
                range: self.config.input_range,
            };
            let tensor = ImagePreprocessor::preprocess(image, &options)?;
            timings.preprocessing_ms = elapsed_ms(start);
            tensor
        };

        let output = {
            let _span = span!(Level::INFO, "inference").entered();
            let start = Instant::now();
            let output = self.backend.infer(&input_tensor.to_nhwc()?)?;
            timings.inference_ms = elapsed_ms(start);
            output
        };

        let result_image = {
            let _span = span!(Level::DEBUG, "postprocessing").entered();
            let start = Instant::now();

            TensorValidator::validate_single_batch(&output, 3)?;
            let output_tensor = NormalizedTensor::from_nhwc(&output)?;
            let scale = TensorValidator::validate_scale_factor(
                input_tensor.dimensions(),
                output_tensor.dimensions(),
            )?;
            debug!("Model upscaled by x{}", scale);

            let upscaled = ImagePostprocessor::postprocess(
                &output_tensor,
                output_tensor.dimensions(),
                self.config.output_range,
            )?;
            let result = match image.aspect_ratio() {
                Some(ratio) if self.config.pad_to_square && self.config.restore_aspect => {
                    ImagePostprocessor::crop_to_aspect(&upscaled, ratio)?
                },
                _ => upscaled,
            };
            timings.postprocessing_ms = elapsed_ms(start);
            result
        };

        timings.total_ms = elapsed_ms(total_start) + timings.model_load_ms;
        info!(
            "✅ Enhanced to {}x{} in {}ms",
            result_image.width(),
            result_image.height(),
            timings.total_ms
        );

        let mut metadata =
            ProcessingMetadata::new(FilterOperation::Enhancement, self.model_name());
        metadata.timings = timings;
        Ok(FilterResult::new(result_image, original_dimensions, metadata))
    }

    fn model_name(&self) -> String {
        self.backend
            .get_model_info()
            .map_or_else(|_| self.config.model_spec.name.clone(), |info| info.name)
    }
}

/// Background removal pipeline: segment, mask, synthesize, composite
pub struct BackgroundRemovalProcessor {
    config: RemovalConfig,
    segmenter: Box<dyn Segmenter>,
    initialized: bool,
    pending_load_ms: u64,
}

impl BackgroundRemovalProcessor {
    #[must_use]
    pub fn new(config: RemovalConfig, segmenter: Box<dyn Segmenter>) -> Self {
        Self {
            config,
            segmenter,
            initialized: false,
            pending_load_ms: 0,
        }
    }

    /// Create a [`ModelSegmenter`] for `config.model_spec` through a factory
    pub fn with_factory(
        config: RemovalConfig,
        factory: &dyn BackendFactory,
        backend_type: BackendType,
    ) -> Result<Self> {
        config.validate()?;
        let backend = factory.create_backend(backend_type, &config.model_spec)?;
        let segmenter = ModelSegmenter::new(backend, config.input_range);
        Ok(Self::new(config, Box::new(segmenter)))
    }

    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Load the model if not done yet
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        info!("Initializing background removal processor");
        if let Some(load_time) = self.segmenter.initialize(&self.config.inference)? {
            self.pending_load_ms = load_time.as_millis() as u64;
        }
        self.initialized = true;
        Ok(())
    }

    /// Cut the subject out of `image` and place it over `background`
    ///
    /// The output has the mask's resolution unless `restore_original_size` is
    /// set.
    ///
    /// # Errors
    /// - `InvalidInput` for empty images or invalid background parameters
    /// - `ModelUnavailable` when the segmenter fails
    /// - `ShapeMismatch` when the mask violates its contract
    #[instrument(
        skip(self, image, background),
        fields(
            dimensions = %format!("{}x{}", image.width(), image.height()),
            background = background.label()
        )
    )]
    pub fn remove_background(
        &mut self,
        image: &RawImage,
        background: &BackgroundSpec,
    ) -> Result<FilterResult> {
        TensorValidator::validate_image_dimensions(image.width(), image.height())?;
        self.initialize()?;

        let total_start = Instant::now();
        let mut timings = ProcessingTimings {
            model_load_ms: std::mem::take(&mut self.pending_load_ms),
            ..ProcessingTimings::default()
        };
        let original_dimensions = image.dimensions();

        let mask = {
            let _span = span!(Level::INFO, "segmentation").entered();
            let start = Instant::now();
            let mask = self.segmenter.segment(image)?;
            timings.inference_ms = elapsed_ms(start);
            mask
        };
        let mask_size = mask.dimensions();
        if mask_size.0 == 0 || mask_size.1 == 0 {
            return Err(FilterError::shape_mismatch("Segmenter returned an empty mask"));
        }

        let (scaled_source, foreground) = {
            let _span = span!(Level::DEBUG, "masking").entered();
            let start = Instant::now();
            let scaled_source = image.resized(mask_size.0, mask_size.1);
            let foreground = AlphaCompositor::apply_mask(&scaled_source, &mask)?;
            timings.postprocessing_ms = elapsed_ms(start);
            (scaled_source, foreground)
        };

        let composite = {
            let _span = span!(Level::DEBUG, "compositing").entered();
            let start = Instant::now();
            let layer =
                BackgroundSynthesizer::make_background(background, mask_size, Some(&scaled_source))?;
            let mut composite = AlphaCompositor::composite(&layer, &foreground)?;
            if self.config.restore_original_size {
                composite = ImagePostprocessor::resize(
                    &composite,
                    original_dimensions.0,
                    original_dimensions.1,
                );
            }
            timings.compositing_ms = elapsed_ms(start);
            composite
        };

        timings.total_ms = elapsed_ms(total_start) + timings.model_load_ms;
        let stats = mask.statistics();
        info!(
            "✅ Background replaced ({}) in {}ms, foreground {:.1}%",
            background.label(),
            timings.total_ms,
            stats.foreground_ratio * 100.0
        );

        let mut metadata =
            ProcessingMetadata::new(FilterOperation::BackgroundRemoval, self.segmenter.name());
        metadata.timings = timings;
        metadata.background = Some(background.label().to_string());
        Ok(FilterResult::new(composite, original_dimensions, metadata).with_mask(mask))
    }
}
