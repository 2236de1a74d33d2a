//! Deterministic stand-in backend
//!
//! Behaves like a real model with respect to shapes and initialization, so the
//! pipelines can be exercised end to end without a model file.

use crate::config::InferenceConfig;
use crate::error::{FilterError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelSpec};
use crate::utils::TensorValidator;
use ndarray::Array4;

use instant::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockKind {
    /// Nearest-neighbour xN upscaler
    Upscaler,
    /// Soft centred ellipse mask
    Segmenter,
}

/// Mock backend for tests and dry runs
#[derive(Debug, Clone)]
pub struct MockBackend {
    kind: MockKind,
    spec: ModelSpec,
    signed_output: bool,
    forced_output: Option<(usize, usize, usize, usize)>,
    fail_inference: bool,
    initialized: bool,
}

impl MockBackend {
    /// Upscaler taking `input_size` (width, height) and emitting `scale` times that
    #[must_use]
    pub fn upscaler(input_size: (u32, u32), scale: u32) -> Self {
        let spec = ModelSpec::esrgan_x4("mock://upscaler")
            .with_name("mock-upscaler")
            .with_input_size(input_size.0, input_size.1)
            .with_scale(scale);
        Self::from_parts(MockKind::Upscaler, spec)
    }

    /// Segmenter emitting a mask of `size` (width, height)
    #[must_use]
    pub fn segmenter(size: (u32, u32)) -> Self {
        let spec = ModelSpec::selfie_segmenter("mock://segmenter")
            .with_name("mock-segmenter")
            .with_input_size(size.0, size.1);
        Self::from_parts(MockKind::Segmenter, spec)
    }

    /// Mock matching a model specification: single-channel specs segment,
    /// everything else upscales
    #[must_use]
    pub fn for_spec(spec: &ModelSpec) -> Self {
        let kind = if spec.output_channels == 1 {
            MockKind::Segmenter
        } else {
            MockKind::Upscaler
        };
        let spec = spec.clone().with_name(format!("mock-{}", spec.name));
        Self::from_parts(kind, spec)
    }

    fn from_parts(kind: MockKind, spec: ModelSpec) -> Self {
        Self {
            kind,
            spec,
            signed_output: false,
            forced_output: None,
            fail_inference: false,
            initialized: false,
        }
    }

    /// Emit values in `[-1, 1]` instead of `[0, 1]`
    #[must_use]
    pub fn with_signed_output(mut self, signed: bool) -> Self {
        self.signed_output = signed;
        self
    }

    /// Ignore the declared contract and emit zeros of this NHWC shape
    #[must_use]
    pub fn with_output_shape(mut self, shape: (usize, usize, usize, usize)) -> Self {
        self.forced_output = Some(shape);
        self
    }

    /// Make every inference fail with `ModelUnavailable`
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_inference = true;
        self
    }

    fn upscale(&self, input: &Array4<f32>) -> Array4<f32> {
        let (_, height, width, channels) = self.output_shape();
        let scale = self.spec.scale as usize;
        let signed = self.signed_output;
        Array4::from_shape_fn((1, height, width, channels), |(_, y, x, c)| {
            let value = input[[0, y / scale, x / scale, c]];
            if signed {
                value * 2.0 - 1.0
            } else {
                value
            }
        })
    }

    fn ellipse_mask(&self) -> Array4<f32> {
        let (_, height, width, _) = self.output_shape();
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;
        let rx = (width as f32 * 0.35).max(0.5);
        let ry = (height as f32 * 0.35).max(0.5);
        Array4::from_shape_fn((1, height, width, 1), |(_, y, x, _)| {
            let dx = (x as f32 + 0.5 - cx) / rx;
            let dy = (y as f32 + 0.5 - cy) / ry;
            let distance = dx * dx + dy * dy;
            // Fully opaque inside 0.8, fading out by 1.2
            ((1.2 - distance) / 0.4).clamp(0.0, 1.0)
        })
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &InferenceConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        let start = Instant::now();
        self.spec.validate()?;
        self.initialized = true;
        log::debug!("Mock backend '{}' initialized", self.spec.name);
        Ok(Some(start.elapsed()))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(FilterError::model_unavailable("Mock backend not initialized"));
        }
        if self.fail_inference {
            return Err(FilterError::model_unavailable("Mock inference failure"));
        }
        TensorValidator::validate_tensor_shape(input, self.input_shape())?;

        let output = match (self.forced_output, self.kind) {
            (Some(shape), _) => Array4::zeros(shape),
            (None, MockKind::Upscaler) => self.upscale(input),
            (None, MockKind::Segmenter) => self.ellipse_mask(),
        };
        Ok(output)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.spec.input_shape()
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.spec.output_shape()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        if !self.initialized {
            return Err(FilterError::internal("Mock backend not initialized"));
        }
        Ok(ModelInfo::from_spec(&self.spec, 0))
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
