//! Tract backend implementation
//!
//! Pure Rust ONNX inference with no native dependencies. Tract runs on the CPU
//! only, so execution provider and thread settings are logged and ignored.

use crate::config::InferenceConfig;
use crate::error::{FilterError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelSpec};
use crate::utils::TensorValidator;
use ndarray::Array4;
use tract_onnx::prelude::*;

use super::{from_model_layout, model_input_shape, to_model_layout};

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend for running a model described by a [`ModelSpec`]
#[derive(Debug)]
pub struct TractBackend {
    spec: ModelSpec,
    model: Option<TractModel>,
    size_bytes: usize,
}

impl TractBackend {
    /// Create a new uninitialized Tract backend
    #[must_use]
    pub fn new(spec: ModelSpec) -> Self {
        Self {
            spec,
            model: None,
            size_bytes: 0,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn load_model(&mut self, config: &InferenceConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = self.spec.load_bytes()?;

        log::info!("🚀 Initializing Tract Backend");
        log::info!("🧠 Model: {}", self.spec.display_name());
        log::info!("📦 Backend: Tract (Pure Rust)");
        log::info!("📏 Model size: {:.2} MB", model_data.len() as f64 / (1024.0 * 1024.0));
        if config.intra_threads > 0 || config.inter_threads > 0 {
            log::debug!("Thread settings are not applied by the Tract backend");
        }

        let input_shape = model_input_shape(&self.spec);
        let path = self.spec.path.clone();
        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(&model_data))
            .and_then(|model| model.with_input_fact(0, f32::fact(input_shape).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                FilterError::model_error_with_context(
                    "compile",
                    &path,
                    &e.to_string(),
                    &["verify the model is a valid ONNX file", "check the declared input size"],
                )
            })?;

        self.model = Some(model);
        self.size_bytes = model_data.len();

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {:.2}ms",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None);
        }
        self.load_model(config).map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| FilterError::model_unavailable("Tract model not initialized"))?;

        TensorValidator::validate_tensor_shape(input, self.spec.input_shape())?;

        log::debug!("🔮 Running Tract inference");
        log::debug!("  - Input tensor: {:?}", input.shape());
        let inference_start = Instant::now();

        let model_input = to_model_layout(input, self.spec.layout);
        let data: Vec<f32> = model_input.iter().copied().collect();
        let input_tensor = Tensor::from_shape(model_input.shape(), &data)
            .map_err(|e| FilterError::internal(format!("Failed to build input tensor: {e}")))?;

        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| FilterError::model_unavailable(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| FilterError::model_unavailable("Model produced no output tensor"))?
            .into_arc_tensor();

        let output_view = output_tensor.to_array_view::<f32>().map_err(|e| {
            FilterError::shape_mismatch(format!("Output tensor is not f32: {e}"))
        })?;
        let shape = output_view.shape().to_vec();
        let [batch, d1, d2, d3] = shape[..] else {
            return Err(FilterError::shape_mismatch(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            )));
        };

        let output = Array4::from_shape_vec(
            (batch, d1, d2, d3),
            output_view.iter().copied().collect(),
        )
        .map_err(|e| FilterError::shape_mismatch(format!("Failed to reshape output: {e}")))?;
        let output = from_model_layout(output, self.spec.layout);

        log::debug!(
            "✅ Tract inference completed in {:.2}ms, output {:?}",
            inference_start.elapsed().as_millis(),
            output.shape()
        );
        Ok(output)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.spec.input_shape()
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.spec.output_shape()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        if self.model.is_none() {
            return Err(FilterError::internal("Tract backend not initialized"));
        }
        Ok(ModelInfo::from_spec(&self.spec, self.size_bytes))
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }
}
