//! ONNX Runtime backend implementation
//!
//! Supports CPU, CUDA and `CoreML` execution providers. Requested providers that
//! are unavailable fall back to CPU with a warning.

use crate::config::{ExecutionProvider, InferenceConfig};
use crate::error::{FilterError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelSpec};
use crate::utils::TensorValidator;
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

use super::{from_model_layout, to_model_layout};

use instant::{Duration, Instant};

/// ONNX Runtime backend for a model described by a [`ModelSpec`]
#[derive(Debug)]
pub struct OnnxBackend {
    spec: ModelSpec,
    session: Option<Session>,
    size_bytes: usize,
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers with availability status
    ///
    /// Returns `(name, available, description)` tuples.
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    #[must_use]
    pub fn new(spec: ModelSpec) -> Self {
        Self {
            spec,
            session: None,
            size_bytes: 0,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Providers to register for the requested execution provider
    fn select_providers(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda = CUDAExecutionProvider::default();
        let coreml = CoreMLExecutionProvider::default().with_subgraphs(true);
        let cuda_available = OrtExecutionProvider::is_available(&cuda).unwrap_or(false);
        let coreml_available = OrtExecutionProvider::is_available(&coreml).unwrap_or(false);

        match requested {
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();
                if cuda_available {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(cuda.build());
                }
                if coreml_available {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(coreml.build());
                }
                if providers.is_empty() {
                    log::debug!("No hardware acceleration available, using CPU");
                }
                providers
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                Vec::new()
            },
            ExecutionProvider::Cuda if cuda_available => vec![cuda.build()],
            ExecutionProvider::CoreMl if coreml_available => vec![coreml.build()],
            other => {
                log::warn!(
                    "{} execution provider requested but not available, falling back to CPU",
                    other
                );
                Vec::new()
            },
        }
    }

    fn load_model(&mut self, config: &InferenceConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = self.spec.load_bytes()?;

        let session_error = |stage: &str, e: ort::Error| {
            FilterError::model_error_with_context(
                stage,
                &self.spec.path,
                &e.to_string(),
                &["verify the model is a valid ONNX file"],
            )
        };

        let mut session_builder = Session::builder()
            .map_err(|e| session_error("create session for", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| session_error("optimize", e))?;

        let providers = Self::select_providers(config.execution_provider);
        if !providers.is_empty() {
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(|e| session_error("register execution providers for", e))?;
        }

        let cores = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(8);
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            cores
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (cores / 4).max(1)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| session_error("configure threads for", e))?
            .with_inter_threads(inter_threads)
            .map_err(|e| session_error("configure threads for", e))?
            .commit_from_memory(&model_data)
            .map_err(|e| session_error("load", e))?;

        log::debug!("✅ ONNX Runtime session created");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!("  - Threading: {intra_threads} intra-op, {inter_threads} inter-op");
        log::debug!("  - Model: {}", self.spec.display_name());

        self.session = Some(session);
        self.size_bytes = model_data.len();

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>> {
        if self.session.is_some() {
            return Ok(None);
        }
        self.load_model(config).map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        TensorValidator::validate_tensor_shape(input, self.spec.input_shape())?;
        let layout = self.spec.layout;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| FilterError::model_unavailable("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(to_model_layout(input, layout))
            .map_err(|e| FilterError::internal(format!("Failed to convert input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| FilterError::model_unavailable(format!("ONNX inference failed: {e}")))?;

        // Positional access to the first output avoids tensor name dependencies
        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| FilterError::model_unavailable("Model produced no output tensor"))?
            .to_string();
        let output_tensor = outputs
            .get(&first_key)
            .ok_or_else(|| FilterError::model_unavailable("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| FilterError::shape_mismatch(format!("Output tensor is not f32: {e}")))?;

        let shape = output_tensor.shape().to_vec();
        let [batch, d1, d2, d3] = shape[..] else {
            return Err(FilterError::shape_mismatch(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            )));
        };
        let output = Array4::from_shape_vec(
            (batch, d1, d2, d3),
            output_tensor.iter().copied().collect(),
        )
        .map_err(|e| FilterError::shape_mismatch(format!("Failed to reshape output: {e}")))?;

        log::debug!(
            "  ⚡ Inference: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(from_model_layout(output, layout))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.spec.input_shape()
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.spec.output_shape()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        if self.session.is_none() {
            return Err(FilterError::internal("ONNX backend not initialized"));
        }
        Ok(ModelInfo::from_spec(&self.spec, self.size_bytes))
    }

    fn is_initialized(&self) -> bool {
        self.session.is_some()
    }
}
