//! Backend implementations for different inference engines
//!
//! - ONNX Runtime backend (GPU acceleration, feature `onnx`)
//! - Tract backend (pure Rust, feature `tract`)
//! - Mock backend (deterministic stand-ins for tests and dry runs)

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub use self::mock::MockBackend;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

#[cfg(any(feature = "onnx", feature = "tract"))]
use crate::models::ModelSpec;
use crate::models::TensorLayout;
use ndarray::Array4;

/// Reorder a pipeline NHWC tensor into the model's native layout
#[cfg_attr(not(any(feature = "onnx", feature = "tract")), allow(dead_code))]
pub(crate) fn to_model_layout(input: &Array4<f32>, layout: TensorLayout) -> Array4<f32> {
    match layout {
        TensorLayout::Nhwc => input.clone(),
        TensorLayout::Nchw => input
            .view()
            .permuted_axes([0, 3, 1, 2])
            .as_standard_layout()
            .into_owned(),
    }
}

/// Reorder a model output into NHWC
#[cfg_attr(not(any(feature = "onnx", feature = "tract")), allow(dead_code))]
pub(crate) fn from_model_layout(output: Array4<f32>, layout: TensorLayout) -> Array4<f32> {
    match layout {
        TensorLayout::Nhwc => output,
        TensorLayout::Nchw => output
            .permuted_axes([0, 2, 3, 1])
            .as_standard_layout()
            .into_owned(),
    }
}

/// Input shape in the model's native layout
#[cfg(feature = "tract")]
pub(crate) fn model_input_shape(spec: &ModelSpec) -> [usize; 4] {
    let (n, h, w, c) = spec.input_shape();
    match spec.layout {
        TensorLayout::Nhwc => [n, h, w, c],
        TensorLayout::Nchw => [n, c, h, w],
    }
}
