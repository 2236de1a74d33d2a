//! Segmentation on top of a generic inference backend

use crate::{
    config::InferenceConfig,
    error::{FilterError, Result},
    inference::{InferenceBackend, Segmenter},
    types::{RawImage, SegmentationMask, TensorRange},
    utils::{ImagePreprocessor, PreprocessingOptions, TensorValidator},
};
use instant::Duration;

/// Adapts an [`InferenceBackend`] with a `[1, H, W, 1]` output to [`Segmenter`]
///
/// The image is stretched to the model input without padding, so the mask
/// covers the whole frame at the model's output resolution.
pub struct ModelSegmenter {
    backend: Box<dyn InferenceBackend>,
    input_range: TensorRange,
}

impl ModelSegmenter {
    #[must_use]
    pub fn new(backend: Box<dyn InferenceBackend>, input_range: TensorRange) -> Self {
        Self {
            backend,
            input_range,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &dyn InferenceBackend {
        self.backend.as_ref()
    }
}

impl Segmenter for ModelSegmenter {
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>> {
        self.backend.initialize(config)
    }

    fn segment(&mut self, image: &RawImage) -> Result<SegmentationMask> {
        TensorValidator::validate_image_dimensions(image.width(), image.height())?;
        if !self.backend.is_initialized() {
            return Err(FilterError::model_unavailable(
                "Segmentation backend not initialized",
            ));
        }

        let (_, height, width, channels) = self.backend.input_shape();
        if channels != 3 {
            return Err(FilterError::shape_mismatch(format!(
                "Segmentation model must take 3 input channels, declares {}",
                channels
            )));
        }
        let target_size = (
            u32::try_from(width).map_err(|_| FilterError::shape_mismatch("Model input too wide"))?,
            u32::try_from(height).map_err(|_| FilterError::shape_mismatch("Model input too tall"))?,
        );

        let options = PreprocessingOptions {
            target_size,
            pad_to_square: false,
            padding_color: [0, 0, 0],
            range: self.input_range,
        };
        let input = ImagePreprocessor::preprocess(image, &options)?.to_nhwc()?;

        let output = self.backend.infer(&input)?;
        TensorValidator::validate_single_batch(&output, 1)?;
        let mask = SegmentationMask::from_nhwc(&output)?;

        tracing::debug!(
            mask_width = mask.width(),
            mask_height = mask.height(),
            "Segmentation mask generated"
        );
        Ok(mask)
    }

    fn name(&self) -> String {
        self.backend
            .get_model_info()
            .map_or_else(|_| "segmenter".to_string(), |info| info.name)
    }
}
