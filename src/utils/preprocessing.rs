//! Image to tensor preprocessing
//!
//! Pads to a square canvas (optional), resizes to the model input and packs
//! the RGB channels into a normalised, channel-interleaved tensor.

use crate::{
    error::Result,
    types::{NormalizedTensor, RawImage, TensorRange},
    utils::validation::TensorValidator,
};
use image::{imageops::FilterType, ImageBuffer, Rgb, RgbImage};

/// Configuration for preprocessing behavior
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingOptions {
    /// Model input `(width, height)`
    pub target_size: (u32, u32),
    /// Center the image on a square canvas before resizing
    pub pad_to_square: bool,
    /// Canvas color used for padding (RGB)
    pub padding_color: [u8; 3],
    /// Range each channel is normalised into
    pub range: TensorRange,
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            target_size: (128, 128),
            pad_to_square: true,
            padding_color: [0, 0, 0],
            range: TensorRange::ZeroToOne,
        }
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Convert an image into a model input tensor of `target_size`
    ///
    /// Alpha is discarded. Output length is always `W * H * 3`. Stretching to a
    /// non-matching aspect ratio is accepted when padding is disabled.
    ///
    /// # Errors
    /// - `InvalidInput` for zero-sized or oversized images
    /// - `InvalidConfig` for a zero-sized target
    pub fn preprocess(image: &RawImage, options: &PreprocessingOptions) -> Result<NormalizedTensor> {
        let (width, height) = image.dimensions();
        let (target_w, target_h) = options.target_size;
        let _span = tracing::debug_span!(
            "preprocess",
            width,
            height,
            target_w,
            target_h,
            pad = options.pad_to_square
        )
        .entered();

        TensorValidator::validate_image_dimensions(width, height)?;
        TensorValidator::validate_target_size(target_w, target_h)?;

        let rgb = image.to_rgb();
        let canvas = if options.pad_to_square {
            Self::pad_to_square(&rgb, options.padding_color)
        } else {
            rgb
        };

        let resized = if canvas.dimensions() == (target_w, target_h) {
            canvas
        } else {
            image::imageops::resize(&canvas, target_w, target_h, FilterType::Triangle)
        };

        Self::canvas_to_tensor(&resized, options.range)
    }

    /// Center `image` on a square canvas of side `max(w, h)`
    #[must_use]
    pub fn pad_to_square(image: &RgbImage, padding_color: [u8; 3]) -> RgbImage {
        let (width, height) = image.dimensions();
        let side = width.max(height);
        if width == height {
            return image.clone();
        }

        let mut canvas = ImageBuffer::from_pixel(side, side, Rgb(padding_color));
        let offset_x = (side - width) / 2;
        let offset_y = (side - height) / 2;

        for (x, y, pixel) in image.enumerate_pixels() {
            canvas.put_pixel(x + offset_x, y + offset_y, *pixel);
        }
        canvas
    }

    /// Pack RGB samples into an interleaved tensor
    fn canvas_to_tensor(canvas: &RgbImage, range: TensorRange) -> Result<NormalizedTensor> {
        let data: Vec<f32> = canvas
            .as_raw()
            .iter()
            .map(|&sample| range.normalize(sample))
            .collect();
        NormalizedTensor::new(data, canvas.width(), canvas.height(), 3)
    }
}
