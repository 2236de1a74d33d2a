//! Background synthesis for background replacement

use crate::{
    error::{FilterError, Result},
    types::{BackgroundSpec, RawImage},
};
use image::Rgba;

/// Builds the layer drawn behind the segmented foreground
pub struct BackgroundSynthesizer;

impl BackgroundSynthesizer {
    /// Render `spec` as a canvas of `size`
    ///
    /// `source_for_blur` is only read for [`BackgroundSpec::Blur`] and must
    /// match `size`.
    ///
    /// # Errors
    /// - `InvalidInput` for a zero-sized canvas, an invalid blur radius, or a
    ///   missing / mis-sized blur source
    pub fn make_background(
        spec: &BackgroundSpec,
        size: (u32, u32),
        source_for_blur: Option<&RawImage>,
    ) -> Result<RawImage> {
        let (width, height) = size;
        if width == 0 || height == 0 {
            return Err(FilterError::invalid_input(format!(
                "Background size must be non-zero, got {}x{}",
                width, height
            )));
        }
        let _span =
            tracing::debug_span!("make_background", kind = spec.label(), width, height).entered();

        match spec {
            BackgroundSpec::Transparent => Ok(RawImage::filled(width, height, Rgba([0, 0, 0, 0]))),
            BackgroundSpec::SolidColor(color) => {
                let [r, g, b, _] = color.0;
                Ok(RawImage::filled(width, height, Rgba([r, g, b, 255])))
            },
            BackgroundSpec::Blur { radius } => {
                let source = source_for_blur.ok_or_else(|| {
                    FilterError::invalid_input("Blur background requires a source image")
                })?;
                if source.dimensions() != size {
                    return Err(FilterError::invalid_input(format!(
                        "Blur source is {}x{} but background is {}x{}",
                        source.width(),
                        source.height(),
                        width,
                        height
                    )));
                }
                Self::blur(source, *radius)
            },
            BackgroundSpec::ImageBackdrop(backdrop) => {
                if backdrop.is_empty() {
                    return Err(FilterError::invalid_input("Backdrop image is empty"));
                }
                Ok(backdrop.resized(width, height))
            },
        }
    }

    /// Gaussian blur with `sigma = 0.57735 * radius + 0.5`
    ///
    /// # Errors
    /// - `InvalidInput` for a negative or non-finite radius
    pub fn blur(source: &RawImage, radius: f32) -> Result<RawImage> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(FilterError::invalid_input(format!(
                "Blur radius must be finite and non-negative, got {}",
                radius
            )));
        }
        if radius == 0.0 {
            return Ok(source.clone());
        }

        let sigma = Self::radius_to_sigma(radius);
        log::debug!("Blurring background with radius {} (sigma {:.3})", radius, sigma);
        Ok(RawImage::new(image::imageops::blur(source.pixels(), sigma)))
    }

    /// Convert a blur radius into a Gaussian standard deviation
    #[must_use]
    pub fn radius_to_sigma(radius: f32) -> f32 {
        0.577_35 * radius + 0.5
    }
}
