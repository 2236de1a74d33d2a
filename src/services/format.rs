//! Output format mapping
//!
//! Decides how a [`RawImage`] is presented to the encoder for each
//! [`OutputFormat`] and maps formats to and from file extensions.

use crate::{
    config::OutputFormat,
    error::{FilterError, Result},
    types::RawImage,
};
use image::{DynamicImage, ImageFormat};
use std::path::Path;

/// Service for output format decisions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Prepare an image for encoding in `format`
    ///
    /// JPEG drops the alpha channel; every other format keeps RGBA.
    #[must_use]
    pub fn to_encodable(image: &RawImage, format: OutputFormat) -> DynamicImage {
        match format {
            OutputFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb()),
            OutputFormat::Png | OutputFormat::WebP | OutputFormat::Tiff | OutputFormat::Rgba8 => {
                image.to_dynamic()
            },
        }
    }

    /// Encoder format, `None` for raw RGBA output
    ///
    /// # Errors
    /// - `UnsupportedFormat` for WebP when built without `webp-support`
    pub fn image_format(format: OutputFormat) -> Result<Option<ImageFormat>> {
        match format {
            OutputFormat::Png => Ok(Some(ImageFormat::Png)),
            OutputFormat::Jpeg => Ok(Some(ImageFormat::Jpeg)),
            OutputFormat::Tiff => Ok(Some(ImageFormat::Tiff)),
            OutputFormat::Rgba8 => Ok(None),
            #[cfg(feature = "webp-support")]
            OutputFormat::WebP => Ok(Some(ImageFormat::WebP)),
            #[cfg(not(feature = "webp-support"))]
            OutputFormat::WebP => Err(FilterError::unsupported_format(
                "WebP output requires the webp-support feature",
            )),
        }
    }

    /// File extension without the dot
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Rgba8 => "raw",
        }
    }

    /// Infer an output format from a path's extension
    ///
    /// # Errors
    /// - `UnsupportedFormat` for a missing or unknown extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<OutputFormat> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| {
                FilterError::unsupported_format(format!("No file extension on '{}'", path.display()))
            })?;
        Self::from_extension(&extension)
    }

    /// Parse a format name or extension (`png`, `jpg`, `jpeg`, `webp`, `tif`, `tiff`, `raw`, `rgba8`)
    pub fn from_extension(extension: &str) -> Result<OutputFormat> {
        match extension.to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::WebP),
            "tif" | "tiff" => Ok(OutputFormat::Tiff),
            "raw" | "rgba8" => Ok(OutputFormat::Rgba8),
            other => Err(FilterError::unsupported_format(format!(
                "Unknown output format '{}'",
                other
            ))),
        }
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        !matches!(format, OutputFormat::Jpeg)
    }

    /// Warn when a transparent background is about to be flattened
    pub fn warn_if_alpha_dropped(format: OutputFormat, image: &RawImage) {
        if Self::supports_transparency(format) {
            return;
        }
        if image.pixels().pixels().any(|p| p[3] < 255) {
            log::warn!(
                "Output format {:?} does not support transparency; alpha will be discarded",
                format
            );
        }
    }
}
