//! Core types shared by the enhancement and background removal pipelines

use crate::{
    config::OutputFormat,
    error::{FilterError, Result},
    services::ImageIOService,
    utils::TensorValidator,
};
use image::{DynamicImage, ImageBuffer, Luma, RgbImage, Rgba, RgbaImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Immutable 8-bit RGBA pixel grid, row-major, origin top-left
///
/// RGB sources are promoted to RGBA with an opaque alpha channel. Transforms
/// never mutate a `RawImage`; they return a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    pixels: RgbaImage,
}

impl RawImage {
    #[must_use]
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Convert any decoded image into RGBA8
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::new(image.to_rgba8())
    }

    #[must_use]
    pub fn from_rgb(image: &RgbImage) -> Self {
        let pixels = RgbaImage::from_fn(image.width(), image.height(), |x, y| {
            let p = image.get_pixel(x, y);
            Rgba([p[0], p[1], p[2], 255])
        });
        Self::new(pixels)
    }

    /// Wrap an interleaved RGBA buffer
    ///
    /// # Errors
    /// - `ShapeMismatch` if `data.len() != width * height * 4`
    pub fn from_raw_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        TensorValidator::validate_buffer_length("RGBA", data.len(), width, height, 4)?;
        ImageBuffer::from_raw(width, height, data)
            .map(Self::new)
            .ok_or_else(|| FilterError::internal("Failed to wrap RGBA buffer"))
    }

    /// Canvas of `width`x`height` filled with a single color
    #[must_use]
    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, color))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// True when either side is zero
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Width divided by height, `None` for empty images
    #[must_use]
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(f64::from(self.width()) / f64::from(self.height()))
        }
    }

    #[must_use]
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.pixels.get_pixel_checked(x, y).copied()
    }

    #[must_use]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Drop the alpha channel
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let p = self.pixels.get_pixel(x, y);
            image::Rgb([p[0], p[1], p[2]])
        })
    }

    #[must_use]
    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.pixels.clone())
    }

    /// Bilinear resize into a new image
    #[must_use]
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Self::new(image::imageops::resize(
            &self.pixels,
            width,
            height,
            image::imageops::FilterType::Triangle,
        ))
    }
}

impl From<RgbaImage> for RawImage {
    fn from(pixels: RgbaImage) -> Self {
        Self::new(pixels)
    }
}

impl From<DynamicImage> for RawImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image.into_rgba8())
    }
}

/// Numeric range a tensor's values are normalised into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorRange {
    /// `sample / 255`
    #[default]
    ZeroToOne,
    /// `sample / 127.5 - 1`
    MinusOneToOne,
}

impl TensorRange {
    /// Map an 8-bit sample into this range
    #[must_use]
    pub fn normalize(self, sample: u8) -> f32 {
        match self {
            Self::ZeroToOne => f32::from(sample) / 255.0,
            Self::MinusOneToOne => f32::from(sample) / 127.5 - 1.0,
        }
    }

    /// Map a value in this range back into `[0, 1]`
    #[must_use]
    pub fn to_unit(self, value: f32) -> f32 {
        match self {
            Self::ZeroToOne => value,
            Self::MinusOneToOne => (value + 1.0) / 2.0,
        }
    }
}

/// Flat channel-interleaved `f32` buffer of `width * height * channels` values
///
/// Bridges to the `[1, H, W, C]` tensors exchanged with model backends.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Vec<f32>,
    width: u32,
    height: u32,
    channels: usize,
}

impl NormalizedTensor {
    /// # Errors
    /// - `ShapeMismatch` if `data.len() != width * height * channels`
    pub fn new(data: Vec<f32>, width: u32, height: u32, channels: usize) -> Result<Self> {
        TensorValidator::validate_buffer_length("Tensor", data.len(), width, height, channels)?;
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// Read a `[1, H, W, C]` tensor
    ///
    /// # Errors
    /// - `ShapeMismatch` for a batch size other than 1 or dimensions beyond `u32`
    pub fn from_nhwc(tensor: &Array4<f32>) -> Result<Self> {
        let (batch, height, width, channels) = tensor.dim();
        if batch != 1 {
            return Err(FilterError::shape_mismatch(format!(
                "Expected batch size 1, got {}",
                batch
            )));
        }
        let width = u32::try_from(width)
            .map_err(|_| FilterError::shape_mismatch("Tensor width exceeds u32"))?;
        let height = u32::try_from(height)
            .map_err(|_| FilterError::shape_mismatch("Tensor height exceeds u32"))?;

        // Logical iteration order is row-major regardless of memory layout
        let data: Vec<f32> = tensor.iter().copied().collect();
        Self::new(data, width, height, channels)
    }

    /// Produce the `[1, H, W, C]` tensor expected by model backends
    ///
    /// # Errors
    /// - `ShapeMismatch` if the buffer no longer fits its dimensions
    pub fn to_nhwc(&self) -> Result<Array4<f32>> {
        Array4::from_shape_vec(
            (1, self.height as usize, self.width as usize, self.channels),
            self.data.clone(),
        )
        .map_err(|e| FilterError::shape_mismatch(format!("Failed to shape tensor: {}", e)))
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }
}

/// Per-pixel foreground confidence produced by a segmentation model
///
/// The mask's own resolution is authoritative: it is fixed by the model and
/// need not match the image that was segmented.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    data: Vec<f32>,
    width: u32,
    height: u32,
}

impl SegmentationMask {
    /// # Errors
    /// - `ShapeMismatch` if `data.len() != width * height`
    pub fn new(data: Vec<f32>, width: u32, height: u32) -> Result<Self> {
        TensorValidator::validate_buffer_length("Mask", data.len(), width, height, 1)?;
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Uniform mask, mostly useful for tests and previews
    #[must_use]
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            data: vec![value; width as usize * height as usize],
            width,
            height,
        }
    }

    /// Read a `[1, H, W, 1]` model output
    ///
    /// # Errors
    /// - `ShapeMismatch` for any other tensor shape
    pub fn from_nhwc(tensor: &Array4<f32>) -> Result<Self> {
        let (batch, height, width, channels) = tensor.dim();
        if batch != 1 || channels != 1 {
            return Err(FilterError::shape_mismatch(format!(
                "Segmentation output must be [1, H, W, 1], got [{}, {}, {}, {}]",
                batch, height, width, channels
            )));
        }
        let width = u32::try_from(width)
            .map_err(|_| FilterError::shape_mismatch("Mask width exceeds u32"))?;
        let height = u32::try_from(height)
            .map_err(|_| FilterError::shape_mismatch("Mask height exceeds u32"))?;
        Self::new(tensor.iter().copied().collect(), width, height)
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Render as an 8-bit grayscale image
    #[must_use]
    pub fn to_luma(&self) -> ImageBuffer<Luma<u8>, Vec<u8>> {
        let data = self
            .data
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        ImageBuffer::from_raw(self.width, self.height, data)
            .unwrap_or_else(|| ImageBuffer::new(self.width, self.height))
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&v| v > 0.5).count();
        let background_pixels = total_pixels - foreground_pixels;
        let ratio = |count: usize| {
            if total_pixels == 0 {
                0.0
            } else {
                count as f32 / total_pixels as f32
            }
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels,
            foreground_ratio: ratio(foreground_pixels),
            background_ratio: ratio(background_pixels),
        }
    }
}

/// Statistics about a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
    pub background_ratio: f32,
}

/// What to place behind the segmented foreground
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BackgroundSpec {
    /// Fully transparent canvas
    #[default]
    Transparent,
    /// Opaque canvas of one color
    SolidColor(Rgba<u8>),
    /// Blurred copy of the source image
    Blur { radius: f32 },
    /// Another image, resized to fit
    ImageBackdrop(RawImage),
}

impl BackgroundSpec {
    /// Solid white, the stock replacement color
    #[must_use]
    pub fn white() -> Self {
        Self::SolidColor(Rgba([255, 255, 255, 255]))
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional)
    ///
    /// # Errors
    /// - `InvalidConfig` for malformed hex strings
    pub fn solid_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(FilterError::invalid_config(format!(
                "Color must be #RRGGBB or #RRGGBBAA, got '{}'",
                hex
            )));
        }

        let channel = |i: usize| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| FilterError::invalid_config(format!("Invalid hex color '{}'", hex)))
        };

        let alpha = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::SolidColor(Rgba([
            channel(0)?,
            channel(2)?,
            channel(4)?,
            alpha,
        ])))
    }

    /// Short label for logs
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Transparent => "transparent",
            Self::SolidColor(_) => "solid-color",
            Self::Blur { .. } => "blur",
            Self::ImageBackdrop(_) => "image",
        }
    }
}

/// Which pipeline produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperation {
    Enhancement,
    BackgroundRemoval,
}

/// Final image of a pipeline invocation, owned by the caller
#[derive(Debug, Clone)]
pub struct FilterResult {
    /// The processed image
    pub image: RawImage,

    /// The segmentation mask used (background removal only)
    pub mask: Option<SegmentationMask>,

    /// Original image dimensions
    pub original_dimensions: (u32, u32),

    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl FilterResult {
    #[must_use]
    pub fn new(
        image: RawImage,
        original_dimensions: (u32, u32),
        metadata: ProcessingMetadata,
    ) -> Self {
        Self {
            image,
            mask: None,
            original_dimensions,
            metadata,
        }
    }

    #[must_use]
    pub fn with_mask(mut self, mask: SegmentationMask) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Save in the specified format
    pub fn save<P: AsRef<Path>>(&self, path: P, format: OutputFormat, quality: u8) -> Result<()> {
        ImageIOService::save_image(&self.image, path, format, quality)
    }

    /// Get the image as encoded bytes in the specified format
    pub fn to_bytes(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        ImageIOService::encode(&self.image, format, quality)
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.metadata.timings
    }

    /// Get timing summary for display
    #[must_use]
    pub fn timing_summary(&self) -> String {
        let t = &self.metadata.timings;
        let mut summary = format!(
            "Total: {}ms | Preprocess: {}ms | Inference: {}ms | Postprocess: {}ms",
            t.total_ms, t.preprocessing_ms, t.inference_ms, t.postprocessing_ms
        );
        if t.compositing_ms > 0 {
            summary.push_str(&format!(" | Composite: {}ms", t.compositing_ms));
        }
        if t.model_load_ms > 0 {
            summary.push_str(&format!(" | Model load: {}ms", t.model_load_ms));
        }
        let other_ms = t.other_overhead_ms();
        if other_ms > 5 {
            summary.push_str(&format!(" | Other: {}ms", other_ms));
        }
        summary
    }
}

/// Timing breakdown for one pipeline invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Model loading time (first call only)
    pub model_load_ms: u64,

    /// Resize, padding and tensor packing
    pub preprocessing_ms: u64,

    /// External model execution
    pub inference_ms: u64,

    /// Tensor unpacking, cropping, mask application
    pub postprocessing_ms: u64,

    /// Background synthesis and layer compositing
    pub compositing_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Time not attributed to any measured stage
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        let measured = self.model_load_ms
            + self.preprocessing_ms
            + self.inference_ms
            + self.postprocessing_ms
            + self.compositing_ms;
        self.total_ms.saturating_sub(measured)
    }

    /// Share of total time spent inside the model
    #[must_use]
    pub fn inference_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.inference_ms as f64 / self.total_ms as f64
        }
    }
}

/// Metadata about the processing operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Which pipeline ran
    pub operation: FilterOperation,

    /// Model used for inference
    pub model_name: String,

    /// Detailed timing breakdown
    pub timings: ProcessingTimings,

    /// Background choice (background removal only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(operation: FilterOperation, model_name: String) -> Self {
        Self {
            operation,
            model_name,
            timings: ProcessingTimings::new(),
            background: None,
        }
    }
}
