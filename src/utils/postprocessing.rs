//! Tensor to image postprocessing and aspect-ratio cropping

use crate::{
    config::OutputRange,
    error::{FilterError, Result},
    types::{NormalizedTensor, RawImage, TensorRange},
};
use image::RgbaImage;

/// Relative tolerance under which two aspect ratios count as equal
const RATIO_EPSILON: f64 = 1e-6;

/// Shared output-side image utilities
pub struct ImagePostprocessor;

impl ImagePostprocessor {
    /// Convert a 3-channel model output into an opaque image of `out_dims`
    ///
    /// # Errors
    /// - `ShapeMismatch` if the tensor is not `out_dims` with 3 channels
    pub fn postprocess(
        tensor: &NormalizedTensor,
        out_dims: (u32, u32),
        range: OutputRange,
    ) -> Result<RawImage> {
        let _span = tracing::debug_span!(
            "postprocess",
            width = out_dims.0,
            height = out_dims.1,
            ?range
        )
        .entered();

        if tensor.dimensions() != out_dims || tensor.channels() != 3 {
            return Err(FilterError::shape_mismatch(format!(
                "Expected {}x{}x3 model output, got {}x{}x{}",
                out_dims.0,
                out_dims.1,
                tensor.width(),
                tensor.height(),
                tensor.channels()
            )));
        }

        let mut pixels = Vec::with_capacity(tensor.len() / 3 * 4);
        for rgb in tensor.data().chunks_exact(3) {
            let source_range = match range {
                OutputRange::Fixed(fixed) => fixed,
                OutputRange::Auto if rgb.iter().any(|v| *v < 0.0) => TensorRange::MinusOneToOne,
                OutputRange::Auto => TensorRange::ZeroToOne,
            };
            pixels.extend(rgb.iter().map(|&v| to_sample(source_range.to_unit(v))));
            pixels.push(255);
        }

        RawImage::from_raw_rgba(out_dims.0, out_dims.1, pixels)
    }

    /// Crop a centred window with the given width/height ratio
    ///
    /// Only one axis shrinks; matching ratios return an identical copy.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty image or a non-finite / non-positive ratio
    pub fn crop_to_aspect(image: &RawImage, ratio: f64) -> Result<RawImage> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(FilterError::invalid_input(format!(
                "Aspect ratio must be finite and positive, got {}",
                ratio
            )));
        }
        let current = image
            .aspect_ratio()
            .ok_or_else(|| FilterError::invalid_input("Cannot crop an empty image"))?;

        let (width, height) = image.dimensions();
        if ((current - ratio) / ratio).abs() < RATIO_EPSILON {
            return Ok(image.clone());
        }

        let (crop_w, crop_h) = if current > ratio {
            let crop_w = (f64::from(height) * ratio).floor() as u32;
            (crop_w.clamp(1, width), height)
        } else {
            let crop_h = (f64::from(width) / ratio).floor() as u32;
            (width, crop_h.clamp(1, height))
        };

        let x = (width - crop_w) / 2;
        let y = (height - crop_h) / 2;
        log::debug!(
            "Cropping {}x{} to {}x{} at ({}, {})",
            width,
            height,
            crop_w,
            crop_h,
            x,
            y
        );

        let cropped: RgbaImage =
            image::imageops::crop_imm(image.pixels(), x, y, crop_w, crop_h).to_image();
        Ok(RawImage::new(cropped))
    }

    /// Resize to exact dimensions with bilinear filtering
    #[must_use]
    pub fn resize(image: &RawImage, width: u32, height: u32) -> RawImage {
        image.resized(width, height)
    }
}

fn to_sample(unit: f32) -> u8 {
    (unit.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const OPAQUE_BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn tensor_from(pixels: &[[f32; 3]], width: u32, height: u32) -> NormalizedTensor {
        let data = pixels.iter().flat_map(|p| p.iter().copied()).collect();
        NormalizedTensor::new(data, width, height, 3).unwrap()
    }

    #[test]
    fn test_postprocess_zero_to_one() {
        let tensor = tensor_from(&[[0.0, 0.5, 1.0], [1.5, -0.0, 0.25]], 2, 1);
        let image = ImagePostprocessor::postprocess(&tensor, (2, 1), OutputRange::Auto).unwrap();

        assert_eq!(image.get_pixel(0, 0), Some(Rgba([0, 128, 255, 255])));
        // Out-of-range values clamp
        assert_eq!(image.get_pixel(1, 0), Some(Rgba([255, 0, 64, 255])));
    }

    #[test]
    fn test_auto_range_matches_equivalent_signed_data() {
        let unit = [[0.2, 0.4, 0.6], [0.0, 0.15, 0.35]];
        let signed: Vec<[f32; 3]> = unit
            .iter()
            .map(|p| [p[0] * 2.0 - 1.0, p[1] * 2.0 - 1.0, p[2] * 2.0 - 1.0])
            .collect();

        let from_unit =
            ImagePostprocessor::postprocess(&tensor_from(&unit, 2, 1), (2, 1), OutputRange::Auto)
                .unwrap();
        let from_signed =
            ImagePostprocessor::postprocess(&tensor_from(&signed, 2, 1), (2, 1), OutputRange::Auto)
                .unwrap();
        assert_eq!(from_unit, from_signed);
    }

    #[test]
    fn test_fixed_range_overrides_detection() {
        // Bright [-1, 1] data has no negative component, so detection misses it
        let tensor = tensor_from(&[[0.0, 0.5, 1.0]], 1, 1);

        let auto = ImagePostprocessor::postprocess(&tensor, (1, 1), OutputRange::Auto).unwrap();
        assert_eq!(auto.get_pixel(0, 0), Some(Rgba([0, 128, 255, 255])));

        let fixed = ImagePostprocessor::postprocess(
            &tensor,
            (1, 1),
            OutputRange::Fixed(TensorRange::MinusOneToOne),
        )
        .unwrap();
        assert_eq!(fixed.get_pixel(0, 0), Some(Rgba([128, 191, 255, 255])));
    }

    #[test]
    fn test_postprocess_rejects_wrong_dims() {
        let tensor = tensor_from(&[[0.0; 3]; 4], 2, 2);
        assert!(matches!(
            ImagePostprocessor::postprocess(&tensor, (4, 1), OutputRange::Auto),
            Err(FilterError::ShapeMismatch(_))
        ));

        let single = NormalizedTensor::new(vec![0.0; 4], 2, 2, 1).unwrap();
        assert!(ImagePostprocessor::postprocess(&single, (2, 2), OutputRange::Auto).is_err());
    }

    #[test]
    fn test_crop_wide_and_tall() {
        let square = RawImage::filled(512, 512, OPAQUE_BLACK);

        let wide = ImagePostprocessor::crop_to_aspect(&square, 2.0).unwrap();
        assert_eq!(wide.dimensions(), (512, 256));

        let tall = ImagePostprocessor::crop_to_aspect(&square, 0.5).unwrap();
        assert_eq!(tall.dimensions(), (256, 512));
    }

    #[test]
    fn test_crop_is_centred() {
        let mut pixels = RgbaImage::from_pixel(4, 4, OPAQUE_BLACK);
        pixels.put_pixel(0, 1, Rgba([255, 0, 0, 255]));
        let image = RawImage::new(pixels);

        // 4x4 cropped to 2:1 keeps rows 1..3
        let cropped = ImagePostprocessor::crop_to_aspect(&image, 2.0).unwrap();
        assert_eq!(cropped.dimensions(), (4, 2));
        assert_eq!(cropped.get_pixel(0, 0), Some(Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn test_crop_matching_ratio_is_noop() {
        let image = RawImage::filled(300, 200, OPAQUE_BLACK);
        let cropped = ImagePostprocessor::crop_to_aspect(&image, 1.5).unwrap();
        assert_eq!(cropped, image);
    }

    #[test]
    fn test_crop_never_below_one_pixel() {
        let image = RawImage::filled(10, 10, OPAQUE_BLACK);
        let cropped = ImagePostprocessor::crop_to_aspect(&image, 1000.0).unwrap();
        assert_eq!(cropped.dimensions(), (10, 1));
    }

    #[test]
    fn test_crop_rejects_invalid_ratio() {
        let image = RawImage::filled(10, 10, OPAQUE_BLACK);
        for ratio in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                ImagePostprocessor::crop_to_aspect(&image, ratio),
                Err(FilterError::InvalidInput(_))
            ));
        }
    }
}
