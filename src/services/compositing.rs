//! Alpha masking and layer compositing

use crate::{
    error::{FilterError, Result},
    types::{RawImage, SegmentationMask},
};
use image::{Rgba, RgbaImage};

/// Applies masks and stacks layers
pub struct AlphaCompositor;

impl AlphaCompositor {
    /// Replace the alpha channel of `foreground` with the mask confidence
    ///
    /// The mask resolution is authoritative: callers resize the foreground to
    /// the mask before calling. RGB is left untouched.
    ///
    /// # Errors
    /// - `InvalidInput` when the dimensions differ
    pub fn apply_mask(foreground: &RawImage, mask: &SegmentationMask) -> Result<RawImage> {
        if foreground.dimensions() != mask.dimensions() {
            return Err(FilterError::invalid_input(format!(
                "Mask is {}x{} but image is {}x{}",
                mask.width(),
                mask.height(),
                foreground.width(),
                foreground.height()
            )));
        }

        let mut output = foreground.pixels().clone();
        for (pixel, &confidence) in output.pixels_mut().zip(mask.data()) {
            pixel[3] = (confidence.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        Ok(RawImage::new(output))
    }

    /// Draw `foreground` over `background` (source-over, straight alpha)
    ///
    /// # Errors
    /// - `InvalidInput` when the dimensions differ
    pub fn composite(background: &RawImage, foreground: &RawImage) -> Result<RawImage> {
        if background.dimensions() != foreground.dimensions() {
            return Err(FilterError::invalid_input(format!(
                "Background is {}x{} but foreground is {}x{}",
                background.width(),
                background.height(),
                foreground.width(),
                foreground.height()
            )));
        }

        let (width, height) = background.dimensions();
        let output = RgbaImage::from_fn(width, height, |x, y| {
            source_over(
                *background.pixels().get_pixel(x, y),
                *foreground.pixels().get_pixel(x, y),
            )
        });
        Ok(RawImage::new(output))
    }
}

fn source_over(bg: Rgba<u8>, fg: Rgba<u8>) -> Rgba<u8> {
    let fg_a = f32::from(fg[3]) / 255.0;
    let bg_a = f32::from(bg[3]) / 255.0;
    let bg_weight = bg_a * (1.0 - fg_a);
    let out_a = fg_a + bg_weight;
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let value = (f32::from(fg[i]) * fg_a + f32::from(bg[i]) * bg_weight) / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mask_gives_opaque_copy() {
        let image = RawImage::filled(3, 2, Rgba([10, 20, 30, 0]));
        let mask = SegmentationMask::filled(3, 2, 1.0);

        let output = AlphaCompositor::apply_mask(&image, &mask).unwrap();
        assert!(output.pixels().pixels().all(|p| *p == Rgba([10, 20, 30, 255])));
    }

    #[test]
    fn test_empty_mask_keeps_rgb() {
        let image = RawImage::filled(3, 2, Rgba([10, 20, 30, 255]));
        let mask = SegmentationMask::filled(3, 2, 0.0);

        let output = AlphaCompositor::apply_mask(&image, &mask).unwrap();
        assert!(output.pixels().pixels().all(|p| *p == Rgba([10, 20, 30, 0])));
    }

    #[test]
    fn test_mask_values_clamp_and_round() {
        let image = RawImage::filled(4, 1, Rgba([0, 0, 0, 255]));
        let mask = SegmentationMask::new(vec![-0.2, 0.5, 0.25, 1.7], 4, 1).unwrap();

        let output = AlphaCompositor::apply_mask(&image, &mask).unwrap();
        let alphas: Vec<u8> = output.pixels().pixels().map(|p| p[3]).collect();
        assert_eq!(alphas, vec![0, 128, 64, 255]);
    }

    #[test]
    fn test_apply_mask_dimension_mismatch() {
        let image = RawImage::filled(4, 4, Rgba([0, 0, 0, 255]));
        let mask = SegmentationMask::filled(2, 2, 1.0);
        assert!(matches!(
            AlphaCompositor::apply_mask(&image, &mask),
            Err(FilterError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_transparent_foreground_returns_background() {
        let background = RawImage::filled(5, 5, Rgba([200, 100, 50, 255]));
        let foreground = RawImage::filled(5, 5, Rgba([1, 2, 3, 0]));

        let output = AlphaCompositor::composite(&background, &foreground).unwrap();
        assert_eq!(output, background);
    }

    #[test]
    fn test_opaque_foreground_wins() {
        let background = RawImage::filled(2, 2, Rgba([200, 100, 50, 255]));
        let foreground = RawImage::filled(2, 2, Rgba([1, 2, 3, 255]));

        let output = AlphaCompositor::composite(&background, &foreground).unwrap();
        assert_eq!(output, foreground);
    }

    #[test]
    fn test_half_alpha_over_opaque_background() {
        let background = RawImage::filled(1, 1, Rgba([255, 255, 255, 255]));
        let foreground = RawImage::filled(1, 1, Rgba([0, 0, 0, 128]));

        let output = AlphaCompositor::composite(&background, &foreground).unwrap();
        // 255 * (1 - 128/255) = 127
        assert_eq!(output.get_pixel(0, 0), Some(Rgba([127, 127, 127, 255])));
    }

    #[test]
    fn test_transparent_over_transparent() {
        let background = RawImage::filled(1, 1, Rgba([9, 9, 9, 0]));
        let foreground = RawImage::filled(1, 1, Rgba([7, 7, 7, 0]));

        let output = AlphaCompositor::composite(&background, &foreground).unwrap();
        assert_eq!(output.get_pixel(0, 0), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn test_composite_dimension_mismatch() {
        let background = RawImage::filled(2, 2, Rgba([0, 0, 0, 255]));
        let foreground = RawImage::filled(3, 2, Rgba([0, 0, 0, 255]));
        assert!(AlphaCompositor::composite(&background, &foreground).is_err());
    }
}
