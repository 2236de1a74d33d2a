//! End-to-end tests of background replacement with the mock segmenter

use filterkit::{
    backends::MockBackend,
    config::RemovalConfig,
    error::Result,
    inference::Segmenter,
    processor::{BackendType, BackgroundRemovalProcessor},
    segmentation::ModelSegmenter,
    services::{AlphaCompositor, BackgroundSynthesizer},
    types::{BackgroundSpec, FilterOperation, RawImage, SegmentationMask, TensorRange},
};
use image::{Rgba, RgbaImage};

const SUBJECT: Rgba<u8> = Rgba([200, 40, 40, 255]);

/// Always reports the same mask
struct FixedSegmenter {
    mask: SegmentationMask,
}

impl Segmenter for FixedSegmenter {
    fn segment(&mut self, _image: &RawImage) -> Result<SegmentationMask> {
        Ok(self.mask.clone())
    }

    fn name(&self) -> String {
        "fixed".to_string()
    }
}

/// Left half foreground, right half background
fn half_mask(width: u32, height: u32) -> Result<SegmentationMask> {
    let data = (0..height)
        .flat_map(|_| (0..width).map(move |x| if x < width / 2 { 1.0 } else { 0.0 }))
        .collect();
    SegmentationMask::new(data, width, height)
}

fn fixed_processor(mask: SegmentationMask) -> BackgroundRemovalProcessor {
    BackgroundRemovalProcessor::new(RemovalConfig::default(), Box::new(FixedSegmenter { mask }))
}

#[test]
fn test_transparent_background_keeps_subject() -> Result<()> {
    let mut processor = fixed_processor(half_mask(8, 4)?);
    let image = RawImage::filled(8, 4, SUBJECT);

    let result = processor.remove_background(&image, &BackgroundSpec::Transparent)?;
    assert_eq!(result.image.get_pixel(1, 1), Some(SUBJECT));
    assert_eq!(result.image.get_pixel(6, 1), Some(Rgba([0, 0, 0, 0])));
    assert_eq!(result.metadata.operation, FilterOperation::BackgroundRemoval);
    assert_eq!(result.metadata.model_name, "fixed");
    Ok(())
}

#[test]
fn test_solid_background_fills_masked_area() -> Result<()> {
    let mut processor = fixed_processor(half_mask(8, 4)?);
    let image = RawImage::filled(8, 4, SUBJECT);

    let background = BackgroundSpec::solid_hex("#00ff00")?;
    let result = processor.remove_background(&image, &background)?;
    assert_eq!(result.image.get_pixel(1, 1), Some(SUBJECT));
    assert_eq!(result.image.get_pixel(7, 3), Some(Rgba([0, 255, 0, 255])));
    Ok(())
}

#[test]
fn test_backdrop_is_scaled_to_mask() -> Result<()> {
    let mut processor = fixed_processor(SegmentationMask::filled(6, 6, 0.0));
    let image = RawImage::filled(30, 30, SUBJECT);
    let backdrop = RawImage::filled(100, 40, Rgba([10, 10, 250, 255]));

    let result = processor.remove_background(&image, &BackgroundSpec::ImageBackdrop(backdrop))?;
    assert_eq!(result.dimensions(), (6, 6));
    assert_eq!(result.image.get_pixel(3, 3), Some(Rgba([10, 10, 250, 255])));
    Ok(())
}

#[test]
fn test_blur_background_from_source() -> Result<()> {
    // Striped source, fully background: the result is a blurred copy
    let source = RawImage::new(RgbaImage::from_fn(16, 16, |x, _| {
        if x % 2 == 0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    }));
    let mut processor = fixed_processor(SegmentationMask::filled(16, 16, 0.0));

    let result = processor.remove_background(&source, &BackgroundSpec::Blur { radius: 5.0 })?;
    let centre = result.image.get_pixel(8, 8).unwrap();
    assert_eq!(centre[3], 255);
    assert!(centre[0] > 60 && centre[0] < 195, "centre was {:?}", centre);
    Ok(())
}

#[test]
fn test_mask_resolution_drives_output_size() -> Result<()> {
    let segmenter =
        ModelSegmenter::new(Box::new(MockBackend::segmenter((96, 64))), TensorRange::ZeroToOne);
    let mut processor =
        BackgroundRemovalProcessor::new(RemovalConfig::default(), Box::new(segmenter));

    let result =
        processor.remove_background(&RawImage::filled(640, 480, SUBJECT), &BackgroundSpec::white())?;
    assert_eq!(result.dimensions(), (96, 64));
    assert_eq!(result.original_dimensions, (640, 480));

    let stats = result.mask.as_ref().map(SegmentationMask::statistics).unwrap();
    assert!(stats.foreground_ratio > 0.1 && stats.foreground_ratio < 0.9);
    Ok(())
}

#[test]
fn test_restore_original_size() -> Result<()> {
    let config = RemovalConfig::builder().restore_original_size(true).build()?;
    let mut processor = BackgroundRemovalProcessor::with_factory(
        config,
        &filterkit::DefaultBackendFactory,
        BackendType::Mock,
    )?;

    let result =
        processor.remove_background(&RawImage::filled(300, 200, SUBJECT), &BackgroundSpec::white())?;
    assert_eq!(result.dimensions(), (300, 200));
    assert_eq!(result.mask.map(|m| m.dimensions()), Some((256, 256)));
    Ok(())
}

#[test]
fn test_apply_mask_extremes() -> Result<()> {
    let image = RawImage::filled(3, 3, Rgba([12, 34, 56, 255]));

    let opaque = AlphaCompositor::apply_mask(&image, &SegmentationMask::filled(3, 3, 1.0))?;
    assert_eq!(opaque, image);

    let clear = AlphaCompositor::apply_mask(&image, &SegmentationMask::filled(3, 3, 0.0))?;
    assert!(clear
        .pixels()
        .pixels()
        .all(|p| *p == Rgba([12, 34, 56, 0])));
    Ok(())
}

#[test]
fn test_transparent_foreground_over_opaque_background() -> Result<()> {
    let background = BackgroundSynthesizer::make_background(
        &BackgroundSpec::SolidColor(Rgba([90, 80, 70, 255])),
        (4, 4),
        None,
    )?;
    let foreground = RawImage::filled(4, 4, Rgba([255, 0, 0, 0]));

    let composite = AlphaCompositor::composite(&background, &foreground)?;
    assert_eq!(composite, background);
    Ok(())
}

#[test]
fn test_crate_level_remove_background() -> Result<()> {
    let result = filterkit::remove_background(
        &RawImage::filled(50, 50, SUBJECT),
        &RemovalConfig::default(),
        &BackgroundSpec::Transparent,
        BackendType::Mock,
    )?;
    assert_eq!(result.dimensions(), (256, 256));
    assert_eq!(result.metadata.background.as_deref(), Some("transparent"));
    Ok(())
}
