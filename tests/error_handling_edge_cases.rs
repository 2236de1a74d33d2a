//! Error conditions and boundary cases across the public API

use filterkit::{
    backends::MockBackend,
    config::{EnhancementConfig, RemovalConfig},
    error::{FilterError, Result},
    models::ModelSpec,
    processor::{BackendFactory, BackendType, DefaultBackendFactory, EnhancementProcessor},
    services::{AlphaCompositor, BackgroundSynthesizer, ImageIOService},
    types::{BackgroundSpec, NormalizedTensor, RawImage, SegmentationMask},
    utils::{ImagePostprocessor, TensorValidator},
    InferenceBackend,
};
use image::Rgba;

#[test]
fn test_config_validation_edge_cases() -> Result<()> {
    let config = RemovalConfig::builder().jpeg_quality(0).build()?;
    assert_eq!(config.jpeg_quality, 0);
    let config = RemovalConfig::builder().jpeg_quality(100).build()?;
    assert_eq!(config.jpeg_quality, 100);

    let error = RemovalConfig::builder().jpeg_quality(101).build().unwrap_err();
    assert!(matches!(error, FilterError::InvalidConfig(_)));
    assert!(error.to_string().contains("JPEG quality"));
    assert!(error.to_string().contains("101"));

    let mut config = EnhancementConfig::default();
    config.model_spec.scale = 0;
    assert!(config.validate().is_err());
    Ok(())
}

#[test]
fn test_malformed_json_config() {
    let error = EnhancementConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(error, FilterError::InvalidConfig(_)));

    // A segmenter spec cannot drive the enhancement pipeline
    let json = r#"{ "model_spec": { "name": "seg", "path": "seg.onnx",
        "input_size": [256, 256], "scale": 1, "output_channels": 1 } }"#;
    assert!(EnhancementConfig::from_json_str(json).is_err());
    assert!(RemovalConfig::from_json_str(json).is_ok());
}

#[test]
fn test_missing_model_file_is_unavailable() {
    let spec = ModelSpec::esrgan_x4("/definitely/not/here.onnx");
    assert!(matches!(
        spec.load_bytes(),
        Err(FilterError::ModelUnavailable(_))
    ));
}

#[cfg(feature = "tract")]
#[test]
fn test_tract_backend_missing_model() {
    let config = EnhancementConfig::builder()
        .model_spec(ModelSpec::esrgan_x4("/definitely/not/here.onnx"))
        .build()
        .unwrap();
    let result = filterkit::enhance(
        &RawImage::filled(10, 10, Rgba([0, 0, 0, 255])),
        &config,
        BackendType::Tract,
    );
    assert!(matches!(result, Err(FilterError::ModelUnavailable(_))));
}

#[test]
fn test_empty_and_oversized_images() {
    let mut processor = EnhancementProcessor::new(
        EnhancementConfig::default(),
        Box::new(MockBackend::upscaler((8, 8), 2)),
    );
    assert!(matches!(
        processor.enhance(&RawImage::filled(0, 10, Rgba([0, 0, 0, 255]))),
        Err(FilterError::InvalidInput(_))
    ));
    assert!(TensorValidator::validate_image_dimensions(16_385, 1).is_err());
    assert!(TensorValidator::validate_image_dimensions(1, 1).is_ok());
}

#[test]
fn test_one_pixel_image() -> Result<()> {
    let mut processor = EnhancementProcessor::new(
        EnhancementConfig::default(),
        Box::new(MockBackend::upscaler((8, 8), 2)),
    );
    let result = processor.enhance(&RawImage::filled(1, 1, Rgba([90, 90, 90, 255])))?;
    assert_eq!(result.dimensions(), (16, 16));
    Ok(())
}

#[test]
fn test_extreme_aspect_ratio_crop() -> Result<()> {
    let mut processor = EnhancementProcessor::new(
        EnhancementConfig::default(),
        Box::new(MockBackend::upscaler((8, 8), 2)),
    );
    // 1000:1 collapses to a single row, never to zero
    let result = processor.enhance(&RawImage::filled(1000, 1, Rgba([90, 90, 90, 255])))?;
    assert_eq!(result.dimensions(), (16, 1));
    Ok(())
}

#[test]
fn test_model_contract_violations() {
    let image = RawImage::filled(8, 8, Rgba([0, 0, 0, 255]));

    // Batch of two
    let mut processor = EnhancementProcessor::new(
        EnhancementConfig::default(),
        Box::new(MockBackend::upscaler((8, 8), 2).with_output_shape((2, 16, 16, 3))),
    );
    assert!(matches!(
        processor.enhance(&image),
        Err(FilterError::ShapeMismatch(_))
    ));

    // Output smaller than input
    let mut processor = EnhancementProcessor::new(
        EnhancementConfig::default(),
        Box::new(MockBackend::upscaler((8, 8), 2).with_output_shape((1, 4, 4, 3))),
    );
    assert!(matches!(
        processor.enhance(&image),
        Err(FilterError::ShapeMismatch(_))
    ));
}

#[test]
fn test_backend_rejects_wrong_input_shape() {
    let mut backend = MockBackend::upscaler((8, 8), 2);
    backend
        .initialize(&filterkit::config::InferenceConfig::default())
        .unwrap();
    let result = backend.infer(&ndarray::Array4::zeros((1, 4, 4, 3)));
    assert!(matches!(result, Err(FilterError::ShapeMismatch(_))));
}

#[test]
fn test_unknown_backend_names() {
    assert!("tensorflow".parse::<BackendType>().is_err());
    assert!(DefaultBackendFactory
        .available_backends()
        .contains(&BackendType::Mock));
}

#[test]
fn test_buffer_and_tensor_mismatches() {
    assert!(matches!(
        RawImage::from_raw_rgba(2, 2, vec![0; 15]),
        Err(FilterError::ShapeMismatch(_))
    ));
    assert!(NormalizedTensor::new(vec![0.0; 11], 2, 2, 3).is_err());
    assert!(SegmentationMask::new(vec![0.0; 3], 2, 2).is_err());

    // Each buffer kind reports itself
    let message = SegmentationMask::new(vec![0.0; 3], 2, 2)
        .unwrap_err()
        .to_string();
    assert!(message.contains("Mask"), "message was {}", message);
    let message = NormalizedTensor::new(vec![0.0; 11], 2, 2, 3)
        .unwrap_err()
        .to_string();
    assert!(message.contains("Tensor"), "message was {}", message);
}

#[test]
fn test_mismatched_compositing_inputs() {
    let image = RawImage::filled(4, 4, Rgba([0, 0, 0, 255]));
    assert!(AlphaCompositor::apply_mask(&image, &SegmentationMask::filled(3, 4, 1.0)).is_err());
    assert!(AlphaCompositor::composite(&image, &RawImage::filled(4, 5, Rgba([0, 0, 0, 255])))
        .is_err());
}

#[test]
fn test_invalid_background_parameters() {
    let source = RawImage::filled(4, 4, Rgba([0, 0, 0, 255]));
    for radius in [-1.0, f32::INFINITY, f32::NAN] {
        assert!(matches!(
            BackgroundSynthesizer::make_background(
                &BackgroundSpec::Blur { radius },
                (4, 4),
                Some(&source)
            ),
            Err(FilterError::InvalidInput(_))
        ));
    }
    assert!(BackgroundSpec::solid_hex("#zzzzzz").is_err());
    assert!(BackgroundSpec::solid_hex("#1234").is_err());
}

#[test]
fn test_invalid_crop_ratio() {
    let image = RawImage::filled(4, 4, Rgba([0, 0, 0, 255]));
    for ratio in [0.0, -1.0, f64::NAN] {
        assert!(ImagePostprocessor::crop_to_aspect(&image, ratio).is_err());
    }
}

#[test]
fn test_undecodable_bytes() {
    assert!(matches!(
        ImageIOService::decode(&[]),
        Err(FilterError::InvalidInput(_))
    ));
    assert!(ImageIOService::decode(b"definitely not an image").is_err());
    assert!(ImageIOService::load_image("/no/such/file.png").is_err());
}
