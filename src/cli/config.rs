//! Conversion of CLI arguments into pipeline configuration

use crate::cli::main_impl::{CommonArgs, EnhanceArgs, RemoveBackgroundArgs};
use crate::{
    config::{EnhancementConfig, ExecutionProvider, InferenceConfig, OutputFormat, RemovalConfig},
    models::ModelSpec,
    processor::BackendType,
    services::ImageIOService,
    types::BackgroundSpec,
};
use anyhow::{Context, Result};
use std::path::Path;

/// Builds pipeline configs from parsed arguments
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    pub(crate) fn backend_type(common: &CommonArgs) -> Result<BackendType> {
        common
            .backend
            .parse()
            .with_context(|| format!("Invalid backend '{}'", common.backend))
    }

    /// `--config` file (or defaults) with flag overrides applied
    pub(crate) fn enhancement_config(args: &EnhanceArgs) -> Result<EnhancementConfig> {
        let mut config = match &args.common.config {
            Some(path) => EnhancementConfig::from_json_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => EnhancementConfig::default(),
        };

        Self::apply_model_overrides(&mut config.model_spec, &args.common);
        if let Some(scale) = args.scale {
            config.model_spec.scale = scale;
        }
        if args.no_pad {
            config.pad_to_square = false;
        }
        Self::apply_output_overrides(
            &args.common,
            &mut config.output_format,
            &mut config.jpeg_quality,
        );
        config.inference = Self::inference_config(&args.common, &config.inference)?;

        config.validate()?;
        Ok(config)
    }

    pub(crate) fn removal_config(args: &RemoveBackgroundArgs) -> Result<RemovalConfig> {
        let mut config = match &args.common.config {
            Some(path) => RemovalConfig::from_json_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => RemovalConfig::default(),
        };

        Self::apply_model_overrides(&mut config.model_spec, &args.common);
        if args.restore_size {
            config.restore_original_size = true;
        }
        Self::apply_output_overrides(
            &args.common,
            &mut config.output_format,
            &mut config.jpeg_quality,
        );
        config.inference = Self::inference_config(&args.common, &config.inference)?;

        config.validate()?;
        Ok(config)
    }

    /// Parse `transparent`, `white`, `color:#RRGGBB[AA]`, `blur:<radius>` or `image:<path>`
    pub(crate) fn parse_background(value: &str) -> Result<BackgroundSpec> {
        let (kind, argument) = match value.split_once(':') {
            Some((kind, argument)) => (kind.trim().to_lowercase(), Some(argument.trim())),
            None => (value.trim().to_lowercase(), None),
        };

        match (kind.as_str(), argument) {
            ("transparent", None) => Ok(BackgroundSpec::Transparent),
            ("white", None) => Ok(BackgroundSpec::white()),
            ("color", Some(hex)) => Ok(BackgroundSpec::solid_hex(hex)?),
            ("blur", Some(radius)) => {
                let radius: f32 = radius
                    .parse()
                    .with_context(|| format!("Invalid blur radius '{}'", radius))?;
                if !radius.is_finite() || radius < 0.0 {
                    anyhow::bail!("Blur radius must be a non-negative number, got {}", radius);
                }
                Ok(BackgroundSpec::Blur { radius })
            },
            ("image", Some(path)) => {
                let backdrop = ImageIOService::load_image(Path::new(path))
                    .with_context(|| format!("Failed to load backdrop {}", path))?;
                Ok(BackgroundSpec::ImageBackdrop(backdrop))
            },
            _ => anyhow::bail!(
                "Expected transparent, white, color:#RRGGBB[AA], blur:<radius> or image:<path>"
            ),
        }
    }

    fn apply_model_overrides(spec: &mut ModelSpec, common: &CommonArgs) {
        if let Some(model) = &common.model {
            spec.path.clone_from(model);
            if let Some(stem) = model.file_stem() {
                spec.name = stem.to_string_lossy().into_owned();
            }
        }
        if let Some(size) = common.input_size {
            spec.input_size = (size, size);
        }
    }

    fn apply_output_overrides(
        common: &CommonArgs,
        format: &mut OutputFormat,
        jpeg_quality: &mut u8,
    ) {
        if let Some(cli_format) = common.format {
            *format = cli_format.into();
        }
        if let Some(quality) = common.jpeg_quality {
            *jpeg_quality = quality;
        }
    }

    fn inference_config(common: &CommonArgs, base: &InferenceConfig) -> Result<InferenceConfig> {
        let provider: ExecutionProvider = common
            .execution_provider
            .parse()
            .context("Invalid execution provider")?;
        let mut inference = base.clone();
        inference.execution_provider = provider;
        if common.threads > 0 {
            inference = inference.with_threads(common.threads);
        }
        Ok(inference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::main_impl::CliOutputFormat;
    use image::Rgba;
    use std::path::PathBuf;

    fn common_args() -> CommonArgs {
        CommonArgs {
            input: "photo.jpg".to_string(),
            model: None,
            backend: "tract".to_string(),
            execution_provider: "auto".to_string(),
            output: None,
            format: None,
            jpeg_quality: None,
            input_size: None,
            threads: 0,
            config: None,
        }
    }

    #[test]
    fn test_enhancement_defaults() {
        let args = EnhanceArgs {
            common: common_args(),
            no_pad: false,
            scale: None,
        };
        let config = CliConfigBuilder::enhancement_config(&args).unwrap();
        assert_eq!(config, EnhancementConfig::default());
    }

    #[test]
    fn test_enhancement_overrides() {
        let mut common = common_args();
        common.model = Some(PathBuf::from("models/esrgan_x2.onnx"));
        common.input_size = Some(64);
        common.format = Some(CliOutputFormat::Png);
        common.threads = 4;
        common.execution_provider = "cpu".to_string();
        let args = EnhanceArgs {
            common,
            no_pad: true,
            scale: Some(2),
        };

        let config = CliConfigBuilder::enhancement_config(&args).unwrap();
        assert_eq!(config.model_spec.name, "esrgan_x2");
        assert_eq!(config.model_spec.input_size, (64, 64));
        assert_eq!(config.model_spec.scale, 2);
        assert!(!config.pad_to_square);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert_eq!(config.inference.intra_threads, 4);
        assert_eq!(config.inference.execution_provider, ExecutionProvider::Cpu);
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let mut common = common_args();
        common.jpeg_quality = Some(150);
        let args = RemoveBackgroundArgs {
            common,
            background: "transparent".to_string(),
            restore_size: false,
        };
        assert!(CliConfigBuilder::removal_config(&args).is_err());
    }

    #[test]
    fn test_removal_restore_size() {
        let args = RemoveBackgroundArgs {
            common: common_args(),
            background: "white".to_string(),
            restore_size: true,
        };
        let config = CliConfigBuilder::removal_config(&args).unwrap();
        assert!(config.restore_original_size);
        assert_eq!(config.output_format, OutputFormat::Png);
    }

    #[test]
    fn test_config_file_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enhance.json");
        std::fs::write(&path, r#"{ "jpeg_quality": 80, "restore_aspect": false }"#).unwrap();

        let mut common = common_args();
        common.config = Some(path);
        common.format = Some(CliOutputFormat::Png);
        let args = EnhanceArgs {
            common,
            no_pad: false,
            scale: None,
        };

        let config = CliConfigBuilder::enhancement_config(&args).unwrap();
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert!(!config.restore_aspect);
    }

    #[test]
    fn test_parse_background_variants() {
        assert_eq!(
            CliConfigBuilder::parse_background("white").unwrap(),
            BackgroundSpec::white()
        );
        assert_eq!(
            CliConfigBuilder::parse_background("color:#102030").unwrap(),
            BackgroundSpec::SolidColor(Rgba([16, 32, 48, 255]))
        );
        assert_eq!(
            CliConfigBuilder::parse_background("blur:7.5").unwrap(),
            BackgroundSpec::Blur { radius: 7.5 }
        );
    }

    #[test]
    fn test_parse_background_errors() {
        assert!(CliConfigBuilder::parse_background("blur:-3").is_err());
        assert!(CliConfigBuilder::parse_background("blur:abc").is_err());
        assert!(CliConfigBuilder::parse_background("color:#12").is_err());
        assert!(CliConfigBuilder::parse_background("gradient").is_err());
        assert!(CliConfigBuilder::parse_background("image:/does/not/exist.png").is_err());
    }

    #[test]
    fn test_parse_backdrop_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backdrop.png");
        ImageIOService::save_image(
            &crate::types::RawImage::filled(4, 4, Rgba([0, 0, 255, 255])),
            &path,
            OutputFormat::Png,
            100,
        )
        .unwrap();

        let spec = CliConfigBuilder::parse_background(&format!("image:{}", path.display())).unwrap();
        assert!(matches!(spec, BackgroundSpec::ImageBackdrop(ref image) if image.dimensions() == (4, 4)));
    }
}
