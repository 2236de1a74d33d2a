//! Filterkit CLI
//!
//! Command-line interface for photo enhancement and background replacement.

use super::config::CliConfigBuilder;
use crate::{
    config::OutputFormat,
    processor::{BackendFactory, BackendType, DefaultBackendFactory},
    services::{ImageIOService, OutputFormatHandler},
    tracing_config::{spans, TracingConfig, TracingFormat},
    types::{BackgroundSpec, FilterResult, RawImage},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::Instrument;

/// Photo enhancement and background replacement
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "filterkit")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE, -vvv: TRACE including inference engines)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upscale an image with a super-resolution model
    Enhance(EnhanceArgs),
    /// Replace the background of an image
    RemoveBackground(RemoveBackgroundArgs),
    /// Show compiled-in backends and execution provider availability
    Providers,
}

/// Arguments shared by both subcommands
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Input image file (use "-" for stdin)
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Path to the ONNX model file [default: from --config or the built-in preset]
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Inference backend (tract, onnx, mock)
    #[arg(short, long, default_value = "tract")]
    pub backend: String,

    /// Execution provider for the ONNX backend (auto, cpu, cuda, coreml)
    #[arg(short, long, default_value = "auto")]
    pub execution_provider: String,

    /// Output file. Use "-" for stdout.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format [default: jpeg for enhance, png for remove-background]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// JPEG quality (0-100)
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Square model input size in pixels
    #[arg(long, value_name = "PIXELS")]
    pub input_size: Option<u32>,

    /// Number of threads (0 = let the backend decide)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// JSON configuration file; command-line flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct EnhanceArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Stretch the image to the model input instead of padding it to a square
    #[arg(long)]
    pub no_pad: bool,

    /// Upscale factor of the model
    #[arg(long)]
    pub scale: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct RemoveBackgroundArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Background: transparent, white, color:#RRGGBB[AA], blur:<radius>, image:<path>
    #[arg(long, default_value = "transparent")]
    pub background: String,

    /// Resize the result back to the input dimensions
    #[arg(long)]
    pub restore_size: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
    Tiff,
    Rgba8,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Jpeg => Self::Jpeg,
            CliOutputFormat::Webp => Self::WebP,
            CliOutputFormat::Tiff => Self::Tiff,
            CliOutputFormat::Rgba8 => Self::Rgba8,
        }
    }
}

/// Output settings resolved from the pipeline config
struct OutputTarget {
    format: OutputFormat,
    quality: u8,
    suffix: &'static str,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(TracingFormat::Console)
        .init()
        .context("Failed to initialize tracing")?;

    let start_time = Instant::now();
    match cli.command {
        Command::Enhance(args) => run_enhance(args).await?,
        Command::RemoveBackground(args) => run_remove_background(args).await?,
        Command::Providers => {
            show_provider_diagnostics();
            return Ok(());
        },
    }
    info!("Done in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

async fn run_enhance(args: EnhanceArgs) -> Result<()> {
    let config = CliConfigBuilder::enhancement_config(&args).context("Invalid configuration")?;
    let backend_type = CliConfigBuilder::backend_type(&args.common)?;
    let span = spans::command("enhance", &backend_type.to_string(), config.model_spec.path());

    info!("Model: {}", config.model_spec.display_name());
    let image = load_input(&args.common.input)?;
    let target = OutputTarget {
        format: config.output_format,
        quality: config.jpeg_quality,
        suffix: "enhanced",
    };

    let result = run_pipeline(move || crate::enhance(&image, &config, backend_type))
        .instrument(span)
        .await
        .context("Failed to enhance image")?;

    report_timings(&result);
    write_output(&result, &args.common, &target)
}

async fn run_remove_background(args: RemoveBackgroundArgs) -> Result<()> {
    let config = CliConfigBuilder::removal_config(&args).context("Invalid configuration")?;
    let backend_type = CliConfigBuilder::backend_type(&args.common)?;
    let background = CliConfigBuilder::parse_background(&args.background)
        .with_context(|| format!("Invalid background '{}'", args.background))?;
    let span = spans::command(
        "remove-background",
        &backend_type.to_string(),
        config.model_spec.path(),
    );

    info!(
        "Model: {}, background: {}",
        config.model_spec.display_name(),
        background.label()
    );
    let image = load_input(&args.common.input)?;
    let target = OutputTarget {
        format: config.output_format,
        quality: config.jpeg_quality,
        suffix: "bg_replaced",
    };

    let result = run_pipeline(move || {
        crate::remove_background(&image, &config, &background, backend_type)
    })
    .instrument(span)
    .await
    .context("Failed to replace background")?;

    if let Some(mask) = &result.mask {
        let stats = mask.statistics();
        info!(
            "🎭 Mask {}x{}: {:.1}% foreground",
            mask.width(),
            mask.height(),
            stats.foreground_ratio * 100.0
        );
    }
    report_timings(&result);
    write_output(&result, &args.common, &target)
}

async fn run_pipeline<F>(job: F) -> Result<FilterResult>
where
    F: FnOnce() -> crate::Result<FilterResult> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(job)
        .await
        .context("Processing task panicked")??;
    Ok(result)
}

fn show_provider_diagnostics() {
    println!("🔍 Backends:");
    for backend in DefaultBackendFactory.available_backends() {
        println!("  • {}", backend);
    }

    #[cfg(feature = "onnx")]
    {
        println!("\n🔍 ONNX Runtime execution providers:");
        for (name, available, description) in crate::backends::OnnxBackend::list_providers() {
            let status = if available { "✅" } else { "❌" };
            println!("  {} {:<8} {}", status, name, description);
        }
    }
    #[cfg(not(feature = "onnx"))]
    println!("\nONNX Runtime execution providers require the 'onnx' feature");
}

fn load_input(input: &str) -> Result<RawImage> {
    if input == "-" {
        info!("Reading image from stdin");
        let data = read_stdin()?;
        return ImageIOService::decode(&data).context("Failed to decode image from stdin");
    }
    let path = Path::new(input);
    let image = ImageIOService::load_image(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    info!(
        "📷 Loaded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}

fn report_timings(result: &FilterResult) {
    let timings = result.timings();
    info!("📊 Processing breakdown:");
    if timings.model_load_ms > 0 {
        info!("  ├─ Model Load: {}ms", timings.model_load_ms);
    }
    info!("  ├─ Preprocessing: {}ms", timings.preprocessing_ms);
    info!(
        "  ├─ Inference: {}ms ({:.1}%)",
        timings.inference_ms,
        timings.inference_ratio() * 100.0
    );
    info!("  ├─ Postprocessing: {}ms", timings.postprocessing_ms);
    if timings.compositing_ms > 0 {
        info!("  ├─ Compositing: {}ms", timings.compositing_ms);
    }
    info!("  └─ Total: {}ms", timings.total_ms);
}

fn write_output(result: &FilterResult, common: &CommonArgs, target: &OutputTarget) -> Result<()> {
    OutputFormatHandler::warn_if_alpha_dropped(target.format, &result.image);

    match common.output.as_deref() {
        Some("-") => {
            let data = result.to_bytes(target.format, target.quality)?;
            write_stdout(&data)?;
            info!("Image written to stdout");
        },
        Some(path) => save_to(result, Path::new(path), target)?,
        None => {
            if common.input == "-" {
                let data = result.to_bytes(target.format, target.quality)?;
                write_stdout(&data)?;
                info!("Image written to stdout");
            } else {
                let path = generate_output_path(Path::new(&common.input), target);
                save_to(result, &path, target)?;
            }
        },
    }
    Ok(())
}

fn save_to(result: &FilterResult, path: &Path, target: &OutputTarget) -> Result<()> {
    let _span = spans::file_output(path, OutputFormatHandler::get_extension(target.format))
        .entered();
    if let Ok(inferred) = OutputFormatHandler::from_path(path) {
        if inferred != target.format {
            warn!(
                "Output extension of {} does not match format {:?}",
                path.display(),
                target.format
            );
        }
    }
    result
        .save(path, target.format, target.quality)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    info!(
        "💾 Saved {}x{} result to {}",
        result.image.width(),
        result.image.height(),
        path.display()
    );
    Ok(())
}

/// Read image data from stdin
fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("Failed to read image data from stdin")?;
    if buffer.is_empty() {
        anyhow::bail!("No data received from stdin");
    }
    Ok(buffer)
}

/// Write image data to stdout
fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout();
    stdout
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// `<dir>/<stem>_<suffix>.<ext>` next to the input
fn generate_output_path(input_path: &Path, target: &OutputTarget) -> PathBuf {
    let stem = input_path.file_stem().unwrap_or_default();
    let dir = input_path.parent().unwrap_or(Path::new("."));
    dir.join(format!(
        "{}_{}.{}",
        stem.to_string_lossy(),
        target.suffix,
        OutputFormatHandler::get_extension(target.format)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_enhance() {
        let cli = Cli::try_parse_from([
            "filterkit",
            "enhance",
            "photo.jpg",
            "--model",
            "esrgan.onnx",
            "--no-pad",
            "--scale",
            "2",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Enhance(args) = cli.command else {
            panic!("expected enhance subcommand");
        };
        assert_eq!(args.common.input, "photo.jpg");
        assert_eq!(args.common.backend, "tract");
        assert!(args.no_pad);
        assert_eq!(args.scale, Some(2));
    }

    #[test]
    fn test_parse_remove_background() {
        let cli = Cli::try_parse_from([
            "filterkit",
            "remove-background",
            "-",
            "--background",
            "blur:12",
            "--restore-size",
            "--format",
            "webp",
            "--output",
            "-",
        ])
        .unwrap();

        let Command::RemoveBackground(args) = cli.command else {
            panic!("expected remove-background subcommand");
        };
        assert_eq!(args.background, "blur:12");
        assert!(args.restore_size);
        assert_eq!(args.common.format, Some(CliOutputFormat::Webp));
        assert_eq!(args.common.output.as_deref(), Some("-"));
    }

    #[test]
    fn test_parse_providers() {
        let cli = Cli::try_parse_from(["filterkit", "providers"]).unwrap();
        assert!(matches!(cli.command, Command::Providers));
    }

    #[test]
    fn test_generate_output_path() {
        let target = OutputTarget {
            format: OutputFormat::Jpeg,
            quality: 95,
            suffix: "enhanced",
        };
        let path = generate_output_path(Path::new("/photos/cat.png"), &target);
        assert_eq!(path, PathBuf::from("/photos/cat_enhanced.jpg"));
    }

    #[test]
    fn test_webp_quality_flag_is_rejected() {
        let result = Cli::try_parse_from([
            "filterkit",
            "enhance",
            "photo.png",
            "--webp-quality",
            "80",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_background_parses() {
        assert_eq!(
            CliConfigBuilder::parse_background("transparent").unwrap(),
            BackgroundSpec::Transparent
        );
    }

    #[test]
    fn test_backend_flag_values() {
        for (flag, expected) in [("tract", BackendType::Tract), ("mock", BackendType::Mock)] {
            let cli = Cli::try_parse_from(["filterkit", "enhance", "a.png", "--backend", flag])
                .unwrap();
            let Command::Enhance(args) = cli.command else {
                panic!("expected enhance subcommand");
            };
            assert_eq!(CliConfigBuilder::backend_type(&args.common).unwrap(), expected);
        }
    }
}
