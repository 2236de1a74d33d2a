//! Subscriber setup for the command-line tool
//!
//! The library only emits `log` records and `tracing` spans; installing a
//! subscriber is left to the binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Console rendering of events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Coloured single-line output (default)
    #[default]
    Console,
    /// Plain output without ANSI codes, for CI logs
    Plain,
    /// One JSON object per event
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Subscriber configuration derived from CLI flags
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// Number of `-v` flags
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Explicit filter directive, takes precedence over `verbosity`
    pub env_filter: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive for the configured verbosity
    ///
    /// Inference engines stay at `warn` until `-vvv`, they are very chatty.
    #[must_use]
    pub fn filter_directive(&self) -> String {
        if let Some(filter) = &self.env_filter {
            return filter.clone();
        }
        match self.verbosity {
            0 => "info,ort=warn,tract_onnx=warn,tract_core=warn".to_string(),
            1 => "debug,ort=warn,tract_onnx=warn,tract_core=warn".to_string(),
            2 => "trace,ort=warn,tract_onnx=warn,tract_core=warn".to_string(),
            _ => "trace".to_string(),
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<()> {
        let filter = EnvFilter::try_new(self.filter_directive())?;
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => registry
                .with(
                    fmt::layer()
                        .with_ansi(true)
                        .with_target(false)
                        .with_level(true)
                        .compact(),
                )
                .try_init()?,
            TracingFormat::Plain => registry
                .with(fmt::layer().with_ansi(false).with_target(false).compact())
                .try_init()?,
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => registry
                .with(fmt::layer().json().with_current_span(true).with_span_list(true))
                .try_init()?,
        }
        Ok(())
    }
}

/// Install a console subscriber for `verbosity`
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<()> {
    TracingConfig::new().with_verbosity(verbosity).init()
}

/// Spans around CLI operations
pub mod spans {
    use std::path::Path;
    use tracing::{Level, Span};

    pub fn command(operation: &str, backend: &str, model: &Path) -> Span {
        tracing::span!(
            Level::INFO,
            "command",
            operation = %operation,
            backend = %backend,
            model = %model.display()
        )
    }

    pub fn file_output(path: &Path, format: &str) -> Span {
        tracing::span!(
            Level::DEBUG,
            "file_output",
            path = %path.display(),
            format = %format
        )
    }
}
