//! Structured logging configuration for dock-peek

use anyhow::{anyhow, Context};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, time::UtcTime, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration for dock-peek
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Required for `File` and `Both` output
    pub file_path: Option<String>,
    /// Include source file and line numbers
    pub include_source: bool,
    pub include_thread_names: bool,
    /// Trace-level output for the registry and thumbnail cache
    pub performance_tracing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Log destinations. Console output goes to stderr so command output on
/// stdout stays machine readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" | "stderr" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" => Ok(LogOutput::Both),
            _ => Err(format!("Invalid log output: {}", s)),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Console,
            file_path: None,
            include_source: false,
            include_thread_names: true,
            performance_tracing: false,
        }
    }
}

impl LogConfig {
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            include_source: true,
            performance_tracing: true,
            ..Self::default()
        }
    }

    /// Configuration for one-shot commands: warnings only, so command output
    /// is not interleaved with startup chatter
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Warn,
            include_thread_names: false,
            ..Self::default()
        }
    }

    /// Overlay `DOCKPEEK_LOG_*` environment variables on `self`
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(level) = env_parsed::<LogLevel>("DOCKPEEK_LOG_LEVEL") {
            self.level = level;
        }
        if let Some(format) = env_parsed::<LogFormat>("DOCKPEEK_LOG_FORMAT") {
            self.format = format;
        }
        if let Some(output) = env_parsed::<LogOutput>("DOCKPEEK_LOG_OUTPUT") {
            self.output = output;
        }
        if let Ok(file_path) = std::env::var("DOCKPEEK_LOG_FILE") {
            self.file_path = Some(file_path);
        }
        if let Ok(include_source) = std::env::var("DOCKPEEK_LOG_SOURCE") {
            self.include_source = include_source.eq_ignore_ascii_case("true");
        }
        if let Ok(performance) = std::env::var("DOCKPEEK_LOG_PERFORMANCE") {
            self.performance_tracing = performance.eq_ignore_ascii_case("true");
        }
        self
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }
}

fn env_parsed<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}

/// Install the global tracing subscriber. Fails if one is already set.
pub fn init_logging(config: &LogConfig) -> crate::Result<()> {
    let filter = create_filter(config);

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if matches!(config.output, LogOutput::Console | LogOutput::Both) {
        layers.push(build_layer(config, std::io::stderr, true));
    }
    if matches!(config.output, LogOutput::File | LogOutput::Both) {
        let path = config
            .file_path
            .as_deref()
            .ok_or_else(|| anyhow!("DOCKPEEK_LOG_FILE is required for file output"))?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {path}"))?;
        layers.push(build_layer(config, Arc::new(file), false));
    }

    tracing_subscriber::registry()
        .with(layers.with_filter(filter))
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    info!(?config, "logging initialized");
    Ok(())
}

fn create_filter(config: &LogConfig) -> EnvFilter {
    let mut directives = format!("dock_peek={}", config.level.as_str());
    if config.performance_tracing {
        directives.push_str(",dock_peek::services::window_registry=trace");
        directives.push_str(",dock_peek::services::thumbnail_cache=trace");
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

fn build_layer<W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_timer(UtcTime::rfc_3339())
        .with_thread_names(config.include_thread_names)
        .with_file(config.include_source)
        .with_line_number(config.include_source);

    match config.format {
        LogFormat::Pretty => Box::new(layer.pretty()),
        LogFormat::Compact => Box::new(layer.compact()),
        LogFormat::Json => Box::new(layer.json()),
    }
}

/// Time a block and report it at debug level
#[macro_export]
macro_rules! trace_performance {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        tracing::debug!(
            event = "performance",
            operation = $name,
            duration_us = start.elapsed().as_micros() as u64,
        );
        result
    }};
}

#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let config = LogConfig {
            level: LogLevel::Debug,
            include_source: true,
            include_thread_names: false,
            performance_tracing: true,
            ..LogConfig::default()
        };
        let _ = init_logging(&config);
    });
}
