//! Logging setup on top of tracing
//!
//! One console layer, plus an optional daily-rotating file layer. `RUST_LOG`
//! overrides the configured level when set.

use std::fs;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::error::{Error, Result};

/// Keeps the non-blocking file writer alive; dropping it flushes pending
/// log lines, so hold it until the process exits.
pub struct LogGuards {
    _file: Option<WorkerGuard>,
}

/// Set up the global subscriber from config plus the CLI verbosity flags.
pub fn init_logging(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Result<LogGuards> {
    let level = effective_level(settings, verbose, quiet);

    let (file_layer, file_guard) = match settings.file.as_deref() {
        Some(path) => {
            let (layer, guard) = file_layer(path, settings.max_files, settings.json_format)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(console_layer(settings.json_format))
        .with(file_layer)
        .init();

    tracing::debug!(%level, file = ?settings.file, "Logging initialized");

    Ok(LogGuards { _file: file_guard })
}

/// Minimal console-only setup for subcommands that do not load config.
pub fn init_simple(level: Level) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(fmt::layer().compact())
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

/// CLI flags win over the configured level; `-q` wins over everything.
fn effective_level(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Level {
    if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => parse_level(&settings.level),
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

fn parse_level(s: &str) -> Level {
    match s.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// `RUST_LOG` takes precedence; otherwise use the resolved level and keep
/// the websocket stack quiet unless asked for explicitly.
fn filter_for(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    for directive in ["tokio_tungstenite=warn", "tungstenite=warn"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }
    filter
}

fn console_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    if json {
        Box::new(fmt::layer().json().with_target(true))
    } else {
        Box::new(fmt::layer().compact().with_target(true).with_ansi(true))
    }
}

fn file_layer<S>(
    path: &str,
    max_files: u32,
    json: bool,
) -> Result<(Box<dyn Layer<S> + Send + Sync>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let path = Path::new(path);
    let directory = path.parent().unwrap_or(Path::new("."));
    let prefix = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("ingest-watch");

    fs::create_dir_all(directory).map_err(|e| {
        Error::Config(format!(
            "Failed to create log directory '{}': {}",
            directory.display(),
            e
        ))
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(max_files as usize)
        .build(directory)
        .map_err(|e| Error::Config(format!("Failed to open log file: {}", e)))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer: Box<dyn Layer<S> + Send + Sync> = if json {
        Box::new(fmt::layer().json().with_writer(writer).with_ansi(false))
    } else {
        Box::new(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false),
        )
    };
    Ok((layer, guard))
}
