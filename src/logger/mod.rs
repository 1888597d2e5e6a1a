//! Logger Module
//!
//! A logging system based on `tracing-subscriber` with support for:
//! - Console output with color control
//! - File output in Full, Compact or JSON format
//! - Size based file rotation with a stderr fallback

pub mod config;
pub(crate) mod rotation;
pub(crate) mod writer;

pub use config::*;

use std::io::IsTerminal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use writer::RotatingFileWriter;

/// Initialize the global subscriber with the given configuration
pub fn init_logger(config: LoggerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    match (config.console.enabled, config.file.enabled) {
        (true, true) => init_both(&config, filter)?,
        (true, false) => init_console_only(&config.console, filter),
        (false, true) => init_file_only(&config.file, filter)?,
        (false, false) => anyhow::bail!("At least one output (console or file) must be enabled"),
    }

    Ok(())
}

fn init_console_only(config: &ConsoleConfig, filter: EnvFilter) {
    let use_ansi = config.colored && std::io::stdout().is_terminal();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(use_ansi)
                .with_target(true)
                .with_level(true),
        )
        .init();
}

fn init_file_only(config: &FileConfig, filter: EnvFilter) -> anyhow::Result<()> {
    let writer = RotatingFileWriter::new(config)?;

    match config.format {
        LogFormat::Full => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(true)
                        .with_writer(writer),
                )
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(true)
                        .compact()
                        .with_writer(writer),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_ansi(false).json().with_writer(writer))
                .init();
        }
    }

    Ok(())
}

fn init_both(config: &LoggerConfig, filter: EnvFilter) -> anyhow::Result<()> {
    let use_ansi = config.console.colored && std::io::stdout().is_terminal();
    let writer = RotatingFileWriter::new(&config.file)?;

    // The file layer goes first so the console layer's ANSI setting does not
    // leak escape codes into span fields written to the file. Each arm builds
    // its own console layer since a `fmt::Layer` is typed by its subscriber.
    match config.file.format {
        LogFormat::Full => {
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(
                    fmt::layer()
                        .with_ansi(use_ansi)
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
        LogFormat::Compact => {
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .compact()
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(
                    fmt::layer()
                        .with_ansi(use_ansi)
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
        LogFormat::Json => {
            let file_layer = fmt::layer().with_ansi(false).json().with_writer(writer);

            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(
                    fmt::layer()
                        .with_ansi(use_ansi)
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }

    Ok(())
}
