// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization for hebb
//!
//! Console output always; with the `file-logging` feature, a timestamped run folder
//! receives daily-rotated JSON logs as well.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hebb_config::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

/// Keeps background log writers alive; dropping it flushes file output
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Directory receiving log files for this run, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Build the `EnvFilter` for a base level plus per-crate debug flags
pub fn build_filter(level: &str, debug_flags: &CrateDebugFlags) -> Result<EnvFilter> {
    let directives = debug_flags.to_filter_string(level);
    EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter directives: {}", directives))
}

/// Initialize logging from the `[logging]` configuration section
///
/// # Arguments
/// * `config` - Level, format and optional log directory
/// * `debug_flags` - Per-crate debug flags layered over the base level
///
/// # Errors
/// Fails if the filter does not parse, the log directory cannot be created, or a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig, debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_filter = build_filter(&config.level, debug_flags)?;
    let console_layer = if config.json {
        fmt::layer().json().with_filter(console_filter).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_filter(console_filter)
            .boxed()
    };
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let (file_guard, log_dir) = match &config.log_dir {
        Some(base_dir) => {
            let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
            let run_folder = base_dir.join(format!("run_{}", timestamp));
            std::fs::create_dir_all(&run_folder).with_context(|| {
                format!("Failed to create log directory: {}", run_folder.display())
            })?;

            let appender = tracing_appender::rolling::daily(&run_folder, "hebb.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(build_filter(&config.level, debug_flags)?)
                .boxed();
            layers.push(file_layer);
            (Some(guard), Some(run_folder))
        }
        None => (None, None),
    };

    #[cfg(not(feature = "file-logging"))]
    let log_dir: Option<PathBuf> = None;

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    #[cfg(not(feature = "file-logging"))]
    if let Some(dir) = &config.log_dir {
        tracing::warn!(
            "logging.log_dir = {} ignored: built without the file-logging feature",
            dir.display()
        );
    }

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guard: file_guard,
        log_dir,
    })
}

/// Initialize console logging at `info` with flags from the process arguments and `HEBB_DEBUG`
pub fn init_logging_default() -> Result<LoggingGuard> {
    init_logging(&LoggingConfig::default(), &crate::cli::parse_debug_flags())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_flags() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-hebb-compute".to_string()]);
        let filter = build_filter("warn", &flags).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("hebb_compute=debug"));
    }

    #[test]
    fn test_build_filter_rejects_garbage() {
        let flags = CrateDebugFlags::default();
        assert!(build_filter("hebb_compute=loud", &flags).is_err());
    }
}
