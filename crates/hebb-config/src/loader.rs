// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{validate_config, ConfigError, ConfigResult, HebbConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "hebb_configuration.toml";

/// Find the hebb configuration file
///
/// Search order:
/// 1. `HEBB_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories (workspace root)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("HEBB_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by HEBB_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "hebb configuration file '{}' not found in any of these locations:\n{}\n\nSet HEBB_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Returns
///
/// Complete, validated `HebbConfig` with all overrides applied
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<HebbConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: HebbConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    validate_config(&config)?;
    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `HEBB_GPU_BACKENDS` -> `gpu.backends`
/// - `HEBB_GPU_ADAPTER_INDEX` -> `gpu.adapter_index`
/// - `HEBB_KERNEL_ROOT` -> `kernels.root`
/// - `HEBB_LOG_LEVEL` -> `logging.level`
/// - `HEBB_MAX_INHIBITION_SCORE` -> `dispatch.global_inhibition.max_score`
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` when a numeric override does not parse
pub fn apply_environment_overrides(config: &mut HebbConfig) -> ConfigResult<()> {
    let vars: HashMap<String, String> = [
        ("HEBB_GPU_BACKENDS", "gpu_backends"),
        ("HEBB_GPU_ADAPTER_INDEX", "adapter_index"),
        ("HEBB_KERNEL_ROOT", "kernel_root"),
        ("HEBB_LOG_LEVEL", "log_level"),
        ("HEBB_MAX_INHIBITION_SCORE", "max_inhibition_score"),
    ]
    .into_iter()
    .filter_map(|(var, key)| env::var(var).ok().map(|value| (key.to_string(), value)))
    .collect();

    apply_overrides(config, &vars)
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"kernel_root": "/opt/kernels", "log_level": "debug"}`)
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` when a numeric override does not parse
pub fn apply_cli_overrides(
    config: &mut HebbConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    apply_overrides(config, cli_args)
}

fn apply_overrides(config: &mut HebbConfig, values: &HashMap<String, String>) -> ConfigResult<()> {
    if let Some(value) = values.get("gpu_backends") {
        config.gpu.backends = value.clone();
    }
    if let Some(value) = values.get("adapter_index") {
        config.gpu.adapter_index = parse_number("adapter_index", value)?;
    }
    if let Some(value) = values.get("kernel_root") {
        config.kernels.root = if value.is_empty() {
            None
        } else {
            Some(PathBuf::from(value))
        };
    }
    if let Some(value) = values.get("log_level") {
        config.logging.level = value.clone();
    }
    if let Some(value) = values.get("max_inhibition_score") {
        config.dispatch.global_inhibition.max_score = parse_number("max_inhibition_score", value)?;
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse::<T>().map_err(|_| {
        ConfigError::InvalidValue(format!("{} must be a non-negative integer, got '{}'", key, value))
    })
}
