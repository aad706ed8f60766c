// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures configuration values are within the ranges the kernels were written for.

use crate::{ConfigError, ConfigResult, HebbConfig, WorkSizeConfig};

/// Largest work-group size every wgpu backend guarantees
pub const MAX_LOCAL_SIZE: u32 = 256;

/// Workgroups per dispatch dimension every wgpu backend guarantees
pub const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65_535;

/// Workgroup memory every wgpu backend guarantees (bytes)
pub const MIN_WORKGROUP_STORAGE: u32 = 16 * 1024;

const KNOWN_BACKENDS: &[&str] = &["all", "primary", "secondary", "vulkan", "metal", "dx12", "gl"];
const KNOWN_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    UnknownBackend { value: String },
    InvalidLocalSize { kernel: String, local_size: u32 },
    GlobalBelowLocal { kernel: String, local_size: u32, max_global_size: u32 },
    TooManyWorkgroups { kernel: String, local_size: u32, max_global_size: u32 },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownBackend { value } => write!(
                f,
                "gpu.backends contains unknown backend '{}' (known: {})",
                value,
                KNOWN_BACKENDS.join(", ")
            ),
            Self::InvalidLocalSize { kernel, local_size } => write!(
                f,
                "dispatch.{}.local_size = {} must be a power of two between 1 and {}",
                kernel, local_size, MAX_LOCAL_SIZE
            ),
            Self::GlobalBelowLocal {
                kernel,
                local_size,
                max_global_size,
            } => write!(
                f,
                "dispatch.{}.max_global_size = {} is smaller than its local_size {}",
                kernel, max_global_size, local_size
            ),
            Self::TooManyWorkgroups {
                kernel,
                local_size,
                max_global_size,
            } => write!(
                f,
                "dispatch.{}.max_global_size = {} needs {} workgroups of {}, more than {}",
                kernel,
                max_global_size,
                max_global_size / local_size,
                local_size,
                MAX_WORKGROUPS_PER_DIMENSION
            ),
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Known graphics backend names
/// - Work-group sizes the device API can launch
/// - Top-k histogram fitting in guaranteed workgroup memory
/// - Known log levels
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` with details if validation fails
pub fn validate_config(config: &HebbConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_backends(config, &mut errors);
    validate_work_sizes(config, &mut errors);
    validate_inhibition(config, &mut errors);
    validate_logging(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_backends(config: &HebbConfig, errors: &mut Vec<ConfigValidationError>) {
    let tokens: Vec<String> = config
        .gpu
        .backends
        .split(',')
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "gpu.backends".to_string(),
            reason: "at least one backend is required".to_string(),
        });
    }

    for token in tokens {
        if !KNOWN_BACKENDS.contains(&token.as_str()) {
            errors.push(ConfigValidationError::UnknownBackend { value: token });
        }
    }
}

fn check_work_size(kernel: &str, work: WorkSizeConfig, errors: &mut Vec<ConfigValidationError>) {
    if work.local_size == 0 || work.local_size > MAX_LOCAL_SIZE || !work.local_size.is_power_of_two()
    {
        errors.push(ConfigValidationError::InvalidLocalSize {
            kernel: kernel.to_string(),
            local_size: work.local_size,
        });
    } else if work.max_global_size < work.local_size {
        errors.push(ConfigValidationError::GlobalBelowLocal {
            kernel: kernel.to_string(),
            local_size: work.local_size,
            max_global_size: work.max_global_size,
        });
    } else if work.max_global_size / work.local_size > MAX_WORKGROUPS_PER_DIMENSION {
        errors.push(ConfigValidationError::TooManyWorkgroups {
            kernel: kernel.to_string(),
            local_size: work.local_size,
            max_global_size: work.max_global_size,
        });
    }
}

fn validate_work_sizes(config: &HebbConfig, errors: &mut Vec<ConfigValidationError>) {
    let dispatch = &config.dispatch;
    check_work_size("overlap_score", dispatch.overlap_score, errors);
    check_work_size(
        "global_inhibition.threshold",
        dispatch.global_inhibition.threshold,
        errors,
    );
    check_work_size("learn_correlation", dispatch.learn_correlation, errors);
    check_work_size("sort_synapse", dispatch.sort_synapse, errors);
    check_work_size("cast", dispatch.cast, errors);
}

fn validate_inhibition(config: &HebbConfig, errors: &mut Vec<ConfigValidationError>) {
    let inhibition = &config.dispatch.global_inhibition;

    let width = inhibition.top_k_width;
    if width == 0 || width > MAX_LOCAL_SIZE || !width.is_power_of_two() {
        errors.push(ConfigValidationError::InvalidLocalSize {
            kernel: "global_inhibition.top_k_width".to_string(),
            local_size: width,
        });
    }

    // One u32 histogram bin per score value in [0, max_score]
    let max_bins = MIN_WORKGROUP_STORAGE / 4;
    if inhibition.max_score == 0 || inhibition.max_score >= max_bins {
        errors.push(ConfigValidationError::InvalidValue {
            field: "dispatch.global_inhibition.max_score".to_string(),
            reason: format!("must be between 1 and {}", max_bins - 1),
        });
    }
}

fn validate_logging(config: &HebbConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_ascii_lowercase();
    if !KNOWN_LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!(
                "'{}' is not one of {}",
                config.logging.level,
                KNOWN_LOG_LEVELS.join(", ")
            ),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        assert!(validate_config(&HebbConfig::default()).is_ok());
    }

    #[test]
    fn test_unknown_backend() {
        let mut config = HebbConfig::default();
        config.gpu.backends = "vulkan, opencl".to_string();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("opencl"));
        assert!(!err.contains("'vulkan'"));
    }

    #[test]
    fn test_local_size_must_be_power_of_two() {
        let mut config = HebbConfig::default();
        config.dispatch.sort_synapse.local_size = 96;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("sort_synapse"));
    }

    #[test]
    fn test_global_below_local() {
        let mut config = HebbConfig::default();
        config.dispatch.overlap_score = WorkSizeConfig::new(64, 32);

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("max_global_size = 32"));
    }

    #[test]
    fn test_workgroup_count_must_fit_one_dimension() {
        let mut config = HebbConfig::default();
        config.dispatch.cast = WorkSizeConfig::new(1, 1_000_000);

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("dispatch.cast.max_global_size = 1000000"));

        config.dispatch.cast = WorkSizeConfig::new(1, MAX_WORKGROUPS_PER_DIMENSION);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_inhibition_histogram_must_fit() {
        let mut config = HebbConfig::default();
        config.dispatch.global_inhibition.max_score = 4096;
        assert!(validate_config(&config).is_err());

        config.dispatch.global_inhibition.max_score = 4095;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let mut config = HebbConfig::default();
        config.logging.level = "DEBUG".to_string();
        assert!(validate_config(&config).is_ok());

        config.logging.level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }
}
