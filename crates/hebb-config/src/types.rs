// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `hebb_configuration.toml`, plus the named work-size defaults of every kernel.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// Work-size defaults, one pair (or group) per dispatched algorithm.

/// Work-group size of the overlap scoring kernel
pub const OVERLAP_SCORE_LOCAL_SIZE: u32 = 64;
/// Ceiling on the overlap scoring global work size (dispatched as 8128, a multiple of 64)
pub const OVERLAP_SCORE_MAX_GLOBAL_SIZE: u32 = 8152;

/// Width of the single work-group running the top-k threshold search
pub const GLOBAL_INHIBITION_TOP_K_WIDTH: u32 = 256;
/// Highest score resolved by the top-k histogram; larger scores share the top bin
pub const GLOBAL_INHIBITION_MAX_SCORE: u32 = 2000;
/// Work-group size of the thresholding kernel
pub const GLOBAL_INHIBITION_LOCAL_SIZE: u32 = 32;
/// Ceiling on the thresholding global work size
pub const GLOBAL_INHIBITION_MAX_GLOBAL_SIZE: u32 = 1024;

/// Work-group size of the permanence learning kernel
pub const LEARN_CORRELATION_LOCAL_SIZE: u32 = 128;
/// Ceiling on the permanence learning global work size
pub const LEARN_CORRELATION_MAX_GLOBAL_SIZE: u32 = 4096;

/// Work-group size of the synapse sorting kernel
pub const SORT_SYNAPSE_LOCAL_SIZE: u32 = 128;
/// Ceiling on the synapse sorting global work size
pub const SORT_SYNAPSE_MAX_GLOBAL_SIZE: u32 = 4096;

/// Work-group size of the element cast kernel
pub const CAST_LOCAL_SIZE: u32 = 32;
/// Ceiling on the element cast global work size
pub const CAST_MAX_GLOBAL_SIZE: u32 = 1024;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HebbConfig {
    pub gpu: GpuConfig,
    pub kernels: KernelsConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

/// Adapter selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GpuConfig {
    /// Comma-separated graphics APIs to enumerate: all, primary, vulkan, metal, dx12, gl
    pub backends: String,
    /// Index into the enumerated adapters (0 = first)
    pub adapter_index: usize,
    /// Label attached to the logical device
    pub device_label: String,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            backends: "all".to_string(),
            adapter_index: 0,
            device_label: "hebb compute device".to_string(),
        }
    }
}

/// Where kernel sources come from
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct KernelsConfig {
    /// Directory holding `<kernel>.wgsl` files. `None` uses the sources compiled into the binary.
    pub root: Option<PathBuf>,
}

/// Launch geometry of a single kernel.
///
/// Both fields are required whenever the table appears in a file: a half-specified
/// launch geometry is rejected at parse time rather than mixed with another kernel's defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct WorkSizeConfig {
    pub local_size: u32,
    pub max_global_size: u32,
}

impl WorkSizeConfig {
    pub const fn new(local_size: u32, max_global_size: u32) -> Self {
        Self {
            local_size,
            max_global_size,
        }
    }
}

/// Global inhibition has a fixed-width top-k phase and a thresholding phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct InhibitionConfig {
    pub top_k_width: u32,
    pub max_score: u32,
    pub threshold: WorkSizeConfig,
}

impl Default for InhibitionConfig {
    fn default() -> Self {
        Self {
            top_k_width: GLOBAL_INHIBITION_TOP_K_WIDTH,
            max_score: GLOBAL_INHIBITION_MAX_SCORE,
            threshold: WorkSizeConfig::new(
                GLOBAL_INHIBITION_LOCAL_SIZE,
                GLOBAL_INHIBITION_MAX_GLOBAL_SIZE,
            ),
        }
    }
}

/// Per-algorithm launch tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub overlap_score: WorkSizeConfig,
    pub global_inhibition: InhibitionConfig,
    pub learn_correlation: WorkSizeConfig,
    pub sort_synapse: WorkSizeConfig,
    pub cast: WorkSizeConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            overlap_score: WorkSizeConfig::new(
                OVERLAP_SCORE_LOCAL_SIZE,
                OVERLAP_SCORE_MAX_GLOBAL_SIZE,
            ),
            global_inhibition: InhibitionConfig::default(),
            learn_correlation: WorkSizeConfig::new(
                LEARN_CORRELATION_LOCAL_SIZE,
                LEARN_CORRELATION_MAX_GLOBAL_SIZE,
            ),
            sort_synapse: WorkSizeConfig::new(SORT_SYNAPSE_LOCAL_SIZE, SORT_SYNAPSE_MAX_GLOBAL_SIZE),
            cast: WorkSizeConfig::new(CAST_LOCAL_SIZE, CAST_MAX_GLOBAL_SIZE),
        }
    }
}

/// Logging output
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Directory for rotated log files (requires the `file-logging` feature of hebb-observability)
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: HebbConfig = toml::from_str(
            r#"
            [dispatch.cast]
            local_size = 64
            max_global_size = 2048
            "#,
        )
        .unwrap();

        assert_eq!(config.dispatch.cast, WorkSizeConfig::new(64, 2048));
        assert_eq!(
            config.dispatch.overlap_score.local_size,
            OVERLAP_SCORE_LOCAL_SIZE
        );
        assert_eq!(config.gpu.backends, "all");
        assert!(config.kernels.root.is_none());
    }

    #[test]
    fn test_inhibition_section() {
        let config: HebbConfig = toml::from_str(
            r#"
            [dispatch.global_inhibition]
            max_score = 512

            [dispatch.global_inhibition.threshold]
            local_size = 64
            max_global_size = 2048
            "#,
        )
        .unwrap();

        let inhibition = config.dispatch.global_inhibition;
        assert_eq!(inhibition.max_score, 512);
        assert_eq!(inhibition.top_k_width, GLOBAL_INHIBITION_TOP_K_WIDTH);
        assert_eq!(inhibition.threshold.local_size, 64);
    }

    #[test]
    fn test_half_specified_work_size_is_rejected() {
        let result: Result<HebbConfig, _> = toml::from_str(
            r#"
            [dispatch.sort_synapse]
            local_size = 64
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_roundtrip_through_json() {
        let config = HebbConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: HebbConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dispatch, config.dispatch);
    }
}
