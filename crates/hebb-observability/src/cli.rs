// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-hebb-compute` to raise one crate to debug level.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

/// Per-crate debug switches
///
/// # Example
/// ```rust
/// use hebb_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-hebb-compute".to_string()]);
/// assert!(flags.is_enabled("hebb_compute"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    enabled_crates: BTreeSet<String>,
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching `--debug-{crate-name}`; `--debug-all` enables every
    /// known crate. Hyphens and underscores in crate names are interchangeable.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();

        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
            } else if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enable(crate_name);
            }
        }

        flags
    }

    pub fn enable(&mut self, crate_name: &str) {
        self.enabled_crates.insert(normalize(crate_name));
    }

    pub fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enable(crate_name);
        }
    }

    /// Check if debug is enabled for a specific crate
    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains(&normalize(crate_name))
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// Build an `EnvFilter` directive string on top of a base level.
    ///
    /// Format: `"info,hebb_compute=debug"`.
    pub fn to_filter_string(&self, base_level: &str) -> String {
        let mut directives = vec![base_level.to_ascii_lowercase()];
        directives.extend(
            self.enabled_crates
                .iter()
                .map(|crate_name| format!("{}=debug", crate_name)),
        );
        directives.join(",")
    }
}

fn normalize(crate_name: &str) -> String {
    crate_name.trim().replace('-', "_")
}

/// Parse debug flags from the process arguments and the `HEBB_DEBUG` environment variable.
///
/// `HEBB_DEBUG` holds comma-separated crate names, or `all`.
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());

    if let Ok(env_var) = env::var("HEBB_DEBUG") {
        if env_var == "all" {
            flags.enable_all();
        } else {
            for crate_name in env_var.split(',').filter(|c| !c.trim().is_empty()) {
                flags.enable(crate_name);
            }
        }
    }

    flags
}

/// Generate help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  HEBB_DEBUG={{crate-name}}[,{{crate-name}}]  Enable debug for crates (comma-separated)
  HEBB_DEBUG=all                              Enable debug for all crates
"#,
        KNOWN_CRATES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-hebb-compute".to_string()]);
        assert!(flags.is_enabled("hebb_compute"));
        assert!(flags.is_enabled("hebb-compute"));
        assert!(!flags.is_enabled("hebb_config"));
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_unrelated_args_ignored() {
        let flags = CrateDebugFlags::from_args(vec!["--verbose".to_string(), "run".to_string()]);
        assert!(!flags.any_enabled());
        assert_eq!(flags.to_filter_string("INFO"), "info");
    }

    #[test]
    fn test_filter_string() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-hebb-compute".to_string()]);
        assert_eq!(flags.to_filter_string("warn"), "warn,hebb_compute=debug");
    }
}
