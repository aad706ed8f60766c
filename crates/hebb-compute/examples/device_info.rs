// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Print every visible GPU adapter and the diagnostic report of the selected one.
//!
//! Run with: cargo run -p hebb-compute --example device_info [-- path/to/hebb_configuration.toml]
//!
//! Without a path the configuration is searched for as usual; when none is found the
//! built-in defaults are used.

use std::path::PathBuf;

use anyhow::Context;
use hebb_compute::{enumerate_devices, GpuBackend};
use hebb_config::{load_config, HebbConfig};
use hebb_observability::{init_logging, parse_debug_flags};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .skip(1)
        .find(|arg| !arg.starts_with("--"))
        .map(PathBuf::from);
    let config = match load_config(config_path.as_deref(), None) {
        Ok(config) => config,
        Err(e) if config_path.is_none() => {
            eprintln!("No configuration loaded ({}), using defaults", e);
            HebbConfig::default()
        }
        Err(e) => return Err(e).context("failed to load configuration"),
    };

    let _guard = init_logging(&config.logging, &parse_debug_flags())?;

    let adapters = enumerate_devices(&config.gpu)?;
    println!("Adapters for backends '{}':", config.gpu.backends);
    for (index, info) in adapters.iter().enumerate() {
        let marker = if index == config.gpu.adapter_index { "*" } else { " " };
        println!(
            "{} [{}] {} ({:?}, {:?})",
            marker, index, info.name, info.backend, info.device_type
        );
    }
    if adapters.is_empty() {
        println!("  none");
        return Ok(());
    }

    let backend = GpuBackend::new(&config).context("failed to initialise GPU backend")?;
    println!();
    println!("{}", backend.device_info());
    Ok(())
}
