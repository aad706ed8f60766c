// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # hebb-observability
//!
//! Logging setup shared by everything that embeds the hebb backend.
//!
//! The backend crates only emit `tracing` events; installing a subscriber is the
//! embedding application's call, made through [`init_logging`].
//!
//! ## Features
//! - `file-logging`: daily-rotated JSON log files next to console output

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Tracing targets of the hebb crates, usable with `--debug-<crate>`
pub const KNOWN_CRATES: &[&str] = &["hebb_compute", "hebb_config", "hebb_observability"];
