// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # hebb-types
//!
//! Element types and tensor shapes shared between the configuration layer and the
//! GPU compute backend.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod dtype;
pub mod shape;

pub use dtype::{DType, ParseDTypeError};
pub use shape::Shape;
