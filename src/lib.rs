// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # hebb - GPU building blocks for HTM learning
//!
//! Spatial pooling on the GPU: overlap scoring, global inhibition, correlation learning
//! and synapse maintenance, plus the device memory and kernel cache they run on.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! hebb = "0.1"
//! ```
//!
//! ```rust,no_run
//! use hebb::prelude::*;
//!
//! let config = HebbConfig::default();
//! let _logging = hebb::observability::init_logging_default()?;
//! let backend = GpuBackend::new(&config)?;
//!
//! // One step of a 1024-cell layer over a 1024-bit input, 16 synapses per cell
//! let x = backend.zeros([1024], DType::Bool)?;
//! let connections = backend.zeros([1024, 16], DType::Int32)?;
//! let permanences = backend.zeros([1024, 16], DType::Float32)?;
//! let overlaps = backend.zeros([1024], DType::Int32)?;
//! let active = backend.zeros([1024], DType::Bool)?;
//!
//! backend.overlap_score(&x, &connections, &permanences, 0.5, 2, &overlaps, false)?;
//! backend.global_inhibition(&overlaps, &active, 0.02)?;
//! backend.learn_correlation(&x, &active, &connections, &permanences, 0.05, 0.008)?;
//! let winners: Vec<bool> = backend.to_vec(&active)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! - **`file-logging`**: daily-rotated JSON log files next to console output
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: hebb-types, hebb-config                    │
//! │  (DType, Shape, HebbConfig)                             │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Compute: hebb-compute                                  │
//! │  (DeviceContext, Tensor, KernelCache, dispatch)         │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Infrastructure: hebb-observability                     │
//! │  (tracing subscriber, per-crate debug flags)            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub use hebb_compute as compute;
pub use hebb_config as config;
pub use hebb_observability as observability;
pub use hebb_types as types;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::compute::{ComputeError, Element, GpuBackend, Tensor};
    pub use crate::config::HebbConfig;
    pub use crate::types::{DType, Shape};
}
