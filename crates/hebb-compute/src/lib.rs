// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Hebb Compute
//!
//! GPU execution backend for hebb's learning algorithms, built on wgpu.
//!
//! ## Components
//! - **Device context**: one adapter, one device, one in-order queue
//! - **Tensors**: reference-counted device buffers tagged with their owning backend
//! - **Kernel cache**: WGSL programs compiled once per build-flag combination
//! - **Dispatch**: overlap scoring, global inhibition, correlation learning, synapse
//!   sorting and element casting
//!
//! ## Example
//! ```no_run
//! use hebb_compute::{DType, GpuBackend};
//!
//! let backend = GpuBackend::with_defaults()?;
//! let x = backend.from_slice([4], &[true, false, true, true])?;
//! let y = backend.cast(&x, DType::Int32)?;
//! let values: Vec<i32> = backend.to_vec(&y)?;
//! assert_eq!(values, vec![1, 0, 1, 1]);
//! # Ok::<(), hebb_compute::ComputeError>(())
//! ```

pub mod backend;
pub mod build_flags;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod kernel_cache;
pub mod loader;
pub mod tensor;
pub mod work_size;

pub use backend::{AllocationSnapshot, GpuBackend, PROBE_PROGRAM};
pub use build_flags::{program_name, BuildFlags};
pub use context::{enumerate_devices, DeviceContext, DeviceFault};
pub use error::{ComputeError, Result};
pub use hebb_types::{DType, Shape};
pub use kernel_cache::{CompiledProgram, KernelCache, ProgramBuilder, WgpuProgramBuilder};
pub use loader::{DirectoryKernels, EmbeddedKernels, KernelLoader};
pub use tensor::{BackendId, Element, Tensor};
pub use work_size::{select_work_size, WorkSize};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
