// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Element type casting

use hebb_types::DType;
use tracing::debug;

use super::{as_u32, dtype_const, programs};
use crate::backend::GpuBackend;
use crate::build_flags::BuildFlags;
use crate::error::Result;
use crate::loader;
use crate::tensor::Tensor;
use crate::work_size::select_for;

const ENTRY_POINT: &str = "cast_elements";

impl GpuBackend {
    /// Convert `x` element-wise into a new tensor of `dtype`
    ///
    /// float → int32 truncates toward zero (saturating, NaN → 0), int32 → float rounds to
    /// nearest, anything → bool is a nonzero test and bool → numeric gives 0 or 1. Casting to
    /// the same dtype is a device-side copy.
    pub fn cast(&self, x: &Tensor, dtype: DType) -> Result<Tensor> {
        self.check_owner("x", x)?;
        if x.dtype() == dtype {
            return self.copy_device_to_device(x);
        }

        let input_size = as_u32("input size", x.volume())?;
        let y = self.zeros(x.shape().clone(), dtype)?;
        if input_size == 0 {
            return Ok(y);
        }

        let config = self.dispatch_config().cast;
        let flags = BuildFlags::new()
            .define("INPUT_SIZE", input_size)
            .define("IN_DTYPE", dtype_const(x.dtype()))
            .define("OUT_DTYPE", dtype_const(dtype))
            .define("LOCAL_SIZE", config.local_size)
            .to_string();
        let (program, pipeline) = self.kernel(
            programs::CAST,
            &flags,
            loader::CAST,
            &[ENTRY_POINT],
            ENTRY_POINT,
        )?;

        let words = match dtype {
            DType::Bool => x.volume().div_ceil(4),
            DType::Int32 | DType::Float32 => x.volume(),
        };
        let work = select_for(&config, words);
        debug!(
            "cast {} -> {}: {} elements, global {} local {}",
            x.dtype(),
            dtype,
            input_size,
            work.global,
            work.local
        );
        self.run_pass(
            &program,
            &pipeline,
            &[(0, x.buffer()), (1, y.buffer())],
            work.workgroups(),
        )?;
        Ok(y)
    }
}
