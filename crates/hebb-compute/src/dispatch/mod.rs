// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Compute Dispatch Layer
//!
//! One module per algorithm. Every entry point follows the same sequence: validate
//! operands, derive build flags from input shapes, fetch or compile the specialised
//! kernel, bind buffers in a fixed order, select the work size and submit.
//!
//! All dispatches are asynchronous; results are visible after a blocking read or `sync`.

mod cast;
mod inhibition;
mod learning;
mod overlap;
mod sort;

pub use inhibition::active_count;

use hebb_types::{DType, Shape};

use crate::backend::GpuBackend;
use crate::error::{ComputeError, Result};
use crate::tensor::Tensor;

/// Program name prefixes, one per algorithm
pub mod programs {
    pub const OVERLAP_SCORE: &str = "overlapScore";
    pub const GLOBAL_INHIBITION: &str = "globalInhibition";
    pub const LEARN_CORRELATION: &str = "learnCorrelation";
    pub const SORT_SYNAPSE: &str = "sortSynapse";
    pub const CAST: &str = "cast";
}

/// WGSL constant naming a dtype, declared in `common.wgsl`
pub(crate) fn dtype_const(dtype: DType) -> &'static str {
    match dtype {
        DType::Bool => "DTYPE_BOOL",
        DType::Int32 => "DTYPE_INT32",
        DType::Float32 => "DTYPE_FLOAT32",
    }
}

impl GpuBackend {
    /// Backend tag and dtype check for one operand
    pub(crate) fn check_operand(&self, operand: &'static str, tensor: &Tensor, dtype: DType) -> Result<()> {
        self.check_owner(operand, tensor)?;
        if tensor.dtype() != dtype {
            return Err(ComputeError::DTypeMismatch {
                operand,
                expected: dtype,
                actual: tensor.dtype(),
            });
        }
        Ok(())
    }
}

pub(crate) fn check_shape(operand: &'static str, tensor: &Tensor, expected: &Shape) -> Result<()> {
    if tensor.shape() != expected {
        return Err(ComputeError::ShapeMismatch {
            operand,
            expected: expected.clone(),
            actual: tensor.shape().clone(),
        });
    }
    Ok(())
}

pub(crate) fn as_u32(what: &str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        ComputeError::Precondition(format!("{} = {} exceeds the 32-bit kernel index range", what, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_consts() {
        assert_eq!(dtype_const(DType::Bool), "DTYPE_BOOL");
        assert_eq!(dtype_const(DType::Float32), "DTYPE_FLOAT32");
    }

    #[test]
    fn test_as_u32() {
        assert_eq!(as_u32("n", 7).unwrap(), 7);
        assert!(as_u32("n", usize::MAX).is_err());
    }
}
