// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Global inhibition
//!
//! Approximate top-k by histogram: the threshold pass picks the highest score whose
//! cumulative count reaches `k = floor(N × fraction)`, and the marking pass activates
//! everything at or above it. Ties at the threshold are all activated, so the active
//! count may exceed `k`; no inactive element ever outscores an active one.

use hebb_types::DType;
use tracing::debug;

use super::{as_u32, check_shape, programs};
use crate::backend::GpuBackend;
use crate::build_flags::BuildFlags;
use crate::error::{ComputeError, Result};
use crate::loader;
use crate::tensor::Tensor;
use crate::work_size::select_for;

const TOP_K_ENTRY_POINT: &str = "top_k_threshold";
const THRESHOLD_ENTRY_POINT: &str = "apply_threshold";

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct InhibitionParams {
    k: u32,
    _pad: [u32; 3],
}

/// Requested number of winners: `floor(n × fraction)`
pub fn active_count(n: usize, fraction: f32) -> usize {
    ((n as f32) * fraction).floor() as usize
}

impl GpuBackend {
    /// Mark the top `fraction` of `x` by score in `y`
    ///
    /// # Arguments
    /// * `x` - Int32 scores
    /// * `y` - Bool output, same shape as `x`
    /// * `fraction` - share of elements to activate, in `[0, 1]`
    pub fn global_inhibition(&self, x: &Tensor, y: &Tensor, fraction: f32) -> Result<()> {
        self.check_operand("x", x, DType::Int32)?;
        self.check_operand("y", y, DType::Bool)?;
        check_shape("y", y, x.shape())?;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ComputeError::Precondition(format!(
                "inhibition fraction {} is outside [0, 1]",
                fraction
            )));
        }
        let n = x.volume();
        if n == 0 {
            return Ok(());
        }

        let config = self.dispatch_config().global_inhibition;
        let flags = BuildFlags::new()
            .define("INPUT_SIZE", as_u32("input size", n)?)
            .define("MAX_INPUT_VALUE", config.max_score)
            .define("HISTOGRAM_BINS", config.max_score + 1)
            .define("TOP_K_WIDTH", config.top_k_width)
            .define("LOCAL_SIZE", config.threshold.local_size)
            .to_string();
        let entry_points = [TOP_K_ENTRY_POINT, THRESHOLD_ENTRY_POINT];
        let (program, top_k) = self.kernel(
            programs::GLOBAL_INHIBITION,
            &flags,
            loader::GLOBAL_INHIBITION,
            &entry_points,
            TOP_K_ENTRY_POINT,
        )?;
        let (_, apply) = self.kernel(
            programs::GLOBAL_INHIBITION,
            &flags,
            loader::GLOBAL_INHIBITION,
            &entry_points,
            THRESHOLD_ENTRY_POINT,
        )?;

        let k = active_count(n, fraction);
        let threshold = self.zeros([1], DType::Int32)?;
        let params = self.uniform(
            "inhibition params",
            &InhibitionParams {
                k: as_u32("k", k)?,
                _pad: [0; 3],
            },
        );

        // Queue order carries the threshold from the first pass to the second
        self.run_pass(
            &program,
            &top_k,
            &[(0, x.buffer()), (1, threshold.buffer()), (2, &params)],
            1,
        )?;

        let work = select_for(&config.threshold, n.div_ceil(4));
        debug!(
            "global_inhibition: n {} k {}, global {} local {}",
            n, k, work.global, work.local
        );
        self.run_pass(
            &program,
            &apply,
            &[(0, x.buffer()), (1, threshold.buffer()), (3, y.buffer())],
            work.workgroups(),
        )
    }
}
