// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Overlap scoring

use hebb_types::{DType, Shape};
use tracing::debug;

use super::{as_u32, check_shape, programs};
use crate::backend::GpuBackend;
use crate::build_flags::BuildFlags;
use crate::error::{ComputeError, Result};
use crate::loader;
use crate::tensor::Tensor;
use crate::work_size::select_work_size;

const ENTRY_POINT: &str = "overlap_score";

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct OverlapParams {
    connected_permanence: f32,
    activation_threshold: u32,
    cells: u32,
    _pad: u32,
}

impl GpuBackend {
    /// Count connected, active synapses per cell into `y`
    ///
    /// # Arguments
    /// * `x` - Bool input bits
    /// * `connections` - Int32 `[cells, synapses]` presynaptic indices
    /// * `permanences` - Float32, same shape as `connections`
    /// * `connected_permanence` - a synapse is connected at or above this permanence
    /// * `activation_threshold` - overlaps below this are written as 0
    /// * `y` - Int32 output with one element per cell
    /// * `has_unconnected_synapses` - rows may end early with a negative index
    #[allow(clippy::too_many_arguments)]
    pub fn overlap_score(
        &self,
        x: &Tensor,
        connections: &Tensor,
        permanences: &Tensor,
        connected_permanence: f32,
        activation_threshold: u32,
        y: &Tensor,
        has_unconnected_synapses: bool,
    ) -> Result<()> {
        self.check_operand("x", x, DType::Bool)?;
        self.check_operand("connections", connections, DType::Int32)?;
        self.check_operand("permanences", permanences, DType::Float32)?;
        self.check_operand("y", y, DType::Int32)?;
        check_shape("permanences", permanences, connections.shape())?;

        let cells = connections.shape().rows();
        if y.volume() != cells {
            return Err(ComputeError::ShapeMismatch {
                operand: "y",
                expected: Shape::new([cells]),
                actual: y.shape().clone(),
            });
        }
        if cells == 0 {
            return Ok(());
        }

        as_u32("synapse count", connections.volume())?;
        let input_size = as_u32("input size", x.volume())?;
        let synapses = as_u32("synapses per cell", connections.shape().last())?;
        let config = self.dispatch_config().overlap_score;
        let flags = BuildFlags::new()
            .define("INPUT_SIZE", input_size)
            .define("MAX_SYNAPSE_PER_CELL", synapses)
            .define("NO_UNUSED_SYNAPSE", !has_unconnected_synapses)
            .define("LOCAL_SIZE", config.local_size)
            .to_string();
        let (program, pipeline) = self.kernel(
            programs::OVERLAP_SCORE,
            &flags,
            loader::OVERLAP_SCORE,
            &[ENTRY_POINT],
            ENTRY_POINT,
        )?;

        let params = self.uniform(
            "overlap params",
            &OverlapParams {
                connected_permanence,
                activation_threshold,
                cells: as_u32("cells", cells)?,
                _pad: 0,
            },
        );
        let work = select_work_size(config.max_global_size, config.local_size, x.volume());
        debug!(
            "overlap_score: {} cells x {} synapses, global {} local {}",
            cells, synapses, work.global, work.local
        );
        self.run_pass(
            &program,
            &pipeline,
            &[
                (0, x.buffer()),
                (1, connections.buffer()),
                (2, permanences.buffer()),
                (3, y.buffer()),
                (4, &params),
            ],
            work.workgroups(),
        )
    }
}
