// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Correlation-based permanence learning

use hebb_types::{DType, Shape};
use tracing::debug;

use super::{as_u32, check_shape, programs};
use crate::backend::GpuBackend;
use crate::build_flags::BuildFlags;
use crate::error::{ComputeError, Result};
use crate::loader;
use crate::tensor::Tensor;
use crate::work_size::select_for;

const ENTRY_POINT: &str = "learn_correlation";

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LearnParams {
    increment: f32,
    decrement: f32,
    cells: u32,
    _pad: u32,
}

impl GpuBackend {
    /// Update `permanences` in place from input/learning coincidence
    ///
    /// For each synapse of cell `c` with presynaptic index `i`: `+increment` when both
    /// `x[i]` and `learn[c]` are set, `-decrement` otherwise, clamped to `[0, 1]`.
    /// Every synapse slot is assumed to be in use.
    pub fn learn_correlation(
        &self,
        x: &Tensor,
        learn: &Tensor,
        connections: &Tensor,
        permanences: &Tensor,
        increment: f32,
        decrement: f32,
    ) -> Result<()> {
        self.check_operand("x", x, DType::Bool)?;
        self.check_operand("learn", learn, DType::Bool)?;
        self.check_operand("connections", connections, DType::Int32)?;
        self.check_operand("permanences", permanences, DType::Float32)?;
        check_shape("learn", learn, x.shape())?;
        check_shape("permanences", permanences, connections.shape())?;

        let cells = connections.shape().rows();
        if cells != learn.volume() {
            return Err(ComputeError::ShapeMismatch {
                operand: "connections",
                expected: Shape::new([learn.volume(), connections.shape().last()]),
                actual: connections.shape().clone(),
            });
        }
        if connections.volume() == 0 {
            return Ok(());
        }

        as_u32("synapse count", connections.volume())?;
        let config = self.dispatch_config().learn_correlation;
        let synapses = as_u32("synapses per cell", connections.shape().last())?;
        let flags = BuildFlags::new()
            .define("INPUT_SIZE", as_u32("input size", x.volume())?)
            .define("MAX_SYNAPSE_PER_CELL", synapses)
            .flag("NO_UNUSED_SYNAPSE")
            .define("LOCAL_SIZE", config.local_size)
            .to_string();
        let (program, pipeline) = self.kernel(
            programs::LEARN_CORRELATION,
            &flags,
            loader::LEARN_CORRELATION,
            &[ENTRY_POINT],
            ENTRY_POINT,
        )?;

        let params = self.uniform(
            "learn params",
            &LearnParams {
                increment,
                decrement,
                cells: as_u32("cells", cells)?,
                _pad: 0,
            },
        );
        let work = select_for(&config, connections.volume());
        debug!(
            "learn_correlation: {} cells x {} synapses, global {} local {}",
            cells, synapses, work.global, work.local
        );
        self.run_pass(
            &program,
            &pipeline,
            &[
                (0, x.buffer()),
                (1, learn.buffer()),
                (2, connections.buffer()),
                (3, permanences.buffer()),
                (4, &params),
            ],
            work.workgroups(),
        )
    }
}
