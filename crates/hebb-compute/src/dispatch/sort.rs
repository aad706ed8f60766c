// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synapse row sorting

use hebb_types::DType;
use tracing::debug;

use super::{as_u32, check_shape, programs};
use crate::backend::GpuBackend;
use crate::build_flags::BuildFlags;
use crate::error::Result;
use crate::loader;
use crate::tensor::Tensor;
use crate::work_size::select_for;

const ENTRY_POINT: &str = "sort_synapse";

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SortParams {
    rows: u32,
    _pad: [u32; 3],
}

impl GpuBackend {
    /// Sort every synapse row by connection index, in place
    ///
    /// Permanences move with their connection index. Negative (unused) indices end up at
    /// the end of the row in their original order.
    pub fn sort_synapse(&self, connections: &Tensor, permanences: &Tensor) -> Result<()> {
        self.check_operand("connections", connections, DType::Int32)?;
        self.check_operand("permanences", permanences, DType::Float32)?;
        check_shape("permanences", permanences, connections.shape())?;

        let rows = connections.shape().rows();
        if rows == 0 {
            return Ok(());
        }
        as_u32("synapse count", connections.volume())?;

        let config = self.dispatch_config().sort_synapse;
        let flags = BuildFlags::new()
            .define("MAX_SYNAPSE_PER_CELL", as_u32("synapses per cell", connections.shape().last())?)
            .define("LOCAL_SIZE", config.local_size)
            .to_string();
        let (program, pipeline) = self.kernel(
            programs::SORT_SYNAPSE,
            &flags,
            loader::SORT_SYNAPSE,
            &[ENTRY_POINT],
            ENTRY_POINT,
        )?;

        let aux_connections = self.zeros(connections.shape().clone(), DType::Int32)?;
        let aux_permanences = self.zeros(permanences.shape().clone(), DType::Float32)?;
        let params = self.uniform(
            "sort params",
            &SortParams {
                rows: as_u32("rows", rows)?,
                _pad: [0; 3],
            },
        );
        let work = select_for(&config, rows);
        debug!(
            "sort_synapse: {} rows, global {} local {}",
            rows, work.global, work.local
        );
        self.run_pass(
            &program,
            &pipeline,
            &[
                (0, connections.buffer()),
                (1, permanences.buffer()),
                (2, aux_connections.buffer()),
                (3, aux_permanences.buffer()),
                (4, &params),
            ],
            work.workgroups(),
        )
    }
}
