// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for GPU integration tests: backend acquisition and host reference
//! models of every kernel.

#![allow(dead_code)]

use hebb_compute::GpuBackend;

/// Backend on the first adapter, or `None` when the machine has no usable GPU
pub fn gpu_backend() -> Option<GpuBackend> {
    match GpuBackend::with_defaults() {
        Ok(backend) => Some(backend),
        Err(e) => {
            eprintln!("⚠️  Skipping GPU test: {}", e);
            None
        }
    }
}

/// Overlap per cell, zeroed below `activation_threshold`
pub fn overlap_reference(
    x: &[bool],
    connections: &[i32],
    permanences: &[f32],
    synapses_per_cell: usize,
    connected_permanence: f32,
    activation_threshold: u32,
    has_unconnected_synapses: bool,
) -> Vec<i32> {
    connections
        .chunks(synapses_per_cell)
        .zip(permanences.chunks(synapses_per_cell))
        .map(|(row, perms)| {
            let mut hits = 0u32;
            for (&source, &permanence) in row.iter().zip(perms) {
                if source < 0 {
                    if has_unconnected_synapses {
                        break;
                    }
                    continue;
                }
                let source = source as usize;
                if source < x.len() && x[source] && permanence >= connected_permanence {
                    hits += 1;
                }
            }
            if hits >= activation_threshold {
                hits as i32
            } else {
                0
            }
        })
        .collect()
}

/// Permanences after one learning step
pub fn learn_reference(
    x: &[bool],
    learn: &[bool],
    connections: &[i32],
    permanences: &[f32],
    synapses_per_cell: usize,
    increment: f32,
    decrement: f32,
) -> Vec<f32> {
    connections
        .iter()
        .zip(permanences)
        .enumerate()
        .map(|(s, (&source, &permanence))| {
            let cell = s / synapses_per_cell;
            let firing = source >= 0 && (source as usize) < x.len() && x[source as usize];
            let updated = if firing && learn[cell] {
                permanence + increment
            } else {
                permanence - decrement
            };
            updated.clamp(0.0, 1.0)
        })
        .collect()
}

/// Stable per-row co-sort, negative indices last
pub fn sort_reference(connections: &[i32], permanences: &[f32], synapses_per_cell: usize) -> (Vec<i32>, Vec<f32>) {
    let mut sorted_connections = Vec::with_capacity(connections.len());
    let mut sorted_permanences = Vec::with_capacity(permanences.len());
    for (row, perms) in connections
        .chunks(synapses_per_cell)
        .zip(permanences.chunks(synapses_per_cell))
    {
        let mut pairs: Vec<(i32, f32)> = row.iter().copied().zip(perms.iter().copied()).collect();
        pairs.sort_by_key(|&(c, _)| if c < 0 { u32::MAX } else { c as u32 });
        for (c, p) in pairs {
            sorted_connections.push(c);
            sorted_permanences.push(p);
        }
    }
    (sorted_connections, sorted_permanences)
}

/// Threshold chosen by the histogram top-k over scores clamped to `[0, max_score]`
pub fn inhibition_threshold(scores: &[i32], k: usize, max_score: u32) -> u32 {
    if k == 0 {
        return max_score + 1;
    }
    let mut histogram = vec![0usize; max_score as usize + 1];
    for &score in scores {
        histogram[score.clamp(0, max_score as i32) as usize] += 1;
    }
    let mut cumulative = 0;
    for bin in (0..histogram.len()).rev() {
        cumulative += histogram[bin];
        if cumulative >= k {
            return bin as u32;
        }
    }
    0
}
