// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Global/local work size selection

use hebb_config::WorkSizeConfig;

/// Work size of one dispatch, in invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkSize {
    pub global: u32,
    pub local: u32,
}

impl WorkSize {
    /// Number of workgroups to dispatch along x
    pub fn workgroups(&self) -> u32 {
        self.global / self.local
    }
}

/// Round `items` up to a multiple of `local`, capped at `max_global`
///
/// The ceiling is rounded down to a multiple of `local` (never below one workgroup), so
/// the result always divides evenly. Kernels walk the remainder with a grid-stride loop.
pub fn select_work_size(max_global: u32, local: u32, items: usize) -> WorkSize {
    let local = local.max(1);
    let ceiling = ((max_global / local) * local).max(local);
    let items = u64::try_from(items).unwrap_or(u64::MAX).max(1);
    let rounded = items.div_ceil(u64::from(local)) * u64::from(local);
    let global = u32::try_from(rounded.min(u64::from(ceiling))).unwrap_or(ceiling);
    WorkSize { global, local }
}

/// [`select_work_size`] using a configured per-algorithm pair
pub fn select_for(config: &WorkSizeConfig, items: usize) -> WorkSize {
    select_work_size(config.max_global_size, config.local_size, items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_up_to_local() {
        let ws = select_work_size(8192, 64, 100);
        assert_eq!(ws.global, 128);
        assert_eq!(ws.workgroups(), 2);
    }

    #[test]
    fn test_caps_at_ceiling() {
        let ws = select_work_size(1024, 32, 10_000);
        assert_eq!(ws.global, 1024);
        assert_eq!(ws.workgroups(), 32);
    }

    #[test]
    fn test_ceiling_rounded_down_to_local() {
        // 8152 is not a multiple of 64
        let ws = select_work_size(8152, 64, 1_000_000);
        assert_eq!(ws.global, 8128);
        assert_eq!(ws.global % 64, 0);
    }

    #[test]
    fn test_overlap_default_ceiling() {
        let config = hebb_config::DispatchConfig::default();
        let ws = select_for(&config.overlap_score, 1_000_000);
        assert_eq!(ws.global, 8128);
        assert_eq!(ws.workgroups(), 127);
    }

    #[test]
    fn test_empty_input_still_one_workgroup() {
        let ws = select_work_size(4096, 128, 0);
        assert_eq!(ws.global, 128);
        assert_eq!(ws.workgroups(), 1);
    }

    #[test]
    fn test_ceiling_below_local() {
        let ws = select_work_size(16, 64, 1000);
        assert_eq!(ws.global, 64);
    }

    #[test]
    fn test_select_for_config() {
        let ws = select_for(&WorkSizeConfig::new(32, 1024), 33);
        assert_eq!(ws, WorkSize { global: 64, local: 32 });
    }
}
