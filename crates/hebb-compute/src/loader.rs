// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Kernel source loading
//!
//! Dispatch code asks for kernel files by name (`overlap_score.wgsl`, ...). The default
//! set is compiled into the binary; a configured kernel root replaces it with files read
//! from disk, which is how kernels are iterated on without rebuilding.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hebb_config::KernelsConfig;
use tracing::debug;

use crate::error::{ComputeError, Result};

pub const COMMON: &str = "common.wgsl";
pub const PROBE: &str = "probe.wgsl";
pub const OVERLAP_SCORE: &str = "overlap_score.wgsl";
pub const GLOBAL_INHIBITION: &str = "global_inhibition.wgsl";
pub const LEARN_CORRELATION: &str = "learn_correlation.wgsl";
pub const SORT_SYNAPSE: &str = "sort_synapse.wgsl";
pub const CAST: &str = "cast.wgsl";

/// Supplies kernel source text by file name
pub trait KernelLoader: Send + Sync + fmt::Debug {
    fn load(&self, name: &str) -> Result<String>;

    /// Short description for diagnostics
    fn describe(&self) -> String;
}

/// The WGSL kernel set shipped with the crate
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedKernels;

impl EmbeddedKernels {
    fn source(name: &str) -> Option<&'static str> {
        Some(match name {
            COMMON => include_str!("../kernels/common.wgsl"),
            PROBE => include_str!("../kernels/probe.wgsl"),
            OVERLAP_SCORE => include_str!("../kernels/overlap_score.wgsl"),
            GLOBAL_INHIBITION => include_str!("../kernels/global_inhibition.wgsl"),
            LEARN_CORRELATION => include_str!("../kernels/learn_correlation.wgsl"),
            SORT_SYNAPSE => include_str!("../kernels/sort_synapse.wgsl"),
            CAST => include_str!("../kernels/cast.wgsl"),
            _ => return None,
        })
    }
}

impl KernelLoader for EmbeddedKernels {
    fn load(&self, name: &str) -> Result<String> {
        Self::source(name)
            .map(str::to_string)
            .ok_or_else(|| ComputeError::Io {
                path: PathBuf::from(name),
                source: io::Error::new(io::ErrorKind::NotFound, "no embedded kernel with this name"),
            })
    }

    fn describe(&self) -> String {
        "embedded".to_string()
    }
}

/// Kernel files under a root directory
#[derive(Debug, Clone)]
pub struct DirectoryKernels {
    root: PathBuf,
}

impl DirectoryKernels {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl KernelLoader for DirectoryKernels {
    fn load(&self, name: &str) -> Result<String> {
        read_source(&self.root.join(name))
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}

/// Read a kernel source file fully, naming the path on failure
pub fn read_source(path: &Path) -> Result<String> {
    debug!("Reading kernel source {}", path.display());
    std::fs::read_to_string(path).map_err(|source| ComputeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Loader selected by `[kernels]`: a directory when `root` is set, the embedded set otherwise
pub fn loader_from_config(config: &KernelsConfig) -> Arc<dyn KernelLoader> {
    match &config.root {
        Some(root) => Arc::new(DirectoryKernels::new(root)),
        None => Arc::new(EmbeddedKernels),
    }
}
