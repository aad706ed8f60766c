// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for GPU compute operations

use std::path::PathBuf;

use hebb_types::{DType, Shape};

use crate::tensor::BackendId;

/// Errors raised by the compute backend
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// No usable adapter, or the adapter cannot run compute kernels
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("{operand}: expected dtype {expected}, got {actual}")]
    DTypeMismatch {
        operand: &'static str,
        expected: DType,
        actual: DType,
    },

    #[error("{operand}: expected shape {expected}, got {actual}")]
    ShapeMismatch {
        operand: &'static str,
        expected: Shape,
        actual: Shape,
    },

    #[error("{operand}: tensor belongs to backend {actual}, not {expected}")]
    BackendMismatch {
        operand: &'static str,
        expected: BackendId,
        actual: BackendId,
    },

    /// Kernel build failure with the device error kind and the full build log
    #[error("Failed to compile program '{program}' ({code}):\n{log}")]
    Compile {
        program: String,
        code: String,
        log: String,
    },

    #[error("Entry point '{entry_point}' not found in program '{program}'")]
    EntryPointNotFound { program: String, entry_point: String },

    #[error("Kernel '{entry_point}' of program '{program}' has not been compiled")]
    KernelNotCompiled { program: String, entry_point: String },

    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("Dispatch of '{kernel}' failed ({code}): {message}")]
    Dispatch {
        kernel: String,
        code: String,
        message: String,
    },

    #[error("Device read failed: {0}")]
    Readback(String),

    #[error("Device wait failed: {0}")]
    Wait(String),

    #[error("Failed to read kernel source {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ComputeError {
    /// True for caller errors detected before any device work was issued
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ComputeError::Precondition(_)
                | ComputeError::DTypeMismatch { .. }
                | ComputeError::ShapeMismatch { .. }
                | ComputeError::BackendMismatch { .. }
                | ComputeError::KernelNotCompiled { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ComputeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_carries_log() {
        let err = ComputeError::Compile {
            program: "overlapScore1f".to_string(),
            code: "validation".to_string(),
            log: "error: unknown identifier `foo`".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("overlapScore1f"));
        assert!(rendered.contains("validation"));
        assert!(rendered.contains("unknown identifier"));
    }

    #[test]
    fn test_precondition_classification() {
        let mismatch = ComputeError::DTypeMismatch {
            operand: "x",
            expected: DType::Bool,
            actual: DType::Float32,
        };
        assert!(mismatch.is_precondition());
        assert!(!ComputeError::Wait("lost".to_string()).is_precondition());
    }
}
