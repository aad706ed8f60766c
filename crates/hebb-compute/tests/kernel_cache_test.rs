// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Kernel Cache Tests (device compiler)
//!
//! Memoisation, forced rebuilds, build logs and entry point resolution against the real
//! WGSL compiler. Tests return early when no GPU adapter is available.

mod common;

use std::sync::Arc;

use common::gpu_backend;
use hebb_compute::{program_name, ComputeError, DType, PROBE_PROGRAM};

const DOUBLE: &str = "
@group(0) @binding(0) var<storage, read_write> data: array<u32>;

@compute @workgroup_size(LOCAL_SIZE)
fn double(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x < arrayLength(&data)) {
        data[gid.x] = data[gid.x] * FACTOR;
    }
}
";

const BROKEN: &str = "
@compute @workgroup_size(1)
fn double() {
    let a: u32 = undefined_symbol;
}
";

#[test]
fn test_probe_program_is_cached_at_startup() {
    let Some(backend) = gpu_backend() else { return };
    let cache = backend.kernel_cache();
    assert!(cache.contains(PROBE_PROGRAM));
    assert!(cache.lookup(PROBE_PROGRAM, "probe").is_ok());
}

#[test]
fn test_same_name_compiles_once() {
    let Some(backend) = gpu_backend() else { return };
    let mut cache = backend.kernel_cache();
    let flags = "-DLOCAL_SIZE=64 -DFACTOR=2";
    let name = program_name("double", flags);

    cache.compile(&[DOUBLE], &name, &["double"], false, flags).unwrap();
    let builds = cache.build_count();
    // A hit never looks at the source, so broken source is accepted
    cache.compile(&[BROKEN], &name, &["double"], false, flags).unwrap();
    assert_eq!(cache.build_count(), builds);
}

#[test]
fn test_build_failure_reports_program_and_log() {
    let Some(backend) = gpu_backend() else { return };
    let mut cache = backend.kernel_cache();

    match cache.compile(&[BROKEN], "broken", &["double"], false, "") {
        Err(ComputeError::Compile { program, code, log }) => {
            assert_eq!(program, "broken");
            assert_eq!(code, "validation");
            assert!(log.contains("undefined_symbol"), "log was: {}", log);
        }
        other => panic!("expected a compile error, got {:?}", other),
    }
    assert!(!cache.contains("broken"));
}

#[test]
fn test_failed_forced_rebuild_keeps_working_kernel() {
    let Some(backend) = gpu_backend() else { return };
    let flags = "-DLOCAL_SIZE=64 -DFACTOR=3";
    let name = program_name("triple", flags);

    let before = backend
        .kernel_cache()
        .compile_kernel(DOUBLE, &name, "double", false, flags)
        .unwrap();
    let err = backend
        .kernel_cache()
        .compile(&[BROKEN], &name, &["double"], true, flags)
        .unwrap_err();
    assert!(matches!(err, ComputeError::Compile { .. }));

    let after = backend.kernel_cache().lookup(&name, "double").unwrap();
    assert!(Arc::ptr_eq(&before, &after));

    // A corrected forced rebuild replaces it
    let rebuilt = backend
        .kernel_cache()
        .compile_kernel(DOUBLE, &name, "double", true, flags)
        .unwrap();
    assert!(!Arc::ptr_eq(&before, &rebuilt));
}

#[test]
fn test_missing_entry_point_is_not_found() {
    let Some(backend) = gpu_backend() else { return };
    let mut cache = backend.kernel_cache();
    let flags = "-DLOCAL_SIZE=64 -DFACTOR=2";

    match cache.compile(&[DOUBLE], "no_entry", &["halve"], false, flags) {
        Err(ComputeError::EntryPointNotFound { program, entry_point }) => {
            assert_eq!(program, "no_entry");
            assert_eq!(entry_point, "halve");
        }
        other => panic!("expected EntryPointNotFound, got {:?}", other),
    }
}

#[test]
fn test_lookup_before_compile_is_precondition() {
    let Some(backend) = gpu_backend() else { return };
    let err = backend.kernel_cache().lookup("never_built", "main").unwrap_err();
    assert!(matches!(err, ComputeError::KernelNotCompiled { .. }));
}

#[test]
fn test_compile_from_files_names_unreadable_path() {
    let Some(backend) = gpu_backend() else { return };
    let dir = tempfile::tempdir().unwrap();
    let kernel = dir.path().join("double.wgsl");
    std::fs::write(&kernel, DOUBLE).unwrap();

    let mut cache = backend.kernel_cache();
    cache
        .compile_from_file(&kernel, "from_file", &["double"], false, "-DLOCAL_SIZE=32 -DFACTOR=5")
        .unwrap();
    assert!(cache.contains("from_file"));

    let missing = dir.path().join("absent.wgsl");
    match cache.compile_from_files(&[&kernel, &missing], "from_files", &["double"], false, "") {
        Err(ComputeError::Io { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected an I/O error, got {:?}", other),
    }
}

#[test]
fn test_dispatch_reuses_cached_program() {
    let Some(backend) = gpu_backend() else { return };

    let x = backend.from_slice([8], &[1i32, 0, 2, 0, 3, 0, 4, 0]).unwrap();
    let first = backend.cast(&x, DType::Bool).unwrap();
    let programs = backend.kernel_cache().len();
    let builds = backend.kernel_cache().build_count();

    let second = backend.cast(&x, DType::Bool).unwrap();
    assert_eq!(backend.kernel_cache().len(), programs);
    assert_eq!(backend.kernel_cache().build_count(), builds);
    assert_eq!(
        backend.to_vec::<bool>(&first).unwrap(),
        backend.to_vec::<bool>(&second).unwrap()
    );

    // A different shape is a different specialisation
    let wider = backend.zeros([9], DType::Int32).unwrap();
    backend.cast(&wider, DType::Bool).unwrap();
    assert_eq!(backend.kernel_cache().len(), programs + 1);
}
