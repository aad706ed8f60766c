// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Kernel Compilation Cache
//!
//! Compiled programs are memoised by program name. The cache only grows: a program is
//! replaced solely when `force_override` is set and the rebuild succeeds, and nothing is
//! ever evicted. Every entry point of a program is resolved before the program is stored,
//! so a failed build or a missing entry point leaves the previous entry in place.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use tracing::{debug, info};

use crate::build_flags::{parse_build_flags, render_program_source};
use crate::context::capture_device_errors;
use crate::error::{ComputeError, Result};
use crate::loader::read_source;

/// Turns complete program source into kernels
///
/// The production builder compiles WGSL on a wgpu device; tests substitute a counting
/// builder to exercise the cache policy without a GPU.
pub trait ProgramBuilder {
    /// One compiled program unit
    type Module;
    /// Handle to one compiled entry point
    type Kernel: Clone;

    fn build(&self, program_name: &str, source: &str) -> Result<Self::Module>;

    fn entry_point(
        &self,
        program_name: &str,
        module: &Self::Module,
        entry_point: &str,
    ) -> Result<Self::Kernel>;
}

/// A named program and its resolved entry points
#[derive(Debug)]
pub struct CompiledProgram<K> {
    name: String,
    kernels: AHashMap<String, K>,
}

impl<K> CompiledProgram<K> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kernel(&self, entry_point: &str) -> Option<&K> {
        self.kernels.get(entry_point)
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.kernels.keys().map(String::as_str)
    }
}

/// True if `source` declares `@compute ... fn entry_point(`
pub fn declares_entry_point(source: &str, entry_point: &str) -> bool {
    let needle = format!("fn {}", entry_point);
    source.match_indices(&needle).any(|(at, _)| {
        let head = &source[..at];
        let rest = &source[at + needle.len()..];
        if !rest.trim_start().starts_with('(') {
            return false;
        }
        if !(head.is_empty() || head.ends_with(char::is_whitespace)) {
            return false;
        }
        let item_start = head.rfind([';', '}']).map_or(0, |i| i + 1);
        head[item_start..].contains("@compute")
    })
}

/// Program name → compiled program
pub struct KernelCache<B: ProgramBuilder> {
    builder: B,
    programs: AHashMap<String, CompiledProgram<B::Kernel>>,
    builds: u64,
}

impl<B: ProgramBuilder> KernelCache<B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            programs: AHashMap::new(),
            builds: 0,
        }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Build `sources` as one program and store it under `program_name`
    ///
    /// A no-op when `program_name` is already cached and `force_override` is false.
    ///
    /// # Errors
    /// * `Compile` - malformed build flags or a build failure, with the full log
    /// * `EntryPointNotFound` - a requested entry point is not declared by the sources
    pub fn compile(
        &mut self,
        sources: &[&str],
        program_name: &str,
        entry_points: &[&str],
        force_override: bool,
        build_flags: &str,
    ) -> Result<()> {
        if !force_override && self.programs.contains_key(program_name) {
            debug!("Program {} already compiled", program_name);
            return Ok(());
        }

        let defines = parse_build_flags(build_flags).map_err(|log| ComputeError::Compile {
            program: program_name.to_string(),
            code: "build-flags".to_string(),
            log,
        })?;
        let source = render_program_source(&defines, sources);

        self.builds += 1;
        let module = self.builder.build(program_name, &source)?;

        let mut kernels = AHashMap::with_capacity(entry_points.len());
        for &entry_point in entry_points {
            if !declares_entry_point(&source, entry_point) {
                return Err(ComputeError::EntryPointNotFound {
                    program: program_name.to_string(),
                    entry_point: entry_point.to_string(),
                });
            }
            let kernel = self.builder.entry_point(program_name, &module, entry_point)?;
            kernels.insert(entry_point.to_string(), kernel);
        }

        let replaced = self
            .programs
            .insert(
                program_name.to_string(),
                CompiledProgram {
                    name: program_name.to_string(),
                    kernels,
                },
            )
            .is_some();
        info!(
            "Compiled program {} [{}] with flags '{}'{}",
            program_name,
            entry_points.join(", "),
            build_flags,
            if replaced { " (replaced)" } else { "" }
        );
        Ok(())
    }

    /// Compile a single-entry program and return its kernel
    pub fn compile_kernel(
        &mut self,
        source: &str,
        program_name: &str,
        entry_point: &str,
        force_override: bool,
        build_flags: &str,
    ) -> Result<B::Kernel> {
        self.compile(&[source], program_name, &[entry_point], force_override, build_flags)?;
        self.lookup(program_name, entry_point)
    }

    /// Read every file fully, then [`compile`](Self::compile)
    pub fn compile_from_files<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        program_name: &str,
        entry_points: &[&str],
        force_override: bool,
        build_flags: &str,
    ) -> Result<()> {
        let sources = paths
            .iter()
            .map(|path| read_source(path.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let sources: Vec<&str> = sources.iter().map(String::as_str).collect();
        self.compile(&sources, program_name, entry_points, force_override, build_flags)
    }

    pub fn compile_from_file(
        &mut self,
        path: impl AsRef<Path>,
        program_name: &str,
        entry_points: &[&str],
        force_override: bool,
        build_flags: &str,
    ) -> Result<()> {
        self.compile_from_files(&[path.as_ref()], program_name, entry_points, force_override, build_flags)
    }

    /// Compile on a cache miss only; `load_sources` is not called on a hit
    pub fn get_or_compile<F>(
        &mut self,
        program_name: &str,
        entry_points: &[&str],
        build_flags: &str,
        load_sources: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Result<Vec<String>>,
    {
        if self.programs.contains_key(program_name) {
            debug!("Kernel cache hit: {}", program_name);
            return Ok(());
        }
        let sources = load_sources()?;
        let sources: Vec<&str> = sources.iter().map(String::as_str).collect();
        self.compile(&sources, program_name, entry_points, false, build_flags)
    }

    /// # Errors
    /// `KernelNotCompiled` if the program or the entry point was never compiled
    pub fn lookup(&self, program_name: &str, entry_point: &str) -> Result<B::Kernel> {
        self.programs
            .get(program_name)
            .and_then(|program| program.kernel(entry_point))
            .cloned()
            .ok_or_else(|| ComputeError::KernelNotCompiled {
                program: program_name.to_string(),
                entry_point: entry_point.to_string(),
            })
    }

    pub fn program(&self, program_name: &str) -> Option<&CompiledProgram<B::Kernel>> {
        self.programs.get(program_name)
    }

    pub fn contains(&self, program_name: &str) -> bool {
        self.programs.contains_key(program_name)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Cached program names, sorted
    pub fn program_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.programs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of builds attempted, successful or not
    pub fn build_count(&self) -> u64 {
        self.builds
    }
}

/// Compiles WGSL on a wgpu device
pub struct WgpuProgramBuilder {
    device: Arc<wgpu::Device>,
}

impl WgpuProgramBuilder {
    pub fn new(device: Arc<wgpu::Device>) -> Self {
        Self { device }
    }
}

impl ProgramBuilder for WgpuProgramBuilder {
    type Module = wgpu::ShaderModule;
    type Kernel = Arc<wgpu::ComputePipeline>;

    fn build(&self, program_name: &str, source: &str) -> Result<Self::Module> {
        let (module, fault) = capture_device_errors(&self.device, || {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(program_name),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
            })
        });
        match fault {
            Some(fault) => Err(ComputeError::Compile {
                program: program_name.to_string(),
                code: fault.kind.to_string(),
                log: fault.message,
            }),
            None => Ok(module),
        }
    }

    fn entry_point(
        &self,
        program_name: &str,
        module: &Self::Module,
        entry_point: &str,
    ) -> Result<Self::Kernel> {
        let label = format!("{}::{}", program_name, entry_point);
        let (pipeline, fault) = capture_device_errors(&self.device, || {
            self.device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&label),
                    layout: None, // Auto-layout from shader
                    module,
                    entry_point,
                })
        });
        match fault {
            Some(fault) => Err(ComputeError::Compile {
                program: program_name.to_string(),
                code: fault.kind.to_string(),
                log: fault.message,
            }),
            None => Ok(Arc::new(pipeline)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Counts builds; fails any source containing `syntax error`
    #[derive(Default)]
    struct CountingBuilder {
        builds: Cell<usize>,
    }

    impl ProgramBuilder for CountingBuilder {
        type Module = String;
        type Kernel = String;

        fn build(&self, program_name: &str, source: &str) -> Result<String> {
            self.builds.set(self.builds.get() + 1);
            if source.contains("syntax error") {
                return Err(ComputeError::Compile {
                    program: program_name.to_string(),
                    code: "validation".to_string(),
                    log: "expected `;`, found `error`".to_string(),
                });
            }
            Ok(source.to_string())
        }

        fn entry_point(&self, _program_name: &str, module: &String, entry_point: &str) -> Result<String> {
            Ok(format!("{}#{}", module.len(), entry_point))
        }
    }

    const GOOD: &str = "@compute @workgroup_size(1)\nfn main() {}";
    const OTHER: &str = "@compute @workgroup_size(1)\nfn main() { let a = 1; }";
    const BAD: &str = "syntax error";

    fn cache() -> KernelCache<CountingBuilder> {
        KernelCache::new(CountingBuilder::default())
    }

    #[test]
    fn test_second_compile_is_noop() {
        let mut cache = cache();
        cache.compile(&[GOOD], "prog", &["main"], false, "").unwrap();
        // Invalid source is never built on a hit
        cache.compile(&[BAD], "prog", &["main"], false, "").unwrap();
        assert_eq!(cache.builder().builds.get(), 1);
        assert_eq!(cache.build_count(), 1);
        assert!(cache.lookup("prog", "main").is_ok());
    }

    #[test]
    fn test_force_override_rebuilds() {
        let mut cache = cache();
        cache.compile(&[GOOD], "prog", &["main"], false, "").unwrap();
        let before = cache.lookup("prog", "main").unwrap();
        cache.compile(&[OTHER], "prog", &["main"], true, "").unwrap();
        let after = cache.lookup("prog", "main").unwrap();
        assert_eq!(cache.builder().builds.get(), 2);
        assert_ne!(before, after);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_program() {
        let mut cache = cache();
        cache.compile(&[GOOD], "prog", &["main"], false, "").unwrap();
        let before = cache.lookup("prog", "main").unwrap();

        let err = cache.compile(&[BAD], "prog", &["main"], true, "").unwrap_err();
        assert!(matches!(err, ComputeError::Compile { .. }));
        assert_eq!(cache.lookup("prog", "main").unwrap(), before);
    }

    #[test]
    fn test_missing_entry_point_leaves_cache_unmodified() {
        let mut cache = cache();
        let err = cache
            .compile(&[GOOD], "prog", &["main", "absent"], false, "")
            .unwrap_err();
        match err {
            ComputeError::EntryPointNotFound { program, entry_point } => {
                assert_eq!(program, "prog");
                assert_eq!(entry_point, "absent");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!cache.contains("prog"));
    }

    #[test]
    fn test_lookup_before_compile() {
        let cache = cache();
        let err = cache.lookup("prog", "main").unwrap_err();
        assert!(matches!(err, ComputeError::KernelNotCompiled { .. }));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_malformed_flags_fail_without_building() {
        let mut cache = cache();
        let err = cache.compile(&[GOOD], "prog", &["main"], false, "-O2").unwrap_err();
        match err {
            ComputeError::Compile { code, log, .. } => {
                assert_eq!(code, "build-flags");
                assert!(log.contains("-O2"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(cache.builder().builds.get(), 0);
    }

    #[test]
    fn test_multi_source_and_flags_reach_builder() {
        let mut cache = cache();
        let err = cache
            .compile_kernel("fn helper() {}", "prog", "helper", false, "")
            .unwrap_err();
        assert!(matches!(err, ComputeError::EntryPointNotFound { .. }));

        cache
            .compile(&["fn helper() {}", GOOD], "multi", &["main"], false, "-DN=4")
            .unwrap();
        let module_len = "const N: u32 = 4u;\n".len() + 1 + "fn helper() {}".len() + 1 + GOOD.len();
        assert_eq!(cache.lookup("multi", "main").unwrap(), format!("{}#main", module_len));
    }

    #[test]
    fn test_get_or_compile_loads_only_on_miss() {
        let mut cache = cache();
        let mut loads = 0;
        for _ in 0..3 {
            cache
                .get_or_compile("prog", &["main"], "", || {
                    loads += 1;
                    Ok(vec![GOOD.to_string()])
                })
                .unwrap();
        }
        assert_eq!(loads, 1);
        assert_eq!(cache.program_names(), vec!["prog".to_string()]);
    }

    #[test]
    fn test_compile_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let helpers = dir.path().join("helpers.wgsl");
        let main = dir.path().join("main.wgsl");
        std::fs::write(&helpers, "fn helper() {}").unwrap();
        std::fs::write(&main, GOOD).unwrap();

        let mut cache = cache();
        cache
            .compile_from_files(&[&helpers, &main], "files", &["main"], false, "")
            .unwrap();
        assert!(cache.contains("files"));

        let missing = dir.path().join("missing.wgsl");
        match cache.compile_from_file(&missing, "other", &["main"], false, "") {
            Err(ComputeError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected an I/O error, got {:?}", other),
        }
    }

    #[test]
    fn test_declares_entry_point() {
        let source = "fn helper(a: u32) -> u32 { return a; }\n\
                      @compute @workgroup_size(LOCAL_SIZE)\n\
                      fn overlap_score(@builtin(global_invocation_id) gid: vec3<u32>) {}";
        assert!(declares_entry_point(source, "overlap_score"));
        assert!(!declares_entry_point(source, "helper"));
        assert!(!declares_entry_point(source, "overlap"));
        assert!(!declares_entry_point(source, "missing"));
    }
}
