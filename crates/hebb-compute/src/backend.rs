// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # GPU Backend
//!
//! Owns the device context, the kernel cache and the kernel loader, and manages the
//! lifecycle of every tensor it allocates. All work is issued on the context's single
//! in-order queue.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use hebb_config::{validate_config, DispatchConfig, HebbConfig};
use hebb_types::{DType, Shape};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, trace};

use crate::context::{capture_device_errors, DeviceContext};
use crate::error::{ComputeError, Result};
use crate::kernel_cache::{KernelCache, WgpuProgramBuilder};
use crate::loader::{self, loader_from_config, KernelLoader};
use crate::tensor::{padded_size, BackendId, Element, ReleaseFn, Tensor};

/// Program holding the self-check kernel
pub const PROBE_PROGRAM: &str = "__hebb_probe__";
const PROBE_ENTRY_POINT: &str = "probe";
const PROBE_WIDTH: u32 = 64;

/// Live allocation counters
#[derive(Debug, Default)]
struct AllocationStats {
    live_tensors: AtomicUsize,
    live_bytes: AtomicU64,
    total_allocations: AtomicU64,
}

/// Point-in-time copy of the allocation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocationSnapshot {
    pub live_tensors: usize,
    pub live_bytes: u64,
    pub total_allocations: u64,
}

pub(crate) struct BackendShared {
    id: BackendId,
    context: DeviceContext,
    cache: Mutex<KernelCache<WgpuProgramBuilder>>,
    loader: Arc<dyn KernelLoader>,
    dispatch: DispatchConfig,
    stats: AllocationStats,
}

impl BackendShared {
    fn release_buffer(&self, bytes: u64) {
        self.stats.live_tensors.fetch_sub(1, Ordering::Relaxed);
        self.stats.live_bytes.fetch_sub(bytes, Ordering::Relaxed);
        trace!("Released {} bytes on backend {}", bytes, self.id);
    }
}

/// GPU execution backend
///
/// Cheap to clone; clones share the device, queue and kernel cache.
#[derive(Clone)]
pub struct GpuBackend {
    shared: Arc<BackendShared>,
}

impl GpuBackend {
    /// Create a backend from a full configuration
    ///
    /// Acquires the device, then compiles and runs the probe kernel as a self-check.
    pub fn new(config: &HebbConfig) -> Result<Self> {
        Self::with_loader(config, loader_from_config(&config.kernels))
    }

    /// Create a backend with default configuration and the embedded kernels
    pub fn with_defaults() -> Result<Self> {
        Self::new(&HebbConfig::default())
    }

    pub fn with_loader(config: &HebbConfig, loader: Arc<dyn KernelLoader>) -> Result<Self> {
        validate_config(config).map_err(|e| ComputeError::Configuration(e.to_string()))?;

        let context = DeviceContext::new(&config.gpu)?;
        let cache = KernelCache::new(WgpuProgramBuilder::new(context.shared_device()));
        let backend = Self {
            shared: Arc::new(BackendShared {
                id: BackendId::next(),
                context,
                cache: Mutex::new(cache),
                loader,
                dispatch: config.dispatch,
                stats: AllocationStats::default(),
            }),
        };

        backend.run_probe()?;
        info!(
            "GPU backend {} ready (kernels: {})",
            backend.shared.id,
            backend.shared.loader.describe()
        );
        Ok(backend)
    }

    pub fn id(&self) -> BackendId {
        self.shared.id
    }

    pub fn context(&self) -> &DeviceContext {
        &self.shared.context
    }

    pub fn dispatch_config(&self) -> &DispatchConfig {
        &self.shared.dispatch
    }

    pub fn loader(&self) -> &dyn KernelLoader {
        self.shared.loader.as_ref()
    }

    /// Exclusive access to the kernel cache
    ///
    /// Every dispatch locks the same mutex, so dispatching on this backend from the thread
    /// holding the guard deadlocks. Drop the guard first.
    pub fn kernel_cache(&self) -> MutexGuard<'_, KernelCache<WgpuProgramBuilder>> {
        self.shared.cache.lock()
    }

    /// Allocate a tensor, optionally initialised from `initial`
    ///
    /// # Errors
    /// * `Precondition` - `initial` is not exactly `volume × dtype size` bytes
    /// * `Allocation` - larger than the device's max buffer size, or rejected by the device
    pub fn allocate(&self, shape: impl Into<Shape>, dtype: DType, initial: Option<&[u8]>) -> Result<Tensor> {
        let shape = shape.into();
        let byte_len = shape.volume().checked_mul(dtype.size()).ok_or_else(|| {
            ComputeError::Allocation(format!("{} tensor of shape {} overflows the address space", dtype, shape))
        })?;
        if let Some(data) = initial {
            if data.len() != byte_len {
                return Err(ComputeError::Precondition(format!(
                    "initial data is {} bytes, tensor {} of {} needs {}",
                    data.len(),
                    shape,
                    dtype,
                    byte_len
                )));
            }
        }

        let physical = padded_size(byte_len as u64);
        let max_buffer = self.shared.context.limits().max_buffer_size;
        if physical > max_buffer {
            return Err(ComputeError::Allocation(format!(
                "{} bytes exceeds the device maximum of {} bytes",
                physical, max_buffer
            )));
        }

        let device = self.shared.context.device();
        let (buffer, fault) = capture_device_errors(device, || {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("hebb tensor"),
                size: physical,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: initial.is_some(),
            });
            if let Some(data) = initial {
                buffer.slice(..).get_mapped_range_mut()[..data.len()].copy_from_slice(data);
                buffer.unmap();
            }
            buffer
        });
        if let Some(fault) = fault {
            return Err(ComputeError::Allocation(format!(
                "device rejected {} byte buffer ({}): {}",
                physical, fault.kind, fault.message
            )));
        }

        Ok(self.wrap(shape, dtype, buffer))
    }

    fn wrap(&self, shape: Shape, dtype: DType, buffer: wgpu::Buffer) -> Tensor {
        let bytes = (shape.volume() * dtype.size()) as u64;
        let stats = &self.shared.stats;
        stats.live_tensors.fetch_add(1, Ordering::Relaxed);
        stats.live_bytes.fetch_add(bytes, Ordering::Relaxed);
        stats.total_allocations.fetch_add(1, Ordering::Relaxed);
        trace!("Allocated {} {} tensor {} ({} bytes)", dtype, shape, self.shared.id, bytes);

        let owner: Weak<BackendShared> = Arc::downgrade(&self.shared);
        let release: ReleaseFn = Box::new(move |bytes| {
            if let Some(shared) = owner.upgrade() {
                shared.release_buffer(bytes);
            }
        });
        Tensor::new(shape, dtype, self.shared.id, buffer, release)
    }

    /// Allocate a tensor holding `values`
    pub fn from_slice<T: Element>(&self, shape: impl Into<Shape>, values: &[T]) -> Result<Tensor> {
        self.allocate(shape, T::DTYPE, Some(&T::encode(values)))
    }

    /// Allocate a zero-filled tensor
    pub fn zeros(&self, shape: impl Into<Shape>, dtype: DType) -> Result<Tensor> {
        // wgpu zero-initialises new buffers
        self.allocate(shape, dtype, None)
    }

    /// Explicitly release a handle
    ///
    /// The buffer is freed once no other clone of the handle remains.
    ///
    /// # Errors
    /// `BackendMismatch` if the tensor was allocated by another backend
    pub fn release(&self, tensor: Tensor) -> Result<()> {
        self.check_owner("tensor", &tensor)?;
        drop(tensor);
        Ok(())
    }

    pub(crate) fn check_owner(&self, operand: &'static str, tensor: &Tensor) -> Result<()> {
        if tensor.backend_id() != self.shared.id {
            return Err(ComputeError::BackendMismatch {
                operand,
                expected: self.shared.id,
                actual: tensor.backend_id(),
            });
        }
        Ok(())
    }

    /// Blocking read of the tensor's full logical byte range into `dest`
    pub fn copy_to_host(&self, tensor: &Tensor, dest: &mut [u8]) -> Result<()> {
        self.check_owner("tensor", tensor)?;
        if dest.len() != tensor.byte_len() {
            return Err(ComputeError::Precondition(format!(
                "destination is {} bytes, tensor holds {}",
                dest.len(),
                tensor.byte_len()
            )));
        }

        let device = self.shared.context.device();
        let size = tensor.physical_size();
        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("hebb readback staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("hebb readback"),
        });
        encoder.copy_buffer_to_buffer(tensor.buffer(), 0, &staging_buffer, 0, size);
        self.shared.context.queue().submit(Some(encoder.finish()));

        // Map staging buffer to CPU memory (blocking)
        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| ComputeError::Readback("map callback was dropped".to_string()))?
            .map_err(|e| ComputeError::Readback(format!("Failed to map staging buffer: {}", e)))?;

        {
            let data = buffer_slice.get_mapped_range();
            dest.copy_from_slice(&data[..dest.len()]);
        }
        staging_buffer.unmap();

        if let Some(fault) = self.shared.context.take_fault() {
            return Err(ComputeError::Readback(format!("{}: {}", fault.kind, fault.message)));
        }
        Ok(())
    }

    /// Read a tensor back as host values
    pub fn to_vec<T: Element>(&self, tensor: &Tensor) -> Result<Vec<T>> {
        if tensor.dtype() != T::DTYPE {
            return Err(ComputeError::DTypeMismatch {
                operand: "tensor",
                expected: T::DTYPE,
                actual: tensor.dtype(),
            });
        }
        let mut bytes = vec![0u8; tensor.byte_len()];
        self.copy_to_host(tensor, &mut bytes)?;
        Ok(T::decode(&bytes))
    }

    /// Enqueue a device-side copy into a new tensor; does not block
    pub fn copy_device_to_device(&self, tensor: &Tensor) -> Result<Tensor> {
        self.check_owner("tensor", tensor)?;
        let copy = self.allocate(tensor.shape().clone(), tensor.dtype(), None)?;

        let device = self.shared.context.device();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("hebb device copy"),
        });
        encoder.copy_buffer_to_buffer(tensor.buffer(), 0, copy.buffer(), 0, tensor.physical_size());
        self.shared.context.queue().submit(Some(encoder.finish()));
        Ok(copy)
    }

    /// Block until all submitted work has completed
    ///
    /// # Errors
    /// `Wait` if the device reported an error since the previous sync
    pub fn sync(&self) -> Result<()> {
        self.shared.context.device().poll(wgpu::Maintain::Wait);
        match self.shared.context.take_fault() {
            Some(fault) => Err(ComputeError::Wait(format!("{}: {}", fault.kind, fault.message))),
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> AllocationSnapshot {
        let stats = &self.shared.stats;
        AllocationSnapshot {
            live_tensors: stats.live_tensors.load(Ordering::Relaxed),
            live_bytes: stats.live_bytes.load(Ordering::Relaxed),
            total_allocations: stats.total_allocations.load(Ordering::Relaxed),
        }
    }

    /// Multi-line human-readable device report
    ///
    /// Lists every cached program with its entry points. When the kernel cache is locked
    /// by a live [`GpuBackend::kernel_cache`] guard the cache lines read `busy`.
    pub fn device_info(&self) -> String {
        let cache_report = match self.shared.cache.try_lock() {
            Some(cache) => {
                let probe = if cache.contains(PROBE_PROGRAM) {
                    format!("{} ok (work group {})", PROBE_PROGRAM, PROBE_WIDTH)
                } else {
                    format!("{} missing", PROBE_PROGRAM)
                };
                let mut lines = vec![
                    format!("Probe kernel: {}", probe),
                    format!("Cached programs: {}", cache.len()),
                ];
                for name in cache.program_names() {
                    if let Some(program) = cache.program(&name) {
                        let mut entry_points: Vec<&str> = program.entry_points().collect();
                        entry_points.sort_unstable();
                        lines.push(format!("  {} [{}]", name, entry_points.join(", ")));
                    }
                }
                lines.join("\n")
            }
            None => "Probe kernel: unknown (kernel cache busy)\nCached programs: busy".to_string(),
        };
        format!(
            "{}\n{}\nKernel source: {}",
            self.shared.context.describe(),
            cache_report,
            self.shared.loader.describe()
        )
    }

    /// Compile the probe kernel and check that it writes what it should
    fn run_probe(&self) -> Result<()> {
        let source = self.shared.loader.load(loader::PROBE)?;
        let flags = format!("-DLOCAL_SIZE={}", PROBE_WIDTH);
        let pipeline = self.kernel_cache().compile_kernel(
            &source,
            PROBE_PROGRAM,
            PROBE_ENTRY_POINT,
            false,
            &flags,
        )?;

        let lanes = self.zeros([PROBE_WIDTH as usize], DType::Int32)?;
        self.run_pass(
            PROBE_PROGRAM,
            &pipeline,
            &[(0, lanes.buffer())],
            1,
        )?;
        let written: Vec<i32> = self.to_vec(&lanes)?;
        let intact = written
            .iter()
            .enumerate()
            .all(|(i, &v)| v == 2 * i as i32 + 1);
        if !intact {
            return Err(ComputeError::Configuration(
                "probe kernel produced unexpected output".to_string(),
            ));
        }
        debug!("Probe kernel self-check passed");
        Ok(())
    }

    /// Bind `bindings` to group 0 and dispatch `workgroups` along x
    pub(crate) fn run_pass(
        &self,
        kernel: &str,
        pipeline: &wgpu::ComputePipeline,
        bindings: &[(u32, &wgpu::Buffer)],
        workgroups: u32,
    ) -> Result<()> {
        let device = self.shared.context.device();
        let ((), fault) = capture_device_errors(device, || {
            let layout = pipeline.get_bind_group_layout(0);
            let entries: Vec<wgpu::BindGroupEntry> = bindings
                .iter()
                .map(|&(binding, buffer)| wgpu::BindGroupEntry {
                    binding,
                    resource: buffer.as_entire_binding(),
                })
                .collect();
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(kernel),
                layout: &layout,
                entries: &entries,
            });

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(kernel),
            });
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(kernel),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(pipeline);
                compute_pass.set_bind_group(0, &bind_group, &[]);
                compute_pass.dispatch_workgroups(workgroups, 1, 1);
            }
            self.shared.context.queue().submit(Some(encoder.finish()));
        });

        match fault {
            Some(fault) => Err(ComputeError::Dispatch {
                kernel: kernel.to_string(),
                code: fault.kind.to_string(),
                message: fault.message,
            }),
            None => Ok(()),
        }
    }

    /// Uniform buffer holding one `Pod` parameter block
    pub(crate) fn uniform<T: bytemuck::Pod>(&self, label: &str, params: &T) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        self.shared
            .context
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(params),
                usage: wgpu::BufferUsages::UNIFORM,
            })
    }

    /// Fetch a specialised kernel, compiling it from the loader on a cache miss
    ///
    /// `common.wgsl` is prepended to `source` and every entry point is resolved together.
    pub(crate) fn kernel(
        &self,
        prefix: &str,
        build_flags: &str,
        source: &str,
        entry_points: &[&str],
        entry_point: &str,
    ) -> Result<(String, Arc<wgpu::ComputePipeline>)> {
        let program_name = crate::build_flags::program_name(prefix, build_flags);
        let mut cache = self.kernel_cache();
        cache.get_or_compile(&program_name, entry_points, build_flags, || {
            Ok(vec![
                self.shared.loader.load(loader::COMMON)?,
                self.shared.loader.load(source)?,
            ])
        })?;
        let pipeline = cache.lookup(&program_name, entry_point)?;
        Ok((program_name, pipeline))
    }
}

impl std::fmt::Debug for GpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBackend")
            .field("id", &self.shared.id)
            .field("adapter", &self.shared.context.adapter_info().name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_backend_creation() {
        // This test requires a GPU - may not work in CI
        if let Ok(backend) = GpuBackend::with_defaults() {
            assert!(backend.kernel_cache().contains(PROBE_PROGRAM));
            let info = backend.device_info();
            assert!(info.contains("Probe kernel: __hebb_probe__ ok"));
            assert!(info.contains("Max work group size"));
            assert!(info.contains("  __hebb_probe__ [probe]"));
        }
    }

    #[test]
    fn test_device_info_with_cache_guard_held() {
        if let Ok(backend) = GpuBackend::with_defaults() {
            let cache = backend.kernel_cache();
            let info = backend.device_info();
            assert!(info.contains("Cached programs: busy"));
            assert!(info.contains("Max work group size"));
            drop(cache);

            assert!(backend.device_info().contains("Probe kernel: __hebb_probe__ ok"));
        }
    }

    #[test]
    fn test_invalid_config_is_rejected_before_device_work() {
        let mut config = HebbConfig::default();
        config.dispatch.cast.local_size = 48;
        assert!(matches!(
            GpuBackend::new(&config),
            Err(ComputeError::Configuration(_))
        ));
    }
}
