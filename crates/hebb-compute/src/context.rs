// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Device Context
//!
//! One adapter, one logical device and its single in-order queue. Device errors raised
//! outside an error scope land in a fault slot that the next `sync` reports.

use std::sync::Arc;

use hebb_config::GpuConfig;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::error::{ComputeError, Result};

/// A device error captured by an error scope or the uncaptured-error handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFault {
    /// `validation`, `out-of-memory` or `device`
    pub kind: &'static str,
    pub message: String,
}

impl From<wgpu::Error> for DeviceFault {
    fn from(err: wgpu::Error) -> Self {
        #[allow(unreachable_patterns)]
        let kind = match &err {
            wgpu::Error::Validation { .. } => "validation",
            wgpu::Error::OutOfMemory { .. } => "out-of-memory",
            _ => "device",
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Run `op` inside validation and out-of-memory error scopes
pub(crate) fn capture_device_errors<T>(
    device: &wgpu::Device,
    op: impl FnOnce() -> T,
) -> (T, Option<DeviceFault>) {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = op();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    (value, validation.or(out_of_memory).map(DeviceFault::from))
}

/// Parse a comma-separated `gpu.backends` value into a wgpu backend set
pub fn parse_backends(names: &str) -> Result<wgpu::Backends> {
    let mut backends = wgpu::Backends::empty();
    for name in names
        .split(',')
        .map(|n| n.trim().to_ascii_lowercase())
        .filter(|n| !n.is_empty())
    {
        backends |= match name.as_str() {
            "all" => wgpu::Backends::all(),
            "primary" => wgpu::Backends::PRIMARY,
            "secondary" => wgpu::Backends::SECONDARY,
            "vulkan" => wgpu::Backends::VULKAN,
            "metal" => wgpu::Backends::METAL,
            "dx12" => wgpu::Backends::DX12,
            "gl" => wgpu::Backends::GL,
            other => {
                return Err(ComputeError::Configuration(format!(
                    "unknown GPU backend '{}'",
                    other
                )))
            }
        };
    }
    Ok(backends)
}

fn instance_for(backends: wgpu::Backends) -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    })
}

/// Adapters visible for the configured backend set, in selection order
pub fn enumerate_devices(config: &GpuConfig) -> Result<Vec<wgpu::AdapterInfo>> {
    let backends = parse_backends(&config.backends)?;
    Ok(instance_for(backends)
        .enumerate_adapters(backends)
        .iter()
        .map(|adapter| adapter.get_info())
        .collect())
}

/// Selected adapter, logical device and queue
pub struct DeviceContext {
    adapter_info: wgpu::AdapterInfo,
    limits: wgpu::Limits,
    device: Arc<wgpu::Device>,
    queue: wgpu::Queue,
    fault: Arc<Mutex<Option<DeviceFault>>>,
}

impl DeviceContext {
    /// Acquire the configured adapter and create its device and queue
    ///
    /// # Errors
    /// `Configuration` if no adapter exists, the index is out of range, the adapter cannot
    /// run compute shaders, or device creation fails.
    pub fn new(config: &GpuConfig) -> Result<Self> {
        let backends = parse_backends(&config.backends)?;
        let instance = instance_for(backends);

        let adapters = instance.enumerate_adapters(backends);
        if adapters.is_empty() {
            return Err(ComputeError::Configuration(format!(
                "no GPU adapter found for backends '{}'",
                config.backends
            )));
        }
        let adapter_count = adapters.len();
        let adapter = adapters
            .into_iter()
            .nth(config.adapter_index)
            .ok_or_else(|| {
                ComputeError::Configuration(format!(
                    "adapter index {} out of range ({} adapters found)",
                    config.adapter_index, adapter_count
                ))
            })?;

        let adapter_info = adapter.get_info();
        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(ComputeError::Configuration(format!(
                "adapter '{}' ({:?}) cannot run compute shaders",
                adapter_info.name, adapter_info.backend
            )));
        }

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some(&config.device_label),
                required_features: wgpu::Features::empty(),
                required_limits: limits.clone(),
            },
            None,
        ))
        .map_err(|e| ComputeError::Configuration(format!("Failed to create device: {}", e)))?;

        let fault: Arc<Mutex<Option<DeviceFault>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&fault);
        device.on_uncaptured_error(Box::new(move |err| {
            let captured = DeviceFault::from(err);
            error!("Uncaptured device error ({}): {}", captured.kind, captured.message);
            let mut slot = slot.lock();
            if slot.is_none() {
                *slot = Some(captured);
            }
        }));

        info!(
            "GPU device ready: {} ({:?}, {:?})",
            adapter_info.name, adapter_info.backend, adapter_info.device_type
        );
        if adapter_count > 1 {
            warn!(
                "{} adapters available, using index {}",
                adapter_count, config.adapter_index
            );
        }

        Ok(Self {
            adapter_info,
            limits,
            device: Arc::new(device),
            queue,
            fault,
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub(crate) fn shared_device(&self) -> Arc<wgpu::Device> {
        Arc::clone(&self.device)
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Take the first uncaptured fault since the previous call
    pub fn take_fault(&self) -> Option<DeviceFault> {
        self.fault.lock().take()
    }

    /// `Platform: ...` and `Device ...` lines of the diagnostic report
    pub(crate) fn describe(&self) -> String {
        let info = &self.adapter_info;
        let driver = match (info.driver.is_empty(), info.driver_info.is_empty()) {
            (true, _) => "unknown driver".to_string(),
            (false, true) => info.driver.clone(),
            (false, false) => format!("{} {}", info.driver, info.driver_info),
        };
        let mut lines = Vec::new();
        lines.push(format!("Platform: {:?} ({})", info.backend, driver));
        lines.push(format!("Device: {}", info.name));
        lines.push(format!("Device type: {:?}", info.device_type));
        lines.push("Global memory size: unavailable".to_string());
        lines.push(format!(
            "Max allocatable memory: {} MB",
            self.limits.max_buffer_size / (1024 * 1024)
        ));
        lines.push(format!(
            "Max storage binding: {} MB",
            self.limits.max_storage_buffer_binding_size / (1024 * 1024)
        ));
        lines.push(format!(
            "Local memory size: {} KB",
            self.limits.max_compute_workgroup_storage_size / 1024
        ));
        lines.push(format!(
            "Max work group size: {}",
            self.limits.max_compute_invocations_per_workgroup
        ));
        lines.join("\n")
    }
}
