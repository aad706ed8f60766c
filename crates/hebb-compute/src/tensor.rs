// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Device tensors
//!
//! A [`Tensor`] is a reference-counted handle to one device buffer. It carries the id of
//! the backend that allocated it and a release closure captured at construction; the
//! closure runs when the last clone is dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hebb_types::{DType, Shape};

static NEXT_BACKEND_ID: AtomicU64 = AtomicU64::new(1);

/// Identity tag of a backend instance, stamped on every tensor it allocates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendId(u64);

impl BackendId {
    pub(crate) fn next() -> Self {
        Self(NEXT_BACKEND_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host element types with a device representation
pub trait Element: Copy + Send + Sync + 'static {
    const DTYPE: DType;

    /// Device byte layout (little-endian, one byte per bool)
    fn encode(values: &[Self]) -> Vec<u8>;

    fn decode(bytes: &[u8]) -> Vec<Self>;
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn encode(values: &[Self]) -> Vec<u8> {
        values.iter().map(|&v| u8::from(v)).collect()
    }

    fn decode(bytes: &[u8]) -> Vec<Self> {
        bytes.iter().map(|&b| b != 0).collect()
    }
}

impl Element for i32 {
    const DTYPE: DType = DType::Int32;

    fn encode(values: &[Self]) -> Vec<u8> {
        bytemuck::cast_slice(values).to_vec()
    }

    fn decode(bytes: &[u8]) -> Vec<Self> {
        bytemuck::pod_collect_to_vec(bytes)
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::Float32;

    fn encode(values: &[Self]) -> Vec<u8> {
        bytemuck::cast_slice(values).to_vec()
    }

    fn decode(bytes: &[u8]) -> Vec<Self> {
        bytemuck::pod_collect_to_vec(bytes)
    }
}

/// Runs once with the tensor's logical byte length
pub(crate) type ReleaseFn = Box<dyn FnOnce(u64) + Send + Sync>;

struct TensorInner {
    shape: Shape,
    dtype: DType,
    backend_id: BackendId,
    buffer: wgpu::Buffer,
    release: Option<ReleaseFn>,
}

impl Drop for TensorInner {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release((self.shape.volume() * self.dtype.size()) as u64);
        }
    }
}

/// Shared handle to a device buffer with a shape and element type
#[derive(Clone)]
pub struct Tensor {
    inner: Arc<TensorInner>,
}

impl Tensor {
    pub(crate) fn new(
        shape: Shape,
        dtype: DType,
        backend_id: BackendId,
        buffer: wgpu::Buffer,
        release: ReleaseFn,
    ) -> Self {
        Self {
            inner: Arc::new(TensorInner {
                shape,
                dtype,
                backend_id,
                buffer,
                release: Some(release),
            }),
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    pub fn backend_id(&self) -> BackendId {
        self.inner.backend_id
    }

    pub fn volume(&self) -> usize {
        self.inner.shape.volume()
    }

    /// Logical size: `volume × dtype size`
    pub fn byte_len(&self) -> usize {
        self.volume() * self.inner.dtype.size()
    }

    /// Size of the device allocation, padded to the 4-byte copy alignment
    pub fn physical_size(&self) -> u64 {
        self.inner.buffer.size()
    }

    /// Number of live handles sharing this buffer
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub(crate) fn buffer(&self) -> &wgpu::Buffer {
        &self.inner.buffer
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.inner.shape)
            .field("dtype", &self.inner.dtype)
            .field("backend", &self.inner.backend_id)
            .field("bytes", &self.byte_len())
            .finish()
    }
}

/// Physical allocation size for a logical byte length
pub(crate) fn padded_size(byte_len: u64) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    byte_len.div_ceil(align).max(1) * align
}
