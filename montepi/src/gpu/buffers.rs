// SPDX-License-Identifier: AGPL-3.0-only

//! Sample upload, partial-result buffers, and mapped reads.
//!
//! Copy strategies upload through `create_buffer_init` and read back via
//! a staging copy. Zero-copy writes samples into a host-visible storage
//! buffer while it is mapped at creation and maps the output buffer
//! itself for reading.

use super::GpuContext;
use crate::error::{BenchError, Result};
use crate::strategy::Transfer;

impl GpuContext {
    /// Storage buffer holding the samples (read-only in the kernel).
    #[must_use]
    pub fn create_sample_buffer(&self, data: &[f32], transfer: Transfer) -> wgpu::Buffer {
        match transfer {
            Transfer::Copy => {
                use wgpu::util::DeviceExt;
                self.device()
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("samples"),
                        contents: bytemuck::cast_slice(data),
                        usage: wgpu::BufferUsages::STORAGE,
                    })
            }
            Transfer::Mapped => self.create_mapped_sample_buffer(data),
        }
    }

    /// Host-visible storage buffer filled while mapped, then unmapped
    /// before any dispatch touches it.
    fn create_mapped_sample_buffer(&self, data: &[f32]) -> wgpu::Buffer {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("samples (mapped)"),
            size: bytes.len() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::MAP_WRITE,
            mapped_at_creation: true,
        });
        buffer
            .slice(..)
            .get_mapped_range_mut()
            .copy_from_slice(bytes);
        buffer.unmap();
        buffer
    }

    /// Writable storage buffer with one `u32` per work unit.
    #[must_use]
    pub fn create_partials_buffer(&self, count: usize, transfer: Transfer) -> wgpu::Buffer {
        let usage = match transfer {
            Transfer::Copy => wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            Transfer::Mapped => wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::MAP_READ,
        };
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("partials"),
            size: (count * std::mem::size_of::<u32>()) as u64,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Create a staging buffer for reading results back to the host.
    #[must_use]
    pub fn create_staging_buffer(&self, size: u64, label: &str) -> wgpu::Buffer {
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Map a `MAP_READ` buffer, hand its bytes to `read`, and unmap.
    ///
    /// The caller must have submitted and polled the work that writes the
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::GpuCompute`] if the map callback fails or the
    /// channel is dropped.
    pub fn with_mapped<T>(&self, buffer: &wgpu::Buffer, read: impl FnOnce(&[u8]) -> T) -> Result<T> {
        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device().poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| BenchError::GpuCompute("GPU map callback: channel recv failed".into()))?
            .map_err(|e| BenchError::GpuCompute(format!("GPU buffer mapping: {e}")))?;

        let data = slice.get_mapped_range();
        let out = read(&data);
        drop(data);
        buffer.unmap();
        Ok(out)
    }

    /// Sum a mapped `u32` partial-result buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::GpuCompute`] if mapping fails.
    pub fn sum_partials_mapped(&self, buffer: &wgpu::Buffer) -> Result<u64> {
        self.with_mapped(buffer, |bytes| {
            bytemuck::try_cast_slice::<u8, u32>(bytes).map_or_else(
                |_| mapped_bytes_to_u32(bytes).iter().map(|&c| u64::from(c)).sum(),
                |counts| counts.iter().map(|&c| u64::from(c)).sum(),
            )
        })
    }
}

/// Convert mapped GPU buffer bytes to `u32` values.
///
/// Mapped ranges are normally aligned, so `bytemuck::try_cast_slice`
/// succeeds. Falls back to manual conversion if alignment is wrong.
#[must_use]
pub fn mapped_bytes_to_u32(data: &[u8]) -> Vec<u32> {
    bytemuck::try_cast_slice(data).map_or_else(
        |_| {
            data.chunks_exact(4)
                .map(|chunk| {
                    let mut b = [0u8; 4];
                    b.copy_from_slice(chunk);
                    u32::from_le_bytes(b)
                })
                .collect()
        },
        <[u32]>::to_vec,
    )
}

/// Convert mapped timestamp bytes to `u64` ticks.
pub(super) fn mapped_bytes_to_u64(data: &[u8]) -> Vec<u64> {
    data.chunks_exact(8)
        .map(|chunk| {
            let mut b = [0u8; 8];
            b.copy_from_slice(chunk);
            u64::from_le_bytes(b)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_bytes_convert() {
        let values = [0u32, 1, 1000, u32::MAX];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(mapped_bytes_to_u32(&bytes), values);
    }

    #[test]
    fn misaligned_u32_bytes_fall_back() {
        let mut bytes = vec![0u8];
        bytes.extend(7u32.to_le_bytes());
        bytes.extend(9u32.to_le_bytes());
        assert_eq!(mapped_bytes_to_u32(&bytes[1..]), vec![7, 9]);
    }

    #[test]
    fn timestamp_ticks_convert() {
        let bytes: Vec<u8> = [5u64, 1_000_005].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(mapped_bytes_to_u64(&bytes), vec![5, 1_000_005]);
    }

    #[test]
    fn empty_mapping_is_empty() {
        assert!(mapped_bytes_to_u32(&[]).is_empty());
        assert!(mapped_bytes_to_u64(&[]).is_empty());
    }
}
