// SPDX-License-Identifier: AGPL-3.0-only

//! Bind groups and timed dispatch.
//!
//! One submission per run:
//!
//! ```text
//! compute pass (timestamps at begin/end when available)
//!   → resolve timestamps → copy partials to staging (copy strategies)
//! submit → poll(Wait)
//! ```

use super::buffers::mapped_bytes_to_u64;
use super::GpuContext;
use crate::error::Result;
use crate::report::DeviceClock;
use std::time::Instant;

/// Split workgroup count into (x, y, 1) for 2D dispatch when x > 65535.
/// Shaders must linearize via `gid.x + gid.y * num_workgroups.x * WG_SIZE`.
#[must_use]
pub const fn split_workgroups(total: u32) -> (u32, u32, u32) {
    if total <= 65535 {
        (total, 1, 1)
    } else {
        let y = total.div_ceil(65535);
        let x = total.div_ceil(y);
        (x, y, 1)
    }
}

/// Kernel time as measured for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceTiming {
    pub usec: f64,
    pub clock: DeviceClock,
}

/// Copy of the partial results into a staging buffer, encoded after the
/// compute pass in the same submission.
#[derive(Debug, Clone, Copy)]
pub struct Readback<'a> {
    pub source: &'a wgpu::Buffer,
    pub staging: &'a wgpu::Buffer,
    pub size: u64,
}

/// Two-entry timestamp query set with its resolve and staging buffers.
struct TimestampQueries {
    set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    staging: wgpu::Buffer,
}

const TIMESTAMP_BYTES: u64 = 2 * std::mem::size_of::<u64>() as u64;

impl TimestampQueries {
    fn new(ctx: &GpuContext) -> Self {
        let set = ctx.device().create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("kernel timestamps"),
            ty: wgpu::QueryType::Timestamp,
            count: 2,
        });
        let resolve = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("timestamp resolve"),
            size: TIMESTAMP_BYTES,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = ctx.create_staging_buffer(TIMESTAMP_BYTES, "timestamp staging");
        Self {
            set,
            resolve,
            staging,
        }
    }

    fn encode_resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.resolve_query_set(&self.set, 0..2, &self.resolve, 0);
        encoder.copy_buffer_to_buffer(&self.resolve, 0, &self.staging, 0, TIMESTAMP_BYTES);
    }
}

/// Elapsed µs between two timestamp ticks, or `None` if the pair is
/// unusable (end before start).
#[must_use]
pub fn timestamp_usec(start: u64, end: u64, period_ns: f32) -> Option<f64> {
    (end >= start).then(|| (end - start) as f64 * f64::from(period_ns) / 1_000.0)
}

impl GpuContext {
    /// Create a bind group from a pipeline and ordered buffer slice.
    ///
    /// Each buffer is bound at binding index 0, 1, 2, ... in order.
    pub fn create_bind_group(
        &self,
        pipeline: &wgpu::ComputePipeline,
        buffers: &[&wgpu::Buffer],
    ) -> wgpu::BindGroup {
        let layout = pipeline.get_bind_group_layout(0);
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buf): (usize, &&wgpu::Buffer)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: buf.as_entire_binding(),
            })
            .collect();
        self.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bind_group"),
            layout: &layout,
            entries: &entries,
        })
    }

    /// Dispatch `workgroups` workgroups, wait for completion, and report
    /// the kernel time.
    ///
    /// With `TIMESTAMP_QUERY` the time comes from timestamps written at the
    /// start and end of the compute pass. Otherwise (or if the device
    /// returns an unusable pair) it is the host wall time from submit to
    /// the end of `poll(Wait)`, flagged as [`DeviceClock::HostWall`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BenchError::GpuCompute`] if the timestamp
    /// buffer cannot be mapped.
    pub fn dispatch_timed(
        &self,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        workgroups: u32,
        readback: Option<Readback<'_>>,
    ) -> Result<DeviceTiming> {
        let queries = self.has_timestamps.then(|| TimestampQueries::new(self));

        let mut encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("compute"),
            });
        {
            let timestamp_writes =
                queries
                    .as_ref()
                    .map(|q| wgpu::ComputePassTimestampWrites {
                        query_set: &q.set,
                        beginning_of_pass_write_index: Some(0),
                        end_of_pass_write_index: Some(1),
                    });
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("compute_pass"),
                timestamp_writes,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            let (wx, wy, wz) = split_workgroups(workgroups);
            pass.dispatch_workgroups(wx, wy, wz);
        }
        if let Some(q) = &queries {
            q.encode_resolve(&mut encoder);
        }
        if let Some(rb) = readback {
            encoder.copy_buffer_to_buffer(rb.source, 0, rb.staging, 0, rb.size);
        }

        let submitted = Instant::now();
        self.queue().submit(std::iter::once(encoder.finish()));
        self.device().poll(wgpu::Maintain::Wait);
        let wall_usec = submitted.elapsed().as_secs_f64() * 1e6;

        let host_wall = DeviceTiming {
            usec: wall_usec,
            clock: DeviceClock::HostWall,
        };
        let Some(q) = queries else {
            return Ok(host_wall);
        };
        let ticks = self.with_mapped(&q.staging, mapped_bytes_to_u64)?;
        let period = self.queue().get_timestamp_period();
        match ticks.as_slice() {
            [start, end] => Ok(timestamp_usec(*start, *end, period).map_or_else(
                || {
                    log::debug!("{}: unusable timestamps {start}..{end}", self.adapter_name);
                    host_wall
                },
                |usec| DeviceTiming {
                    usec,
                    clock: DeviceClock::Timestamp,
                },
            )),
            _ => Ok(host_wall),
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn small_counts_stay_one_dimensional() {
        assert_eq!(split_workgroups(0), (0, 1, 1));
        assert_eq!(split_workgroups(1), (1, 1, 1));
        assert_eq!(split_workgroups(65535), (65535, 1, 1));
    }

    #[test]
    fn large_counts_split_and_cover_total() {
        for total in [65536u32, 312_500, 1_000_000, 4_000_000] {
            let (x, y, z) = split_workgroups(total);
            assert!(x <= 65535, "{total}: x = {x}");
            assert!(y <= 65535);
            assert_eq!(z, 1);
            assert!(u64::from(x) * u64::from(y) >= u64::from(total));
        }
    }

    #[test]
    fn naive_default_run_needs_two_dimensions() {
        // 20M samples, one per unit, 64 units per workgroup
        let wg = 20_000_000u32.div_ceil(64);
        assert_eq!(wg, 312_500);
        assert!(split_workgroups(wg).1 > 1);
    }

    #[test]
    fn timestamps_scale_by_period() {
        assert_eq!(timestamp_usec(1_000, 3_000, 1.0), Some(2.0));
        assert_eq!(timestamp_usec(0, 1_000, 10.0), Some(10.0));
        assert_eq!(timestamp_usec(5, 5, 1.0), Some(0.0));
    }

    #[test]
    fn reversed_timestamps_are_rejected() {
        assert_eq!(timestamp_usec(10, 5, 1.0), None);
    }
}
