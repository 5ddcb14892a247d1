// SPDX-License-Identifier: AGPL-3.0-only

//! Run one strategy on one device.
//!
//! Every strategy goes through the same protocol; only the
//! [`Strategy`] description differs:
//!
//! 1. check input and device support
//! 2. compile the kernel (with `work_size` overridden for reducing kernels)
//! 3. upload samples, allocate partial results
//! 4. dispatch and wait, timing the kernel
//! 5. read back (staged copy or mapped output), sum on the host, unmap
//!
//! Steps 3 to 5 run inside out-of-memory and validation error scopes. A
//! captured error becomes [`BenchError::GpuCompute`] and the row is never
//! reported.
//!
//! Total time runs from just before the dispatch to the end of the host
//! reduction. Host time covers only mapping, summing and unmapping the
//! partial results.

use crate::cpu::pi_from_count;
use crate::error::{BenchError, Result};
use crate::gpu::{DeviceTiming, GpuContext, Readback};
use crate::kernels::{KernelLibrary, WORKGROUP_SIZE};
use crate::report::EstimationResult;
use crate::sampling::{SampleBuffer, Seed};
use crate::strategy::{Strategy, Transfer};
use montepi_forge::substrate::Capability;
use std::collections::HashMap;
use std::time::Instant;

/// Result of one (strategy, device) run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub result: EstimationResult,
    /// Sum of the partial results.
    pub inside: u64,
}

/// Device capabilities as the runner needs them.
fn device_capabilities(ctx: &GpuContext) -> Vec<Capability> {
    let mut caps = vec![Capability::F32Compute, Capability::ShaderDispatch];
    if ctx.has_timestamps {
        caps.push(Capability::TimestampQuery);
    }
    if ctx.has_mappable_primary {
        caps.push(Capability::MappablePrimaryBuffers);
    }
    caps
}

fn unsupported(strategy: Strategy, ctx: &GpuContext, reason: String) -> BenchError {
    BenchError::Unsupported {
        strategy: strategy.label().to_string(),
        device: ctx.adapter_name.clone(),
        reason,
    }
}

/// Pre-flight checks that need no device work.
///
/// Returns the work-unit count as the kernel sees it.
///
/// # Errors
///
/// [`BenchError::InvalidInput`] for an empty buffer or zero work size,
/// [`BenchError::Unsupported`] for a missing capability or a buffer beyond
/// the device's binding limit.
pub fn check_run(
    strategy: Strategy,
    ctx: &GpuContext,
    samples: &SampleBuffer,
    work_size: u32,
) -> Result<u32> {
    if samples.is_empty() {
        return Err(BenchError::InvalidInput(String::from("zero samples")));
    }
    if strategy.reduces() && work_size == 0 {
        return Err(BenchError::InvalidInput(String::from("work size must be positive")));
    }

    let caps = device_capabilities(ctx);
    let missing: Vec<&str> = strategy
        .required_capabilities()
        .iter()
        .filter(|c| !caps.contains(c))
        .map(Capability::label)
        .collect();
    if !missing.is_empty() {
        return Err(unsupported(strategy, ctx, format!("missing {}", missing.join(", "))));
    }

    let units = strategy.work_units(samples.len(), work_size);
    let units = u32::try_from(units)
        .map_err(|_| unsupported(strategy, ctx, format!("{units} work units exceed u32")))?;
    let partial_bytes = u64::from(units) * std::mem::size_of::<u32>() as u64;
    match binding_overflow(samples.byte_len(), partial_bytes, ctx.max_binding_bytes()) {
        Some(reason) => Err(unsupported(strategy, ctx, reason)),
        None => Ok(units),
    }
}

/// Bytes per sample point (two `f32`).
const SAMPLE_BYTES: u64 = 2 * std::mem::size_of::<f32>() as u64;

/// Why a run's buffers cannot be bound under `limit`, if they cannot.
///
/// An oversized sample buffer names the largest sample count that fits,
/// so the skip line tells the user what to run instead.
#[must_use]
pub fn binding_overflow(sample_bytes: u64, partial_bytes: u64, limit: u64) -> Option<String> {
    if sample_bytes > limit {
        return Some(format!(
            "samples buffer of {sample_bytes} bytes exceeds binding limit {limit}; \
             at most {} samples fit",
            limit / SAMPLE_BYTES
        ));
    }
    (partial_bytes > limit).then(|| {
        format!("partials buffer of {partial_bytes} bytes exceeds binding limit {limit}")
    })
}

/// Pipeline-overridable constants for `strategy`.
///
/// Only reducing kernels declare `work_size`; passing an undeclared name
/// fails pipeline creation.
#[must_use]
pub fn override_constants(strategy: Strategy, work_size: u32) -> HashMap<String, f64> {
    let mut constants = HashMap::new();
    if strategy.reduces() {
        constants.insert(String::from("work_size"), f64::from(work_size));
    }
    constants
}

/// Timings and count of one dispatch plus host reduction.
struct Measured {
    timing: DeviceTiming,
    inside: u64,
    host_usec: f64,
    total_usec: f64,
}

/// Upload, dispatch, read back and reduce. Must run inside the device's
/// run error scopes: a failed allocation or bind group leaves valid
/// staging buffers that read back as zeros.
fn execute(
    ctx: &GpuContext,
    pipeline: &wgpu::ComputePipeline,
    samples: &SampleBuffer,
    units: u32,
    transfer: Transfer,
) -> Result<Measured> {
    let sample_buf = ctx.create_sample_buffer(samples.as_slice(), transfer);
    let partials = ctx.create_partials_buffer(units as usize, transfer);
    let bind_group = ctx.create_bind_group(pipeline, &[&sample_buf, &partials]);
    let workgroups = units.div_ceil(WORKGROUP_SIZE);

    let partial_bytes = partials.size();
    let staging = match transfer {
        Transfer::Copy => Some(ctx.create_staging_buffer(partial_bytes, "partials staging")),
        Transfer::Mapped => None,
    };
    let readback = staging.as_ref().map(|s| Readback {
        source: &partials,
        staging: s,
        size: partial_bytes,
    });

    let start = Instant::now();
    let timing = ctx.dispatch_timed(pipeline, &bind_group, workgroups, readback)?;

    let host_start = Instant::now();
    let inside = ctx.sum_partials_mapped(staging.as_ref().unwrap_or(&partials))?;
    let host_usec = host_start.elapsed().as_secs_f64() * 1e6;
    let total_usec = start.elapsed().as_secs_f64() * 1e6;

    log::debug!(
        "{} units, {workgroups} workgroups, inside {inside}/{}",
        units,
        samples.len()
    );
    Ok(Measured {
        timing,
        inside,
        host_usec,
        total_usec,
    })
}

/// Run `strategy` over `samples` on `ctx`.
///
/// # Errors
///
/// Everything [`check_run`] returns, [`BenchError::Unsupported`] when the
/// strategy's kernel did not load, [`BenchError::Compilation`] when the
/// kernel fails to build, and [`BenchError::GpuCompute`] when an
/// allocation, bind group or submission fails or a buffer cannot be
/// mapped.
pub async fn run(
    strategy: Strategy,
    ctx: &GpuContext,
    kernels: &KernelLibrary,
    samples: &SampleBuffer,
    work_size: u32,
) -> Result<RunOutcome> {
    let units = check_run(strategy, ctx, samples, work_size)?;
    let kernel = kernels
        .get(strategy)
        .ok_or_else(|| unsupported(strategy, ctx, String::from("kernel source not loaded")))?;

    let constants = override_constants(strategy, work_size);
    let pipeline = ctx.build_pipeline(&kernel.wgsl, kernel.file, &constants).await?;

    ctx.push_run_scopes();
    let measured = execute(ctx, &pipeline, samples, units, strategy.transfer());
    ctx.pop_run_scopes().await?;
    let m = measured?;

    let n = samples.len();
    Ok(RunOutcome {
        result: EstimationResult {
            method: strategy.label().to_string(),
            device: ctx.adapter_name.clone(),
            pi_estimate: pi_from_count(m.inside, n),
            device_time_usec: m.timing.usec,
            host_time_usec: m.host_usec,
            total_time_usec: m.total_usec,
            samples: n,
            device_clock: Some(m.timing.clock),
        },
        inside: m.inside,
    })
}

/// Generate a fresh time-seeded buffer of `count` samples and run on it.
///
/// # Errors
///
/// As [`run`].
pub async fn run_fresh(
    strategy: Strategy,
    ctx: &GpuContext,
    kernels: &KernelLibrary,
    count: usize,
    work_size: u32,
) -> Result<RunOutcome> {
    let samples = SampleBuffer::generate(count, Seed::Time);
    run(strategy, ctx, kernels, &samples, work_size).await
}
