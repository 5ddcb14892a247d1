// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed-seed correctness checks for the π estimators.
//!
//! CPU checks always run. GPU checks run every strategy on every adapter
//! over the same buffer, compare against the CPU count, and require exact
//! agreement between strategies and between repeated runs; a device that
//! cannot run a strategy (missing feature, binding limit) is reported and
//! not counted as a failure. A bundled kernel that fails to compile is.
//!
//! Exit code 0 when every check passes, 1 otherwise.

use montepi::cpu;
use montepi::error::BenchError;
use montepi::gpu::GpuContext;
use montepi::kernels::{self, KernelLibrary};
use montepi::runner::{self, RunOutcome};
use montepi::sampling::{SampleBuffer, Seed};
use montepi::strategy::{self, Strategy, DEFAULT_WORK_SIZE};
use montepi::tolerances;
use montepi::validation::ValidationHarness;
use montepi_forge::inventory;
use std::f64::consts::PI;

const CPU_SAMPLES: usize = 1_000_000;

fn cpu_checks(harness: &mut ValidationHarness) {
    println!("── CPU baseline ──");
    let samples = SampleBuffer::generate(CPU_SAMPLES, Seed::Fixed(tolerances::VALIDATION_SEED));
    let est = cpu::estimate(&samples);
    println!("  π̂ = {:.6} over {CPU_SAMPLES} samples", est.pi_estimate);
    harness.check_abs(
        "CPU π within statistical bound",
        est.pi_estimate,
        PI,
        tolerances::PI_STATISTICAL_TOLERANCE,
    );

    let again = cpu::estimate(&SampleBuffer::generate(
        CPU_SAMPLES,
        Seed::Fixed(tolerances::VALIDATION_SEED),
    ));
    harness.check_bool(
        "fixed seed is bit-identical",
        again.pi_estimate.to_bits() == est.pi_estimate.to_bits(),
    );

    let multi = cpu::estimate_multicore(&samples);
    harness.check_count("multi-core count matches", multi.inside, est.inside);

    let scenario =
        SampleBuffer::from_pairs(&[(0.1, 0.1), (0.9, 0.9), (0.2, 0.3), (0.99, 0.99)]);
    let s = cpu::estimate(&scenario);
    harness.check_count("4-point scenario inside count", s.inside, 2);
    harness.check_abs("4-point scenario π̂", s.pi_estimate, 2.0, 1e-12);

    let empty = cpu::estimate(&SampleBuffer::generate(0, Seed::Fixed(1)));
    harness.check_abs("empty buffer π̂", empty.pi_estimate, 0.0, 1e-12);
}

fn distribution_checks(harness: &mut ValidationHarness, samples: &SampleBuffer, expected: u64) {
    println!("── work distribution (host emulation) ──");
    for s in Strategy::ALL {
        let partials = strategy::reference_partials(s, samples, DEFAULT_WORK_SIZE);
        harness.check_count(
            &format!("{s}: partials sum to CPU count"),
            strategy::sum_partials(&partials),
            expected,
        );
        harness.check_count(
            &format!("{s}: partial count"),
            partials.len() as u64,
            s.work_units(samples.len(), DEFAULT_WORK_SIZE) as u64,
        );
    }
}

/// Per-device GPU checks against the CPU count `cpu_inside`.
///
/// Each strategy's count must sit within the FMA boundary slack of the CPU
/// count. Counts between strategies on one device must agree exactly, and
/// a second run of the first strategy must reproduce its estimate bit for
/// bit.
async fn device_checks(
    harness: &mut ValidationHarness,
    ctx: &GpuContext,
    kernels: &KernelLibrary,
    samples: &SampleBuffer,
    cpu_inside: u64,
) {
    let mut counts: Vec<(Strategy, RunOutcome)> = Vec::new();
    for s in Strategy::ALL {
        let label = format!("{s} on {}", ctx.adapter_name);
        match runner::run(s, ctx, kernels, samples, DEFAULT_WORK_SIZE).await {
            Ok(out) => {
                harness.check_upper(
                    &format!("{label}: |GPU - CPU| inside count"),
                    out.inside.abs_diff(cpu_inside) as f64,
                    tolerances::GPU_VS_CPU_BOUNDARY_POINTS as f64,
                );
                counts.push((s, out));
            }
            Err(e @ BenchError::Unsupported { .. }) => println!("  {label}: {e} (skipped)"),
            Err(e) => {
                println!("  {label}: {e}");
                harness.check_bool(&format!("{label}: runs"), false);
            }
        }
    }

    let Some((first, reference)) = counts.first() else {
        return;
    };
    for (s, out) in &counts[1..] {
        harness.check_count(
            &format!("{s} matches {first} on {}", ctx.adapter_name),
            out.inside,
            reference.inside,
        );
    }
    match runner::run(*first, ctx, kernels, samples, DEFAULT_WORK_SIZE).await {
        Ok(again) => {
            harness.check_count(
                &format!("{first} rerun on {}: inside count", ctx.adapter_name),
                again.inside,
                reference.inside,
            );
            harness.check_bool(
                &format!("{first} rerun on {}: π̂ bit-identical", ctx.adapter_name),
                again.result.pi_estimate.to_bits() == reference.result.pi_estimate.to_bits(),
            );
        }
        Err(e) => {
            println!("  {first} rerun on {}: {e}", ctx.adapter_name);
            harness.check_bool(&format!("{first} rerun on {}", ctx.adapter_name), false);
        }
    }
}

async fn gpu_checks(
    harness: &mut ValidationHarness,
    kernels: &KernelLibrary,
    samples: &SampleBuffer,
    cpu_inside: u64,
) {
    println!("── GPU parity ──");
    let platforms = inventory::discover_platforms();
    if platforms.is_empty() {
        println!("  no wgpu adapters; GPU checks skipped");
        return;
    }
    for device in platforms.iter().flat_map(|p| &p.devices) {
        match GpuContext::new(device).await {
            Ok(ctx) => {
                ctx.print_info();
                device_checks(harness, &ctx, kernels, samples, cpu_inside).await;
            }
            Err(e) => println!("  {}: {e} (skipped)", device.identity.name),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("═══════════════════════════════════════════════════════════");
    println!("  montepi: π estimator validation");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    let mut harness = ValidationHarness::new("validate_pi");
    cpu_checks(&mut harness);

    let samples = SampleBuffer::generate(
        tolerances::PARITY_SAMPLES,
        Seed::Fixed(tolerances::VALIDATION_SEED),
    );
    let reference = cpu::estimate(&samples);
    distribution_checks(&mut harness, &samples, reference.inside);

    let dir = kernels::kernel_dir(None);
    let (library, failures) = KernelLibrary::load(&dir, &Strategy::ALL);
    harness.check_bool("kernel sources load", failures.is_empty());

    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(gpu_checks(
            &mut harness,
            &library,
            &samples,
            reference.inside,
        )),
        Err(e) => {
            println!("  tokio runtime: {e}");
            harness.check_bool("async runtime starts", false);
        }
    }

    harness.finish();
}
