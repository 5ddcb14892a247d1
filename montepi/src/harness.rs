// SPDX-License-Identifier: AGPL-3.0-only

//! Benchmark orchestration: CPU baseline plus every strategy on every
//! device.
//!
//! Order is deterministic: platforms in enumeration order, devices in
//! platform order, strategies in configured order. The CPU baseline runs
//! once, before or after the devices per [`CpuPosition`]. Failures of a
//! single (strategy, device) pair become [`SkipRecord`]s; the run goes on.

use crate::cpu;
use crate::error::{BenchError, Result};
use crate::gpu::GpuContext;
use crate::kernels::{KernelLibrary, KERNEL_SOURCE_DIR};
use crate::report::{BenchReport, EstimationResult, SkipRecord};
use crate::runner;
use crate::sampling::{SampleBuffer, Seed};
use crate::strategy::{Strategy, DEFAULT_WORK_SIZE};
use montepi_forge::inventory::Platform;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of sample points per run.
pub const DEFAULT_SAMPLE_COUNT: usize = 20_000_000;

/// Method label of the single-core baseline.
pub const CPU_METHOD: &str = "Single Core CPU";
/// Method label of the rayon baseline.
pub const MULTICORE_METHOD: &str = "Multi Core CPU";

/// Where the CPU baseline appears in the results.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CpuPosition {
    First,
    #[default]
    Last,
}

/// Everything a benchmark run is parameterised by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    pub sample_count: usize,
    /// Samples per work unit for the reducing strategies.
    pub work_size: u32,
    pub strategies: Vec<Strategy>,
    pub cpu_position: CpuPosition,
    pub multicore_cpu: bool,
    /// Fixed seed; `None` seeds every buffer from the clock.
    pub seed: Option<u64>,
    pub kernel_dir: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
            work_size: DEFAULT_WORK_SIZE,
            strategies: Strategy::ALL.to_vec(),
            cpu_position: CpuPosition::default(),
            multicore_cpu: false,
            seed: None,
            kernel_dir: PathBuf::from(KERNEL_SOURCE_DIR),
        }
    }
}

impl BenchConfig {
    /// Reject configurations no run can use.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::InvalidInput`] for a zero work size.
    pub fn validate(&self) -> Result<()> {
        if self.work_size == 0 {
            return Err(BenchError::InvalidInput(String::from(
                "work size must be positive",
            )));
        }
        if self.sample_count == 0 {
            log::warn!("sample count is 0; GPU strategies will be skipped");
        }
        Ok(())
    }

    /// Seed for each generated buffer.
    #[must_use]
    pub const fn seed(&self) -> Seed {
        match self.seed {
            Some(s) => Seed::Fixed(s),
            None => Seed::Time,
        }
    }
}

/// Runs the CPU baseline and every configured strategy on every device.
pub struct BenchmarkHarness {
    config: BenchConfig,
    kernels: KernelLibrary,
    kernel_skips: Vec<SkipRecord>,
}

impl BenchmarkHarness {
    /// Harness over an already-loaded kernel library.
    #[must_use]
    pub fn new(config: BenchConfig, kernels: KernelLibrary) -> Self {
        Self {
            config,
            kernels,
            kernel_skips: Vec::new(),
        }
    }

    /// Validate `config` and load its kernels.
    ///
    /// A kernel that fails to load removes its strategy from every device
    /// and is recorded as a skip.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::InvalidInput`] if the configuration is invalid.
    pub fn load(config: BenchConfig) -> Result<Self> {
        config.validate()?;
        let (kernels, failures) = KernelLibrary::load(&config.kernel_dir, &config.strategies);
        let kernel_skips = failures
            .into_iter()
            .map(|(strategy, e)| SkipRecord {
                method: strategy.label().to_string(),
                device: String::from("all devices"),
                reason: e.to_string(),
            })
            .collect();
        Ok(Self {
            config,
            kernels,
            kernel_skips,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Strategies that will be attempted on each device.
    #[must_use]
    pub fn runnable_strategies(&self) -> Vec<Strategy> {
        self.config
            .strategies
            .iter()
            .copied()
            .filter(|s| self.kernels.has(*s))
            .collect()
    }

    /// Run everything and collect the results.
    ///
    /// # Errors
    ///
    /// Returns the first error that is not a per-pair skip. Device-side
    /// failures and devices that cannot be opened are recorded in
    /// [`BenchReport::skipped`] instead.
    pub async fn run_all(&self, platforms: &[Platform]) -> Result<BenchReport> {
        let mut report = BenchReport::new(self.config.clone());
        report.skipped.extend(self.kernel_skips.iter().cloned());

        if self.config.cpu_position == CpuPosition::First {
            self.run_cpu(&mut report);
        }

        let strategies = self.runnable_strategies();
        for platform in platforms {
            log::info!("platform {} ({} device(s))", platform.name, platform.devices.len());
            for device in &platform.devices {
                let ctx = match GpuContext::new(device).await {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        log::warn!("{}: {e}", device.identity.name);
                        report.skipped.push(SkipRecord {
                            method: String::from("all strategies"),
                            device: device.identity.name.clone(),
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };
                for &strategy in &strategies {
                    self.run_strategy(strategy, &ctx, &mut report).await?;
                }
            }
        }

        if self.config.cpu_position == CpuPosition::Last {
            self.run_cpu(&mut report);
        }
        Ok(report)
    }

    async fn run_strategy(
        &self,
        strategy: Strategy,
        ctx: &GpuContext,
        report: &mut BenchReport,
    ) -> Result<()> {
        let (n, w) = (self.config.sample_count, self.config.work_size);
        let outcome = match self.config.seed {
            Some(seed) => {
                let samples = SampleBuffer::generate(n, Seed::Fixed(seed));
                runner::run(strategy, ctx, &self.kernels, &samples, w).await
            }
            None => runner::run_fresh(strategy, ctx, &self.kernels, n, w).await,
        };
        match outcome {
            Ok(out) => {
                log::info!(
                    "{strategy} on {}: π ≈ {:.6} in {:.1} µs",
                    ctx.adapter_name,
                    out.result.pi_estimate,
                    out.result.total_time_usec
                );
                report.results.push(out.result);
                Ok(())
            }
            Err(e) if e.is_skippable() => {
                log::warn!("skipping {strategy} on {}: {e}", ctx.adapter_name);
                report.skipped.push(SkipRecord {
                    method: strategy.label().to_string(),
                    device: ctx.adapter_name.clone(),
                    reason: e.to_string(),
                });
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn run_cpu(&self, report: &mut BenchReport) {
        let n = self.config.sample_count;
        let samples = SampleBuffer::generate(n, self.config.seed());
        let single = cpu::estimate(&samples);
        log::info!("{CPU_METHOD}: π ≈ {:.6}", single.pi_estimate);
        report
            .results
            .push(EstimationResult::cpu(CPU_METHOD, &single, n));
        if self.config.multicore_cpu {
            let multi = cpu::estimate_multicore(&samples);
            report
                .results
                .push(EstimationResult::cpu(MULTICORE_METHOD, &multi, n));
        }
    }
}
