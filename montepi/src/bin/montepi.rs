// SPDX-License-Identifier: AGPL-3.0-only

//! Monte Carlo π benchmark: single-core CPU against four wgpu kernel
//! strategies on every adapter.
//!
//! ```text
//! montepi                           # 20M samples, all strategies, all devices
//! montepi -n 1000000 --seed 42      # reproducible smaller run
//! montepi --strategies naive,zero-copy --cpu first
//! montepi --list-devices
//! RUST_LOG=debug MONTEPI_WGPU_BACKEND=vulkan montepi --json results/
//! ```
//!
//! Exit code 0 on success (skipped pairs included), 1 on a fatal error.

use clap::Parser;
use montepi::error::BenchError;
use montepi::harness::{BenchConfig, BenchmarkHarness, CpuPosition, DEFAULT_SAMPLE_COUNT};
use montepi::kernels::{self, KERNEL_DIR_ENV};
use montepi::strategy::{Strategy, DEFAULT_WORK_SIZE};
use montepi_forge::{inventory, probe};
use std::path::PathBuf;

/// Estimate π on the CPU and with every wgpu kernel strategy on every device.
#[derive(Parser, Debug)]
#[command(name = "montepi", version, about)]
struct Cli {
    /// Sample points per run.
    #[arg(short = 'n', long, default_value_t = DEFAULT_SAMPLE_COUNT)]
    samples: usize,

    /// Samples per work unit for the reducing strategies.
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORK_SIZE)]
    work_size: u32,

    /// Strategies to run, comma separated, in order (default: all).
    #[arg(long, value_enum, value_delimiter = ',')]
    strategies: Option<Vec<Strategy>>,

    /// Print the CPU baseline before or after the device rows.
    #[arg(long, value_enum, default_value_t = CpuPosition::Last)]
    cpu: CpuPosition,

    /// Also run a multi-core (rayon) CPU baseline.
    #[arg(long)]
    multicore: bool,

    /// Fixed RNG seed; omit to seed every run from the clock.
    #[arg(long)]
    seed: Option<u64>,

    /// Directory holding the WGSL kernels.
    #[arg(long, env = KERNEL_DIR_ENV)]
    kernel_dir: Option<PathBuf>,

    /// Also write a JSON report into this directory.
    #[arg(long, value_name = "DIR")]
    json: Option<PathBuf>,

    /// Log at info level (RUST_LOG overrides).
    #[arg(short, long)]
    verbose: bool,

    /// Print the device inventory and exit.
    #[arg(long)]
    list_devices: bool,
}

impl Cli {
    fn bench_config(&self) -> BenchConfig {
        BenchConfig {
            sample_count: self.samples,
            work_size: self.work_size,
            strategies: self
                .strategies
                .clone()
                .unwrap_or_else(|| Strategy::ALL.to_vec()),
            cpu_position: self.cpu,
            multicore_cpu: self.multicore,
            seed: self.seed,
            kernel_dir: kernels::kernel_dir(self.kernel_dir.as_deref()),
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn run(cli: &Cli) -> Result<(), BenchError> {
    let platforms = inventory::discover_platforms();

    if cli.list_devices {
        inventory::print_inventory(&probe::probe_cpu(), &platforms);
        return Ok(());
    }

    let harness = BenchmarkHarness::load(cli.bench_config())?;
    if platforms.is_empty() {
        log::warn!("no wgpu adapters found; running the CPU baseline only");
    }
    let config = harness.config();
    println!(
        "Monte Carlo π: {} samples, work size {}, kernels from {}",
        config.sample_count,
        config.work_size,
        config.kernel_dir.display()
    );
    println!();

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| BenchError::DeviceCreation(format!("tokio runtime: {e}")))?;
    let report = rt.block_on(harness.run_all(&platforms))?;

    report.print_table();
    report.print_skips();

    if let Some(ref dir) = cli.json {
        let path = report.save_json(dir)?;
        println!();
        println!("  Report saved: {}", path.display());
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        log::error!("{e}");
        eprintln!("montepi: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_bench_config() {
        let cli = Cli::parse_from(["montepi"]);
        let config = cli.bench_config();
        let defaults = BenchConfig::default();
        assert_eq!(config.sample_count, defaults.sample_count);
        assert_eq!(config.work_size, defaults.work_size);
        assert_eq!(config.strategies, defaults.strategies);
        assert_eq!(config.cpu_position, CpuPosition::Last);
        assert!(config.seed.is_none());
    }

    #[test]
    fn strategies_parse_in_given_order() {
        let cli = Cli::parse_from(["montepi", "--strategies", "zero-copy,naive", "--cpu", "first"]);
        let config = cli.bench_config();
        assert_eq!(config.strategies, vec![Strategy::ZeroCopy, Strategy::Naive]);
        assert_eq!(config.cpu_position, CpuPosition::First);
    }

    #[test]
    fn explicit_kernel_dir_wins() {
        let cli = Cli::parse_from(["montepi", "--kernel-dir", "/opt/kernels", "-n", "100"]);
        let config = cli.bench_config();
        assert_eq!(config.kernel_dir, PathBuf::from("/opt/kernels"));
        assert_eq!(config.sample_count, 100);
    }
}
