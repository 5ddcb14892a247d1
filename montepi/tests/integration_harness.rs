// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: harness orchestration, kernel loading, and report
//! output without a GPU.
//!
//! Runs with an empty platform list exercise everything except device
//! dispatch; the GPU end-to-end test is ignored unless a device exists.

use montepi::harness::{BenchConfig, BenchmarkHarness, CpuPosition, CPU_METHOD, MULTICORE_METHOD};
use montepi::kernels::KERNEL_SOURCE_DIR;
use montepi::report::{format_row, header_lines, BenchReport};
use montepi::strategy::Strategy;
use montepi::tolerances;
use montepi_forge::inventory::{self, Platform};
use std::path::PathBuf;

fn config(samples: usize) -> BenchConfig {
    BenchConfig {
        sample_count: samples,
        seed: Some(tolerances::VALIDATION_SEED),
        ..BenchConfig::default()
    }
}

fn run_all(harness: &BenchmarkHarness, platforms: &[Platform]) -> BenchReport {
    tokio::runtime::Runtime::new()
        .expect("tokio runtime")
        .block_on(harness.run_all(platforms))
        .expect("harness run")
}

#[test]
fn missing_kernel_dir_leaves_cpu_row_and_skips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = BenchConfig {
        kernel_dir: dir.path().join("does-not-exist"),
        ..config(50_000)
    };
    let harness = BenchmarkHarness::load(cfg).expect("load");
    let report = run_all(&harness, &[]);

    assert_eq!(report.results.len(), 1, "only the CPU baseline");
    assert_eq!(report.results[0].method, CPU_METHOD);
    let skipped: Vec<&str> = report.skipped.iter().map(|s| s.method.as_str()).collect();
    assert_eq!(
        skipped,
        Strategy::ALL.iter().map(|s| s.label()).collect::<Vec<_>>()
    );
}

#[test]
fn partial_kernel_dir_keeps_loaded_strategies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let naive = PathBuf::from(KERNEL_SOURCE_DIR).join("pi_naive.wgsl");
    std::fs::copy(&naive, dir.path().join("pi_naive.wgsl")).expect("copy kernel");
    let cfg = BenchConfig {
        kernel_dir: dir.path().to_path_buf(),
        ..config(1_000)
    };
    let harness = BenchmarkHarness::load(cfg).expect("load");
    assert_eq!(harness.runnable_strategies(), vec![Strategy::Naive]);
}

#[test]
fn cpu_position_orders_rows() {
    let first = BenchmarkHarness::load(BenchConfig {
        cpu_position: CpuPosition::First,
        multicore_cpu: true,
        ..config(10_000)
    })
    .expect("load");
    let report = run_all(&first, &[]);
    assert_eq!(report.results[0].method, CPU_METHOD);
    assert_eq!(report.results[1].method, MULTICORE_METHOD);
}

#[test]
fn cpu_estimate_is_within_statistical_bound() {
    let harness = BenchmarkHarness::load(config(200_000)).expect("load");
    let report = run_all(&harness, &[]);
    assert!(
        report.results[0].error() < tolerances::PI_STATISTICAL_TOLERANCE,
        "π̂ = {}",
        report.results[0].pi_estimate
    );
}

#[test]
fn table_lines_share_one_width() {
    let harness = BenchmarkHarness::load(config(10_000)).expect("load");
    let report = run_all(&harness, &[]);
    let [header, sep] = header_lines();
    let row = format_row(&report.results[0]);
    assert_eq!(header.chars().count(), sep.chars().count());
    assert_eq!(header.chars().count(), row.chars().count());
}

#[test]
fn json_report_round_trips_through_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let harness = BenchmarkHarness::load(config(10_000)).expect("load");
    let report = run_all(&harness, &[]);
    let path = report.save_json(dir.path()).expect("save");
    let text = std::fs::read_to_string(path).expect("read back");
    let back: BenchReport = serde_json::from_str(&text).expect("parse");
    assert_eq!(back.results, report.results);
    assert_eq!(back.config, report.config);
}

#[test]
#[ignore = "requires GPU"]
fn every_device_reports_every_strategy_or_a_skip() {
    let platforms = inventory::discover_platforms();
    let devices: usize = platforms.iter().map(|p| p.devices.len()).sum();
    assert!(devices > 0, "no adapters");

    let harness = BenchmarkHarness::load(config(tolerances::PARITY_SAMPLES)).expect("load");
    let report = run_all(&harness, &platforms);
    let cpu_pi = report
        .results
        .iter()
        .find(|r| r.method == CPU_METHOD)
        .map(|r| r.pi_estimate)
        .expect("cpu row");
    let gpu_rows = report.results.len() - 1;
    assert_eq!(gpu_rows + report.skipped.len(), devices * Strategy::ALL.len());
    for r in report.results.iter().filter(|r| r.device_clock.is_some()) {
        assert!(
            (r.pi_estimate - cpu_pi).abs() < tolerances::GPU_VS_CPU_PI,
            "{} on {}: {} vs {cpu_pi}",
            r.method,
            r.device,
            r.pi_estimate
        );
    }

    // one fixed seed, so every strategy on a device counts the same buffer;
    // an adapter listed under two backends is compiled twice and left out
    let names: Vec<&str> = platforms
        .iter()
        .flat_map(|p| &p.devices)
        .map(|d| d.identity.name.as_str())
        .collect();
    for device in platforms.iter().flat_map(|p| &p.devices) {
        if names.iter().filter(|n| **n == device.identity.name).count() > 1 {
            continue;
        }
        let on_device: Vec<f64> = report
            .results
            .iter()
            .filter(|r| r.device == device.identity.name)
            .map(|r| r.pi_estimate)
            .collect();
        if let Some(first) = on_device.first() {
            assert!(
                on_device.iter().all(|p| p.to_bits() == first.to_bits()),
                "{}: {on_device:?}",
                device.identity.name
            );
        }
    }
}
