// SPDX-License-Identifier: AGPL-3.0-only

//! Benchmark result types, the fixed-width results table, and JSON output.

use crate::cpu::CpuEstimate;
use crate::error::{BenchError, Result};
use crate::harness::BenchConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Column widths: method, device, π estimate, device µs, host µs, total µs.
pub const COLUMN_WIDTHS: [usize; 6] = [15, 15, 12, 11, 11, 13];

const HEADINGS: [&str; 6] = [
    "Method",
    "Device",
    "Pi estimate",
    "Device usec",
    "Host usec",
    "Total usec",
];

/// Where a device time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClock {
    /// GPU timestamp queries around the compute pass.
    Timestamp,
    /// Host wall clock from submit to completion (no timestamp support).
    HostWall,
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    pub method: String,
    pub device: String,
    pub pi_estimate: f64,
    pub device_time_usec: f64,
    /// Host-side reduction of the partial results (the whole count for CPU
    /// methods).
    pub host_time_usec: f64,
    pub total_time_usec: f64,
    pub samples: usize,
    /// `None` for CPU methods, which have no device time.
    pub device_clock: Option<DeviceClock>,
}

impl EstimationResult {
    /// Row for a CPU method: no device time, host and total equal.
    #[must_use]
    pub fn cpu(method: &str, estimate: &CpuEstimate, samples: usize) -> Self {
        let usec = estimate.elapsed.as_secs_f64() * 1e6;
        Self {
            method: method.to_string(),
            device: String::from("CPU"),
            pi_estimate: estimate.pi_estimate,
            device_time_usec: 0.0,
            host_time_usec: usec,
            total_time_usec: usec,
            samples,
            device_clock: None,
        }
    }

    /// Absolute error against π.
    #[must_use]
    pub fn error(&self) -> f64 {
        (self.pi_estimate - std::f64::consts::PI).abs()
    }
}

/// A (method, device) pair that produced no row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub method: String,
    pub device: String,
    pub reason: String,
}

/// Truncate or pad `s` to exactly `width` characters.
fn cell(s: &str, width: usize) -> String {
    let clipped: String = s.chars().take(width).collect();
    format!("{clipped:<width$}")
}

fn join_cells(cells: &[String]) -> String {
    let mut line = String::new();
    for c in cells {
        line.push_str("| ");
        line.push_str(c);
    }
    line.push('|');
    line
}

/// Header and separator rows.
#[must_use]
pub fn header_lines() -> [String; 2] {
    let heading: Vec<String> = HEADINGS
        .iter()
        .zip(COLUMN_WIDTHS)
        .map(|(h, w)| cell(h, w))
        .collect();
    let mut sep = String::new();
    for w in COLUMN_WIDTHS {
        sep.push('|');
        sep.push_str(&"-".repeat(w + 1));
    }
    sep.push('|');
    [join_cells(&heading), sep]
}

/// Print the header and separator rows.
pub fn print_header() {
    for line in header_lines() {
        println!("{line}");
    }
}

/// Format one result row. Host-wall device times carry a trailing `*`.
#[must_use]
pub fn format_row(r: &EstimationResult) -> String {
    let device_time = match r.device_clock {
        Some(DeviceClock::HostWall) => format!("{:.1}*", r.device_time_usec),
        Some(DeviceClock::Timestamp) | None => format!("{:.1}", r.device_time_usec),
    };
    let values = [
        r.method.clone(),
        r.device.clone(),
        format!("{:.6}", r.pi_estimate),
        device_time,
        format!("{:.1}", r.host_time_usec),
        format!("{:.1}", r.total_time_usec),
    ];
    let cells: Vec<String> = values
        .iter()
        .zip(COLUMN_WIDTHS)
        .map(|(v, w)| cell(v, w))
        .collect();
    join_cells(&cells)
}

/// Full report for one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub timestamp: String,
    pub config: BenchConfig,
    pub results: Vec<EstimationResult>,
    pub skipped: Vec<SkipRecord>,
}

impl BenchReport {
    /// Empty report stamped with the current time.
    #[must_use]
    pub fn new(config: BenchConfig) -> Self {
        Self {
            timestamp: now_iso8601(),
            config,
            results: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Print the results table to stdout.
    pub fn print_table(&self) {
        print_header();
        for r in &self.results {
            println!("{}", format_row(r));
        }
        if self
            .results
            .iter()
            .any(|r| r.device_clock == Some(DeviceClock::HostWall))
        {
            println!("* device time from host wall clock (no timestamp queries)");
        }
    }

    /// Print skipped pairs, one per line.
    pub fn print_skips(&self) {
        if self.skipped.is_empty() {
            return;
        }
        println!();
        println!("Skipped:");
        for s in &self.skipped {
            println!("  {} on {}: {}", s.method, s.device, s.reason);
        }
    }

    /// Save to a JSON file in `dir`. Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Io`] if the directory cannot be created, the
    /// file cannot be written, or JSON serialization fails.
    pub fn save_json(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|source| BenchError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let filename = format!("montepi_{}.json", self.timestamp.replace(':', "-"));
        let path = dir.join(filename);
        let json = serde_json::to_string_pretty(self).map_err(|e| BenchError::Io {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;
        std::fs::write(&path, json).map_err(|source| BenchError::Io {
            path: path.clone(),
            source,
        })?;
        log::info!("report written to {}", path.display());
        Ok(path)
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS`.
#[must_use]
pub fn now_iso8601() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    utc_timestamp(secs)
}

const fn is_leap(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Format seconds since the Unix epoch as `YYYY-MM-DDTHH:MM:SS` (UTC).
#[must_use]
pub fn utc_timestamp(secs: u64) -> String {
    let mut days = secs / 86_400;
    let of_day = secs % 86_400;

    let mut year = 1970;
    loop {
        let year_days = if is_leap(year) { 366 } else { 365 };
        if days < year_days {
            break;
        }
        days -= year_days;
        year += 1;
    }

    let february = if is_leap(year) { 29 } else { 28 };
    let mut month = 1;
    for month_days in [31, february, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31] {
        if days < month_days {
            break;
        }
        days -= month_days;
        month += 1;
    }

    format!(
        "{year:04}-{month:02}-{:02}T{:02}:{:02}:{:02}",
        days + 1,
        of_day / 3600,
        of_day % 3600 / 60,
        of_day % 60
    )
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn gpu_row(clock: DeviceClock) -> EstimationResult {
        EstimationResult {
            method: "wgpu coalesced".into(),
            device: "NVIDIA GeForce RTX 4070".into(),
            pi_estimate: 3.141_2,
            device_time_usec: 812.5,
            host_time_usec: 40.0,
            total_time_usec: 1_900.5,
            samples: 20_000_000,
            device_clock: Some(clock),
        }
    }

    #[test]
    fn header_matches_row_width() {
        let [header, sep] = header_lines();
        let row = format_row(&gpu_row(DeviceClock::Timestamp));
        assert_eq!(header.chars().count(), row.chars().count());
        assert_eq!(sep.chars().count(), row.chars().count());
        assert!(header.starts_with("| Method"));
        assert!(sep.starts_with("|----------------|"));
    }

    #[test]
    fn row_columns_have_fixed_widths() {
        let row = format_row(&gpu_row(DeviceClock::Timestamp));
        let cols: Vec<&str> = row.split('|').collect();
        // leading and trailing empties around six cells
        assert_eq!(cols.len(), 8);
        for (col, w) in cols[1..7].iter().zip(COLUMN_WIDTHS) {
            assert_eq!(col.chars().count(), w + 1, "{col:?}");
        }
    }

    #[test]
    fn long_device_name_is_clipped() {
        let row = format_row(&gpu_row(DeviceClock::Timestamp));
        assert!(row.contains("| NVIDIA GeForce "));
        assert!(!row.contains("RTX 4070"));
    }

    #[test]
    fn host_wall_time_is_marked() {
        assert!(format_row(&gpu_row(DeviceClock::HostWall)).contains("| 812.5*     |"));
        assert!(!format_row(&gpu_row(DeviceClock::Timestamp)).contains('*'));
    }

    #[test]
    fn cpu_row_has_no_device_time() {
        let est = CpuEstimate {
            pi_estimate: 3.12,
            inside: 785,
            elapsed: Duration::from_micros(250),
        };
        let r = EstimationResult::cpu("Single Core CPU", &est, 1_000);
        assert_eq!(r.device, "CPU");
        assert!(r.device_time_usec.abs() < f64::EPSILON);
        assert!((r.host_time_usec - 250.0).abs() < 1e-9);
        assert!((r.total_time_usec - r.host_time_usec).abs() < f64::EPSILON);
        assert!(r.device_clock.is_none());
        assert!(format_row(&r).starts_with("| Single Core CPU| CPU"));
    }

    #[test]
    fn now_iso8601_valid_format() {
        let s = now_iso8601();
        assert_eq!(s.len(), 19);
        let parts: Vec<&str> = s.split('T').collect();
        assert_eq!(parts.len(), 2);
        let date: Vec<&str> = parts[0].split('-').collect();
        assert_eq!(date.len(), 3);
        assert_eq!(date[0].len(), 4);
        let time: Vec<&str> = parts[1].split(':').collect();
        assert_eq!(time.len(), 3);
        assert!(time.iter().all(|t| t.parse::<u8>().is_ok()));
    }

    #[test]
    fn utc_timestamp_known_instants() {
        assert_eq!(utc_timestamp(0), "1970-01-01T00:00:00");
        assert_eq!(utc_timestamp(951_782_400), "2000-02-29T00:00:00");
        assert_eq!(utc_timestamp(1_700_000_000), "2023-11-14T22:13:20");
        assert_eq!(utc_timestamp(4_107_542_399), "2100-02-28T23:59:59");
    }

    #[test]
    fn report_json_round_trip() {
        let mut report = BenchReport::new(BenchConfig::default());
        report.results.push(gpu_row(DeviceClock::HostWall));
        report.skipped.push(SkipRecord {
            method: "wgpu zero-copy".into(),
            device: "llvmpipe".into(),
            reason: "no mappable storage".into(),
        });
        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"host-wall\""));
        let back: BenchReport = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.results, report.results);
        assert_eq!(back.skipped, report.skipped);
    }

    #[test]
    fn save_json_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let report = BenchReport::new(BenchConfig::default());
        let path = report.save_json(&dir.path().join("out")).expect("save");
        assert!(path.exists());
        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("montepi_") && !n.contains(':')));
    }
}
