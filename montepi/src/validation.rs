// SPDX-License-Identifier: AGPL-3.0-only

//! Pass/fail accounting for the `validate_pi` binary.
//!
//! Checks are compared against thresholds from [`crate::tolerances`]. The
//! binary exits 0 when every check passes and 1 otherwise, after printing
//! a summary line per check.

use std::fmt::Write as _;
use std::process;

/// One recorded check.
#[derive(Debug, Clone)]
pub struct Check {
    pub label: String,
    pub passed: bool,
    pub observed: f64,
    pub expected: f64,
    pub tolerance: f64,
    pub mode: ToleranceMode,
}

/// How a check's threshold was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceMode {
    /// |observed - expected| < tolerance
    Absolute,
    /// observed == expected (integer counts)
    Exact,
    /// observed < threshold
    UpperBound,
}

impl std::fmt::Display for ToleranceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute => write!(f, "abs"),
            Self::Exact => write!(f, "=="),
            Self::UpperBound => write!(f, "<"),
        }
    }
}

/// Accumulates checks and produces the summary and exit code.
#[derive(Debug, Default)]
#[must_use]
pub struct ValidationHarness {
    pub name: String,
    pub checks: Vec<Check>,
}

impl ValidationHarness {
    #[must_use = "validation harness must be used to run checks"]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: Vec::new(),
        }
    }

    /// |observed - expected| < tolerance
    pub fn check_abs(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        self.checks.push(Check {
            label: label.to_string(),
            passed: (observed - expected).abs() < tolerance,
            observed,
            expected,
            tolerance,
            mode: ToleranceMode::Absolute,
        });
    }

    /// Integer counts must match exactly.
    pub fn check_count(&mut self, label: &str, observed: u64, expected: u64) {
        self.checks.push(Check {
            label: label.to_string(),
            passed: observed == expected,
            observed: observed as f64,
            expected: expected as f64,
            tolerance: 0.0,
            mode: ToleranceMode::Exact,
        });
    }

    /// observed < threshold
    pub fn check_upper(&mut self, label: &str, observed: f64, threshold: f64) {
        self.checks.push(Check {
            label: label.to_string(),
            passed: observed < threshold,
            observed,
            expected: threshold,
            tolerance: threshold,
            mode: ToleranceMode::UpperBound,
        });
    }

    pub fn check_bool(&mut self, label: &str, passed: bool) {
        self.checks.push(Check {
            label: label.to_string(),
            passed,
            observed: f64::from(u8::from(passed)),
            expected: 1.0,
            tolerance: 0.0,
            mode: ToleranceMode::Exact,
        });
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    #[must_use]
    pub const fn total_count(&self) -> usize {
        self.checks.len()
    }

    /// Vacuously true with no checks.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Summary header plus one line per check.
    #[must_use]
    pub fn format_summary(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "═══ {} validation: {}/{} checks passed ═══",
            self.name,
            self.passed_count(),
            self.total_count()
        );
        for check in &self.checks {
            let icon = if check.passed { "✓" } else { "✗" };
            let _ = writeln!(
                s,
                "  {icon} {}: observed={:.6}, expected={:.6}, tol={:.2e} ({})",
                check.label, check.observed, check.expected, check.tolerance, check.mode
            );
        }
        s
    }

    /// Print the summary and exit: 0 if all checks pass, 1 otherwise.
    pub fn finish(&self) -> ! {
        println!();
        print!("{}", self.format_summary());
        if self.all_passed() {
            println!("ALL CHECKS PASSED");
            process::exit(0);
        }
        let failed: Vec<&str> = self
            .checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.label.as_str())
            .collect();
        println!("FAILED CHECKS: {}", failed.join(", "));
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harness_tracks_pass_fail() {
        let mut h = ValidationHarness::new("test");
        h.check_abs("exact", 3.0, 3.0, 1e-10);
        h.check_abs("close", 3.12, std::f64::consts::PI, 0.05);
        h.check_abs("far", 2.0, std::f64::consts::PI, 0.05);
        assert_eq!(h.passed_count(), 2);
        assert_eq!(h.total_count(), 3);
        assert!(!h.all_passed());
    }

    #[test]
    fn counts_compare_exactly() {
        let mut h = ValidationHarness::new("test");
        h.check_count("same", 7_853_981, 7_853_981);
        h.check_count("off by one", 7_853_982, 7_853_981);
        assert!(h.checks[0].passed);
        assert!(!h.checks[1].passed);
        assert_eq!(h.checks[0].mode, ToleranceMode::Exact);
    }

    #[test]
    fn upper_bound_is_strict() {
        let mut h = ValidationHarness::new("test");
        h.check_upper("below", 0.5, 1.0);
        h.check_upper("at", 1.0, 1.0);
        assert!(h.checks[0].passed);
        assert!(!h.checks[1].passed);
    }

    #[test]
    fn bool_check_records_outcome() {
        let mut h = ValidationHarness::new("test");
        h.check_bool("fail", false);
        assert!(!h.all_passed());
        assert_eq!(h.passed_count(), 0);
    }

    #[test]
    fn empty_harness_passes() {
        let h = ValidationHarness::new("empty");
        assert_eq!(h.total_count(), 0);
        assert!(h.all_passed());
    }

    #[test]
    fn summary_names_binary_and_ratio() {
        let mut h = ValidationHarness::new("validate_pi");
        h.check_abs("a", 1.0, 1.0, 1e-10);
        h.check_abs("b", 2.0, 1.0, 0.1);
        let s = h.format_summary();
        assert!(s.contains("validate_pi"));
        assert!(s.contains("1/2"));
        assert!(s.contains("✗ b"));
    }

    #[test]
    fn tolerance_mode_display() {
        assert_eq!(ToleranceMode::Absolute.to_string(), "abs");
        assert_eq!(ToleranceMode::Exact.to_string(), "==");
        assert_eq!(ToleranceMode::UpperBound.to_string(), "<");
    }
}
