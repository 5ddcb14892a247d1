// SPDX-License-Identifier: AGPL-3.0-only

//! Kernel strategies: how samples are distributed over work units and how
//! buffers cross the host/device boundary.
//!
//! | Strategy | Units | Per unit | Reads | Transfer |
//! |----------|-------|----------|-------|----------|
//! | `naive` | N | 1 sample | one per unit | staged copy |
//! | `reduction` | ⌈N/W⌉ | W contiguous samples | strided across units | staged copy |
//! | `coalesced` | ⌈N/W⌉ | W samples, stride U | adjacent units, adjacent vec2s | staged copy |
//! | `zero-copy` | ⌈N/W⌉ | as coalesced | as coalesced | mapped buffers |
//!
//! One runner consumes this description; the strategies never get their
//! own code paths.

use crate::cpu::inside_circle;
use crate::sampling::SampleBuffer;
use montepi_forge::substrate::Capability;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default samples per work unit for the reducing strategies.
pub const DEFAULT_WORK_SIZE: u32 = 1000;

/// One GPU execution/memory strategy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Naive,
    Reduction,
    Coalesced,
    ZeroCopy,
}

/// How samples reach the device and partial counts come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Upload at buffer creation; read back through a staging copy.
    Copy,
    /// Host-visible buffers mapped directly; no staging copy.
    Mapped,
}

impl Strategy {
    /// Every strategy in benchmark order.
    pub const ALL: [Self; 4] = [Self::Naive, Self::Reduction, Self::Coalesced, Self::ZeroCopy];

    /// Method label for the results table (≤ 15 chars).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Naive => "wgpu naive",
            Self::Reduction => "wgpu reduction",
            Self::Coalesced => "wgpu coalesced",
            Self::ZeroCopy => "wgpu zero-copy",
        }
    }

    /// Kernel source file. Zero-copy reuses the coalesced kernel.
    #[must_use]
    pub const fn kernel_file(self) -> &'static str {
        match self {
            Self::Naive => "pi_naive.wgsl",
            Self::Reduction => "pi_reduction.wgsl",
            Self::Coalesced | Self::ZeroCopy => "pi_coalesced.wgsl",
        }
    }

    #[must_use]
    pub const fn transfer(self) -> Transfer {
        match self {
            Self::ZeroCopy => Transfer::Mapped,
            Self::Naive | Self::Reduction | Self::Coalesced => Transfer::Copy,
        }
    }

    /// Whether each unit folds `work_size` samples before writing.
    #[must_use]
    pub const fn reduces(self) -> bool {
        !matches!(self, Self::Naive)
    }

    /// Number of parallel work units (and partial results) for `n` samples.
    ///
    /// The last unit of a reducing strategy may cover fewer than
    /// `work_size` samples; no sample is dropped.
    #[must_use]
    pub fn work_units(self, n: usize, work_size: u32) -> usize {
        if self.reduces() {
            n.div_ceil(work_size.max(1) as usize)
        } else {
            n
        }
    }

    /// Device capabilities the strategy cannot run without.
    #[must_use]
    pub fn required_capabilities(self) -> Vec<Capability> {
        match self.transfer() {
            Transfer::Copy => vec![Capability::ShaderDispatch],
            Transfer::Mapped => vec![
                Capability::ShaderDispatch,
                Capability::MappablePrimaryBuffers,
            ],
        }
    }

    /// Sample indices handled by `unit`, following the kernel's access pattern.
    ///
    /// `units` must be [`Self::work_units`] for the same `n` and `work_size`.
    pub fn unit_samples(
        self,
        unit: usize,
        units: usize,
        n: usize,
        work_size: u32,
    ) -> Box<dyn Iterator<Item = usize>> {
        let w = work_size.max(1) as usize;
        match self {
            Self::Naive => Box::new((unit < n).then_some(unit).into_iter()),
            Self::Reduction => {
                let start = (unit * w).min(n);
                let end = (start + w).min(n);
                Box::new(start..end)
            }
            Self::Coalesced | Self::ZeroCopy => {
                Box::new((0..w).map(move |k| unit + k * units).take_while(move |&j| j < n))
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Host emulation of a strategy's partial-result buffer.
///
/// Computes on the CPU exactly what each work unit of the kernel writes,
/// following the kernel's sample assignment. Used to check that every
/// strategy counts each sample exactly once.
#[must_use]
pub fn reference_partials(strategy: Strategy, samples: &SampleBuffer, work_size: u32) -> Vec<u32> {
    let n = samples.len();
    let units = strategy.work_units(n, work_size);
    (0..units)
        .map(|unit| {
            strategy
                .unit_samples(unit, units, n, work_size)
                .filter(|&j| {
                    let (x, y) = samples.point(j);
                    inside_circle(x, y)
                })
                .count() as u32
        })
        .collect()
}

/// Sum a partial-result buffer.
#[must_use]
pub fn sum_partials(partials: &[u32]) -> u64 {
    partials.iter().map(|&c| u64::from(c)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::count_inside;
    use crate::sampling::Seed;

    #[test]
    fn work_units_per_strategy() {
        assert_eq!(Strategy::Naive.work_units(20_000, 1000), 20_000);
        assert_eq!(Strategy::Reduction.work_units(20_000, 1000), 20);
        assert_eq!(Strategy::Coalesced.work_units(20_500, 1000), 21);
        assert_eq!(Strategy::ZeroCopy.work_units(0, 1000), 0);
        assert_eq!(Strategy::Reduction.work_units(5, 0), 5);
    }

    #[test]
    fn labels_fit_method_column() {
        for s in Strategy::ALL {
            assert!(s.label().len() <= 15, "{} too wide", s.label());
        }
    }

    #[test]
    fn zero_copy_reuses_coalesced_kernel() {
        assert_eq!(Strategy::ZeroCopy.kernel_file(), Strategy::Coalesced.kernel_file());
        assert_eq!(Strategy::ZeroCopy.transfer(), Transfer::Mapped);
        assert_eq!(Strategy::Coalesced.transfer(), Transfer::Copy);
    }

    #[test]
    fn zero_copy_needs_mappable_storage() {
        assert!(Strategy::ZeroCopy
            .required_capabilities()
            .contains(&Capability::MappablePrimaryBuffers));
        assert!(!Strategy::Naive
            .required_capabilities()
            .contains(&Capability::MappablePrimaryBuffers));
    }

    #[test]
    fn every_sample_assigned_exactly_once() {
        for strategy in Strategy::ALL {
            for (n, w) in [(10, 3), (12, 4), (1, 1000), (2_001, 1000), (7, 1)] {
                let units = strategy.work_units(n, w);
                let mut seen = vec![0u32; n];
                for unit in 0..units {
                    for j in strategy.unit_samples(unit, units, n, w) {
                        seen[j] += 1;
                    }
                }
                assert!(
                    seen.iter().all(|&c| c == 1),
                    "{strategy} n={n} w={w}: {seen:?}"
                );
            }
        }
    }

    #[test]
    fn coalesced_units_read_adjacent_samples() {
        let units = Strategy::Coalesced.work_units(3_000, 1000);
        assert_eq!(units, 3);
        let first: Vec<usize> = (0..units)
            .map(|u| {
                Strategy::Coalesced
                    .unit_samples(u, units, 3_000, 1000)
                    .next()
                    .unwrap_or(usize::MAX)
            })
            .collect();
        assert_eq!(first, vec![0, 1, 2]);
    }

    #[test]
    fn reference_partials_sum_to_cpu_count() {
        let samples = SampleBuffer::generate(12_345, Seed::Fixed(42));
        let expected = count_inside(&samples);
        for strategy in Strategy::ALL {
            let partials = reference_partials(strategy, &samples, 1000);
            assert_eq!(partials.len(), strategy.work_units(12_345, 1000));
            assert_eq!(sum_partials(&partials), expected, "{strategy}");
        }
    }

    #[test]
    fn reduction_and_coalesced_partials_differ_but_agree_in_sum() {
        let samples = SampleBuffer::generate(4_000, Seed::Fixed(9));
        let red = reference_partials(Strategy::Reduction, &samples, 1000);
        let coal = reference_partials(Strategy::Coalesced, &samples, 1000);
        assert_eq!(sum_partials(&red), sum_partials(&coal));
        assert!(red.iter().all(|&c| c <= 1000));
    }
}
