// SPDX-License-Identifier: AGPL-3.0-only

//! CPU baseline: count points inside the unit quarter circle.
//!
//! The single-core estimator is the reference every GPU strategy is
//! compared against. The predicate is evaluated in f32, the same
//! precision the kernels use, so identical buffers give identical counts.

use crate::sampling::SampleBuffer;
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Result of a CPU estimate.
#[derive(Debug, Clone, Copy)]
pub struct CpuEstimate {
    pub pi_estimate: f64,
    pub inside: u64,
    /// Time spent in the counting loop only.
    pub elapsed: Duration,
}

/// Whether `(x, y)` falls strictly inside the unit circle.
#[inline]
#[must_use]
pub fn inside_circle(x: f32, y: f32) -> bool {
    x * x + y * y < 1.0
}

/// `4 · inside / n`, or `0.0` when there are no samples.
#[must_use]
pub fn pi_from_count(inside: u64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    4.0 * inside as f64 / n as f64
}

/// Sequential inside-circle count.
#[must_use]
pub fn count_inside(samples: &SampleBuffer) -> u64 {
    let mut count = 0u64;
    for (x, y) in samples.points() {
        if inside_circle(x, y) {
            count += 1;
        }
    }
    count
}

/// Single-threaded estimate.
#[must_use]
pub fn estimate(samples: &SampleBuffer) -> CpuEstimate {
    let start = Instant::now();
    let inside = count_inside(samples);
    let elapsed = start.elapsed();
    CpuEstimate {
        pi_estimate: pi_from_count(inside, samples.len()),
        inside,
        elapsed,
    }
}

/// Estimate across all cores with rayon.
#[must_use]
pub fn estimate_multicore(samples: &SampleBuffer) -> CpuEstimate {
    let start = Instant::now();
    let inside = samples
        .as_slice()
        .par_chunks_exact(2)
        .filter(|p| inside_circle(p[0], p[1]))
        .count() as u64;
    let elapsed = start.elapsed();
    CpuEstimate {
        pi_estimate: pi_from_count(inside, samples.len()),
        inside,
        elapsed,
    }
}
