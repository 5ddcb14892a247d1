// SPDX-License-Identifier: AGPL-3.0-only

//! Uniform random sample points in the unit square.
//!
//! A [`SampleBuffer`] holds `2 * count` f32 values laid out as
//! `x0, y0, x1, y1, …`, exactly the layout every kernel reads, so the
//! same buffer uploads unchanged for scalar (`array<f32>`) and paired
//! (`array<vec2<f32>>`) access.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// How a sample buffer is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// Fresh seed from the system clock on every call.
    Time,
    /// Fixed seed for reproducible buffers.
    Fixed(u64),
}

impl Seed {
    /// Resolve to a concrete seed value.
    #[must_use]
    pub fn value(self) -> u64 {
        match self {
            Self::Fixed(s) => s,
            Self::Time => time_seed(),
        }
    }
}

/// Seed derived from the wall clock (nanoseconds since the epoch).
#[must_use]
pub fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}

/// `2N` uniform values in `[0, 1)`, read as N `(x, y)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    values: Vec<f32>,
}

impl SampleBuffer {
    /// Generate `count` uniform points with the given seed.
    #[must_use]
    pub fn generate(count: usize, seed: Seed) -> Self {
        let seed = seed.value();
        log::debug!("generating {count} samples (seed {seed:#018x})");
        let mut rng = StdRng::seed_from_u64(seed);
        let values = (0..2 * count).map(|_| rng.gen::<f32>()).collect();
        Self { values }
    }

    /// Build a buffer from literal points.
    #[must_use]
    pub fn from_pairs(pairs: &[(f32, f32)]) -> Self {
        let values = pairs.iter().flat_map(|&(x, y)| [x, y]).collect();
        Self { values }
    }

    /// Number of `(x, y)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len() / 2
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Flat `x0, y0, x1, y1, …` view.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Point `i` as `(x, y)`.
    #[must_use]
    pub fn point(&self, i: usize) -> (f32, f32) {
        (self.values[2 * i], self.values[2 * i + 1])
    }

    /// Iterate over `(x, y)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.values.chunks_exact(2).map(|p| (p[0], p[1]))
    }

    /// Size in bytes once uploaded.
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        std::mem::size_of_val(self.values.as_slice()) as u64
    }
}
