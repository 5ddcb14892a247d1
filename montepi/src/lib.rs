// SPDX-License-Identifier: AGPL-3.0-only

#![deny(clippy::expect_used, clippy::unwrap_used)]

//! montepi: Monte Carlo π on the CPU and on every wgpu adapter.
//!
//! Estimates π by counting uniform points in the unit square that fall
//! inside the unit circle, once on a single CPU core and once per GPU
//! kernel strategy per device, and compares the timings.
//!
//! ## Modules
//!   - `sampling`: seeded uniform sample buffers
//!   - `cpu`: single- and multi-core baselines
//!   - `strategy`: naive, reduction, coalesced and zero-copy descriptions
//!   - `kernels`: WGSL kernel loading
//!   - `gpu`: wgpu device context, buffers, timed dispatch
//!   - `runner`: one strategy on one device
//!   - `harness`: everything on everything, in a fixed order
//!   - `report`: result rows, the fixed-width table, JSON output
//!   - `validation`, `tolerances`: pass/fail checks for `validate_pi`
//!
//! ## Binaries
//!   - `montepi`: run the benchmark and print the table
//!   - `validate_pi`: fixed-seed correctness checks, exit 0/1
//!
//! Devices come from `montepi_forge`, which groups adapters into
//! platforms (one per wgpu backend).

pub mod cpu;
pub mod error;
pub mod gpu;
pub mod harness;
pub mod kernels;
pub mod report;
pub mod runner;
pub mod sampling;
pub mod strategy;
pub mod tolerances;
pub mod validation;
