// SPDX-License-Identifier: AGPL-3.0-only

#![deny(clippy::expect_used, clippy::unwrap_used)]

//! montepi Forge: local compute device discovery.
//!
//! Forge discovers what compute substrates exist on THIS machine at runtime:
//! every wgpu adapter on every backend, plus the host CPU. The benchmark
//! treats each adapter as an opaque capability record and opens its own
//! device and queue against it.
//!
//! # Architecture
//!
//! ```text
//!    ┌─────────────────────────────┐
//!    │  probe (wgpu + procfs)      │  adapters + /proc/cpuinfo
//!    └──────────┬──────────────────┘
//!               │ Vec<Substrate>
//!    ┌──────────▼──────────────────┐
//!    │       inventory             │  platforms → devices, in order
//!    └─────────────────────────────┘
//! ```

pub mod inventory;
pub mod probe;
pub mod substrate;
