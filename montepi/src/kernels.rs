// SPDX-License-Identifier: AGPL-3.0-only

//! Kernel source loading.
//!
//! Kernel sources are plain WGSL files read once at startup from a
//! directory. Each declares the samples at `@binding(0)`, the partial
//! results at `@binding(1)`, and entry point `main`. Reducing kernels also
//! declare `override work_size: u32`.

use crate::error::{BenchError, Result};
use crate::strategy::Strategy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Kernel directory fixed at build time.
pub const KERNEL_SOURCE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/kernels");

/// Environment variable overriding [`KERNEL_SOURCE_DIR`].
pub const KERNEL_DIR_ENV: &str = "MONTEPI_KERNEL_DIR";

/// Entry point every kernel exports.
pub const ENTRY_POINT: &str = "main";

/// Workgroup size every kernel declares (`@workgroup_size(64)`).
pub const WORKGROUP_SIZE: u32 = 64;

/// One loaded kernel file.
#[derive(Debug, Clone)]
pub struct KernelSource {
    pub file: &'static str,
    pub path: PathBuf,
    pub wgsl: String,
}

impl KernelSource {
    /// Read `file` from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::KernelSource`] if the file cannot be read.
    pub fn read(dir: &Path, file: &'static str) -> Result<Self> {
        let path = dir.join(file);
        let wgsl = std::fs::read_to_string(&path).map_err(|source| BenchError::KernelSource {
            path: path.clone(),
            source,
        })?;
        Ok(Self { file, path, wgsl })
    }
}

/// Kernel sources for the strategies that loaded successfully.
#[derive(Debug, Clone, Default)]
pub struct KernelLibrary {
    sources: HashMap<&'static str, KernelSource>,
}

impl KernelLibrary {
    /// Load the kernels for `strategies` from `dir`.
    ///
    /// Each distinct file is read once. A missing or unreadable file is
    /// returned alongside the library (one entry per affected strategy)
    /// rather than aborting, so the remaining strategies still run.
    pub fn load(dir: &Path, strategies: &[Strategy]) -> (Self, Vec<(Strategy, BenchError)>) {
        let mut library = Self::default();
        let mut failures = Vec::new();
        for &strategy in strategies {
            let file = strategy.kernel_file();
            if library.sources.contains_key(file) {
                continue;
            }
            match KernelSource::read(dir, file) {
                Ok(source) => {
                    log::debug!("loaded {}", source.path.display());
                    library.sources.insert(file, source);
                }
                Err(e) => {
                    log::warn!("{strategy}: {e}");
                    failures.push((strategy, e));
                }
            }
        }
        // a strategy sharing a file with a failed one fails too
        for &strategy in strategies {
            let file = strategy.kernel_file();
            if !library.sources.contains_key(file) && !failures.iter().any(|(s, _)| *s == strategy)
            {
                let path = dir.join(file);
                failures.push((
                    strategy,
                    BenchError::KernelSource {
                        path,
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "shared kernel failed to load",
                        ),
                    },
                ));
            }
        }
        (library, failures)
    }

    /// Build a library from in-memory sources.
    #[must_use]
    pub fn from_sources(sources: impl IntoIterator<Item = KernelSource>) -> Self {
        Self {
            sources: sources.into_iter().map(|s| (s.file, s)).collect(),
        }
    }

    /// Kernel for `strategy`, if it loaded.
    #[must_use]
    pub fn get(&self, strategy: Strategy) -> Option<&KernelSource> {
        self.sources.get(strategy.kernel_file())
    }

    /// Whether `strategy` has a kernel.
    #[must_use]
    pub fn has(&self, strategy: Strategy) -> bool {
        self.get(strategy).is_some()
    }
}

/// Resolve the kernel directory: explicit path, then [`KERNEL_DIR_ENV`],
/// then [`KERNEL_SOURCE_DIR`].
#[must_use]
pub fn kernel_dir(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(
        || {
            std::env::var_os(KERNEL_DIR_ENV)
                .map_or_else(|| PathBuf::from(KERNEL_SOURCE_DIR), PathBuf::from)
        },
        Path::to_path_buf,
    )
}
