// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for montepi kernel loading, GPU dispatch, and reporting.
//!
//! Callers pattern-match on failure modes instead of parsing strings. The
//! harness uses [`BenchError::is_skippable`] to decide whether a failure
//! drops one (strategy, device) pair or ends the run.

use std::fmt;
use std::path::PathBuf;

/// Errors arising from kernel loading, GPU dispatch, or report output.
#[derive(Debug)]
pub enum BenchError {
    /// Kernel source file could not be read.
    KernelSource {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Kernel failed to compile for a device.
    Compilation {
        /// Kernel file name.
        kernel: String,
        /// Device the build was attempted on.
        device: String,
        /// Full compiler message log.
        log: String,
    },

    /// The device cannot run this strategy (missing feature, size limit).
    Unsupported {
        strategy: String,
        device: String,
        reason: String,
    },

    /// Caller passed an input the benchmark cannot run (e.g. zero samples).
    InvalidInput(String),

    /// No compatible adapter was found by wgpu.
    NoAdapter,

    /// GPU device creation failed (wraps the underlying wgpu error message).
    DeviceCreation(String),

    /// GPU dispatch, mapping, or readback failed.
    GpuCompute(String),

    /// Report file I/O failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type alias for montepi operations.
pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    /// Whether the harness should log this failure and continue with the
    /// next (strategy, device) pair.
    ///
    /// Device-side failures never end a run; only adapter-level and report
    /// errors are left to the caller.
    #[must_use]
    pub const fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::KernelSource { .. }
                | Self::Compilation { .. }
                | Self::Unsupported { .. }
                | Self::InvalidInput(_)
                | Self::GpuCompute(_)
        )
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KernelSource { path, source } => {
                write!(f, "kernel source {}: {source}", path.display())
            }
            Self::Compilation { kernel, device, .. } => {
                write!(f, "kernel {kernel} failed to build on {device}")
            }
            Self::Unsupported {
                strategy,
                device,
                reason,
            } => write!(f, "{strategy} unsupported on {device}: {reason}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::NoAdapter => write!(f, "No GPU adapter found"),
            Self::DeviceCreation(e) => write!(f, "Failed to create GPU device: {e}"),
            Self::GpuCompute(e) => write!(f, "GPU compute error: {e}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::KernelSource { source, .. } | Self::Io { source, .. } => Some(source),
            Self::Compilation { .. }
            | Self::Unsupported { .. }
            | Self::InvalidInput(_)
            | Self::NoAdapter
            | Self::DeviceCreation(_)
            | Self::GpuCompute(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(path: &str) -> BenchError {
        BenchError::KernelSource {
            path: PathBuf::from(path),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        }
    }

    #[test]
    fn display_kernel_source_names_path() {
        let err = missing("kernels/pi_naive.wgsl");
        assert!(err.to_string().contains("pi_naive.wgsl"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn display_compilation_names_device() {
        let err = BenchError::Compilation {
            kernel: "pi_coalesced.wgsl".into(),
            device: "Test GPU".into(),
            log: "error: unknown identifier".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pi_coalesced.wgsl"));
        assert!(msg.contains("Test GPU"));
    }

    #[test]
    fn display_no_adapter() {
        assert_eq!(BenchError::NoAdapter.to_string(), "No GPU adapter found");
    }

    #[test]
    fn skippable_split() {
        assert!(missing("x").is_skippable());
        assert!(BenchError::InvalidInput("zero samples".into()).is_skippable());
        assert!(BenchError::Unsupported {
            strategy: "zero-copy".into(),
            device: "gpu".into(),
            reason: "no mappable storage".into(),
        }
        .is_skippable());
        assert!(BenchError::GpuCompute("map failed".into()).is_skippable());
        assert!(!BenchError::NoAdapter.is_skippable());
        assert!(!BenchError::DeviceCreation("lost".into()).is_skippable());
        assert!(!BenchError::Io {
            path: PathBuf::from("out"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .is_skippable());
    }

    #[test]
    fn source_chain_exposes_io_error() {
        use std::error::Error;
        let err = missing("x");
        assert!(err.source().is_some());
        assert!(BenchError::NoAdapter.source().is_none());
    }
}
