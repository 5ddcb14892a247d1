// SPDX-License-Identifier: AGPL-3.0-only

//! Substrate abstraction: runtime-discovered compute devices.
//!
//! A substrate is a compute device found on this machine. GPUs (and
//! software rasterizers such as llvmpipe or WARP) come from wgpu adapter
//! enumeration. The host CPU comes from procfs.
//!
//! Capabilities are what matters for the benchmark. A strategy asks "can
//! you map a storage buffer directly?" not "is this an Intel iGPU?".

use std::fmt;

/// A compute substrate discovered at runtime.
#[derive(Debug, Clone)]
pub struct Substrate {
    pub kind: SubstrateKind,
    pub identity: Identity,
    pub properties: Properties,
    pub capabilities: Vec<Capability>,
}

/// How we found this device and what to call it.
#[derive(Debug, Clone)]
pub struct Identity {
    pub name: String,
    /// Driver string from wgpu, e.g. "NVIDIA (580.82.09)".
    pub driver: Option<String>,
    /// wgpu backend, e.g. "Vulkan". Plays the role of the compute platform.
    pub backend: Option<String>,
    /// wgpu adapter index, stable for one instance configuration.
    pub adapter_index: Option<usize>,
    /// PCI vendor:device if the driver reports one.
    pub pci_id: Option<String>,
}

/// Measured properties of a substrate.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    /// Total memory in bytes (RAM for CPU, max buffer size for GPU).
    pub memory_bytes: Option<u64>,
    /// Largest storage buffer a single binding may cover (GPU).
    pub max_storage_binding_bytes: Option<u64>,
    /// Physical core count (CPU).
    pub core_count: Option<u32>,
    /// Logical thread count (CPU).
    pub thread_count: Option<u32>,
    /// Cache size in KB (CPU).
    pub cache_kb: Option<u32>,
    /// Supports timestamp queries (GPU).
    pub has_timestamps: bool,
    /// Storage buffers may also be mapped by the host (GPU).
    pub has_mappable_primary: bool,
    /// Shares physical memory with the host (integrated GPU or software).
    pub unified_memory: bool,
}

/// The kind of compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubstrateKind {
    /// Hardware GPU adapter (discrete, integrated or virtual).
    Gpu,
    /// wgpu adapter backed by a CPU rasterizer.
    Software,
    /// The host CPU itself.
    Cpu,
}

/// A capability discovered at runtime on a substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// f32 compute.
    F32Compute,
    /// WGSL compute shader dispatch via wgpu.
    ShaderDispatch,
    /// GPU timestamp query support (device-side kernel timing).
    TimestampQuery,
    /// `MAPPABLE_PRIMARY_BUFFERS`: storage buffers the host can map directly.
    MappablePrimaryBuffers,
    /// Host and device share physical memory.
    UnifiedMemory,
    /// AVX2/SSE SIMD on CPU.
    SimdVector,
}

impl fmt::Display for SubstrateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu => write!(f, "GPU"),
            Self::Software => write!(f, "SW"),
            Self::Cpu => write!(f, "CPU"),
        }
    }
}

impl fmt::Display for Substrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.identity.name, self.kind)?;
        if let Some(ref backend) = self.identity.backend {
            write!(f, " {backend}")?;
        }
        if let Some(ref driver) = self.identity.driver {
            write!(f, " {driver}")?;
        }
        if let Some(mem) = self.properties.memory_bytes {
            let mb = mem / (1024 * 1024);
            write!(f, " {mb}MB")?;
        }
        Ok(())
    }
}

impl Substrate {
    /// Check if this substrate has a specific capability.
    #[must_use]
    pub fn has(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Whether a wgpu adapter backs this substrate.
    #[must_use]
    pub const fn is_adapter(&self) -> bool {
        self.identity.adapter_index.is_some()
    }

    /// Return capabilities as a summary string.
    #[must_use]
    pub fn capability_summary(&self) -> String {
        let labels: Vec<&str> = self.capabilities.iter().map(Capability::label).collect();
        labels.join(", ")
    }
}

impl Capability {
    /// Human-readable label for display.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::F32Compute => "f32",
            Self::ShaderDispatch => "shader",
            Self::TimestampQuery => "timestamps",
            Self::MappablePrimaryBuffers => "zero-copy",
            Self::UnifiedMemory => "unified-mem",
            Self::SimdVector => "simd",
        }
    }
}

impl Identity {
    /// Minimal identity with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: None,
            backend: None,
            adapter_index: None,
            pci_id: None,
        }
    }
}
