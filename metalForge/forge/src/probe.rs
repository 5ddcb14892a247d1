// SPDX-License-Identifier: AGPL-3.0-only

//! Hardware probing: adapters via wgpu, host CPU via procfs.
//!
//! Adapter discovery leans on wgpu. We get adapter name, device type,
//! driver, backend, limits and feature flags (`TIMESTAMP_QUERY`,
//! `MAPPABLE_PRIMARY_BUFFERS`) directly from the driver layer. Every
//! adapter is reported, including CPU rasterizers, so the benchmark can
//! compare them the same way it compares hardware GPUs.
//!
//! CPU discovery reads `/proc/cpuinfo` for model, core count, and SIMD flags.

use crate::substrate::{Capability, Identity, Properties, Substrate, SubstrateKind};
use std::fs;

/// Environment variable restricting wgpu to one backend.
pub const BACKEND_ENV: &str = "MONTEPI_WGPU_BACKEND";

/// Backends selected by [`BACKEND_ENV`] (`vulkan`, `metal`, `dx12`, `gl`).
///
/// Unset or unrecognised values select every backend.
#[must_use]
pub fn configured_backends() -> wgpu::Backends {
    parse_backends(std::env::var(BACKEND_ENV).ok().as_deref())
}

fn parse_backends(value: Option<&str>) -> wgpu::Backends {
    match value.map(str::to_ascii_lowercase).as_deref() {
        Some("vulkan") => wgpu::Backends::VULKAN,
        Some("metal") => wgpu::Backends::METAL,
        Some("dx12") => wgpu::Backends::DX12,
        Some("gl") => wgpu::Backends::GL,
        _ => wgpu::Backends::all(),
    }
}

/// Create a wgpu instance with the configured backends.
///
/// Adapter indices recorded in [`Identity::adapter_index`] are only
/// meaningful against an instance created by this function.
#[must_use]
pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: configured_backends(),
        ..Default::default()
    })
}

/// Enumerate adapters in the order [`create_instance`] reports them.
#[must_use]
pub fn enumerate(instance: &wgpu::Instance) -> Vec<wgpu::Adapter> {
    instance.enumerate_adapters(configured_backends())
}

/// Probe all adapters via wgpu.
///
/// Each adapter becomes a substrate with capabilities derived from its
/// feature flags and device type.
#[must_use]
pub fn probe_gpus() -> Vec<Substrate> {
    let instance = create_instance();
    let gpus: Vec<Substrate> = enumerate(&instance)
        .iter()
        .enumerate()
        .map(|(idx, adapter)| adapter_substrate(idx, adapter))
        .collect();
    log::debug!("wgpu reported {} adapter(s)", gpus.len());
    gpus
}

/// Describe one wgpu adapter as a substrate.
#[must_use]
pub fn adapter_substrate(index: usize, adapter: &wgpu::Adapter) -> Substrate {
    let info = adapter.get_info();
    let features = adapter.features();
    let limits = adapter.limits();

    let has_timestamps = features.contains(wgpu::Features::TIMESTAMP_QUERY);
    let has_mappable_primary = features.contains(wgpu::Features::MAPPABLE_PRIMARY_BUFFERS);
    let unified_memory = matches!(
        info.device_type,
        wgpu::DeviceType::IntegratedGpu | wgpu::DeviceType::Cpu
    );
    let kind = if info.device_type == wgpu::DeviceType::Cpu {
        SubstrateKind::Software
    } else {
        SubstrateKind::Gpu
    };

    let mut capabilities = vec![Capability::F32Compute, Capability::ShaderDispatch];
    if has_timestamps {
        capabilities.push(Capability::TimestampQuery);
    }
    if has_mappable_primary {
        capabilities.push(Capability::MappablePrimaryBuffers);
    }
    if unified_memory {
        capabilities.push(Capability::UnifiedMemory);
    }

    let pci_id = (info.vendor != 0).then(|| format!("{:#06x}:{:#06x}", info.vendor, info.device));
    let driver = if info.driver.is_empty() {
        None
    } else {
        Some(format!("{} ({})", info.driver, info.driver_info))
    };

    Substrate {
        kind,
        identity: Identity {
            name: info.name.clone(),
            driver,
            backend: Some(format!("{:?}", info.backend)),
            adapter_index: Some(index),
            pci_id,
        },
        properties: Properties {
            memory_bytes: Some(limits.max_buffer_size),
            max_storage_binding_bytes: Some(u64::from(limits.max_storage_buffer_binding_size)),
            has_timestamps,
            has_mappable_primary,
            unified_memory,
            ..Properties::default()
        },
        capabilities,
    }
}

/// Probe CPU via `/proc/cpuinfo` and `/proc/meminfo`.
#[must_use]
pub fn probe_cpu() -> Substrate {
    let (model, cores, threads, cache_kb, has_avx2) = parse_cpuinfo();
    let mem_bytes = parse_meminfo();

    let name = model.unwrap_or_else(|| String::from("Unknown CPU"));

    let mut capabilities = vec![Capability::F32Compute];
    if has_avx2 {
        capabilities.push(Capability::SimdVector);
    }

    Substrate {
        kind: SubstrateKind::Cpu,
        identity: Identity::named(name),
        properties: Properties {
            memory_bytes: mem_bytes,
            core_count: cores,
            thread_count: threads
                .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get() as u32)),
            cache_kb,
            unified_memory: true,
            ..Properties::default()
        },
        capabilities,
    }
}

fn parse_cpuinfo() -> (Option<String>, Option<u32>, Option<u32>, Option<u32>, bool) {
    let Ok(content) = fs::read_to_string("/proc/cpuinfo") else {
        return (None, None, None, None, false);
    };
    parse_cpuinfo_text(&content)
}

fn parse_cpuinfo_text(content: &str) -> (Option<String>, Option<u32>, Option<u32>, Option<u32>, bool) {
    let mut model = None;
    let mut cores = None;
    let mut siblings = None;
    let mut cache_kb = None;
    let mut has_avx2 = false;

    for line in content.lines() {
        if let Some((key, val)) = line.split_once(':') {
            let key = key.trim();
            let val = val.trim();
            match key {
                "model name" if model.is_none() => model = Some(val.to_string()),
                "cpu cores" if cores.is_none() => cores = val.parse().ok(),
                "siblings" if siblings.is_none() => siblings = val.parse().ok(),
                "cache size" if cache_kb.is_none() => {
                    cache_kb = val.trim_end_matches(" KB").parse().ok();
                }
                "flags" if !has_avx2 => {
                    has_avx2 = val.split_whitespace().any(|f| f == "avx2");
                }
                _ => {}
            }
        }
    }

    (model, cores, siblings, cache_kb, has_avx2)
}

fn parse_meminfo() -> Option<u64> {
    let content = fs::read_to_string("/proc/meminfo").ok()?;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            let kb_str = rest.trim().trim_end_matches(" kB").trim();
            let kb: u64 = kb_str.parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn cpu_always_discovered() {
        let cpu = probe_cpu();
        assert_eq!(cpu.kind, SubstrateKind::Cpu);
        assert!(cpu.has(&Capability::F32Compute));
        assert!(!cpu.identity.name.is_empty());
        assert!(!cpu.is_adapter());
    }

    #[test]
    fn gpu_probe_uses_wgpu() {
        let gpus = probe_gpus();
        for (i, gpu) in gpus.iter().enumerate() {
            assert_ne!(gpu.kind, SubstrateKind::Cpu);
            assert!(gpu.has(&Capability::ShaderDispatch));
            assert_eq!(gpu.identity.adapter_index, Some(i));
            assert!(gpu.identity.backend.is_some());
        }
    }

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!(parse_backends(Some("vulkan")), wgpu::Backends::VULKAN);
        assert_eq!(parse_backends(Some("Metal")), wgpu::Backends::METAL);
        assert_eq!(parse_backends(Some("DX12")), wgpu::Backends::DX12);
        assert_eq!(parse_backends(Some("gl")), wgpu::Backends::GL);
        assert_eq!(parse_backends(Some("opencl")), wgpu::Backends::all());
        assert_eq!(parse_backends(None), wgpu::Backends::all());
    }

    #[test]
    fn cpuinfo_text_parses_first_core() {
        let text = "processor\t: 0\n\
                    model name\t: Test CPU @ 3.00GHz\n\
                    cache size\t: 8192 KB\n\
                    siblings\t: 8\n\
                    cpu cores\t: 4\n\
                    flags\t\t: fpu sse2 avx2\n\
                    processor\t: 1\n\
                    model name\t: ignored\n";
        let (model, cores, threads, cache, avx2) = parse_cpuinfo_text(text);
        assert_eq!(model.as_deref(), Some("Test CPU @ 3.00GHz"));
        assert_eq!(cores, Some(4));
        assert_eq!(threads, Some(8));
        assert_eq!(cache, Some(8192));
        assert!(avx2);
    }
}
