// SPDX-License-Identifier: AGPL-3.0-only

//! Hardware inventory: assemble probed substrates into platforms.
//!
//! A platform is one wgpu backend (Vulkan, Metal, DX12, GL) and the
//! adapters it exposes, in enumeration order. The benchmark walks
//! platforms in first-seen order, then devices within each platform.

use crate::probe;
use crate::substrate::{Substrate, SubstrateKind};

/// One compute platform (wgpu backend) and its devices.
#[derive(Debug, Clone)]
pub struct Platform {
    pub name: String,
    pub devices: Vec<Substrate>,
}

/// Discover wgpu adapters grouped by platform.
///
/// Returns an empty vector when no adapter is available; callers still
/// run their CPU work.
#[must_use]
pub fn discover_platforms() -> Vec<Platform> {
    group_by_platform(probe::probe_gpus())
}

/// Group adapter substrates by backend, preserving first-seen platform
/// order and device order within each platform. Non-adapter substrates
/// are dropped.
#[must_use]
pub fn group_by_platform(substrates: Vec<Substrate>) -> Vec<Platform> {
    let mut platforms: Vec<Platform> = Vec::new();
    for s in substrates.into_iter().filter(Substrate::is_adapter) {
        let name = s
            .identity
            .backend
            .clone()
            .unwrap_or_else(|| String::from("unknown"));
        match platforms.iter_mut().find(|p| p.name == name) {
            Some(platform) => platform.devices.push(s),
            None => platforms.push(Platform {
                name,
                devices: vec![s],
            }),
        }
    }
    platforms
}

/// Print a human-readable inventory to stdout.
pub fn print_inventory(cpu: &Substrate, platforms: &[Platform]) {
    println!("┌──────────────────────────────────────────────┐");
    println!("│  montepi Forge: Hardware Inventory           │");
    println!("├──────────────────────────────────────────────┤");
    println!("│ host: {cpu}");
    if let Some(cores) = cpu.properties.core_count {
        let threads = cpu.properties.thread_count.unwrap_or(cores);
        println!("│    cores:   {cores} ({threads} threads)");
    }
    println!("│");

    for platform in platforms {
        println!("│ platform: {}", platform.name);
        for s in &platform.devices {
            let idx = s.identity.adapter_index.unwrap_or_default();
            println!("│  {idx}: {s}");
            if let Some(ref pci) = s.identity.pci_id {
                println!("│    pci:     {pci}");
            }
            if let Some(binding) = s.properties.max_storage_binding_bytes {
                println!("│    binding: {} MB", binding / (1024 * 1024));
            }
            println!("│    caps:    {}", s.capability_summary());
        }
        println!("│");
    }

    let devices: Vec<&Substrate> = platforms.iter().flat_map(|p| &p.devices).collect();
    let gpu_count = devices
        .iter()
        .filter(|s| s.kind == SubstrateKind::Gpu)
        .count();
    let sw_count = devices.len() - gpu_count;
    println!(
        "│  Total: {} platform(s), {gpu_count} GPU(s), {sw_count} software adapter(s)",
        platforms.len()
    );
    println!("└──────────────────────────────────────────────┘");
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::substrate::{Capability, Identity, Properties};

    fn adapter(name: &str, backend: &str, index: usize) -> Substrate {
        Substrate {
            kind: SubstrateKind::Gpu,
            identity: Identity {
                backend: Some(backend.to_string()),
                adapter_index: Some(index),
                ..Identity::named(name)
            },
            properties: Properties::default(),
            capabilities: vec![Capability::ShaderDispatch],
        }
    }

    #[test]
    fn grouping_preserves_platform_then_device_order() {
        let subs = vec![
            adapter("a", "Vulkan", 0),
            adapter("b", "Gl", 1),
            adapter("c", "Vulkan", 2),
        ];
        let platforms = group_by_platform(subs);
        assert_eq!(platforms.len(), 2);
        assert_eq!(platforms[0].name, "Vulkan");
        let names: Vec<&str> = platforms[0]
            .devices
            .iter()
            .map(|s| s.identity.name.as_str())
            .collect();
        assert_eq!(names, ["a", "c"]);
        assert_eq!(platforms[1].name, "Gl");
        assert_eq!(platforms[1].devices[0].identity.name, "b");
    }

    #[test]
    fn grouping_drops_host_cpu() {
        let mut subs = vec![crate::probe::probe_cpu()];
        subs.push(adapter("gpu", "Metal", 0));
        let platforms = group_by_platform(subs);
        assert_eq!(platforms.len(), 1);
        assert_eq!(platforms[0].devices.len(), 1);
    }

    #[test]
    fn no_adapters_means_no_platforms() {
        assert!(group_by_platform(Vec::new()).is_empty());
    }
}
