// SPDX-License-Identifier: AGPL-3.0-only

//! Discover and print every compute platform and device on this machine,
//! plus which montepi transfer modes each device can run.

use montepi_forge::inventory;
use montepi_forge::probe;
use montepi_forge::substrate::Capability;

fn main() {
    env_logger::init();

    let cpu = probe::probe_cpu();
    let platforms = inventory::discover_platforms();
    inventory::print_inventory(&cpu, &platforms);

    println!();
    println!("═══ Transfer Modes ═════════════════════════════════════════");
    for platform in &platforms {
        for s in &platform.devices {
            let zero_copy = if s.has(&Capability::MappablePrimaryBuffers) {
                "mapped"
            } else {
                "copy only"
            };
            let timing = if s.has(&Capability::TimestampQuery) {
                "device timestamps"
            } else {
                "host wall clock"
            };
            println!(
                "  {:40} {:>6} → {zero_copy}, {timing}",
                s.identity.name, platform.name
            );
        }
    }
    if platforms.is_empty() {
        println!("  (no adapters: only the CPU baseline can run)");
    }
}
