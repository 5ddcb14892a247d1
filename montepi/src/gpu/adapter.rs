// SPDX-License-Identifier: AGPL-3.0-only

//! Adapter lookup and feature/limit negotiation.
//!
//! Adapters are addressed by the enumeration index the forge probe
//! recorded, against an instance built the same way.

use crate::error::{BenchError, Result};

/// Optional features the benchmark uses when present.
const OPTIONAL_FEATURES: wgpu::Features = wgpu::Features::TIMESTAMP_QUERY
    .union(wgpu::Features::MAPPABLE_PRIMARY_BUFFERS);

/// Re-enumerate adapters and take the one at `index`.
///
/// # Errors
///
/// Returns [`BenchError::NoAdapter`] if no adapter sits at `index`.
pub fn select_adapter(index: usize) -> Result<wgpu::Adapter> {
    let instance = montepi_forge::probe::create_instance();
    let adapter = montepi_forge::probe::enumerate(&instance)
        .into_iter()
        .nth(index)
        .ok_or(BenchError::NoAdapter)?;
    log::debug!("selected adapter {index}: {}", adapter.get_info().name);
    Ok(adapter)
}

/// Features to request from an adapter offering `available`.
#[must_use]
pub fn features_to_request(available: wgpu::Features) -> wgpu::Features {
    available.intersection(OPTIONAL_FEATURES)
}

/// Limits to request: the adapter's own storage and buffer maxima on top
/// of the downlevel baseline, so large sample buffers bind where the
/// hardware allows it.
pub(super) fn limits_to_request(adapter_limits: &wgpu::Limits) -> wgpu::Limits {
    wgpu::Limits {
        max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
        max_buffer_size: adapter_limits.max_buffer_size,
        max_compute_workgroups_per_dimension: adapter_limits
            .max_compute_workgroups_per_dimension,
        ..wgpu::Limits::downlevel_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_only_offered_features() {
        let offered = wgpu::Features::TIMESTAMP_QUERY | wgpu::Features::SHADER_F64;
        let req = features_to_request(offered);
        assert!(req.contains(wgpu::Features::TIMESTAMP_QUERY));
        assert!(!req.contains(wgpu::Features::SHADER_F64));
        assert!(!req.contains(wgpu::Features::MAPPABLE_PRIMARY_BUFFERS));
    }

    #[test]
    fn nothing_offered_requests_nothing() {
        assert!(features_to_request(wgpu::Features::empty()).is_empty());
    }

    #[test]
    fn limits_carry_adapter_storage_maxima() {
        let adapter = wgpu::Limits {
            max_storage_buffer_binding_size: 1 << 30,
            max_buffer_size: 1 << 31,
            ..wgpu::Limits::default()
        };
        let req = limits_to_request(&adapter);
        assert_eq!(req.max_storage_buffer_binding_size, 1 << 30);
        assert_eq!(req.max_buffer_size, 1 << 31);
    }

    #[test]
    fn out_of_range_index_is_no_adapter() {
        assert!(matches!(select_adapter(usize::MAX), Err(BenchError::NoAdapter)));
    }
}
