// SPDX-License-Identifier: AGPL-3.0-only

//! wgpu device context for the π kernels.
//!
//! One [`GpuContext`] is opened per adapter and reused by every strategy
//! run on that adapter. Optional features are requested only when the
//! adapter offers them:
//!
//! | Feature | Used for |
//! |---------|----------|
//! | `TIMESTAMP_QUERY` | device-side kernel time |
//! | `MAPPABLE_PRIMARY_BUFFERS` | zero-copy storage buffers |
//!
//! ## Module structure
//!
//! - `adapter`: adapter lookup and feature/limit negotiation
//! - `buffers`: sample upload, partial-result buffers, mapped reads
//! - `dispatch`: bind groups, timed dispatch, workgroup splitting

mod adapter;
mod buffers;
mod dispatch;

pub use adapter::{features_to_request, select_adapter};
pub use buffers::mapped_bytes_to_u32;
pub use dispatch::{split_workgroups, DeviceTiming, Readback};

use crate::error::{BenchError, Result};
use crate::kernels::ENTRY_POINT;
use montepi_forge::substrate::Substrate;
use std::collections::HashMap;

/// Live device and queue for one adapter.
#[must_use]
pub struct GpuContext {
    pub adapter_name: String,
    pub backend: String,
    pub has_timestamps: bool,
    pub has_mappable_primary: bool,
    limits: wgpu::Limits,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

// ── Core accessors ───────────────────────────────────────────────────

impl GpuContext {
    #[must_use]
    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[must_use]
    pub const fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Limits granted at device creation.
    #[must_use]
    pub const fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    /// Largest buffer this device accepts as one storage binding.
    #[must_use]
    pub fn max_binding_bytes(&self) -> u64 {
        u64::from(self.limits.max_storage_buffer_binding_size).min(self.limits.max_buffer_size)
    }
}

// ── Constructor ──────────────────────────────────────────────────────

impl GpuContext {
    /// Open the adapter a probed substrate describes.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::NoAdapter`] if the substrate is not an adapter
    /// or the adapter has gone, and [`BenchError::DeviceCreation`] if the
    /// driver refuses the device.
    pub async fn new(substrate: &Substrate) -> Result<Self> {
        let index = substrate.identity.adapter_index.ok_or(BenchError::NoAdapter)?;
        let selected = adapter::select_adapter(index)?;
        Self::from_adapter(&selected).await
    }

    /// Open a device on an already-selected adapter.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::DeviceCreation`] if `request_device` fails.
    pub async fn from_adapter(selected: &wgpu::Adapter) -> Result<Self> {
        let adapter_info = selected.get_info();
        let required_features = adapter::features_to_request(selected.features());
        let required_limits = adapter::limits_to_request(&selected.limits());

        let (device, queue) = selected
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("montepi device"),
                    required_features,
                    required_limits: required_limits.clone(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| BenchError::DeviceCreation(e.to_string()))?;

        let adapter_name = adapter_info.name.clone();
        {
            let name = adapter_name.clone();
            device.on_uncaptured_error(Box::new(move |e| {
                log::error!("{name}: uncaptured wgpu error: {e}");
            }));
        }

        let ctx = Self {
            adapter_name,
            backend: format!("{:?}", adapter_info.backend),
            has_timestamps: required_features.contains(wgpu::Features::TIMESTAMP_QUERY),
            has_mappable_primary: required_features
                .contains(wgpu::Features::MAPPABLE_PRIMARY_BUFFERS),
            limits: required_limits,
            device,
            queue,
        };
        log::info!(
            "opened {} ({}), timestamps={}, mappable={}",
            ctx.adapter_name,
            ctx.backend,
            ctx.has_timestamps,
            ctx.has_mappable_primary
        );
        Ok(ctx)
    }

    /// Print device capabilities.
    pub fn print_info(&self) {
        println!("  GPU: {} ({})", self.adapter_name, self.backend);
        println!(
            "  TIMESTAMP_QUERY: {}",
            if self.has_timestamps { "YES" } else { "NO" }
        );
        println!(
            "  MAPPABLE_PRIMARY_BUFFERS: {}",
            if self.has_mappable_primary { "YES" } else { "NO" }
        );
        println!("  max binding: {} MB", self.max_binding_bytes() / (1024 * 1024));
    }
}

// ── Pipeline creation ────────────────────────────────────────────────

impl GpuContext {
    /// Compile `wgsl` and build its compute pipeline.
    ///
    /// Shader and pipeline creation run inside a validation error scope
    /// that is awaited once. On failure the compiler's messages are
    /// collected into [`BenchError::Compilation`] and logged with the
    /// device name.
    ///
    /// `constants` sets pipeline-overridable constants by name; every
    /// name must be declared by the shader.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Compilation`] if the shader or pipeline fails
    /// validation.
    pub async fn build_pipeline(
        &self,
        wgsl: &str,
        label: &str,
        constants: &HashMap<String, f64>,
    ) -> Result<wgpu::ComputePipeline> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader_module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(wgsl.into()),
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module: &shader_module,
                entry_point: ENTRY_POINT,
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants,
                    ..Default::default()
                },
                cache: None,
            });

        if let Some(err) = self.device.pop_error_scope().await {
            let info = shader_module.get_compilation_info().await;
            let log = compilation_log(&info, &err);
            log::error!("{label} failed to build on {}:\n{log}", self.adapter_name);
            return Err(BenchError::Compilation {
                kernel: label.to_string(),
                device: self.adapter_name.clone(),
                log,
            });
        }
        Ok(pipeline)
    }
}

// ── Run error scopes ─────────────────────────────────────────────────

impl GpuContext {
    /// Capture out-of-memory and validation errors from everything issued
    /// until [`Self::pop_run_scopes`].
    ///
    /// Every push must be followed by exactly one pop, including on error
    /// paths, or later scopes on this device pair up wrongly.
    pub fn push_run_scopes(&self) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
    }

    /// Pop both scopes opened by [`Self::push_run_scopes`].
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::GpuCompute`] if any buffer, bind group or
    /// submission inside the scopes failed.
    pub async fn pop_run_scopes(&self) -> Result<()> {
        let validation = self.device.pop_error_scope().await;
        let oom = self.device.pop_error_scope().await;
        match validation.or(oom) {
            None => Ok(()),
            Some(e) => {
                log::warn!("{}: {e}", self.adapter_name);
                Err(BenchError::GpuCompute(e.to_string()))
            }
        }
    }
}

/// Render compiler messages, one per line, followed by the validation
/// error itself.
fn compilation_log(info: &wgpu::CompilationInfo, err: &wgpu::Error) -> String {
    let mut lines: Vec<String> = info
        .messages
        .iter()
        .map(|m| {
            let kind = match m.message_type {
                wgpu::CompilationMessageType::Error => "error",
                wgpu::CompilationMessageType::Warning => "warning",
                wgpu::CompilationMessageType::Info => "info",
            };
            m.location.as_ref().map_or_else(
                || format!("{kind}: {}", m.message),
                |loc| {
                    format!(
                        "{kind}: {}:{}: {}",
                        loc.line_number, loc.line_position, m.message
                    )
                },
            )
        })
        .collect();
    lines.push(err.to_string());
    lines.join("\n")
}
