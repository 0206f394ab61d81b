//! GPU context and initialization
//!
//! This module handles GPU device initialization and capability detection.
//! It distinguishes between "no GPU found" (expected on some systems) and
//! "GPU found but failed to initialize" (potential driver issue).

/// Result of GPU initialization attempt
#[derive(Debug)]
pub enum GpuInitResult {
    /// GPU initialized successfully
    #[cfg(feature = "gpu")]
    Success(GpuContext),
    /// No GPU adapter found (silent fallback to CPU)
    NoGpuFound,
    /// GPU found but initialization failed (log warning, fallback to CPU)
    InitFailed {
        /// Name of the adapter that failed
        adapter_name: String,
        /// Error message
        error: String,
    },
}

// All GPU-specific code is conditionally compiled only when "gpu" feature is enabled
#[cfg(feature = "gpu")]
mod gpu_impl {
    use super::GpuInitResult;
    use crate::solver::store::FieldId;
    use tracing::{debug, info};

    /// GPU context managing device and queue
    ///
    /// Wraps wgpu device and queue along with adapter information.
    #[derive(Debug)]
    pub struct GpuContext {
        device: wgpu::Device,
        queue: wgpu::Queue,
        adapter_info: wgpu::AdapterInfo,
    }

    impl GpuContext {
        /// Initialize GPU context
        ///
        /// # Returns
        ///
        /// - `GpuInitResult::Success` - GPU ready to use
        /// - `GpuInitResult::NoGpuFound` - No compatible GPU adapter
        /// - `GpuInitResult::InitFailed` - GPU found but initialization failed
        #[allow(clippy::new_ret_no_self)]
        pub fn new() -> GpuInitResult {
            info!("Attempting to initialize GPU context");

            let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            let adapter = if let Some(a) =
                pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })) {
                debug!("Found GPU adapter: {}", a.get_info().name);
                a
            } else {
                debug!("No GPU adapter found");
                return GpuInitResult::NoGpuFound;
            };

            let adapter_info = adapter.get_info();
            let adapter_name = adapter_info.name.clone();

            // Device creation can fail even with a valid adapter
            match pollster::block_on(adapter.request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("FluidSim GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )) {
                Ok((device, queue)) => {
                    info!("GPU context initialized successfully: {}", adapter_name);
                    GpuInitResult::Success(Self {
                        device,
                        queue,
                        adapter_info,
                    })
                }
                Err(e) => {
                    debug!("Failed to create GPU device: {}", e);
                    GpuInitResult::InitFailed {
                        adapter_name,
                        error: e.to_string(),
                    }
                }
            }
        }

        /// Get adapter name for logging
        #[must_use]
        pub fn adapter_name(&self) -> &str {
            &self.adapter_info.name
        }

        /// Check if the device can hold every generation of every field
        ///
        /// # Arguments
        ///
        /// * `width` - Grid width in cells
        /// * `height` - Grid height in cells
        ///
        /// # Returns
        ///
        /// `true` if each buffer fits the device limits and the total stays
        /// under half the maximum buffer size
        #[must_use]
        pub fn can_allocate(&self, width: u32, height: u32) -> bool {
            let cells = u64::from(width) * u64::from(height);
            let floats_per_cell: u64 = FieldId::ALL
                .iter()
                .map(|f| (f.generations() * f.channels()) as u64)
                .sum();
            let largest_buffer = cells * 2 * 4;
            let estimated_bytes = cells * floats_per_cell * 4;

            let limits = self.device.limits();
            largest_buffer <= u64::from(limits.max_storage_buffer_binding_size)
                && estimated_bytes < limits.max_buffer_size / 2
        }

        #[must_use]
        pub fn device(&self) -> &wgpu::Device {
            &self.device
        }

        #[must_use]
        pub fn queue(&self) -> &wgpu::Queue {
            &self.queue
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_gpu_init_returns_valid_result() {
            // Which variant comes back depends on the machine
            match GpuContext::new() {
                GpuInitResult::Success(ctx) => {
                    assert!(!ctx.adapter_name().is_empty());
                }
                GpuInitResult::NoGpuFound => {}
                GpuInitResult::InitFailed {
                    adapter_name,
                    error,
                } => {
                    assert!(!adapter_name.is_empty());
                    assert!(!error.is_empty());
                }
            }
        }

        #[test]
        fn test_can_allocate() {
            if let GpuInitResult::Success(ctx) = GpuContext::new() {
                assert!(ctx.can_allocate(256, 256));
                assert!(!ctx.can_allocate(16384, 16384));
            }
        }
    }
}

#[cfg(feature = "gpu")]
pub use gpu_impl::GpuContext;
