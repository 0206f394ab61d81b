//! Stable Fluids solver module
//!
//! This module provides a unified GPU/CPU abstraction over the fluid kernels.
//! The core abstraction is the `FluidSolver` trait, which has both CPU and GPU
//! implementations. Stage drivers (`diffuse`, `advect_field`, `project`) are
//! written once against the trait.
//!
//! # Feature Flags
//!
//! - `gpu` (default): Enables GPU acceleration via wgpu. Disable with
//!   `--no-default-features` for environments without GPU access.
//!
//! # Backend Selection
//!
//! With [`BackendPreference::Auto`] the best available backend is used:
//! 1. Try GPU (if `gpu` feature enabled and hardware available)
//! 2. Fall back to CPU (always available)
//!
//! # Example
//!
//! ```rust,ignore
//! use fluid_sim_core::config::AspectRatio;
//! use fluid_sim_core::solver::{create_fluid_solver, BackendPreference, GridGeometry};
//!
//! let geometry = GridGeometry::new(256, AspectRatio::SQUARE)?;
//! let solver = create_fluid_solver(geometry, BackendPreference::Auto)?;
//! ```

pub mod advection;
mod context;
mod cpu;
pub mod diffusion;
mod fields;
mod grid;
pub mod profiler;
pub mod projection;
pub mod pyrolysis;
pub mod seed;
pub mod source;
mod store;
#[allow(clippy::module_name_repetitions)]
mod r#trait;

#[cfg(feature = "gpu")]
mod gpu;

// Re-exports
pub use advection::{advect_field, advect_velocity};
pub use context::GpuInitResult;
pub use cpu::CpuFluidSolver;
pub use diffusion::{diffuse, DiffusionCoefficients, DIFFUSION_ITERATIONS};
pub use fields::{sample_bilinear, FieldBuffer};
pub use grid::{GridGeometry, TILE_SIZE};
pub use profiler::{FrameTimer, ProfilerScope};
pub use projection::{project, ProjectionPass, PROJECTION_ITERATIONS};
pub use pyrolysis::PyrolysisParams;
pub use r#trait::FluidSolver;
pub use source::{BuoyancyParams, SourceStamp};
pub use store::{FieldId, FieldStore, Generations, Rotation, Slot};

#[cfg(feature = "gpu")]
pub use context::GpuContext;
#[cfg(feature = "gpu")]
pub use gpu::GpuFluidSolver;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

#[cfg(feature = "gpu")]
use tracing::warn;

/// Which backend the simulation should run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendPreference {
    /// GPU when available, CPU otherwise
    #[default]
    Auto,
    /// Always the CPU backend
    Cpu,
}

/// Create a fluid solver with automatic backend selection
///
/// # Arguments
///
/// * `geometry` - Grid the solver is allocated for
/// * `preference` - Whether the GPU may be used
///
/// # Returns
///
/// A boxed `FluidSolver` trait object using the best permitted backend,
/// with every field zero-filled
///
/// # Errors
///
/// Fails only if the CPU fallback cannot be created.
pub fn create_fluid_solver(
    geometry: GridGeometry,
    preference: BackendPreference,
) -> Result<Box<dyn FluidSolver>> {
    if preference == BackendPreference::Cpu {
        info!("CPU backend requested");
        return Ok(Box::new(CpuFluidSolver::new(geometry)?));
    }

    #[cfg(feature = "gpu")]
    {
        match GpuContext::new() {
            GpuInitResult::Success(gpu_context) => {
                let adapter_name = gpu_context.adapter_name().to_owned();
                match GpuFluidSolver::new(gpu_context, geometry) {
                    Ok(solver) => {
                        info!(
                            "Using GPU backend: {} ({}x{} grid)",
                            adapter_name,
                            geometry.width(),
                            geometry.height()
                        );
                        return Ok(Box::new(solver));
                    }
                    Err(e) => {
                        warn!("GPU '{}' cannot host the grid: {}. Falling back to CPU.", adapter_name, e);
                    }
                }
            }
            GpuInitResult::NoGpuFound => {
                info!("No GPU found, using CPU backend");
            }
            GpuInitResult::InitFailed {
                adapter_name,
                error,
            } => {
                warn!(
                    "GPU '{}' found but failed to initialize: {}. Falling back to CPU.",
                    adapter_name, error
                );
            }
        }
    }

    #[cfg(not(feature = "gpu"))]
    info!("GPU feature disabled, using CPU backend");

    Ok(Box::new(CpuFluidSolver::new(geometry)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AspectRatio;

    #[test]
    fn test_cpu_preference_is_honoured() {
        let geometry = GridGeometry::new(32, AspectRatio::SQUARE).unwrap();
        let solver = create_fluid_solver(geometry, BackendPreference::Cpu).unwrap();
        assert!(!solver.is_gpu_accelerated());
        assert_eq!(solver.geometry(), geometry);
    }

    #[test]
    fn test_auto_always_yields_a_solver() {
        let geometry = GridGeometry::new(16, AspectRatio::new(2, 1)).unwrap();
        let solver = create_fluid_solver(geometry, BackendPreference::Auto).unwrap();
        assert_eq!(solver.geometry().width(), 16);
        assert_eq!(solver.geometry().height(), 8);
    }
}
