//! Fluid Simulation Core Library
//!
//! An interactive 2D Stable Fluids simulation. Density, temperature and fuel
//! are carried by an incompressible velocity field; solid fuel heated past a
//! threshold turns into gas.
//!
//! ## Per-tick pipeline
//!
//! Every transported quantity goes through the same three steps:
//! - Inject sources around the pointer
//! - Implicit diffusion by Jacobi relaxation
//! - Semi-Lagrangian advection along the velocity field
//!
//! Velocity is additionally projected onto its divergence-free part before
//! and after self-advection. All kernels run on the GPU via wgpu when one is
//! available and on the CPU via rayon otherwise.

pub mod config;
pub mod error;
pub mod simulation;
pub mod solver;

pub use config::{
    AspectRatio, FalloffKernel, OverheatPolicy, SimulationConfig, VelocitySeed,
};
pub use error::{Result, SimError};
pub use simulation::{
    EditMode, FieldComparison, FieldKind, ImageView, PointerButtons, Simulation, TickInput,
    TickOutcome,
};
pub use solver::{BackendPreference, FieldId, GridGeometry, Slot};
