//! C ABI for the fluid simulation
//!
//! Every function returns a [`FluidSimErrorCode`] and records a message
//! retrievable with `fluid_sim_get_last_error()` on failure. Instances are
//! opaque pointers created by `fluid_sim_new` and freed by
//! `fluid_sim_destroy`. The header `FluidSimFFI.h` is generated by cbindgen
//! at build time.

mod error;
mod helpers;
mod instance;
mod queries;
mod simulation;

pub use error::{fluid_sim_get_last_error, fluid_sim_get_last_error_code, FluidSimErrorCode};
pub use instance::{
    fluid_sim_configure, fluid_sim_default_config, fluid_sim_destroy, fluid_sim_get_config,
    fluid_sim_new, FluidSimBackend, FluidSimConfig, FluidSimFalloff, FluidSimInstance,
    FluidSimOverheatPolicy, FluidSimVelocitySeed,
};
pub use queries::{
    fluid_sim_get_dimensions, fluid_sim_get_field, fluid_sim_get_stats, fluid_sim_present,
    FluidSimField, FluidSimStats,
};
pub use simulation::{
    fluid_sim_pause, fluid_sim_resume, fluid_sim_set_initial_density, fluid_sim_tick,
    FluidSimEditMode, FluidSimInput,
};
