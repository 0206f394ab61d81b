//! Fluid solver trait definition
//!
//! This module defines the `FluidSolver` trait, the backend-agnostic set of
//! kernels the stage drivers are composed from. Every kernel names its input
//! and output generations explicitly; implementations validate them against
//! the field store before doing any work.

use super::diffusion::DiffusionCoefficients;
use super::grid::GridGeometry;
use super::pyrolysis::PyrolysisParams;
use super::source::{BuoyancyParams, SourceStamp};
use super::store::{FieldId, Rotation, Slot};
use crate::config::VelocitySeed;
use crate::error::Result;
use std::borrow::Cow;

/// Backend-agnostic interface for Stable Fluids kernels
///
/// Each call completes before the next one starts. All kernels fully
/// overwrite their output generation.
///
/// # Errors
///
/// Every kernel fails with an invariant error if an input generation was
/// never written, a slot does not exist for the field, or the output aliases
/// an input. GPU implementations also report device errors.
pub trait FluidSolver: Send + Sync {
    /// Grid the solver was allocated for
    fn geometry(&self) -> GridGeometry;

    /// Check if this solver is using GPU acceleration
    fn is_gpu_accelerated(&self) -> bool;

    /// Write the initial velocity into the `Current` and `Next` generations
    fn seed_velocity(&mut self, seed: &VelocitySeed) -> Result<()>;

    /// Overwrite one generation with host data
    ///
    /// # Arguments
    ///
    /// * `field` - Target field
    /// * `slot` - Target generation
    /// * `data` - Interleaved values, `cell_count * channels` long
    fn upload(&mut self, field: FieldId, slot: Slot, data: &[f32]) -> Result<()>;

    /// Read one generation back to the host
    ///
    /// # Returns
    ///
    /// Interleaved values in row-major order. CPU solvers borrow, GPU solvers
    /// return an owned copy.
    fn read(&self, field: FieldId, slot: Slot) -> Result<Cow<'_, [f32]>>;

    /// Copy generation `from` into generation `to` of the same field
    fn copy(&mut self, field: FieldId, from: Slot, to: Slot) -> Result<()>;

    /// Exchange the roles of two generations without moving data
    fn swap_slots(&mut self, field: FieldId, a: Slot, b: Slot) -> Result<()>;

    /// Add a radially weighted source to `input`, writing `output`
    fn add_source(
        &mut self,
        field: FieldId,
        input: Slot,
        output: Slot,
        stamp: &SourceStamp,
    ) -> Result<()>;

    /// Accelerate velocity `input` by temperature buoyancy, writing `output`
    ///
    /// # Arguments
    ///
    /// * `temperature` - Temperature generation driving the lift
    fn apply_buoyancy(
        &mut self,
        input: Slot,
        output: Slot,
        temperature: Slot,
        params: &BuoyancyParams,
    ) -> Result<()>;

    /// One Jacobi sweep of implicit diffusion
    ///
    /// # Arguments
    ///
    /// * `initial` - Right-hand side `x0`
    /// * `read` - Current estimate whose neighbours are averaged
    /// * `write` - Next estimate
    fn diffuse_sweep(
        &mut self,
        field: FieldId,
        initial: Slot,
        read: Slot,
        write: Slot,
        coefficients: DiffusionCoefficients,
    ) -> Result<()>;

    /// Semi-Lagrangian advection of `field` by velocity generation `velocity`
    fn advect(
        &mut self,
        field: FieldId,
        input: Slot,
        output: Slot,
        velocity: Slot,
        dt: f32,
    ) -> Result<()>;

    /// Compute the divergence of velocity `input` into `output` with zero pressure
    fn projection_setup(&mut self, input: Slot, output: Slot, h: f32) -> Result<()>;

    /// One Jacobi sweep of the pressure Poisson equation
    fn projection_relax(&mut self, read: Slot, write: Slot) -> Result<()>;

    /// Subtract the pressure gradient of `pressure` from `velocity`, writing `output`
    fn projection_finish(
        &mut self,
        pressure: Slot,
        velocity: Slot,
        output: Slot,
        h: f32,
    ) -> Result<()>;

    /// Convert solid fuel to gas in one pass
    ///
    /// # Arguments
    ///
    /// * `temperature` - Temperature generation gating the reaction
    /// * `solid` - (input, output) generations of fuel solid
    /// * `gas` - (input, output) generations of fuel gas
    fn pyrolysis(
        &mut self,
        temperature: Slot,
        solid: (Slot, Slot),
        gas: (Slot, Slot),
        params: &PyrolysisParams,
    ) -> Result<()>;

    /// Pack fuel solid and gas into the display composite
    fn composite_fuel(&mut self, solid: Slot, gas: Slot) -> Result<()>;

    /// Make `Next` the current generation according to the field's rotation
    fn rotate(&mut self, field: FieldId) -> Result<()> {
        match field.rotation() {
            Rotation::Swap => self.swap_slots(field, Slot::Current, Slot::Next),
            Rotation::Copy => self.copy(field, Slot::Next, Slot::Current),
            Rotation::Static => Ok(()),
        }
    }
}
