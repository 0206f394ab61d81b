//! Per-tick stage order
//!
//! Scalars are injected, diffused and advected by the velocity that was
//! current at tick start. Velocity runs last: inject, optional buoyancy,
//! diffuse, project, self-advect, project. Rotation at the end makes every
//! `Next` generation current at once.

use super::input::{EditMode, TickInput};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::solver::{
    advect_field, advect_velocity, diffuse, project, BuoyancyParams, DiffusionCoefficients,
    FieldId, FluidSolver, ProfilerScope, ProjectionPass, PyrolysisParams, Slot, SourceStamp,
};
use nalgebra::Vector2;

/// Source stamps derived from one tick's input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSources {
    pub temperature: SourceStamp,
    pub fuel: SourceStamp,
    pub density: SourceStamp,
    pub force: SourceStamp,
}

impl TickSources {
    /// Stamps that add nothing
    #[must_use]
    pub fn none() -> Self {
        Self {
            temperature: SourceStamp::inactive(),
            fuel: SourceStamp::inactive(),
            density: SourceStamp::inactive(),
            force: SourceStamp::inactive(),
        }
    }

    /// Decide what this tick injects
    ///
    /// The primary button injects the quantity of the edit mode at the
    /// pointer. Force follows the pointer motion since the previous tick and
    /// is applied with the secondary button, or the primary one in
    /// [`EditMode::Velocity`].
    #[must_use]
    pub fn from_input(
        config: &SimulationConfig,
        input: &TickInput,
        previous_pointer: Option<Vector2<f32>>,
    ) -> Self {
        let mut sources = Self::none();
        let Some(pointer) = input.pointer else {
            return sources;
        };

        let scalar = |strength| {
            SourceStamp::scalar(pointer, config.source_distance, strength, config.falloff)
        };
        if input.buttons.primary {
            match input.mode {
                EditMode::Temperature => sources.temperature = scalar(config.temperature_strength),
                EditMode::Fuel => sources.fuel = scalar(config.source_strength),
                EditMode::Density => sources.density = scalar(config.source_strength),
                EditMode::Velocity => {}
            }
        }

        let pushing = input.buttons.secondary
            || (input.buttons.primary && input.mode == EditMode::Velocity);
        if let (true, Some(previous)) = (pushing, previous_pointer) {
            sources.force = SourceStamp {
                origin: pointer,
                falloff_distance: config.force_distance,
                strength: (pointer - previous) * config.force_strength,
                kernel: config.falloff,
            };
        }
        sources
    }
}

/// Run every stage of one tick
///
/// # Errors
///
/// Propagates the first kernel error. The fields are left mid-tick in that
/// case and must not be trusted.
pub fn advance(
    solver: &mut dyn FluidSolver,
    config: &SimulationConfig,
    sources: &TickSources,
    dt: f32,
) -> Result<()> {
    let resolution = solver.geometry().width();
    let scalar_diffusion = DiffusionCoefficients::new(dt, config.diffusion_rate, resolution);

    update_scalar(
        solver,
        FieldId::Temperature,
        &sources.temperature,
        scalar_diffusion,
        dt,
    )?;
    update_fuel(
        solver,
        &sources.fuel,
        &PyrolysisParams::from_config(config, dt),
        scalar_diffusion,
        dt,
    )?;
    update_scalar(
        solver,
        FieldId::Density,
        &sources.density,
        scalar_diffusion,
        dt,
    )?;
    update_velocity(solver, config, &sources.force, dt)?;
    end_update(solver)
}

fn update_scalar(
    solver: &mut dyn FluidSolver,
    field: FieldId,
    stamp: &SourceStamp,
    coefficients: DiffusionCoefficients,
    dt: f32,
) -> Result<()> {
    let _scope = ProfilerScope::new(field.name());
    solver.add_source(field, Slot::Current, Slot::Next, stamp)?;
    diffuse(solver, field, coefficients)?;
    advect_field(solver, field, dt)
}

/// Solid fuel only receives sources and burns; the gas it releases moves
/// like any other scalar.
fn update_fuel(
    solver: &mut dyn FluidSolver,
    stamp: &SourceStamp,
    params: &PyrolysisParams,
    coefficients: DiffusionCoefficients,
    dt: f32,
) -> Result<()> {
    let _scope = ProfilerScope::new("fuel");
    solver.add_source(FieldId::FuelSolid, Slot::Current, Slot::Next, stamp)?;
    // Temperature `Next` holds this tick's temperature
    solver.pyrolysis(
        Slot::Next,
        (Slot::Next, Slot::Scratch),
        (Slot::Current, Slot::Next),
        params,
    )?;
    solver.swap_slots(FieldId::FuelSolid, Slot::Next, Slot::Scratch)?;
    diffuse(solver, FieldId::FuelGas, coefficients)?;
    advect_field(solver, FieldId::FuelGas, dt)?;
    solver.composite_fuel(Slot::Next, Slot::Next)
}

fn update_velocity(
    solver: &mut dyn FluidSolver,
    config: &SimulationConfig,
    force: &SourceStamp,
    dt: f32,
) -> Result<()> {
    let _scope = ProfilerScope::new("velocity");
    solver.add_source(FieldId::Velocity, Slot::Current, Slot::Next, force)?;

    if config.buoyancy != 0.0 {
        let params = BuoyancyParams {
            coefficient: config.buoyancy,
            ambient: config.ambient_temperature,
            dt,
        };
        solver.apply_buoyancy(Slot::Next, Slot::Scratch, Slot::Next, &params)?;
        solver.swap_slots(FieldId::Velocity, Slot::Next, Slot::Scratch)?;
    }

    let resolution = solver.geometry().width();
    diffuse(
        solver,
        FieldId::Velocity,
        DiffusionCoefficients::new(dt, config.velocity_diffusion_rate, resolution),
    )?;
    project(solver, ProjectionPass::BeforeAdvection)?;
    advect_velocity(solver, dt)?;
    project(solver, ProjectionPass::AfterAdvection)
}

fn end_update(solver: &mut dyn FluidSolver) -> Result<()> {
    for field in FieldId::ALL {
        solver.rotate(field)?;
    }
    Ok(())
}
