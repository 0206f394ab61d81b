//! Semi-Lagrangian advection
//!
//! Each cell traces back along the velocity at its centre and takes the
//! bilinearly interpolated value found there. Velocities are in domain
//! heights per second, so the backtrace in cells is `v * dt * ny`.

use super::fields::sample_bilinear;
use super::store::{FieldId, Slot};
use super::r#trait::FluidSolver;
use crate::error::Result;
use rayon::prelude::*;

/// CPU implementation of advection
///
/// # Arguments
///
/// * `velocity` - Two-channel velocity used for the backtrace
/// * `input` - Field being transported
/// * `output` - Transported field
/// * `width`, `height`, `channels` - Layout of `input` and `output`
/// * `dt` - Timestep in seconds
pub fn advect_cpu(
    velocity: &[f32],
    input: &[f32],
    output: &mut [f32],
    width: usize,
    height: usize,
    channels: usize,
    dt: f32,
) {
    let scale = dt * height as f32;
    let row_len = width * channels;

    output
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                let v = (y * width + x) * 2;
                let sx = x as f32 - velocity[v] * scale;
                let sy = y as f32 - velocity[v + 1] * scale;
                for c in 0..channels {
                    row[x * channels + c] =
                        sample_bilinear(input, width, height, channels, c, sx, sy);
                }
            }
        });
}

/// Advect the `Next` generation of a scalar field by the current velocity
///
/// `Next` is first copied into the field's advection source generation so the
/// kernel never reads what it writes.
///
/// # Errors
///
/// Propagates kernel errors from the solver.
pub fn advect_field(solver: &mut dyn FluidSolver, field: FieldId, dt: f32) -> Result<()> {
    let source = field.advection_source();
    solver.copy(field, Slot::Next, source)?;
    solver.advect(field, source, Slot::Next, Slot::Current, dt)
}

/// Self-advect the `Next` velocity generation
///
/// The copy in `Aux` is both the transported field and the velocity.
///
/// # Errors
///
/// Propagates kernel errors from the solver.
pub fn advect_velocity(solver: &mut dyn FluidSolver, dt: f32) -> Result<()> {
    solver.copy(FieldId::Velocity, Slot::Next, Slot::Aux)?;
    solver.advect(FieldId::Velocity, Slot::Aux, Slot::Next, Slot::Aux, dt)
}
