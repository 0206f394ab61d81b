//! Helmholtz projection onto divergence-free velocity
//!
//! Pressure generations are two-channel buffers of the velocity field holding
//! `(p, div)`. Setup computes the divergence with `p = 0`, relaxation iterates
//! Jacobi sweeps of `lap(p) = div` carrying `div` along, and finish subtracts
//! the pressure gradient. The result does not depend on the spacing `h` used,
//! as long as setup and finish use the same one.

use super::grid::GridGeometry;
use super::store::{FieldId, Slot};
use super::r#trait::FluidSolver;
use crate::error::Result;
use rayon::prelude::*;

/// Jacobi iteration pairs per pressure solve
pub const PROJECTION_ITERATIONS: usize = 10;

/// The two projections of a velocity update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionPass {
    /// Before self-advection, cell spacing `1 / ny`
    BeforeAdvection,
    /// After self-advection, spacing `ny`
    AfterAdvection,
}

impl ProjectionPass {
    #[must_use]
    pub fn spacing(self, geometry: &GridGeometry) -> f32 {
        match self {
            Self::BeforeAdvection => geometry.dx(),
            Self::AfterAdvection => geometry.height() as f32,
        }
    }
}

#[inline]
fn neighbours(x: usize, y: usize, width: usize, height: usize) -> (usize, usize, usize, usize) {
    (
        x.saturating_sub(1),
        (x + 1).min(width - 1),
        y.saturating_sub(1),
        (y + 1).min(height - 1),
    )
}

/// CPU implementation of projection setup
///
/// Writes `(0, div)` with `div = -0.5 * h * (du/dx + dv/dy)` from central
/// differences of clamped neighbours.
pub fn projection_setup_cpu(velocity: &[f32], out: &mut [f32], width: usize, height: usize, h: f32) {
    out.par_chunks_mut(width * 2).enumerate().for_each(|(y, row)| {
        for x in 0..width {
            let (l, r, d, u) = neighbours(x, y, width, height);
            let vx = |cx: usize| velocity[(y * width + cx) * 2];
            let vy = |cy: usize| velocity[(cy * width + x) * 2 + 1];
            row[x * 2] = 0.0;
            row[x * 2 + 1] = -0.5 * h * (vx(r) - vx(l) + vy(u) - vy(d));
        }
    });
}

/// CPU implementation of one pressure relaxation sweep
///
/// `p = (div + p_l + p_r + p_d + p_u) / 4`, `div` copied through.
pub fn projection_relax_cpu(read: &[f32], out: &mut [f32], width: usize, height: usize) {
    out.par_chunks_mut(width * 2).enumerate().for_each(|(y, row)| {
        for x in 0..width {
            let (l, r, d, u) = neighbours(x, y, width, height);
            let p = |cx: usize, cy: usize| read[(cy * width + cx) * 2];
            let div = read[(y * width + x) * 2 + 1];
            row[x * 2] = (div + p(l, y) + p(r, y) + p(x, d) + p(x, u)) * 0.25;
            row[x * 2 + 1] = div;
        }
    });
}

/// CPU implementation of projection finish
///
/// `v - 0.5 * grad(p) / h` with central differences of clamped neighbours.
pub fn projection_finish_cpu(
    pressure: &[f32],
    velocity: &[f32],
    out: &mut [f32],
    width: usize,
    height: usize,
    h: f32,
) {
    out.par_chunks_mut(width * 2).enumerate().for_each(|(y, row)| {
        for x in 0..width {
            let (l, r, d, u) = neighbours(x, y, width, height);
            let p = |cx: usize, cy: usize| pressure[(cy * width + cx) * 2];
            let i = (y * width + x) * 2;
            row[x * 2] = velocity[i] - 0.5 * (p(r, y) - p(l, y)) / h;
            row[x * 2 + 1] = velocity[i + 1] - 0.5 * (p(x, u) - p(x, d)) / h;
        }
    });
}

/// Project the `Next` velocity generation
///
/// Pressure ping-pongs between `Scratch` and `Current`; `Current` is free
/// during the velocity update because rotation overwrites it. The corrected
/// velocity is written to `Aux` and installed into `Next` by a role swap.
///
/// # Errors
///
/// Propagates kernel errors from the solver.
pub fn project(solver: &mut dyn FluidSolver, pass: ProjectionPass) -> Result<()> {
    let h = pass.spacing(&solver.geometry());
    solver.projection_setup(Slot::Next, Slot::Scratch, h)?;
    for _ in 0..PROJECTION_ITERATIONS {
        solver.projection_relax(Slot::Scratch, Slot::Current)?;
        solver.projection_relax(Slot::Current, Slot::Scratch)?;
    }
    solver.projection_finish(Slot::Scratch, Slot::Next, Slot::Aux, h)?;
    solver.swap_slots(FieldId::Velocity, Slot::Next, Slot::Aux)
}

/// Sum of squared central-difference divergence over interior cells
#[must_use]
pub fn divergence_norm(velocity: &[f32], width: usize, height: usize) -> f64 {
    let mut total = 0.0;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let vx = |cx: usize| velocity[(y * width + cx) * 2];
            let vy = |cy: usize| velocity[(cy * width + x) * 2 + 1];
            let div = f64::from(vx(x + 1) - vx(x - 1) + vy(y + 1) - vy(y - 1));
            total += div * div;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn project_cpu(velocity: &[f32], n: usize, h: f32) -> Vec<f32> {
        let mut a = vec![0.0; n * n * 2];
        let mut b = vec![0.0; n * n * 2];
        projection_setup_cpu(velocity, &mut a, n, n, h);
        for _ in 0..PROJECTION_ITERATIONS {
            projection_relax_cpu(&a, &mut b, n, n);
            projection_relax_cpu(&b, &mut a, n, n);
        }
        let mut out = vec![0.0; n * n * 2];
        projection_finish_cpu(&a, velocity, &mut out, n, n, h);
        out
    }

    fn vortex(n: usize) -> Vec<f32> {
        let c = n as f32 / 2.0;
        (0..n * n)
            .flat_map(|i| {
                let px = ((i % n) as f32 + 0.5 - c) / n as f32;
                let py = ((i / n) as f32 + 0.5 - c) / n as f32;
                [-py, px]
            })
            .collect()
    }

    fn radial_blob(n: usize) -> Vec<f32> {
        let c = n as f32 / 2.0;
        (0..n * n)
            .flat_map(|i| {
                let dx = (i % n) as f32 + 0.5 - c;
                let dy = (i / n) as f32 + 0.5 - c;
                let w = (-(dx * dx + dy * dy) / 8.0).exp();
                [dx * w, dy * w]
            })
            .collect()
    }

    #[test]
    fn test_divergence_free_field_is_unchanged() {
        let n = 32;
        let field = vortex(n);
        let once = project_cpu(&field, n, 1.0 / n as f32);
        assert_eq!(once, field);
        let twice = project_cpu(&once, n, n as f32);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_divergence_is_reduced() {
        let n = 32;
        let field = radial_blob(n);
        let before = divergence_norm(&field, n, n);
        let after = divergence_norm(&project_cpu(&field, n, 1.0 / n as f32), n, n);
        assert!(before > 0.0);
        assert!(after < 0.75 * before, "before {before}, after {after}");
    }

    #[test]
    fn test_result_is_independent_of_spacing() {
        let n = 16;
        let field = radial_blob(n);
        let small = project_cpu(&field, n, 1.0 / n as f32);
        let large = project_cpu(&field, n, n as f32);
        for (a, b) in small.iter().zip(&large) {
            assert_relative_eq!(a, b, epsilon = 1e-4, max_relative = 1e-3);
        }
    }

    #[test]
    fn test_pass_spacing() {
        let geometry = GridGeometry::from_dimensions(64, 32).unwrap();
        assert_relative_eq!(ProjectionPass::BeforeAdvection.spacing(&geometry), 1.0 / 32.0);
        assert_relative_eq!(ProjectionPass::AfterAdvection.spacing(&geometry), 32.0);
    }
}
