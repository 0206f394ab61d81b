//! Implicit diffusion by Jacobi relaxation
//!
//! Solves `(1 + 4a) x - a * sum(neighbours(x)) = x0` with
//! `a = dt * k * R^2`, where `R` is the grid resolution. Neighbours outside
//! the grid are clamped to the edge cell.

use super::store::{FieldId, Slot};
use super::r#trait::FluidSolver;
use crate::error::Result;
use rayon::prelude::*;

/// Jacobi iteration pairs per diffusion solve
pub const DIFFUSION_ITERATIONS: usize = 10;

/// Coefficients of one diffusion solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffusionCoefficients {
    pub alpha: f32,
    /// `1 / (1 + 4 * alpha)`
    pub beta: f32,
}

impl DiffusionCoefficients {
    /// # Arguments
    ///
    /// * `dt` - Timestep in seconds
    /// * `rate` - Diffusion rate `k`
    /// * `resolution` - Grid resolution `R`
    #[must_use]
    pub fn new(dt: f32, rate: f32, resolution: usize) -> Self {
        let r = resolution as f32;
        let alpha = dt * rate * r * r;
        Self {
            alpha,
            beta: 1.0 / (1.0 + 4.0 * alpha),
        }
    }
}

/// CPU implementation of one diffusion sweep
///
/// `out = (x0 + alpha * (l + r + d + u)) * beta` for every cell and channel.
///
/// # Arguments
///
/// * `initial` - Right-hand side `x0`
/// * `read` - Estimate whose neighbours are summed
/// * `out` - New estimate
/// * `width`, `height`, `channels` - Field layout
/// * `coefficients` - Solve coefficients
pub fn diffuse_sweep_cpu(
    initial: &[f32],
    read: &[f32],
    out: &mut [f32],
    width: usize,
    height: usize,
    channels: usize,
    coefficients: DiffusionCoefficients,
) {
    let DiffusionCoefficients { alpha, beta } = coefficients;
    let row_len = width * channels;

    out.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
        let down = y.saturating_sub(1);
        let up = (y + 1).min(height - 1);
        for x in 0..width {
            let left = x.saturating_sub(1);
            let right = (x + 1).min(width - 1);
            for c in 0..channels {
                let at = |cx: usize, cy: usize| read[cy * row_len + cx * channels + c];
                let sum = at(left, y) + at(right, y) + at(x, down) + at(x, up);
                let i = x * channels + c;
                row[i] = (initial[y * row_len + i] + alpha * sum) * beta;
            }
        }
    });
}

/// Diffuse the `Next` generation of `field` in place
///
/// The source-added field in `Next` becomes both the right-hand side (copied
/// to `Current`) and the initial guess. Sweeps alternate `Next -> Scratch`
/// and `Scratch -> Next`, so the result ends up in `Next`.
///
/// # Errors
///
/// Propagates kernel errors from the solver.
pub fn diffuse(
    solver: &mut dyn FluidSolver,
    field: FieldId,
    coefficients: DiffusionCoefficients,
) -> Result<()> {
    solver.copy(field, Slot::Next, Slot::Current)?;
    solver.copy(field, Slot::Next, Slot::Scratch)?;
    for _ in 0..DIFFUSION_ITERATIONS {
        solver.diffuse_sweep(field, Slot::Current, Slot::Next, Slot::Scratch, coefficients)?;
        solver.diffuse_sweep(field, Slot::Current, Slot::Scratch, Slot::Next, coefficients)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spike(n: usize) -> Vec<f32> {
        let mut field = vec![0.0; n * n];
        field[(n / 2) * n + n / 2] = 1.0;
        field
    }

    fn second_moment(field: &[f32], n: usize) -> f32 {
        let c = (n / 2) as f32;
        field
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let dx = (i % n) as f32 - c;
                let dy = (i / n) as f32 - c;
                v * (dx * dx + dy * dy)
            })
            .sum::<f32>()
            / field.iter().sum::<f32>()
    }

    fn solve(x0: &[f32], n: usize, coefficients: DiffusionCoefficients) -> Vec<f32> {
        let mut a = x0.to_vec();
        let mut b = x0.to_vec();
        for _ in 0..DIFFUSION_ITERATIONS {
            diffuse_sweep_cpu(x0, &a, &mut b, n, n, 1, coefficients);
            diffuse_sweep_cpu(x0, &b, &mut a, n, n, 1, coefficients);
        }
        a
    }

    #[test]
    fn test_coefficients() {
        let c = DiffusionCoefficients::new(0.1, 0.01, 10);
        assert_relative_eq!(c.alpha, 0.1, epsilon = 1e-6);
        assert_relative_eq!(c.beta, 1.0 / 1.4, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_rate_returns_initial() {
        let x0: Vec<f32> = (0..64).map(|i| (i % 7) as f32).collect();
        let result = solve(&x0, 8, DiffusionCoefficients::new(0.1, 0.0, 8));
        assert_eq!(result, x0);
    }

    #[test]
    fn test_uniform_field_is_fixed_point() {
        let x0 = vec![0.75; 16 * 16];
        let result = solve(&x0, 16, DiffusionCoefficients::new(0.016, 0.01, 16));
        for v in result {
            assert_relative_eq!(v, 0.75, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_spike_spreads_monotonically() {
        let n = 33;
        let coefficients = DiffusionCoefficients::new(0.016, 0.02, n);
        let x0 = spike(n);
        let once = solve(&x0, n, coefficients);
        let twice = solve(&once, n, coefficients);

        let peak = |f: &[f32]| f[(n / 2) * n + n / 2];
        assert!(peak(&once) < peak(&x0));
        assert!(peak(&twice) < peak(&once));
        assert!(second_moment(&once, n) > second_moment(&x0, n));
        assert!(second_moment(&twice, n) > second_moment(&once, n));
        assert!(once.iter().all(|&v| v >= 0.0));
    }
}
