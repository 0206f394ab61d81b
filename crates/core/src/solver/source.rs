//! Source injection and buoyancy
//!
//! Sources add a radially weighted amount around a point given in normalized
//! domain coordinates, where both axes run from -0.5 to 0.5. Distances are
//! measured in units of the domain height so a source stays round on
//! non-square grids.

use crate::config::FalloffKernel;
use nalgebra::Vector2;
use rayon::prelude::*;

/// One source application
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceStamp {
    /// Centre in normalized `[-0.5, 0.5]` coordinates
    pub origin: Vector2<f32>,
    /// Falloff coefficient `k`
    pub falloff_distance: f32,
    /// Amount added at the centre, per channel (`y` ignored for scalars)
    pub strength: Vector2<f32>,
    pub kernel: FalloffKernel,
}

impl SourceStamp {
    /// Scalar source with the same strength on every channel
    #[must_use]
    pub fn scalar(
        origin: Vector2<f32>,
        falloff_distance: f32,
        strength: f32,
        kernel: FalloffKernel,
    ) -> Self {
        Self {
            origin,
            falloff_distance,
            strength: Vector2::new(strength, strength),
            kernel,
        }
    }

    /// A stamp that adds nothing, used for channels with no input this tick
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            origin: Vector2::zeros(),
            falloff_distance: 0.0,
            strength: Vector2::zeros(),
            kernel: FalloffKernel::Exponential,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.strength != Vector2::zeros()
    }

    /// Weight at distance `d` from the origin
    #[inline]
    #[must_use]
    pub fn falloff(&self, d: f32) -> f32 {
        match self.kernel {
            FalloffKernel::Exponential => (-self.falloff_distance * d).exp(),
            FalloffKernel::Gaussian => (-self.falloff_distance * d * d).exp(),
        }
    }
}

/// Upward acceleration from temperature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuoyancyParams {
    /// Acceleration per degree above ambient
    pub coefficient: f32,
    pub ambient: f32,
    /// Timestep in seconds
    pub dt: f32,
}

/// Normalized position of the centre of cell `(x, y)`, x scaled to height units
#[inline]
pub(crate) fn cell_position(x: usize, y: usize, width: usize, height: usize) -> Vector2<f32> {
    let aspect = width as f32 / height as f32;
    Vector2::new(
        ((x as f32 + 0.5) / width as f32 - 0.5) * aspect,
        (y as f32 + 0.5) / height as f32 - 0.5,
    )
}

/// CPU implementation of source injection
///
/// `output = input + falloff(d) * strength` per channel. A zero strength
/// copies `input` bit for bit.
///
/// # Arguments
///
/// * `input` - Field before injection
/// * `output` - Field after injection
/// * `width` - Grid width in cells
/// * `height` - Grid height in cells
/// * `channels` - Values per cell (1 or 2)
/// * `stamp` - Source description
pub fn add_source_cpu(
    input: &[f32],
    output: &mut [f32],
    width: usize,
    height: usize,
    channels: usize,
    stamp: &SourceStamp,
) {
    if !stamp.is_active() {
        output.copy_from_slice(input);
        return;
    }

    let aspect = width as f32 / height as f32;
    let origin = Vector2::new(stamp.origin.x * aspect, stamp.origin.y);
    let row_len = width * channels;

    output
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                let d = (cell_position(x, y, width, height) - origin).norm();
                let weight = stamp.falloff(d);
                for c in 0..channels {
                    let i = x * channels + c;
                    row[i] = input[y * row_len + i] + weight * stamp.strength[c];
                }
            }
        });
}

/// CPU implementation of buoyancy
///
/// `v.y += coefficient * (T - ambient) * dt`, `v.x` unchanged.
///
/// # Arguments
///
/// * `velocity_in` - Two-channel velocity
/// * `temperature` - Scalar temperature
/// * `velocity_out` - Two-channel result
/// * `params` - Buoyancy parameters
pub fn buoyancy_cpu(
    velocity_in: &[f32],
    temperature: &[f32],
    velocity_out: &mut [f32],
    params: &BuoyancyParams,
) {
    velocity_out
        .par_chunks_mut(2)
        .zip(velocity_in.par_chunks(2))
        .zip(temperature.par_iter())
        .for_each(|((out, v), &t)| {
            out[0] = v[0];
            out[1] = v[1] + params.coefficient * (t - params.ambient) * params.dt;
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn centre_of(x: usize, y: usize, n: usize) -> Vector2<f32> {
        let n = n as f32;
        Vector2::new((x as f32 + 0.5) / n - 0.5, (y as f32 + 0.5) / n - 0.5)
    }

    #[test]
    fn test_inactive_stamp_is_exact_passthrough() {
        let input: Vec<f32> = (0..64).map(|i| i as f32 * 0.37).collect();
        let mut output = vec![0.0; 64];
        add_source_cpu(&input, &mut output, 8, 8, 1, &SourceStamp::inactive());
        assert_eq!(input, output);
    }

    #[test]
    fn test_peak_at_origin_cell() {
        let input = vec![0.0; 16 * 16];
        let mut output = vec![0.0; 16 * 16];
        let stamp = SourceStamp::scalar(centre_of(5, 9, 16), 5.0, 1.0, FalloffKernel::Exponential);
        add_source_cpu(&input, &mut output, 16, 16, 1, &stamp);

        assert_relative_eq!(output[9 * 16 + 5], 1.0, epsilon = 1e-6);
        let max = output.iter().copied().fold(f32::MIN, f32::max);
        assert_eq!(max, output[9 * 16 + 5]);
        assert!(output[9 * 16 + 6] < 1.0);
    }

    #[test]
    fn test_gaussian_falls_off_faster_far_away() {
        let stamp = |kernel| SourceStamp::scalar(Vector2::zeros(), 5.0, 1.0, kernel);
        let exp = stamp(FalloffKernel::Exponential);
        let gauss = stamp(FalloffKernel::Gaussian);
        // Gaussian is wider near the centre and narrower beyond d = 1
        assert!(gauss.falloff(0.1) > exp.falloff(0.1));
        assert!(gauss.falloff(1.5) < exp.falloff(1.5));
    }

    #[test]
    fn test_vector_source_uses_per_channel_strength() {
        let input = vec![0.0; 8 * 8 * 2];
        let mut output = vec![0.0; 8 * 8 * 2];
        let stamp = SourceStamp {
            origin: centre_of(2, 2, 8),
            falloff_distance: 2.0,
            strength: Vector2::new(3.0, -1.0),
            kernel: FalloffKernel::Exponential,
        };
        add_source_cpu(&input, &mut output, 8, 8, 2, &stamp);
        let i = (2 * 8 + 2) * 2;
        assert_relative_eq!(output[i], 3.0, epsilon = 1e-6);
        assert_relative_eq!(output[i + 1], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_distance_is_aspect_corrected() {
        // 16x8 grid: one cell step is 1/8 height units along both axes
        let input = vec![0.0; 16 * 8];
        let mut output = vec![0.0; 16 * 8];
        let origin = Vector2::new((8.5 / 16.0) - 0.5, (4.5 / 8.0) - 0.5);
        let stamp = SourceStamp::scalar(origin, 5.0, 1.0, FalloffKernel::Exponential);
        add_source_cpu(&input, &mut output, 16, 8, 1, &stamp);
        assert_relative_eq!(output[4 * 16 + 9], output[5 * 16 + 8], epsilon = 1e-6);
    }

    #[test]
    fn test_buoyancy_lifts_hot_cells_only() {
        let velocity = vec![0.5, 0.0, 0.5, 0.0];
        let temperature = vec![2.0, 0.0];
        let mut out = vec![0.0; 4];
        let params = BuoyancyParams {
            coefficient: 1.0,
            ambient: 0.0,
            dt: 0.5,
        };
        buoyancy_cpu(&velocity, &temperature, &mut out, &params);
        assert_eq!(out, vec![0.5, 1.0, 0.5, 0.0]);
    }
}
