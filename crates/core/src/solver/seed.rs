//! Initial velocity fields

use super::grid::GridGeometry;
use crate::config::VelocitySeed;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Build the initial two-channel velocity for a grid
///
/// # Arguments
///
/// * `geometry` - Grid the field is built for
/// * `seed` - Kind of initial motion
///
/// # Returns
///
/// Interleaved `(vx, vy)` values, two per cell
#[must_use]
pub fn create_velocity_field(geometry: &GridGeometry, seed: &VelocitySeed) -> Vec<f32> {
    let (width, height) = (geometry.width(), geometry.height());
    match *seed {
        VelocitySeed::Still => vec![0.0; width * height * 2],
        VelocitySeed::Vortex { strength } => {
            // Positions in height units relative to the domain centre
            let scale = 1.0 / height as f32;
            let cx = width as f32 / 2.0;
            let cy = height as f32 / 2.0;
            let mut field = Vec::with_capacity(width * height * 2);
            for y in 0..height {
                let py = (y as f32 + 0.5 - cy) * scale;
                for x in 0..width {
                    let px = (x as f32 + 0.5 - cx) * scale;
                    field.push(-strength * py);
                    field.push(strength * px);
                }
            }
            field
        }
        VelocitySeed::Noise { seed, amplitude } => {
            if amplitude <= 0.0 {
                return vec![0.0; width * height * 2];
            }
            let mut rng = StdRng::seed_from_u64(seed);
            (0..width * height * 2)
                .map(|_| rng.random_range(-amplitude..amplitude))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::projection::divergence_norm;

    #[test]
    fn test_still_is_zero() {
        let geometry = GridGeometry::from_dimensions(16, 8).unwrap();
        let field = create_velocity_field(&geometry, &VelocitySeed::Still);
        assert_eq!(field.len(), 16 * 8 * 2);
        assert!(field.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_vortex_rotates_and_is_divergence_free() {
        let geometry = GridGeometry::from_dimensions(32, 32).unwrap();
        let field = create_velocity_field(&geometry, &VelocitySeed::Vortex { strength: 2.0 });
        assert_eq!(divergence_norm(&field, 32, 32), 0.0);

        // Right of centre moves up, above centre moves left
        let right = (16 * 32 + 24) * 2;
        assert!(field[right + 1] > 0.0);
        let above = (24 * 32 + 16) * 2;
        assert!(field[above] < 0.0);
    }

    #[test]
    fn test_noise_is_reproducible_and_bounded() {
        let geometry = GridGeometry::from_dimensions(8, 8).unwrap();
        let seed = VelocitySeed::Noise {
            seed: 7,
            amplitude: 0.25,
        };
        let a = create_velocity_field(&geometry, &seed);
        let b = create_velocity_field(&geometry, &seed);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.abs() <= 0.25));
        assert!(a.iter().any(|&v| v != 0.0));
    }
}
