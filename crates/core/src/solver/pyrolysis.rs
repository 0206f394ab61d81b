//! Pyrolysis: thermal conversion of solid fuel into fuel gas
//!
//! Within the temperature window a fixed fraction of the remaining solid fuel
//! converts per second. Solid and gas are updated in the same pass so no
//! fuel is counted twice.

use crate::config::{OverheatPolicy, SimulationConfig};
use rayon::prelude::*;

/// Reaction parameters for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PyrolysisParams {
    pub min_temp: f32,
    pub max_temp: f32,
    /// Fraction of solid converted per second
    pub rate: f32,
    /// Gas produced per unit of solid converted
    pub fuel_density: f32,
    pub policy: OverheatPolicy,
    /// Timestep in seconds
    pub dt: f32,
}

impl PyrolysisParams {
    #[must_use]
    pub fn from_config(config: &SimulationConfig, dt: f32) -> Self {
        Self {
            min_temp: config.min_pyrolysis_temp,
            max_temp: config.max_pyrolysis_temp,
            rate: config.fuel_conversion_rate,
            fuel_density: config.fuel_density,
            policy: config.overheat_policy,
            dt,
        }
    }

    /// Amount of solid fuel converted in one cell this tick
    #[inline]
    #[must_use]
    pub fn conversion(&self, temperature: f32, solid: f32) -> f32 {
        if solid <= 0.0 || temperature < self.min_temp {
            return 0.0;
        }
        if temperature > self.max_temp && self.policy == OverheatPolicy::Extinguish {
            return 0.0;
        }
        (self.rate * self.dt).min(1.0) * solid
    }
}

/// CPU implementation of pyrolysis
///
/// # Arguments
///
/// * `temperature` - Temperature this tick
/// * `solid_in`, `gas_in` - Fuel before the reaction
/// * `solid_out`, `gas_out` - Fuel after the reaction
/// * `width` - Grid width in cells
/// * `params` - Reaction parameters
pub fn pyrolysis_cpu(
    temperature: &[f32],
    solid_in: &[f32],
    gas_in: &[f32],
    solid_out: &mut [f32],
    gas_out: &mut [f32],
    width: usize,
    params: &PyrolysisParams,
) {
    solid_out
        .par_chunks_mut(width)
        .zip(gas_out.par_chunks_mut(width))
        .enumerate()
        .for_each(|(y, (solid_row, gas_row))| {
            for x in 0..width {
                let i = y * width + x;
                let converted = params.conversion(temperature[i], solid_in[i]);
                solid_row[x] = solid_in[i] - converted;
                gas_row[x] = gas_in[i] + converted * params.fuel_density;
            }
        });
}

/// CPU implementation of the display composite, `(solid, gas)` per cell
pub fn composite_cpu(solid: &[f32], gas: &[f32], out: &mut [f32]) {
    out.par_chunks_mut(2)
        .zip(solid.par_iter().zip(gas.par_iter()))
        .for_each(|(cell, (&s, &g))| {
            cell[0] = s;
            cell[1] = g;
        });
}
