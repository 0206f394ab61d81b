//! Runtime configuration for the fluid simulation
//!
//! Every scalar a host can tune lives in [`SimulationConfig`]. Configurations
//! are validated as a whole before they are applied, so a rejected update never
//! leaves the simulation half-reconfigured.

use crate::error::{Result, SimError};
use crate::solver::TILE_SIZE;
use serde::{Deserialize, Serialize};

/// Aspect ratio of the simulated domain (width : height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::SQUARE
    }
}

/// Radial weighting applied around a source point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FalloffKernel {
    /// `exp(-k * d)`
    #[default]
    Exponential,
    /// `exp(-k * d^2)`
    Gaussian,
}

/// What pyrolysis does when temperature exceeds the upper threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverheatPolicy {
    /// Convert at the full rate, same as exactly at the threshold
    #[default]
    Saturate,
    /// Stop converting above the threshold
    Extinguish,
}

/// Initial velocity written into the field when buffers are allocated
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum VelocitySeed {
    /// Zero everywhere
    #[default]
    Still,
    /// Solid-body rotation about the domain centre, divergence free
    Vortex {
        /// Angular velocity in radians per second
        strength: f32,
    },
    /// Uniform random velocity per cell, reproducible from `seed`
    Noise { seed: u64, amplitude: f32 },
}

/// Simulation configuration
///
/// Rates are per second, distances are falloff coefficients in height units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Nominal grid resolution along the x axis
    pub resolution: u32,
    pub aspect_ratio: AspectRatio,

    /// Diffusion rate for density, temperature and fuel gas
    pub diffusion_rate: f32,
    /// Viscosity of the velocity field
    pub velocity_diffusion_rate: f32,

    /// Density and fuel amount injected per tick at the pointer
    pub source_strength: f32,
    /// Temperature injected per tick at the pointer
    pub temperature_strength: f32,
    pub source_distance: f32,
    pub falloff: FalloffKernel,

    /// Multiplier from pointer motion to injected velocity
    pub force_strength: f32,
    pub force_distance: f32,

    /// Gas produced per unit of solid fuel converted
    pub fuel_density: f32,
    /// Fraction of solid fuel converted per second inside the pyrolysis window
    pub fuel_conversion_rate: f32,
    pub min_pyrolysis_temp: f32,
    pub max_pyrolysis_temp: f32,
    pub overheat_policy: OverheatPolicy,

    /// Upward acceleration per degree above `ambient_temperature`
    pub buoyancy: f32,
    pub ambient_temperature: f32,

    pub velocity_seed: VelocitySeed,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            resolution: 512,
            aspect_ratio: AspectRatio::SQUARE,
            diffusion_rate: 1.0e-5,
            velocity_diffusion_rate: 1.0e-5,
            source_strength: 1.0,
            temperature_strength: 1.0,
            source_distance: 5.0,
            falloff: FalloffKernel::Exponential,
            force_strength: 10.0,
            force_distance: 2.0,
            fuel_density: 1.0,
            fuel_conversion_rate: 0.5,
            min_pyrolysis_temp: 0.3,
            max_pyrolysis_temp: 1.0,
            overheat_policy: OverheatPolicy::Saturate,
            buoyancy: 0.0,
            ambient_temperature: 0.0,
            velocity_seed: VelocitySeed::Still,
        }
    }
}

impl SimulationConfig {
    /// Check every parameter, returning the first offending one
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] naming the rejected parameter.
    pub fn validate(&self) -> Result<()> {
        if self.resolution < TILE_SIZE {
            return Err(SimError::config(
                "resolution",
                format!("must be at least {TILE_SIZE}, got {}", self.resolution),
            ));
        }
        if self.aspect_ratio.width == 0 || self.aspect_ratio.height == 0 {
            return Err(SimError::config(
                "aspect_ratio",
                format!(
                    "components must be positive, got {}:{}",
                    self.aspect_ratio.width, self.aspect_ratio.height
                ),
            ));
        }

        let non_negative = [
            ("diffusion_rate", self.diffusion_rate),
            ("velocity_diffusion_rate", self.velocity_diffusion_rate),
            ("source_distance", self.source_distance),
            ("force_distance", self.force_distance),
            ("fuel_density", self.fuel_density),
            ("fuel_conversion_rate", self.fuel_conversion_rate),
        ];
        for (param, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::config(
                    param,
                    format!("must be finite and non-negative, got {value}"),
                ));
            }
        }

        let finite = [
            ("source_strength", self.source_strength),
            ("temperature_strength", self.temperature_strength),
            ("force_strength", self.force_strength),
            ("min_pyrolysis_temp", self.min_pyrolysis_temp),
            ("max_pyrolysis_temp", self.max_pyrolysis_temp),
            ("buoyancy", self.buoyancy),
            ("ambient_temperature", self.ambient_temperature),
        ];
        for (param, value) in finite {
            if !value.is_finite() {
                return Err(SimError::config(param, format!("must be finite, got {value}")));
            }
        }

        if self.min_pyrolysis_temp > self.max_pyrolysis_temp {
            return Err(SimError::config(
                "min_pyrolysis_temp",
                format!(
                    "{} exceeds max_pyrolysis_temp {}",
                    self.min_pyrolysis_temp, self.max_pyrolysis_temp
                ),
            ));
        }

        match self.velocity_seed {
            VelocitySeed::Vortex { strength } if !strength.is_finite() => Err(SimError::config(
                "velocity_seed",
                format!("vortex strength must be finite, got {strength}"),
            )),
            VelocitySeed::Noise { amplitude, .. } if !amplitude.is_finite() || amplitude < 0.0 => {
                Err(SimError::config(
                    "velocity_seed",
                    format!("noise amplitude must be finite and non-negative, got {amplitude}"),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Whether switching to `other` requires reallocating every buffer
    #[must_use]
    pub fn needs_realloc(&self, other: &Self) -> bool {
        self.resolution != other.resolution
            || self.aspect_ratio != other.aspect_ratio
            || self.velocity_seed != other.velocity_seed
    }
}
