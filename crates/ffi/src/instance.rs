use fluid_sim_core::{
    AspectRatio, BackendPreference, FalloffKernel, OverheatPolicy, Simulation, SimulationConfig,
    VelocitySeed,
};
use std::ptr;
use std::sync::RwLock;

use crate::error::{DefaultFluidSimError, FluidSimErrorCode};
use crate::helpers::{
    handle_ffi_result, instance_from_ptr, track_error, track_result, with_sim, with_sim_mut,
};

/// Radial weighting around a source point.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluidSimFalloff {
    /// `exp(-k * d)`
    Exponential = 0,
    /// `exp(-k * d^2)`
    Gaussian = 1,
}

/// Pyrolysis behaviour above `max_pyrolysis_temp`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluidSimOverheatPolicy {
    Saturate = 0,
    Extinguish = 1,
}

/// Initial velocity written when fields are allocated.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluidSimVelocitySeed {
    Still = 0,
    /// Rigid rotation, `seed_strength` is the angular speed
    Vortex = 1,
    /// Uniform noise, `seed_strength` is the amplitude
    Noise = 2,
}

/// Backend the instance may run on.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluidSimBackend {
    /// GPU when available, CPU otherwise
    Auto = 0,
    Cpu = 1,
}

impl From<FluidSimBackend> for BackendPreference {
    fn from(backend: FluidSimBackend) -> Self {
        match backend {
            FluidSimBackend::Auto => Self::Auto,
            FluidSimBackend::Cpu => Self::Cpu,
        }
    }
}

/// C-compatible simulation configuration.
///
/// Obtain defaults from `fluid_sim_default_config()` and override fields.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidSimConfig {
    /// Cells along the x axis, rounded up to a multiple of 8
    pub resolution: u32,
    pub aspect_width: u32,
    pub aspect_height: u32,
    pub diffusion_rate: f32,
    pub velocity_diffusion_rate: f32,
    pub source_strength: f32,
    pub temperature_strength: f32,
    /// Falloff coefficient of scalar sources
    pub source_distance: f32,
    pub falloff: FluidSimFalloff,
    pub force_strength: f32,
    /// Falloff coefficient of the pointer force
    pub force_distance: f32,
    pub fuel_density: f32,
    pub fuel_conversion_rate: f32,
    pub min_pyrolysis_temp: f32,
    pub max_pyrolysis_temp: f32,
    pub overheat_policy: FluidSimOverheatPolicy,
    pub buoyancy: f32,
    pub ambient_temperature: f32,
    pub velocity_seed: FluidSimVelocitySeed,
    pub seed_strength: f32,
    /// RNG seed for `FluidSimVelocitySeed::Noise`
    pub noise_seed: u64,
}

impl From<&FluidSimConfig> for SimulationConfig {
    fn from(config: &FluidSimConfig) -> Self {
        Self {
            resolution: config.resolution,
            aspect_ratio: AspectRatio::new(config.aspect_width, config.aspect_height),
            diffusion_rate: config.diffusion_rate,
            velocity_diffusion_rate: config.velocity_diffusion_rate,
            source_strength: config.source_strength,
            temperature_strength: config.temperature_strength,
            source_distance: config.source_distance,
            falloff: match config.falloff {
                FluidSimFalloff::Exponential => FalloffKernel::Exponential,
                FluidSimFalloff::Gaussian => FalloffKernel::Gaussian,
            },
            force_strength: config.force_strength,
            force_distance: config.force_distance,
            fuel_density: config.fuel_density,
            fuel_conversion_rate: config.fuel_conversion_rate,
            min_pyrolysis_temp: config.min_pyrolysis_temp,
            max_pyrolysis_temp: config.max_pyrolysis_temp,
            overheat_policy: match config.overheat_policy {
                FluidSimOverheatPolicy::Saturate => OverheatPolicy::Saturate,
                FluidSimOverheatPolicy::Extinguish => OverheatPolicy::Extinguish,
            },
            buoyancy: config.buoyancy,
            ambient_temperature: config.ambient_temperature,
            velocity_seed: match config.velocity_seed {
                FluidSimVelocitySeed::Still => VelocitySeed::Still,
                FluidSimVelocitySeed::Vortex => VelocitySeed::Vortex {
                    strength: config.seed_strength,
                },
                FluidSimVelocitySeed::Noise => VelocitySeed::Noise {
                    seed: config.noise_seed,
                    amplitude: config.seed_strength,
                },
            },
        }
    }
}

impl From<&SimulationConfig> for FluidSimConfig {
    fn from(config: &SimulationConfig) -> Self {
        let (velocity_seed, seed_strength, noise_seed) = match config.velocity_seed {
            VelocitySeed::Still => (FluidSimVelocitySeed::Still, 0.0, 0),
            VelocitySeed::Vortex { strength } => (FluidSimVelocitySeed::Vortex, strength, 0),
            VelocitySeed::Noise { seed, amplitude } => (FluidSimVelocitySeed::Noise, amplitude, seed),
        };
        Self {
            resolution: config.resolution,
            aspect_width: config.aspect_ratio.width,
            aspect_height: config.aspect_ratio.height,
            diffusion_rate: config.diffusion_rate,
            velocity_diffusion_rate: config.velocity_diffusion_rate,
            source_strength: config.source_strength,
            temperature_strength: config.temperature_strength,
            source_distance: config.source_distance,
            falloff: match config.falloff {
                FalloffKernel::Exponential => FluidSimFalloff::Exponential,
                FalloffKernel::Gaussian => FluidSimFalloff::Gaussian,
            },
            force_strength: config.force_strength,
            force_distance: config.force_distance,
            fuel_density: config.fuel_density,
            fuel_conversion_rate: config.fuel_conversion_rate,
            min_pyrolysis_temp: config.min_pyrolysis_temp,
            max_pyrolysis_temp: config.max_pyrolysis_temp,
            overheat_policy: match config.overheat_policy {
                OverheatPolicy::Saturate => FluidSimOverheatPolicy::Saturate,
                OverheatPolicy::Extinguish => FluidSimOverheatPolicy::Extinguish,
            },
            buoyancy: config.buoyancy,
            ambient_temperature: config.ambient_temperature,
            velocity_seed,
            seed_strength,
            noise_seed,
        }
    }
}

/// The fluid simulation context.
///
/// # Thread Safety
/// The simulation is protected by an `RwLock`: field reads take a shared
/// lock, ticks and configuration changes take the exclusive one.
///
/// ```cpp
/// FluidSimInstance* sim = nullptr;
/// FluidSimConfig config = fluid_sim_default_config();
/// config.resolution = 256;
/// if (fluid_sim_new(&config, Auto, &sim) != Ok) {
///     return;
/// }
///
/// FluidSimInput input = { .dt = 1.0f / 60.0f };
/// fluid_sim_tick(sim, &input, nullptr);
///
/// fluid_sim_destroy(sim);
/// ```
pub struct FluidSimInstance {
    pub(crate) sim: RwLock<Simulation>,
}

impl FluidSimInstance {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the configuration does not validate.
    pub(crate) fn new(
        config: &FluidSimConfig,
        backend: FluidSimBackend,
    ) -> Result<Box<Self>, DefaultFluidSimError> {
        let sim = Simulation::with_backend(config.into(), backend.into())?;
        Ok(Box::new(Self {
            sim: RwLock::new(sim),
        }))
    }
}

/// Default configuration: 512 cells wide, square domain, no velocity seed.
#[no_mangle]
pub extern "C" fn fluid_sim_default_config() -> FluidSimConfig {
    FluidSimConfig::from(&SimulationConfig::default())
}

/// Create a new instance and return it via out-parameter.
///
/// Returns
/// - `FluidSimErrorCode::Ok` (0): success, `out_instance` contains valid pointer
/// - `FluidSimErrorCode::NullPointer`: `config` or `out_instance` is null
/// - `FluidSimErrorCode::InvalidConfiguration`: a parameter is out of range
///
/// On failure `out_instance` is set to null. Call `fluid_sim_get_last_error()`
/// for a description.
///
/// # Safety
///
/// - `config` must be null or point to a valid `FluidSimConfig`.
/// - `out_instance` must be null or a valid pointer to writable memory.
/// - The caller takes ownership of the returned instance and MUST call
///   `fluid_sim_destroy` exactly once.
#[no_mangle]
pub unsafe extern "C" fn fluid_sim_new(
    config: *const FluidSimConfig,
    backend: FluidSimBackend,
    out_instance: *mut *mut FluidSimInstance,
) -> FluidSimErrorCode {
    if out_instance.is_null() {
        return track_error(&DefaultFluidSimError::null_pointer("out_instance"));
    }
    // SAFETY: caller guarantees `config` is null or valid.
    let Some(config) = (unsafe { config.as_ref() }) else {
        unsafe {
            *out_instance = ptr::null_mut();
        }
        return track_error(&DefaultFluidSimError::null_pointer("config"));
    };

    match track_result(FluidSimInstance::new(config, backend)) {
        Ok(instance) => {
            unsafe {
                *out_instance = Box::into_raw(instance);
            }
            FluidSimErrorCode::Ok
        }
        Err(code) => {
            unsafe {
                *out_instance = ptr::null_mut();
            }
            code
        }
    }
}

/// Destroys an instance previously created by `fluid_sim_new`.
///
/// If `ptr` is null, this function is a no-op.
///
/// # Safety
/// - The pointer MUST have been created by `fluid_sim_new`.
/// - The pointer MUST NOT have been freed already.
/// - After calling this function, the caller must not use the pointer again.
#[no_mangle]
pub unsafe extern "C" fn fluid_sim_destroy(ptr: *mut FluidSimInstance) {
    if ptr.is_null() {
        return;
    }

    // SAFETY: the pointer came from `Box::into_raw` in `fluid_sim_new` and
    // was not freed before.
    unsafe {
        drop(Box::from_raw(ptr));
    }
}

/// Apply a new configuration.
///
/// Changing resolution, aspect ratio or velocity seed reallocates every
/// field. A faulted instance is rebuilt by any accepted configuration. A
/// rejected configuration leaves the previous one in effect.
///
/// # Safety
/// - `ptr` must be null or a live pointer returned by `fluid_sim_new`.
/// - `config` must be null or point to a valid `FluidSimConfig`.
#[no_mangle]
pub unsafe extern "C" fn fluid_sim_configure(
    ptr: *const FluidSimInstance,
    config: *const FluidSimConfig,
) -> FluidSimErrorCode {
    handle_ffi_result(|| {
        let instance = instance_from_ptr(ptr)?;
        // SAFETY: caller guarantees `config` is null or valid.
        let config = unsafe { config.as_ref() }
            .ok_or_else(|| DefaultFluidSimError::null_pointer("config"))?;
        with_sim_mut(instance, |sim| sim.configure(config.into()))??;
        Ok(())
    })
}

/// Read back the configuration currently in effect.
///
/// # Safety
/// - `ptr` must be null or a live pointer returned by `fluid_sim_new`.
/// - `out_config` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn fluid_sim_get_config(
    ptr: *const FluidSimInstance,
    out_config: *mut FluidSimConfig,
) -> FluidSimErrorCode {
    handle_ffi_result(|| {
        let instance = instance_from_ptr(ptr)?;
        if out_config.is_null() {
            return Err(DefaultFluidSimError::null_pointer("out_config"));
        }
        let config = with_sim(instance, |sim| FluidSimConfig::from(sim.config()))?;
        // SAFETY: checked non-null above, caller guarantees validity.
        unsafe {
            *out_config = config;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::fluid_sim_get_last_error_code;

    fn small_config() -> FluidSimConfig {
        FluidSimConfig {
            resolution: 16,
            ..fluid_sim_default_config()
        }
    }

    #[test]
    fn test_config_round_trips_through_core() {
        let config = FluidSimConfig {
            velocity_seed: FluidSimVelocitySeed::Noise,
            seed_strength: 0.25,
            noise_seed: 7,
            overheat_policy: FluidSimOverheatPolicy::Extinguish,
            ..small_config()
        };
        let core = SimulationConfig::from(&config);
        assert_eq!(
            core.velocity_seed,
            VelocitySeed::Noise {
                seed: 7,
                amplitude: 0.25
            }
        );
        assert_eq!(FluidSimConfig::from(&core), config);
    }

    #[test]
    fn test_new_and_destroy() {
        let config = small_config();
        let mut sim = ptr::null_mut();
        let code = unsafe { fluid_sim_new(&config, FluidSimBackend::Cpu, &mut sim) };
        assert_eq!(code, FluidSimErrorCode::Ok);
        assert!(!sim.is_null());

        let mut read_back = fluid_sim_default_config();
        let code = unsafe { fluid_sim_get_config(sim, &mut read_back) };
        assert_eq!(code, FluidSimErrorCode::Ok);
        assert_eq!(read_back.resolution, 16);

        unsafe { fluid_sim_destroy(sim) };
    }

    #[test]
    fn test_invalid_config_sets_last_error() {
        let config = FluidSimConfig {
            resolution: 2,
            ..fluid_sim_default_config()
        };
        let mut sim = ptr::null_mut();
        let code = unsafe { fluid_sim_new(&config, FluidSimBackend::Cpu, &mut sim) };
        assert_eq!(code, FluidSimErrorCode::InvalidConfiguration);
        assert!(sim.is_null());
        assert_eq!(fluid_sim_get_last_error_code(), code);
        assert!(!crate::error::fluid_sim_get_last_error().is_null());
    }

    #[test]
    fn test_rejected_configure_keeps_previous() {
        let config = small_config();
        let mut sim = ptr::null_mut();
        unsafe { fluid_sim_new(&config, FluidSimBackend::Cpu, &mut sim) };

        let bad = FluidSimConfig {
            force_distance: -1.0,
            ..config
        };
        let code = unsafe { fluid_sim_configure(sim, &bad) };
        assert_eq!(code, FluidSimErrorCode::InvalidConfiguration);

        let mut read_back = fluid_sim_default_config();
        unsafe { fluid_sim_get_config(sim, &mut read_back) };
        assert_eq!(read_back, config);

        unsafe { fluid_sim_destroy(sim) };
    }

    #[test]
    fn test_null_pointers_are_reported() {
        let code = unsafe { fluid_sim_configure(ptr::null(), ptr::null()) };
        assert_eq!(code, FluidSimErrorCode::NullPointer);
        unsafe { fluid_sim_destroy(ptr::null_mut()) };
    }
}
