use fluid_sim_core::{EditMode, ImageView, PointerButtons, TickInput, TickOutcome};
use nalgebra::Vector2;
use std::slice;

use crate::error::{DefaultFluidSimError, FluidSimErrorCode};
use crate::helpers::{handle_ffi_result, instance_from_ptr, with_sim_mut};
use crate::instance::FluidSimInstance;

/// What the primary button edits.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluidSimEditMode {
    Density = 0,
    Temperature = 1,
    Fuel = 2,
    Velocity = 3,
}

impl From<FluidSimEditMode> for EditMode {
    fn from(mode: FluidSimEditMode) -> Self {
        match mode {
            FluidSimEditMode::Density => Self::Density,
            FluidSimEditMode::Temperature => Self::Temperature,
            FluidSimEditMode::Fuel => Self::Fuel,
            FluidSimEditMode::Velocity => Self::Velocity,
        }
    }
}

/// Host input for one tick.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidSimInput {
    /// Timestep in seconds
    pub dt: f32,
    /// Pointer in normalized `[-0.5, 0.5]` coordinates, read only when `has_pointer`
    pub pointer_x: f32,
    pub pointer_y: f32,
    pub has_pointer: bool,
    pub primary: bool,
    pub secondary: bool,
    pub mode: FluidSimEditMode,
}

impl From<&FluidSimInput> for TickInput {
    fn from(input: &FluidSimInput) -> Self {
        Self {
            dt: input.dt,
            pointer: input
                .has_pointer
                .then(|| Vector2::new(input.pointer_x, input.pointer_y)),
            buttons: PointerButtons {
                primary: input.primary,
                secondary: input.secondary,
            },
            mode: input.mode.into(),
        }
    }
}

/// Advance the simulation by one tick.
///
/// Thread-safe: acquires the `RwLock` write lock for the update.
///
/// `out_advanced` may be null. Otherwise it receives `false` when the
/// simulation is paused and the tick was skipped.
///
/// # Safety
/// - `ptr` must be null or a live pointer returned by `fluid_sim_new`.
/// - `input` must be null or point to a valid `FluidSimInput`.
/// - `out_advanced` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn fluid_sim_tick(
    ptr: *const FluidSimInstance,
    input: *const FluidSimInput,
    out_advanced: *mut bool,
) -> FluidSimErrorCode {
    handle_ffi_result(|| {
        let instance = instance_from_ptr(ptr)?;
        // SAFETY: caller guarantees `input` is null or valid.
        let input = unsafe { input.as_ref() }
            .ok_or_else(|| DefaultFluidSimError::null_pointer("input"))?;
        let outcome = with_sim_mut(instance, |sim| sim.tick(&input.into()))??;
        if !out_advanced.is_null() {
            // SAFETY: checked non-null above, caller guarantees validity.
            unsafe {
                *out_advanced = outcome == TickOutcome::Advanced;
            }
        }
        Ok(())
    })
}

/// Stop advancing on `fluid_sim_tick` until resumed.
#[no_mangle]
pub extern "C" fn fluid_sim_pause(ptr: *const FluidSimInstance) -> FluidSimErrorCode {
    handle_ffi_result(|| {
        let instance = instance_from_ptr(ptr)?;
        with_sim_mut(instance, fluid_sim_core::Simulation::pause)
    })
}

#[no_mangle]
pub extern "C" fn fluid_sim_resume(ptr: *const FluidSimInstance) -> FluidSimErrorCode {
    handle_ffi_result(|| {
        let instance = instance_from_ptr(ptr)?;
        with_sim_mut(instance, fluid_sim_core::Simulation::resume)
    })
}

/// Replace the density with an image resampled onto the grid.
///
/// The image is row-major with row 0 at the bottom and `channels` floats per
/// pixel (1 to 4). The data is copied; the caller keeps ownership.
///
/// # Safety
/// - `ptr` must be null or a live pointer returned by `fluid_sim_new`.
/// - `data` must be null or point to `width * height * channels` floats.
#[no_mangle]
pub unsafe extern "C" fn fluid_sim_set_initial_density(
    ptr: *const FluidSimInstance,
    data: *const f32,
    width: usize,
    height: usize,
    channels: usize,
) -> FluidSimErrorCode {
    handle_ffi_result(|| {
        let instance = instance_from_ptr(ptr)?;
        if data.is_null() {
            return Err(DefaultFluidSimError::null_pointer("data"));
        }
        let len = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or_else(|| {
                DefaultFluidSimError::invalid_parameter(format!(
                    "Image of {width}x{height}x{channels} values overflows"
                ))
            })?;
        // SAFETY: non-null, caller guarantees `len` readable floats.
        let data = unsafe { slice::from_raw_parts(data, len) };
        let image = ImageView {
            width,
            height,
            channels,
            data,
        };
        with_sim_mut(instance, |sim| sim.set_initial_density(&image))??;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{
        fluid_sim_default_config, fluid_sim_destroy, fluid_sim_new, FluidSimBackend, FluidSimConfig,
    };
    use std::ptr;

    fn create() -> *mut FluidSimInstance {
        let config = FluidSimConfig {
            resolution: 16,
            ..fluid_sim_default_config()
        };
        let mut sim = ptr::null_mut();
        let code = unsafe { fluid_sim_new(&config, FluidSimBackend::Cpu, &mut sim) };
        assert_eq!(code, FluidSimErrorCode::Ok);
        sim
    }

    fn idle() -> FluidSimInput {
        FluidSimInput {
            dt: 1.0 / 60.0,
            pointer_x: 0.0,
            pointer_y: 0.0,
            has_pointer: false,
            primary: false,
            secondary: false,
            mode: FluidSimEditMode::Density,
        }
    }

    #[test]
    fn test_tick_reports_pause() {
        let sim = create();
        let mut advanced = false;

        let code = unsafe { fluid_sim_tick(sim, &idle(), &mut advanced) };
        assert_eq!(code, FluidSimErrorCode::Ok);
        assert!(advanced);

        assert_eq!(fluid_sim_pause(sim), FluidSimErrorCode::Ok);
        unsafe { fluid_sim_tick(sim, &idle(), &mut advanced) };
        assert!(!advanced);

        assert_eq!(fluid_sim_resume(sim), FluidSimErrorCode::Ok);
        unsafe { fluid_sim_tick(sim, &idle(), ptr::null_mut()) };

        unsafe { fluid_sim_destroy(sim) };
    }

    #[test]
    fn test_negative_dt_is_rejected() {
        let sim = create();
        let input = FluidSimInput { dt: -1.0, ..idle() };
        let code = unsafe { fluid_sim_tick(sim, &input, ptr::null_mut()) };
        assert_eq!(code, FluidSimErrorCode::InvalidConfiguration);
        unsafe { fluid_sim_destroy(sim) };
    }

    #[test]
    fn test_set_initial_density_validates_image() {
        let sim = create();
        let data = [0.5_f32; 20];

        let code = unsafe { fluid_sim_set_initial_density(sim, data.as_ptr(), 2, 2, 3) };
        assert_eq!(code, FluidSimErrorCode::Ok);

        let code = unsafe { fluid_sim_set_initial_density(sim, data.as_ptr(), 2, 2, 5) };
        assert_eq!(code, FluidSimErrorCode::InvalidParameter);

        let code = unsafe { fluid_sim_set_initial_density(sim, ptr::null(), 2, 2, 1) };
        assert_eq!(code, FluidSimErrorCode::NullPointer);

        unsafe { fluid_sim_destroy(sim) };
    }

    #[test]
    fn test_input_conversion() {
        let input = FluidSimInput {
            has_pointer: true,
            pointer_x: 0.25,
            pointer_y: -0.1,
            primary: true,
            mode: FluidSimEditMode::Fuel,
            ..idle()
        };
        let tick = TickInput::from(&input);
        assert_eq!(tick.pointer, Some(Vector2::new(0.25, -0.1)));
        assert!(tick.buttons.primary);
        assert_eq!(tick.mode, EditMode::Fuel);
        assert_eq!(TickInput::from(&idle()).pointer, None);
    }
}
