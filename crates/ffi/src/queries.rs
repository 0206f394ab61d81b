/// FFI query functions: grid size, field read-back, colorized frames and
/// timing statistics.
use fluid_sim_core::FieldKind;
use std::ptr;

use crate::error::{DefaultFluidSimError, FluidSimErrorCode};
use crate::helpers::{handle_ffi_result, instance_from_ptr, with_sim, with_sim_mut};
use crate::instance::FluidSimInstance;

/// Field selector for read-back.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluidSimField {
    /// One float per cell
    Density = 0,
    /// One float per cell
    Temperature = 1,
    /// Two floats per cell: vx, vy
    Velocity = 2,
    /// Two floats per cell: solid, gas
    FuelComposite = 3,
}

impl From<FluidSimField> for FieldKind {
    fn from(field: FluidSimField) -> Self {
        match field {
            FluidSimField::Density => Self::Density,
            FluidSimField::Temperature => Self::Temperature,
            FluidSimField::Velocity => Self::Velocity,
            FluidSimField::FuelComposite => Self::FuelComposite,
        }
    }
}

/// C-compatible simulation statistics.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidSimStats {
    /// Ticks advanced since the fields were allocated
    pub frame_count: u64,
    /// Simulated seconds since the fields were allocated
    pub elapsed_s: f64,
    /// Wall time of the last tick (milliseconds)
    pub last_tick_ms: f64,
    /// Mean wall time per tick (milliseconds)
    pub average_tick_ms: f64,
    pub is_gpu: bool,
    pub is_running: bool,
    pub is_faulted: bool,
}

/// Copy `values` into a caller buffer.
///
/// `out_len` always receives the required length when non-null, so a caller
/// can pass a null buffer with zero capacity to size it first.
unsafe fn copy_out<T: Copy>(
    values: &[T],
    out: *mut T,
    capacity: usize,
    out_len: *mut usize,
    name: &str,
) -> Result<(), DefaultFluidSimError> {
    if !out_len.is_null() {
        // SAFETY: checked non-null, caller guarantees validity.
        unsafe {
            *out_len = values.len();
        }
    }
    if out.is_null() {
        return if capacity == 0 {
            Ok(())
        } else {
            Err(DefaultFluidSimError::null_pointer(name))
        };
    }
    if capacity < values.len() {
        return Err(DefaultFluidSimError::buffer_too_small(
            name,
            values.len(),
            capacity,
        ));
    }
    // SAFETY: `out` holds at least `capacity >= values.len()` elements and
    // cannot overlap simulation-owned memory.
    unsafe {
        ptr::copy_nonoverlapping(values.as_ptr(), out, values.len());
    }
    Ok(())
}

/// Get the grid size in cells.
///
/// # Safety
/// - `ptr` must be null or a live pointer returned by `fluid_sim_new`.
/// - `out_width` and `out_height` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn fluid_sim_get_dimensions(
    ptr: *const FluidSimInstance,
    out_width: *mut u32,
    out_height: *mut u32,
) -> FluidSimErrorCode {
    handle_ffi_result(|| {
        let instance = instance_from_ptr(ptr)?;
        if out_width.is_null() {
            return Err(DefaultFluidSimError::null_pointer("out_width"));
        }
        if out_height.is_null() {
            return Err(DefaultFluidSimError::null_pointer("out_height"));
        }
        let geometry = with_sim(instance, fluid_sim_core::Simulation::geometry)?;
        // SAFETY: both checked non-null above.
        unsafe {
            *out_width = geometry.width() as u32;
            *out_height = geometry.height() as u32;
        }
        Ok(())
    })
}

/// Copy the current generation of a field into `out_values`.
///
/// Values are interleaved per cell, rows bottom to top.
///
/// Returns `BufferTooSmall` if `capacity` is short; `out_len` still receives
/// the required length.
///
/// # Safety
/// - `ptr` must be null or a live pointer returned by `fluid_sim_new`.
/// - `out_values` must be null or valid for `capacity` float writes.
/// - `out_len` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn fluid_sim_get_field(
    ptr: *const FluidSimInstance,
    field: FluidSimField,
    out_values: *mut f32,
    capacity: usize,
    out_len: *mut usize,
) -> FluidSimErrorCode {
    handle_ffi_result(|| {
        let instance = instance_from_ptr(ptr)?;
        with_sim(instance, |sim| {
            let values = sim.field(field.into())?;
            // SAFETY: forwarded caller guarantees.
            unsafe { copy_out(&values, out_values, capacity, out_len, "out_values") }
        })?
    })
}

/// Colorize a field and copy the RGBA8 frame into `out_rgba`.
///
/// The frame holds 4 bytes per cell in the same order as `fluid_sim_get_field`.
///
/// # Safety
/// - `ptr` must be null or a live pointer returned by `fluid_sim_new`.
/// - `out_rgba` must be null or valid for `capacity` byte writes.
/// - `out_len` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn fluid_sim_present(
    ptr: *const FluidSimInstance,
    field: FluidSimField,
    out_rgba: *mut u8,
    capacity: usize,
    out_len: *mut usize,
) -> FluidSimErrorCode {
    handle_ffi_result(|| {
        let instance = instance_from_ptr(ptr)?;
        with_sim_mut(instance, |sim| {
            let frame = sim.present(field.into())?;
            // SAFETY: forwarded caller guarantees.
            unsafe { copy_out(frame, out_rgba, capacity, out_len, "out_rgba") }
        })?
    })
}

/// Get timing and state statistics.
///
/// # Safety
/// - `ptr` must be null or a live pointer returned by `fluid_sim_new`.
/// - `out_stats` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn fluid_sim_get_stats(
    ptr: *const FluidSimInstance,
    out_stats: *mut FluidSimStats,
) -> FluidSimErrorCode {
    handle_ffi_result(|| {
        let instance = instance_from_ptr(ptr)?;
        if out_stats.is_null() {
            return Err(DefaultFluidSimError::null_pointer("out_stats"));
        }
        let stats = with_sim(instance, |sim| FluidSimStats {
            frame_count: sim.frame_count(),
            elapsed_s: sim.elapsed(),
            last_tick_ms: sim.frame_timer().last_frame_time_ms(),
            average_tick_ms: sim.frame_timer().average_frame_time_ms(),
            is_gpu: sim.is_gpu_accelerated(),
            is_running: sim.is_running(),
            is_faulted: sim.fault().is_some(),
        })?;
        // SAFETY: checked non-null above.
        unsafe {
            *out_stats = stats;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{
        fluid_sim_default_config, fluid_sim_destroy, fluid_sim_new, FluidSimBackend, FluidSimConfig,
    };
    use crate::simulation::{fluid_sim_tick, FluidSimEditMode, FluidSimInput};

    fn create() -> *mut FluidSimInstance {
        let config = FluidSimConfig {
            resolution: 16,
            aspect_width: 2,
            aspect_height: 1,
            ..fluid_sim_default_config()
        };
        let mut sim = ptr::null_mut();
        let code = unsafe { fluid_sim_new(&config, FluidSimBackend::Cpu, &mut sim) };
        assert_eq!(code, FluidSimErrorCode::Ok);
        sim
    }

    #[test]
    fn test_dimensions() {
        let sim = create();
        let (mut width, mut height) = (0, 0);
        let code = unsafe { fluid_sim_get_dimensions(sim, &mut width, &mut height) };
        assert_eq!(code, FluidSimErrorCode::Ok);
        assert_eq!((width, height), (16, 8));
        unsafe { fluid_sim_destroy(sim) };
    }

    #[test]
    fn test_field_size_query_then_copy() {
        let sim = create();
        let mut len = 0;
        let code = unsafe {
            fluid_sim_get_field(sim, FluidSimField::Velocity, ptr::null_mut(), 0, &mut len)
        };
        assert_eq!(code, FluidSimErrorCode::Ok);
        assert_eq!(len, 16 * 8 * 2);

        let mut short = vec![0.0_f32; len - 1];
        let code = unsafe {
            fluid_sim_get_field(
                sim,
                FluidSimField::Velocity,
                short.as_mut_ptr(),
                short.len(),
                &mut len,
            )
        };
        assert_eq!(code, FluidSimErrorCode::BufferTooSmall);

        let input = FluidSimInput {
            dt: 0.1,
            pointer_x: 0.0,
            pointer_y: 0.0,
            has_pointer: true,
            primary: true,
            secondary: false,
            mode: FluidSimEditMode::Density,
        };
        unsafe { fluid_sim_tick(sim, &input, ptr::null_mut()) };

        let mut density = vec![0.0_f32; 16 * 8];
        let code = unsafe {
            fluid_sim_get_field(
                sim,
                FluidSimField::Density,
                density.as_mut_ptr(),
                density.len(),
                ptr::null_mut(),
            )
        };
        assert_eq!(code, FluidSimErrorCode::Ok);
        assert!(density.iter().all(|&v| v > 0.0));

        unsafe { fluid_sim_destroy(sim) };
    }

    #[test]
    fn test_present_and_stats() {
        let sim = create();
        let mut frame = vec![0_u8; 16 * 8 * 4];
        let mut len = 0;
        let code = unsafe {
            fluid_sim_present(
                sim,
                FluidSimField::Temperature,
                frame.as_mut_ptr(),
                frame.len(),
                &mut len,
            )
        };
        assert_eq!(code, FluidSimErrorCode::Ok);
        assert_eq!(len, frame.len());
        assert!(frame.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));

        let mut stats = FluidSimStats {
            frame_count: 99,
            elapsed_s: 0.0,
            last_tick_ms: 0.0,
            average_tick_ms: 0.0,
            is_gpu: true,
            is_running: false,
            is_faulted: true,
        };
        let code = unsafe { fluid_sim_get_stats(sim, &mut stats) };
        assert_eq!(code, FluidSimErrorCode::Ok);
        assert_eq!(stats.frame_count, 0);
        assert!(!stats.is_gpu);
        assert!(stats.is_running);
        assert!(!stats.is_faulted);

        unsafe { fluid_sim_destroy(sim) };
    }
}
