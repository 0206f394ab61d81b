//! Interactive fluid simulation
//!
//! `Simulation` owns a backend-agnostic solver and drives one tick per host
//! frame. Hosts feed a [`TickInput`] and read fields or colorized frames
//! back between ticks.
//!
//! A tick that fails on broken buffer discipline or a device error latches
//! the simulation into a faulted state: every later tick returns
//! [`SimError::Faulted`] until `configure` rebuilds the solver.

pub mod diagnostics;
pub mod image;
pub mod input;
pub mod pipeline;
mod presentation;

pub use diagnostics::{compare_fields, FieldComparison, FieldStats};
pub use image::{density_from_image, ImageView};
pub use input::{EditMode, FieldKind, PointerButtons, TickInput, TickOutcome};
pub use pipeline::TickSources;
pub use presentation::Presentation;

use crate::config::SimulationConfig;
use crate::error::{Result, SimError};
use crate::solver::{
    create_fluid_solver, BackendPreference, FieldId, FluidSolver, FrameTimer, GridGeometry,
    ProfilerScope, Slot,
};
use nalgebra::Vector2;
use std::borrow::Cow;
use tracing::{debug, error, info, warn};

/// Stable Fluids simulation with density, temperature, fuel and velocity
pub struct Simulation {
    /// Backend-agnostic solver (CPU or GPU)
    solver: Box<dyn FluidSolver>,
    config: SimulationConfig,
    backend: BackendPreference,

    running: bool,
    fault: Option<String>,
    previous_pointer: Option<Vector2<f32>>,

    /// Density as uploaded by `set_initial_density`
    initial_density: Option<Vec<f32>>,
    presentation: Presentation,

    frame_count: u64,
    elapsed: f64,
    frame_timer: FrameTimer,
}

impl Simulation {
    /// Create a simulation on the best available backend
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        Self::with_backend(config, BackendPreference::Auto)
    }

    /// Create a simulation with an explicit backend preference
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if `config` does not validate, or
    /// the solver error if no backend could be allocated.
    pub fn with_backend(config: SimulationConfig, backend: BackendPreference) -> Result<Self> {
        info!("Creating new fluid simulation");
        config.validate()?;
        let solver = build_solver(&config, backend)?;
        let geometry = solver.geometry();

        info!(
            "Fluid simulation initialized: {}x{} grid, GPU={}",
            geometry.width(),
            geometry.height(),
            solver.is_gpu_accelerated()
        );

        Ok(Self {
            presentation: Presentation::new(geometry.width(), geometry.height()),
            solver,
            config,
            backend,
            running: true,
            fault: None,
            previous_pointer: None,
            initial_density: None,
            frame_count: 0,
            elapsed: 0.0,
            frame_timer: FrameTimer::new(),
        })
    }

    /// Apply a new configuration
    ///
    /// Changing the resolution, aspect ratio or velocity seed reallocates
    /// every field, as does reconfiguring a faulted simulation. Other
    /// parameters take effect on the next tick with the fields untouched.
    ///
    /// # Errors
    ///
    /// A rejected configuration leaves the previous one fully in place.
    pub fn configure(&mut self, config: SimulationConfig) -> Result<()> {
        if let Err(e) = config.validate() {
            warn!("Rejected configuration: {}", e);
            return Err(e);
        }

        if self.fault.is_some() || self.config.needs_realloc(&config) {
            let solver = build_solver(&config, self.backend)?;
            let geometry = solver.geometry();
            info!(
                "Reallocated fields: {}x{} grid, GPU={}",
                geometry.width(),
                geometry.height(),
                solver.is_gpu_accelerated()
            );
            self.solver = solver;
            self.presentation = Presentation::new(geometry.width(), geometry.height());
            self.initial_density = None;
            self.previous_pointer = None;
            self.fault = None;
            self.frame_count = 0;
            self.elapsed = 0.0;
        }

        self.config = config;
        Ok(())
    }

    /// Replace the current density with an image resampled onto the grid
    ///
    /// The resampled field is kept for [`Self::compare_with_initial`].
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidImage`] for unusable input and
    /// [`SimError::Faulted`] if the simulation is faulted.
    pub fn set_initial_density(&mut self, image: &ImageView<'_>) -> Result<()> {
        self.check_fault()?;
        let density = density_from_image(image, &self.solver.geometry())?;
        let uploaded = self
            .solver
            .upload(FieldId::Density, Slot::Current, &density);
        self.latch(uploaded)?;
        debug!(
            "Initial density set from {}x{} image",
            image.width, image.height
        );
        self.initial_density = Some(density);
        Ok(())
    }

    /// Advance the simulation by one timestep
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] for a negative or non-finite `dt`
    /// without touching any field. Fatal solver errors latch the simulation
    /// as faulted.
    pub fn tick(&mut self, input: &TickInput) -> Result<TickOutcome> {
        self.check_fault()?;
        if !input.dt.is_finite() || input.dt < 0.0 {
            return Err(SimError::config(
                "dt",
                format!("must be finite and non-negative, got {}", input.dt),
            ));
        }
        if !self.running {
            return Ok(TickOutcome::Paused);
        }

        let sources = TickSources::from_input(&self.config, input, self.previous_pointer);
        let scope = ProfilerScope::new("tick");
        let advanced = pipeline::advance(self.solver.as_mut(), &self.config, &sources, input.dt);
        self.latch(advanced)?;

        self.frame_timer.record(scope.elapsed_ms());
        self.previous_pointer = input.pointer;
        self.frame_count += 1;
        self.elapsed += f64::from(input.dt);

        debug!(
            "Tick {}: dt={:.4}s, {:.2}ms",
            self.frame_count,
            input.dt,
            self.frame_timer.last_frame_time_ms()
        );
        Ok(TickOutcome::Advanced)
    }

    /// Current generation of a field, interleaved per cell
    ///
    /// Borrowed on the CPU backend, read back into an owned buffer on the GPU.
    ///
    /// # Errors
    ///
    /// Returns the solver error if the read fails.
    pub fn field(&self, kind: FieldKind) -> Result<Cow<'_, [f32]>> {
        self.solver.read(kind.field_id(), Slot::Current)
    }

    /// Colorize a field into the presentation buffer and return the frame
    ///
    /// # Errors
    ///
    /// Returns the solver error if the field cannot be read.
    pub fn present(&mut self, kind: FieldKind) -> Result<&[u8]> {
        let data = self.solver.read(kind.field_id(), Slot::Current)?;
        Ok(self.presentation.render(kind, &data))
    }

    /// Last presented RGBA frame
    pub fn frame(&self) -> &[u8] {
        self.presentation.front()
    }

    /// How far the density has moved from the initial image
    ///
    /// `None` until an initial density was set.
    ///
    /// # Errors
    ///
    /// Returns the solver error if the density cannot be read.
    pub fn compare_with_initial(&self, tolerance: f32) -> Result<Option<FieldComparison>> {
        let Some(initial) = &self.initial_density else {
            return Ok(None);
        };
        let density = self.field(FieldKind::Density)?;
        Ok(Some(compare_fields(initial, &density, tolerance)))
    }

    pub fn pause(&mut self) {
        if self.running {
            info!("Simulation paused at tick {}", self.frame_count);
        }
        self.running = false;
    }

    pub fn resume(&mut self) {
        if !self.running {
            info!("Simulation resumed at tick {}", self.frame_count);
        }
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Reason the simulation faulted, if it did
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn geometry(&self) -> GridGeometry {
        self.solver.geometry()
    }

    pub fn is_gpu_accelerated(&self) -> bool {
        self.solver.is_gpu_accelerated()
    }

    /// Ticks advanced since the fields were allocated
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Simulated seconds since the fields were allocated
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn frame_timer(&self) -> &FrameTimer {
        &self.frame_timer
    }

    fn check_fault(&self) -> Result<()> {
        match &self.fault {
            Some(reason) => Err(SimError::Faulted(reason.clone())),
            None => Ok(()),
        }
    }

    fn latch<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                error!("Simulation faulted: {}", e);
                self.fault = Some(e.to_string());
            }
        }
        result
    }
}

fn build_solver(
    config: &SimulationConfig,
    backend: BackendPreference,
) -> Result<Box<dyn FluidSolver>> {
    let geometry = GridGeometry::new(config.resolution, config.aspect_ratio)?;
    let mut solver = create_fluid_solver(geometry, backend)?;
    solver.seed_velocity(&config.velocity_seed)?;
    Ok(solver)
}
