//! CPU-based fluid solver implementation
//!
//! This module provides a CPU implementation of the `FluidSolver` trait using
//! `Vec<f32>` buffers and Rayon for parallelism. This backend is always
//! available and serves as a fallback when GPU acceleration is not available.

use super::advection::advect_cpu;
use super::diffusion::{diffuse_sweep_cpu, DiffusionCoefficients};
use super::fields::FieldBuffer;
use super::grid::GridGeometry;
use super::projection::{projection_finish_cpu, projection_relax_cpu, projection_setup_cpu};
use super::pyrolysis::{composite_cpu, pyrolysis_cpu, PyrolysisParams};
use super::seed::create_velocity_field;
use super::source::{add_source_cpu, buoyancy_cpu, BuoyancyParams, SourceStamp};
use super::store::{FieldId, FieldStore, Slot};
use super::FluidSolver;
use crate::config::VelocitySeed;
use crate::error::{Result, SimError};
use std::borrow::Cow;

/// CPU-based fluid solver using Rayon for parallelism
///
/// Every generation of every field is a [`FieldBuffer`] in one
/// [`FieldStore`]. Kernels borrow their inputs and output from the store, which
/// rejects aliasing and unwritten reads before any work is done.
pub struct CpuFluidSolver {
    store: FieldStore<FieldBuffer>,
    geometry: GridGeometry,
}

impl CpuFluidSolver {
    /// Create a new CPU fluid solver with zero-filled fields
    ///
    /// # Errors
    ///
    /// Fails only if the store cannot be assembled.
    pub fn new(geometry: GridGeometry) -> Result<Self> {
        let (width, height) = (geometry.width(), geometry.height());
        let store =
            FieldStore::allocate(|field| Ok(FieldBuffer::new(width, height, field.channels())))?;
        Ok(Self { store, geometry })
    }

    #[must_use]
    pub fn store(&self) -> &FieldStore<FieldBuffer> {
        &self.store
    }

    fn layout(&self, field: FieldId) -> (usize, usize, usize) {
        (self.geometry.width(), self.geometry.height(), field.channels())
    }
}

impl FluidSolver for CpuFluidSolver {
    fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    fn is_gpu_accelerated(&self) -> bool {
        false
    }

    fn seed_velocity(&mut self, seed: &VelocitySeed) -> Result<()> {
        let field = create_velocity_field(&self.geometry, seed);
        self.upload(FieldId::Velocity, Slot::Current, &field)?;
        self.upload(FieldId::Velocity, Slot::Next, &field)
    }

    fn upload(&mut self, field: FieldId, slot: Slot, data: &[f32]) -> Result<()> {
        let expected = self.geometry.cell_count() * field.channels();
        if data.len() != expected {
            return Err(SimError::ShapeMismatch {
                field,
                expected,
                actual: data.len(),
            });
        }
        self.store
            .field_mut(field)
            .writable(slot)?
            .as_mut_slice()
            .copy_from_slice(data);
        Ok(())
    }

    fn read(&self, field: FieldId, slot: Slot) -> Result<Cow<'_, [f32]>> {
        let buffer = self.store.field(field).get(slot)?;
        Ok(Cow::Borrowed(buffer.as_slice()))
    }

    fn copy(&mut self, field: FieldId, from: Slot, to: Slot) -> Result<()> {
        let (input, output) = self.store.field_mut(field).read_write(from, to)?;
        output.copy_from(input);
        Ok(())
    }

    fn swap_slots(&mut self, field: FieldId, a: Slot, b: Slot) -> Result<()> {
        self.store.field_mut(field).swap_slots(a, b)
    }

    fn add_source(
        &mut self,
        field: FieldId,
        input: Slot,
        output: Slot,
        stamp: &SourceStamp,
    ) -> Result<()> {
        let (width, height, channels) = self.layout(field);
        let (input, output) = self.store.field_mut(field).read_write(input, output)?;
        add_source_cpu(&input.data, &mut output.data, width, height, channels, stamp);
        Ok(())
    }

    fn apply_buoyancy(
        &mut self,
        input: Slot,
        output: Slot,
        temperature: Slot,
        params: &BuoyancyParams,
    ) -> Result<()> {
        let [velocity_gens, temperature_gens] = self
            .store
            .many_mut([FieldId::Velocity, FieldId::Temperature])?;
        let temperature = temperature_gens.get(temperature)?;
        let (input, output) = velocity_gens.read_write(input, output)?;
        buoyancy_cpu(&input.data, &temperature.data, &mut output.data, params);
        Ok(())
    }

    fn diffuse_sweep(
        &mut self,
        field: FieldId,
        initial: Slot,
        read: Slot,
        write: Slot,
        coefficients: DiffusionCoefficients,
    ) -> Result<()> {
        let (width, height, channels) = self.layout(field);
        let ([initial, read], out) = self
            .store
            .field_mut(field)
            .reads_write([initial, read], write)?;
        diffuse_sweep_cpu(
            &initial.data,
            &read.data,
            &mut out.data,
            width,
            height,
            channels,
            coefficients,
        );
        Ok(())
    }

    fn advect(
        &mut self,
        field: FieldId,
        input: Slot,
        output: Slot,
        velocity: Slot,
        dt: f32,
    ) -> Result<()> {
        let (width, height, channels) = self.layout(field);
        if field == FieldId::Velocity {
            let ([velocity, input], output) = self
                .store
                .field_mut(FieldId::Velocity)
                .reads_write([velocity, input], output)?;
            advect_cpu(
                &velocity.data,
                &input.data,
                &mut output.data,
                width,
                height,
                channels,
                dt,
            );
            return Ok(());
        }

        let [velocity_gens, field_gens] = self.store.many_mut([FieldId::Velocity, field])?;
        let velocity = velocity_gens.get(velocity)?;
        let (input, output) = field_gens.read_write(input, output)?;
        advect_cpu(
            &velocity.data,
            &input.data,
            &mut output.data,
            width,
            height,
            channels,
            dt,
        );
        Ok(())
    }

    fn projection_setup(&mut self, input: Slot, output: Slot, h: f32) -> Result<()> {
        let (width, height) = (self.geometry.width(), self.geometry.height());
        let (input, output) = self
            .store
            .field_mut(FieldId::Velocity)
            .read_write(input, output)?;
        projection_setup_cpu(&input.data, &mut output.data, width, height, h);
        Ok(())
    }

    fn projection_relax(&mut self, read: Slot, write: Slot) -> Result<()> {
        let (width, height) = (self.geometry.width(), self.geometry.height());
        let (read, write) = self
            .store
            .field_mut(FieldId::Velocity)
            .read_write(read, write)?;
        projection_relax_cpu(&read.data, &mut write.data, width, height);
        Ok(())
    }

    fn projection_finish(
        &mut self,
        pressure: Slot,
        velocity: Slot,
        output: Slot,
        h: f32,
    ) -> Result<()> {
        let (width, height) = (self.geometry.width(), self.geometry.height());
        let ([pressure, velocity], output) = self
            .store
            .field_mut(FieldId::Velocity)
            .reads_write([pressure, velocity], output)?;
        projection_finish_cpu(
            &pressure.data,
            &velocity.data,
            &mut output.data,
            width,
            height,
            h,
        );
        Ok(())
    }

    fn pyrolysis(
        &mut self,
        temperature: Slot,
        solid: (Slot, Slot),
        gas: (Slot, Slot),
        params: &PyrolysisParams,
    ) -> Result<()> {
        let width = self.geometry.width();
        let [temperature_gens, solid_gens, gas_gens] = self.store.many_mut([
            FieldId::Temperature,
            FieldId::FuelSolid,
            FieldId::FuelGas,
        ])?;
        let temperature = temperature_gens.get(temperature)?;
        let (solid_in, solid_out) = solid_gens.read_write(solid.0, solid.1)?;
        let (gas_in, gas_out) = gas_gens.read_write(gas.0, gas.1)?;
        pyrolysis_cpu(
            &temperature.data,
            &solid_in.data,
            &gas_in.data,
            &mut solid_out.data,
            &mut gas_out.data,
            width,
            params,
        );
        Ok(())
    }

    fn composite_fuel(&mut self, solid: Slot, gas: Slot) -> Result<()> {
        let [solid_gens, gas_gens, composite_gens] = self.store.many_mut([
            FieldId::FuelSolid,
            FieldId::FuelGas,
            FieldId::FuelComposite,
        ])?;
        let solid = solid_gens.get(solid)?;
        let gas = gas_gens.get(gas)?;
        let out = composite_gens.writable(Slot::Current)?;
        composite_cpu(&solid.data, &gas.data, &mut out.data);
        Ok(())
    }
}
