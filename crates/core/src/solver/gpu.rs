//! GPU-based fluid solver implementation
//!
//! This module provides a GPU implementation of the `FluidSolver` trait using
//! wgpu compute shaders and storage buffers. This backend is only available
//! when the `gpu` feature is enabled.
//!
//! # Shader Files
//!
//! All kernels live in `shaders/fluid.wgsl`, one entry point per kernel,
//! sharing a single bind group layout:
//!
//! | Binding | Use |
//! |---|---|
//! | 0 | `Params` uniform |
//! | 1-3 | read-only inputs |
//! | 4-5 | outputs |
//!
//! Unused bindings are filled with small dummy buffers. Each kernel call is
//! encoded and submitted on its own, so calls complete in order.

use super::context::GpuContext;
use super::diffusion::DiffusionCoefficients;
use super::grid::GridGeometry;
use super::pyrolysis::PyrolysisParams;
use super::seed::create_velocity_field;
use super::source::{BuoyancyParams, SourceStamp};
use super::store::{FieldId, FieldStore, Slot};
use super::FluidSolver;
use crate::config::{FalloffKernel, OverheatPolicy, VelocitySeed};
use crate::error::{Result, SimError};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use tracing::debug;
use wgpu::util::DeviceExt;

/// Kernel parameters (must match WGSL struct layout)
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
struct KernelParams {
    width: u32,
    height: u32,
    channels: u32,
    mode: u32,
    dt: f32,
    alpha: f32,
    beta: f32,
    h: f32,
    origin_x: f32,
    origin_y: f32,
    falloff: f32,
    aspect: f32,
    strength_x: f32,
    strength_y: f32,
    min_temp: f32,
    max_temp: f32,
    rate: f32,
    fuel_density: f32,
    coefficient: f32,
    ambient: f32,
}

struct Pipelines {
    add_source: wgpu::ComputePipeline,
    buoyancy: wgpu::ComputePipeline,
    diffusion: wgpu::ComputePipeline,
    advection: wgpu::ComputePipeline,
    projection_setup: wgpu::ComputePipeline,
    projection_relax: wgpu::ComputePipeline,
    projection_finish: wgpu::ComputePipeline,
    pyrolysis: wgpu::ComputePipeline,
    composite: wgpu::ComputePipeline,
}

/// GPU-based fluid solver using wgpu compute shaders
pub struct GpuFluidSolver {
    context: GpuContext,
    geometry: GridGeometry,
    store: FieldStore<wgpu::Buffer>,
    bind_group_layout: wgpu::BindGroupLayout,
    pipelines: Pipelines,
    dummy_input: wgpu::Buffer,
    dummy_outputs: [wgpu::Buffer; 2],
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn buffer_size(geometry: &GridGeometry, field: FieldId) -> u64 {
    (geometry.cell_count() * field.channels() * std::mem::size_of::<f32>()) as u64
}

impl GpuFluidSolver {
    /// Create a new GPU fluid solver
    ///
    /// Allocates every field generation as a zero-filled storage buffer and
    /// builds one compute pipeline per kernel.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Gpu`] if the grid does not fit the device.
    pub fn new(context: GpuContext, geometry: GridGeometry) -> Result<Self> {
        let (width, height) = (geometry.width() as u32, geometry.height() as u32);
        if !context.can_allocate(width, height) {
            return Err(SimError::Gpu(format!(
                "{width}x{height} grid exceeds limits of {}",
                context.adapter_name()
            )));
        }

        let device = context.device();
        let store = FieldStore::allocate(|field| {
            Ok(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(field.name()),
                size: buffer_size(&geometry, field),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }))
        })?;

        let dummy = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: 16,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        };
        let dummy_input = dummy("Unused Input");
        let dummy_outputs = [dummy("Unused Output A"), dummy("Unused Output B")];

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fluid Kernel Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, false),
                storage_entry(5, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Fluid Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/fluid.wgsl"));
        let pipeline = |entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        };
        let pipelines = Pipelines {
            add_source: pipeline("add_source"),
            buoyancy: pipeline("buoyancy"),
            diffusion: pipeline("diffusion"),
            advection: pipeline("advection"),
            projection_setup: pipeline("projection_setup"),
            projection_relax: pipeline("projection_relax"),
            projection_finish: pipeline("projection_finish"),
            pyrolysis: pipeline("pyrolysis"),
            composite: pipeline("composite"),
        };

        debug!(
            "GPU fluid solver allocated {}x{} grid on {}",
            width,
            height,
            context.adapter_name()
        );

        Ok(Self {
            context,
            geometry,
            store,
            bind_group_layout,
            pipelines,
            dummy_input,
            dummy_outputs,
        })
    }

    fn params(&self, field: FieldId) -> KernelParams {
        KernelParams {
            width: self.geometry.width() as u32,
            height: self.geometry.height() as u32,
            channels: field.channels() as u32,
            aspect: self.geometry.aspect(),
            ..KernelParams::default()
        }
    }

    fn buffer(&self, field: FieldId, index: usize) -> &wgpu::Buffer {
        self.store.field(field).buffer(index)
    }

    /// Encode and submit one kernel over the whole grid
    fn dispatch(
        &self,
        pipeline: &wgpu::ComputePipeline,
        params: &KernelParams,
        inputs: &[&wgpu::Buffer],
        outputs: &[&wgpu::Buffer],
    ) {
        let device = self.context.device();
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Kernel Params"),
            contents: bytemuck::bytes_of(params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let input = |i: usize| inputs.get(i).copied().unwrap_or(&self.dummy_input);
        let output = |i: usize| outputs.get(i).copied().unwrap_or(&self.dummy_outputs[i]);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Kernel Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: input(0).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: input(1).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: input(2).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: output(0).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: output(1).as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Fluid Kernel Encoder"),
        });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Fluid Kernel Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            let (wg_x, wg_y) = self.geometry.tiles();
            compute_pass.dispatch_workgroups(wg_x, wg_y, 1);
        }
        self.context.queue().submit(std::iter::once(encoder.finish()));
    }

    /// Single-field kernel: validate slots, then dispatch
    fn dispatch_field<const N: usize>(
        &mut self,
        pipeline: fn(&Pipelines) -> &wgpu::ComputePipeline,
        field: FieldId,
        reads: [Slot; N],
        write: Slot,
        params: &KernelParams,
    ) -> Result<()> {
        let (reads, write) = self.store.field_mut(field).plan(reads, write)?;
        let inputs = reads.map(|index| self.buffer(field, index));
        self.dispatch(
            pipeline(&self.pipelines),
            params,
            &inputs,
            &[self.buffer(field, write)],
        );
        Ok(())
    }
}

impl FluidSolver for GpuFluidSolver {
    fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    fn is_gpu_accelerated(&self) -> bool {
        true
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
        let buffer = self.store.field_mut(field).writable(slot)?;
        self.context
            .queue()
            .write_buffer(buffer, 0, bytemuck::cast_slice(data));
        Ok(())
    }

    fn read(&self, field: FieldId, slot: Slot) -> Result<Cow<'_, [f32]>> {
        let src_buffer = self.store.field(field).get(slot)?;
        let size = buffer_size(&self.geometry, field);
        let device = self.context.device();

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(src_buffer, 0, &staging, 0, size);
        self.context.queue().submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| SimError::Gpu(format!("readback of {field} dropped: {e}")))?
            .map_err(|e| SimError::Gpu(format!("readback of {field} failed: {e}")))?;

        let data = buffer_slice.get_mapped_range();
        let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();

        Ok(Cow::Owned(result))
    }

    fn copy(&mut self, field: FieldId, from: Slot, to: Slot) -> Result<()> {
        let ([src], dst) = self.store.field_mut(field).plan([from], to)?;
        let mut encoder =
            self.context
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Generation Copy Encoder"),
                });
        encoder.copy_buffer_to_buffer(
            self.buffer(field, src),
            0,
            self.buffer(field, dst),
            0,
            buffer_size(&self.geometry, field),
        );
        self.context.queue().submit(std::iter::once(encoder.finish()));
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
        // Inactive sources must leave the field bit-identical
        if !stamp.is_active() {
            return self.copy(field, input, output);
        }
        let params = KernelParams {
            mode: u32::from(stamp.kernel == FalloffKernel::Gaussian),
            origin_x: stamp.origin.x,
            origin_y: stamp.origin.y,
            falloff: stamp.falloff_distance,
            strength_x: stamp.strength.x,
            strength_y: stamp.strength.y,
            ..self.params(field)
        };
        self.dispatch_field(|p| &p.add_source, field, [input], output, &params)
    }

    fn apply_buoyancy(
        &mut self,
        input: Slot,
        output: Slot,
        temperature: Slot,
        params: &BuoyancyParams,
    ) -> Result<()> {
        let temperature = self.store.field(FieldId::Temperature).read_index(temperature)?;
        let ([velocity], output) = self
            .store
            .field_mut(FieldId::Velocity)
            .plan([input], output)?;
        let kernel_params = KernelParams {
            dt: params.dt,
            coefficient: params.coefficient,
            ambient: params.ambient,
            ..self.params(FieldId::Velocity)
        };
        self.dispatch(
            &self.pipelines.buoyancy,
            &kernel_params,
            &[
                self.buffer(FieldId::Velocity, velocity),
                self.buffer(FieldId::Temperature, temperature),
            ],
            &[self.buffer(FieldId::Velocity, output)],
        );
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
        let params = KernelParams {
            alpha: coefficients.alpha,
            beta: coefficients.beta,
            ..self.params(field)
        };
        self.dispatch_field(|p| &p.diffusion, field, [initial, read], write, &params)
    }

    fn advect(
        &mut self,
        field: FieldId,
        input: Slot,
        output: Slot,
        velocity: Slot,
        dt: f32,
    ) -> Result<()> {
        let params = KernelParams {
            dt,
            ..self.params(field)
        };
        if field == FieldId::Velocity {
            return self.dispatch_field(
                |p| &p.advection,
                field,
                [velocity, input],
                output,
                &params,
            );
        }

        let velocity = self.store.field(FieldId::Velocity).read_index(velocity)?;
        let ([input], output) = self.store.field_mut(field).plan([input], output)?;
        self.dispatch(
            &self.pipelines.advection,
            &params,
            &[
                self.buffer(FieldId::Velocity, velocity),
                self.buffer(field, input),
            ],
            &[self.buffer(field, output)],
        );
        Ok(())
    }

    fn projection_setup(&mut self, input: Slot, output: Slot, h: f32) -> Result<()> {
        let params = KernelParams {
            h,
            ..self.params(FieldId::Velocity)
        };
        self.dispatch_field(
            |p| &p.projection_setup,
            FieldId::Velocity,
            [input],
            output,
            &params,
        )
    }

    fn projection_relax(&mut self, read: Slot, write: Slot) -> Result<()> {
        let params = self.params(FieldId::Velocity);
        self.dispatch_field(
            |p| &p.projection_relax,
            FieldId::Velocity,
            [read],
            write,
            &params,
        )
    }

    fn projection_finish(
        &mut self,
        pressure: Slot,
        velocity: Slot,
        output: Slot,
        h: f32,
    ) -> Result<()> {
        let params = KernelParams {
            h,
            ..self.params(FieldId::Velocity)
        };
        self.dispatch_field(
            |p| &p.projection_finish,
            FieldId::Velocity,
            [pressure, velocity],
            output,
            &params,
        )
    }

    fn pyrolysis(
        &mut self,
        temperature: Slot,
        solid: (Slot, Slot),
        gas: (Slot, Slot),
        params: &PyrolysisParams,
    ) -> Result<()> {
        let temperature = self.store.field(FieldId::Temperature).read_index(temperature)?;
        let ([solid_in], solid_out) = self
            .store
            .field_mut(FieldId::FuelSolid)
            .plan([solid.0], solid.1)?;
        let ([gas_in], gas_out) = self.store.field_mut(FieldId::FuelGas).plan([gas.0], gas.1)?;
        let kernel_params = KernelParams {
            mode: u32::from(params.policy == OverheatPolicy::Extinguish),
            dt: params.dt,
            min_temp: params.min_temp,
            max_temp: params.max_temp,
            rate: params.rate,
            fuel_density: params.fuel_density,
            ..self.params(FieldId::Temperature)
        };
        self.dispatch(
            &self.pipelines.pyrolysis,
            &kernel_params,
            &[
                self.buffer(FieldId::Temperature, temperature),
                self.buffer(FieldId::FuelSolid, solid_in),
                self.buffer(FieldId::FuelGas, gas_in),
            ],
            &[
                self.buffer(FieldId::FuelSolid, solid_out),
                self.buffer(FieldId::FuelGas, gas_out),
            ],
        );
        Ok(())
    }

    fn composite_fuel(&mut self, solid: Slot, gas: Slot) -> Result<()> {
        let solid = self.store.field(FieldId::FuelSolid).read_index(solid)?;
        let gas = self.store.field(FieldId::FuelGas).read_index(gas)?;
        let ([], output) = self
            .store
            .field_mut(FieldId::FuelComposite)
            .plan([], Slot::Current)?;
        let params = self.params(FieldId::FuelComposite);
        self.dispatch(
            &self.pipelines.composite,
            &params,
            &[
                self.buffer(FieldId::FuelSolid, solid),
                self.buffer(FieldId::FuelGas, gas),
            ],
            &[self.buffer(FieldId::FuelComposite, output)],
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::context::GpuInitResult;
    use crate::solver::CpuFluidSolver;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    fn gpu_solver(n: usize) -> Option<GpuFluidSolver> {
        match GpuContext::new() {
            GpuInitResult::Success(context) => {
                let geometry = GridGeometry::from_dimensions(n, n).ok()?;
                GpuFluidSolver::new(context, geometry).ok()
            }
            _ => None,
        }
    }

    #[test]
    fn test_params_layout_is_uniform_aligned() {
        assert_eq!(std::mem::size_of::<KernelParams>() % 16, 0);
    }

    #[test]
    fn test_gpu_matches_cpu_source_and_diffusion() {
        let Some(mut gpu) = gpu_solver(16) else {
            return;
        };
        let mut cpu = CpuFluidSolver::new(gpu.geometry()).unwrap();
        let stamp = SourceStamp::scalar(Vector2::new(0.1, -0.2), 5.0, 1.0, FalloffKernel::Gaussian);
        let coefficients = DiffusionCoefficients::new(0.016, 0.001, 16);

        for solver in [&mut gpu as &mut dyn FluidSolver, &mut cpu] {
            solver
                .add_source(FieldId::Density, Slot::Current, Slot::Next, &stamp)
                .unwrap();
            crate::solver::diffusion::diffuse(solver, FieldId::Density, coefficients).unwrap();
        }

        let a = gpu.read(FieldId::Density, Slot::Next).unwrap();
        let b = cpu.read(FieldId::Density, Slot::Next).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_gpu_rejects_aliasing() {
        let Some(mut gpu) = gpu_solver(8) else {
            return;
        };
        assert!(gpu
            .copy(FieldId::Density, Slot::Current, Slot::Current)
            .is_err());
    }
}
