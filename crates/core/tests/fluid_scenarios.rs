//! End-to-end simulation scenarios
//!
//! Every scenario runs on the CPU backend so results are identical on all
//! machines. The last one compares against the GPU when a device exists.

use fluid_sim_core::simulation::FieldStats;
use fluid_sim_core::{
    BackendPreference, EditMode, FieldKind, ImageView, PointerButtons, SimError, Simulation,
    SimulationConfig, TickInput, TickOutcome, VelocitySeed,
};
use nalgebra::Vector2;
use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const DT: f32 = 1.0 / 60.0;

/// Pointer at the centre of cell `(x, y)` on an `n`x`n` grid
fn cell_pointer(x: usize, y: usize, n: usize) -> Vector2<f32> {
    Vector2::new(
        (x as f32 + 0.5) / n as f32 - 0.5,
        (y as f32 + 0.5) / n as f32 - 0.5,
    )
}

fn press(pointer: Vector2<f32>, mode: EditMode) -> TickInput {
    TickInput {
        dt: DT,
        pointer: Some(pointer),
        buttons: PointerButtons {
            primary: true,
            secondary: false,
        },
        mode,
    }
}

fn cpu_simulation(config: SimulationConfig) -> Simulation {
    Simulation::with_backend(config, BackendPreference::Cpu).unwrap()
}

#[test]
fn test_single_injection_peaks_at_pointer() {
    let n = 64;
    let mut sim = cpu_simulation(SimulationConfig {
        resolution: n as u32,
        diffusion_rate: 0.0,
        velocity_diffusion_rate: 0.0,
        source_strength: 1.0,
        velocity_seed: VelocitySeed::Still,
        ..SimulationConfig::default()
    });

    let outcome = sim
        .tick(&press(cell_pointer(32, 32, n), EditMode::Density))
        .unwrap();
    assert_eq!(outcome, TickOutcome::Advanced);

    let density = sim.field(FieldKind::Density).unwrap();
    let stats = FieldStats::of(&density, 1, 0).unwrap();
    assert_eq!(stats.argmax, 32 * n + 32);
    assert!((stats.max - 1.0).abs() < 1e-6);

    // Strictly decreasing along each axis away from the peak
    for step in 1..31 {
        let row = 32 * n;
        assert!(density[row + 32 + step] < density[row + 32 + step - 1]);
        assert!(density[row + 32 - step] < density[row + 32 - step + 1]);
        assert!(density[(32 + step) * n + 32] < density[(32 + step - 1) * n + 32]);
        assert!(density[(32 - step) * n + 32] < density[(32 - step + 1) * n + 32]);
    }

    // Nothing else moved
    for kind in [FieldKind::Temperature, FieldKind::Velocity, FieldKind::FuelComposite] {
        assert!(sim.field(kind).unwrap().iter().all(|&v| v == 0.0));
    }
}

#[test]
fn test_still_fluid_keeps_initial_image() {
    let n = 32;
    let mut sim = cpu_simulation(SimulationConfig {
        resolution: n as u32,
        diffusion_rate: 0.0,
        ..SimulationConfig::default()
    });
    let image: Vec<f32> = (0..n * n).map(|i| (i % 7) as f32 / 7.0).collect();
    sim.set_initial_density(&ImageView {
        width: n,
        height: n,
        channels: 1,
        data: &image,
    })
    .unwrap();

    for _ in 0..10 {
        sim.tick(&TickInput::idle(DT)).unwrap();
    }
    let comparison = sim.compare_with_initial(0.0).unwrap().unwrap();
    assert!(comparison.is_identical());
    assert_eq!(comparison.total(), n * n);
}

#[test]
fn test_vortex_transport_stays_within_bounds() {
    let n = 32;
    let mut sim = cpu_simulation(SimulationConfig {
        resolution: n as u32,
        velocity_seed: VelocitySeed::Vortex { strength: 2.0 },
        ..SimulationConfig::default()
    });
    // Bright square left of centre
    let mut image = vec![0.0; n * n];
    for y in 12..20 {
        for x in 4..12 {
            image[y * n + x] = 1.0;
        }
    }
    sim.set_initial_density(&ImageView {
        width: n,
        height: n,
        channels: 1,
        data: &image,
    })
    .unwrap();

    for _ in 0..30 {
        sim.tick(&TickInput::idle(DT)).unwrap();
    }

    let density = sim.field(FieldKind::Density).unwrap();
    let stats = FieldStats::of(&density, 1, 0).unwrap();
    assert!(stats.min >= -1e-6, "min {}", stats.min);
    assert!(stats.max <= 1.0 + 1e-5, "max {}", stats.max);

    let comparison = sim.compare_with_initial(1e-3).unwrap().unwrap();
    assert!(comparison.changed > 0);
}

#[test]
fn test_heated_fuel_turns_into_gas() {
    let n = 32;
    let mut sim = cpu_simulation(SimulationConfig {
        resolution: n as u32,
        temperature_strength: 2.0,
        ..SimulationConfig::default()
    });
    let centre = cell_pointer(16, 16, n);
    let cell = 16 * n + 16;

    sim.tick(&press(centre, EditMode::Fuel)).unwrap();
    let fuel = sim.field(FieldKind::FuelComposite).unwrap().into_owned();
    let solid_before = fuel[2 * cell];
    assert!(solid_before > 0.9);
    assert_eq!(fuel[2 * cell + 1], 0.0, "cold fuel must not pyrolyse");

    sim.tick(&press(centre, EditMode::Temperature)).unwrap();
    let fuel = sim.field(FieldKind::FuelComposite).unwrap();
    assert!(fuel[2 * cell] < solid_before);
    assert!(fuel[2 * cell + 1] > 0.0);

    let temperature = sim.field(FieldKind::Temperature).unwrap();
    assert!(temperature[cell] > 1.0);
}

#[test]
fn test_dragging_pushes_fluid() {
    let n = 32;
    let mut sim = cpu_simulation(SimulationConfig {
        resolution: n as u32,
        ..SimulationConfig::default()
    });
    let start = cell_pointer(12, 16, n);
    let drag = |pointer| TickInput {
        dt: DT,
        pointer: Some(pointer),
        buttons: PointerButtons {
            primary: false,
            secondary: true,
        },
        mode: EditMode::Density,
    };

    // First contact only records the pointer
    sim.tick(&drag(start)).unwrap();
    assert!(sim.field(FieldKind::Velocity).unwrap().iter().all(|&v| v == 0.0));

    let end = start + Vector2::new(0.05, 0.0);
    sim.tick(&drag(end)).unwrap();
    let velocity = sim.field(FieldKind::Velocity).unwrap();
    let cell = 16 * n + 14;
    assert!(velocity[2 * cell] > 0.0);
    assert!(velocity[2 * cell] > velocity[2 * cell + 1].abs());
}

#[test]
fn test_buoyancy_lifts_hot_fluid() {
    let n = 32;
    let mut sim = cpu_simulation(SimulationConfig {
        resolution: n as u32,
        buoyancy: 1.0,
        ..SimulationConfig::default()
    });
    sim.tick(&press(cell_pointer(16, 16, n), EditMode::Temperature))
        .unwrap();
    let velocity = sim.field(FieldKind::Velocity).unwrap();
    assert!(velocity[2 * (16 * n + 16) + 1] > 0.0);
}

#[test]
fn test_rejected_reconfigure_keeps_running() {
    let mut sim = cpu_simulation(SimulationConfig {
        resolution: 16,
        ..SimulationConfig::default()
    });
    let before = sim.config().clone();
    let result = sim.configure(SimulationConfig {
        diffusion_rate: -1.0,
        ..before.clone()
    });
    assert!(matches!(result, Err(SimError::InvalidConfig { .. })));
    assert_eq!(sim.config(), &before);
    assert_eq!(sim.tick(&TickInput::idle(DT)).unwrap(), TickOutcome::Advanced);
}

#[test]
fn test_gpu_matches_cpu_when_available() {
    let config = SimulationConfig {
        resolution: 32,
        velocity_seed: VelocitySeed::Vortex { strength: 1.0 },
        buoyancy: 0.5,
        ..SimulationConfig::default()
    };
    let mut gpu = Simulation::with_backend(config.clone(), BackendPreference::Auto).unwrap();
    if !gpu.is_gpu_accelerated() {
        println!("No GPU available, skipping comparison");
        return;
    }
    let mut cpu = cpu_simulation(config);

    let script = [
        press(cell_pointer(10, 10, 32), EditMode::Density),
        press(cell_pointer(12, 10, 32), EditMode::Temperature),
        press(cell_pointer(14, 12, 32), EditMode::Fuel),
        press(cell_pointer(16, 14, 32), EditMode::Velocity),
        TickInput::idle(DT),
    ];
    for input in &script {
        gpu.tick(input).unwrap();
        cpu.tick(input).unwrap();
    }

    for kind in [
        FieldKind::Density,
        FieldKind::Temperature,
        FieldKind::Velocity,
        FieldKind::FuelComposite,
    ] {
        let a = gpu.field(kind).unwrap();
        let b = cpu.field(kind).unwrap();
        let worst = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0_f32, f32::max);
        assert!(worst < 1e-3, "{kind:?} differs by {worst}");
    }
}
