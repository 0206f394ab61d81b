use clap::{Parser, ValueEnum};
use fluid_sim_core::simulation::FieldStats;
use fluid_sim_core::{
    AspectRatio, BackendPreference, EditMode, FieldKind, PointerButtons, SimError, Simulation,
    SimulationConfig, TickInput, VelocitySeed,
};
use nalgebra::Vector2;
use std::f32::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Seed {
    Still,
    Vortex,
    Noise,
}

/// Headless fluid simulation driven by a scripted pointer
#[derive(Parser, Debug)]
#[command(name = "fluid-sim-demo")]
#[command(about = "Stable Fluids simulation without a window", long_about = None)]
struct Args {
    /// Cells along the x axis
    #[arg(short, long, default_value_t = 128)]
    resolution: u32,

    /// Domain aspect ratio as WIDTH:HEIGHT
    #[arg(short, long, default_value = "1:1", value_parser = parse_aspect)]
    aspect: AspectRatio,

    /// Number of ticks to run
    #[arg(short, long, default_value_t = 600)]
    ticks: u64,

    /// Timestep in seconds
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Force the CPU backend
    #[arg(long)]
    cpu: bool,

    /// Initial velocity field
    #[arg(long, value_enum, default_value_t = Seed::Still)]
    seed: Seed,

    /// Vortex angular speed or noise amplitude
    #[arg(long, default_value_t = 1.0)]
    seed_strength: f32,

    /// Upward acceleration per unit temperature
    #[arg(long, default_value_t = 0.5)]
    buoyancy: f32,

    /// Report interval in ticks
    #[arg(long, default_value_t = 60)]
    report_interval: u64,

    /// Write the final density frame as a binary PPM image
    #[arg(long)]
    ppm: Option<PathBuf>,
}

fn parse_aspect(value: &str) -> Result<AspectRatio, String> {
    let (width, height) = value
        .split_once(':')
        .ok_or_else(|| format!("expected WIDTH:HEIGHT, got '{value}'"))?;
    let width = width.trim().parse().map_err(|e| format!("width: {e}"))?;
    let height = height.trim().parse().map_err(|e| format!("height: {e}"))?;
    Ok(AspectRatio::new(width, height))
}

/// Pointer orbiting the centre, switching edit mode every quarter of the run
fn scripted_input(tick: u64, total: u64, dt: f32) -> TickInput {
    const MODES: [EditMode; 4] = [
        EditMode::Fuel,
        EditMode::Temperature,
        EditMode::Density,
        EditMode::Velocity,
    ];
    let phase = ((tick * 4) / total.max(1)).min(3) as usize;
    let angle = tick as f32 * dt * 0.5 * TAU;
    TickInput {
        dt,
        pointer: Some(Vector2::new(angle.cos(), angle.sin()) * 0.25),
        buttons: PointerButtons {
            primary: true,
            secondary: phase == 3,
        },
        mode: MODES[phase],
    }
}

fn mode_name(mode: EditMode) -> &'static str {
    match mode {
        EditMode::Density => "density",
        EditMode::Temperature => "temperature",
        EditMode::Fuel => "fuel",
        EditMode::Velocity => "velocity",
    }
}

fn channel_stats(sim: &Simulation, kind: FieldKind, channel: usize) -> Result<FieldStats, SimError> {
    const EMPTY: FieldStats = FieldStats {
        min: 0.0,
        max: 0.0,
        mean: 0.0,
        total: 0.0,
        argmax: 0,
    };
    let data = sim.field(kind)?;
    Ok(FieldStats::of(&data, kind.channels(), channel).unwrap_or(EMPTY))
}

fn write_ppm(path: &Path, width: usize, height: usize, rgba: &[u8]) -> std::io::Result<()> {
    let mut bytes = format!("P6\n{width} {height}\n255\n").into_bytes();
    // PPM rows run top to bottom
    for row in rgba.chunks_exact(width * 4).rev() {
        for px in row.chunks_exact(4) {
            bytes.extend_from_slice(&px[..3]);
        }
    }
    fs::write(path, bytes)
}

fn run(args: &Args) -> Result<(), SimError> {
    let config = SimulationConfig {
        resolution: args.resolution,
        aspect_ratio: args.aspect,
        buoyancy: args.buoyancy,
        velocity_seed: match args.seed {
            Seed::Still => VelocitySeed::Still,
            Seed::Vortex => VelocitySeed::Vortex {
                strength: args.seed_strength,
            },
            Seed::Noise => VelocitySeed::Noise {
                seed: 42,
                amplitude: args.seed_strength,
            },
        },
        ..SimulationConfig::default()
    };
    let backend = if args.cpu {
        BackendPreference::Cpu
    } else {
        BackendPreference::Auto
    };
    let mut sim = Simulation::with_backend(config, backend)?;
    let geometry = sim.geometry();

    println!("=== Fluid Simulation Demo ===\n");
    println!(
        "Grid: {}x{} cells, backend: {}",
        geometry.width(),
        geometry.height(),
        if sim.is_gpu_accelerated() { "GPU" } else { "CPU" }
    );
    println!("Running {} ticks of {:.4}s...\n", args.ticks, args.dt);
    println!(" Tick | Time(s) | Mode        | Density  | Max Temp | Solid    | Gas      | ms/tick");
    println!("------|---------|-------------|----------|----------|----------|----------|--------");

    for tick in 0..args.ticks {
        let input = scripted_input(tick, args.ticks, args.dt);
        sim.tick(&input)?;

        if (tick + 1) % args.report_interval.max(1) == 0 || tick + 1 == args.ticks {
            let density = channel_stats(&sim, FieldKind::Density, 0)?;
            let temperature = channel_stats(&sim, FieldKind::Temperature, 0)?;
            let solid = channel_stats(&sim, FieldKind::FuelComposite, 0)?;
            let gas = channel_stats(&sim, FieldKind::FuelComposite, 1)?;
            println!(
                "{:5} | {:7.2} | {:11} | {:8.2} | {:8.3} | {:8.2} | {:8.2} | {:7.2}",
                sim.frame_count(),
                sim.elapsed(),
                mode_name(input.mode),
                density.total,
                temperature.max,
                solid.total,
                gas.total,
                sim.frame_timer().last_frame_time_ms()
            );
        }
    }

    println!("\n=== Simulation Complete ===");
    println!(
        "Average tick: {:.2} ms",
        sim.frame_timer().average_frame_time_ms()
    );

    if let Some(path) = &args.ppm {
        let frame = sim.present(FieldKind::Density)?;
        match write_ppm(path, geometry.width(), geometry.height(), frame) {
            Ok(()) => info!("Wrote density frame to {}", path.display()),
            Err(e) => eprintln!("Failed to write {}: {}", path.display(), e),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Simulation failed: {e}");
            ExitCode::FAILURE
        }
    }
}
