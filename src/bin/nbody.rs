use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use quadgrav::io::{read_bodies, FrameWriter};
use quadgrav::{SimParams, Simulation};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Sequential,
    Pool,
    Steal,
}

/// Two-dimensional Barnes-Hut N-body simulation.
#[derive(Parser, Debug)]
struct Args {
    /// Input CSV of body records.
    input: PathBuf,
    /// Output CSV of per-frame body states.
    #[arg(short, long, default_value = "simulation_results.csv")]
    output: PathBuf,
    /// Execution strategy.
    #[arg(short, long, value_enum, default_value_t = Mode::Sequential)]
    mode: Mode,
    /// Worker threads for the parallel modes.
    #[arg(short, long, default_value_t = 4)]
    workers: usize,
    /// Frame count; overrides the input header when given.
    #[arg(short, long)]
    frames: Option<usize>,
    /// Opening-angle threshold.
    #[arg(long, default_value_t = 0.5)]
    theta: f64,
    /// Time step per frame.
    #[arg(long, default_value_t = 0.01)]
    dt: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let (bodies, spec) = read_bodies(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let frames = args
        .frames
        .or((spec.frames > 0).then_some(spec.frames))
        .unwrap_or(100);

    let mut params = SimParams {
        theta: args.theta,
        dt: args.dt,
        ..SimParams::default()
    };
    if let Some(g) = spec.g.filter(|g| g.is_finite() && *g > 0.) {
        params.g = g;
    }

    let sim = Simulation::new(bodies, params);
    let mut sim = match args.mode {
        Mode::Sequential => sim,
        Mode::Pool => sim.pooled(args.workers),
        Mode::Steal => sim.work_stealing(args.workers),
    };

    let mut writer = FrameWriter::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let start = Instant::now();
    let mut write_error = None;
    sim.run(frames, |frame, bodies| {
        if write_error.is_none() {
            if let Err(err) = writer.write_frame(frame, bodies) {
                write_error = Some(err);
            }
        }
    })?;
    if let Some(err) = write_error {
        return Err(err).context("writing results");
    }

    println!("{frames} frames in {:.3?}", start.elapsed());
    Ok(())
}
