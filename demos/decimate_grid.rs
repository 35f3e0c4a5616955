//! Bake an analytic sky onto a regular probe grid and decimate it.
//!
//! Run with: cargo run --release --bin decimate_grid
//!
//! Usage:
//!   decimate_grid                          5x5x5 grid, default limits
//!   decimate_grid --size 6 --min-probes 40 Stop at 40 probes
//!   decimate_grid --max-error 2.5          Stop before the error passes 2.5%
//!   decimate_grid --stochastic 16 --json   Sampled candidates, JSON telemetry

mod sky;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use probecrate_core::{Point3f, ProbeSet};
use probecrate_decimation::{
    CancellationToken, DecimationConfig, DecimationEngine, FixedPattern, Metric, SamplingMode,
    Solver, ZeroCostPolicy,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sky::AnalyticSkyBaker;
use std::time::Instant;
use tracing::{info, Level};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MetricArg {
    Rgb,
    Chrominance,
    Luminance,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Rgb => Metric::Rgb,
            MetricArg::Chrominance => Metric::Chrominance,
            MetricArg::Luminance => Metric::Luminance,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SolverArg {
    MaxPercent,
    AveragePercent,
    L1,
    L2,
    L2Squared,
}

impl From<SolverArg> for Solver {
    fn from(arg: SolverArg) -> Self {
        match arg {
            SolverArg::MaxPercent => Solver::MaxPercentageError,
            SolverArg::AveragePercent => Solver::AveragePercentageError,
            SolverArg::L1 => Solver::L1,
            SolverArg::L2 => Solver::L2,
            SolverArg::L2Squared => Solver::L2Squared,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionsArg {
    Six,
    Fourteen,
    TwentySix,
}

impl From<DirectionsArg> for SamplingMode {
    fn from(arg: DirectionsArg) -> Self {
        SamplingMode::Fixed(match arg {
            DirectionsArg::Six => FixedPattern::Six,
            DirectionsArg::Fourteen => FixedPattern::Fourteen,
            DirectionsArg::TwentySix => FixedPattern::TwentySix,
        })
    }
}

#[derive(Parser)]
#[command(name = "decimate_grid")]
#[command(about = "Decimate a baked light probe grid")]
struct Args {
    /// Probes per axis
    #[arg(long, default_value_t = 5)]
    size: usize,

    /// Distance between neighbouring probes
    #[arg(long, default_value_t = 1.0)]
    spacing: f32,

    /// Number of random evaluation points inside the grid
    #[arg(long, default_value_t = 200)]
    eval_points: usize,

    /// Stop at this many probes
    #[arg(long)]
    min_probes: Option<usize>,

    /// Stop before the error passes this value
    #[arg(long)]
    max_error: Option<f64>,

    #[arg(long, value_enum, default_value_t = MetricArg::Rgb)]
    metric: MetricArg,

    #[arg(long, value_enum, default_value_t = SolverArg::AveragePercent)]
    solver: SolverArg,

    /// Evaluation directions per point
    #[arg(long, value_enum, default_value_t = DirectionsArg::Fourteen)]
    directions: DirectionsArg,

    /// Try this many random candidates per iteration instead of all
    #[arg(long)]
    stochastic: Option<usize>,

    /// Let zero-cost removals win
    #[arg(long)]
    accept_zero_cost: bool,

    /// Monte-Carlo samples per probe bake
    #[arg(long, default_value_t = 512)]
    bake_samples: usize,

    #[arg(short, long, default_value_t = 12345)]
    seed: u64,

    /// Print telemetry as JSON
    #[arg(long)]
    json: bool,

    /// Log every iteration
    #[arg(short, long)]
    verbose: bool,
}

fn grid(size: usize, spacing: f32) -> Vec<Point3f> {
    let mut positions = Vec::with_capacity(size * size * size);
    for x in 0..size {
        for y in 0..size {
            for z in 0..size {
                positions.push(Point3f::new(
                    x as f32 * spacing,
                    y as f32 * spacing,
                    z as f32 * spacing,
                ));
            }
        }
    }
    positions
}

fn eval_points(count: usize, extent: f32, seed: u64) -> Vec<Point3f> {
    let mut rng = StdRng::seed_from_u64(seed);
    let margin = extent * 0.02;
    (0..count)
        .map(|_| {
            Point3f::new(
                rng.gen_range(margin..extent - margin),
                rng.gen_range(margin..extent - margin),
                rng.gen_range(margin..extent - margin),
            )
        })
        .collect()
}

fn config_from(args: &Args) -> DecimationConfig {
    let mut config = DecimationConfig::default()
        .with_metric(args.metric.into())
        .with_solver(args.solver.into())
        .with_directions(args.directions.into())
        .with_seed(args.seed);

    match (args.min_probes, args.max_error) {
        (Some(min), Some(max)) => config = config.with_min_probes(min).with_max_error(max),
        (Some(min), None) => config = config.with_min_probes(min).without_max_error(),
        (None, Some(max)) => config = config.with_max_error(max).without_min_probes(),
        (None, None) => {}
    }
    if let Some(count) = args.stochastic {
        config = config.with_stochastic(count);
    }
    if args.accept_zero_cost {
        config = config.with_zero_cost_policy(ZeroCostPolicy::Accept);
    }
    config
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if args.size < 2 {
        anyhow::bail!("--size must be at least 2");
    }
    let extent = (args.size - 1) as f32 * args.spacing;

    let start = Instant::now();
    let baker = AnalyticSkyBaker::new(args.bake_samples, args.seed)
        .with_canopy(0.0, 0.0, extent * 0.5, extent * 0.5, extent * 0.75);
    let probes = ProbeSet::bake(grid(args.size, args.spacing), &baker)
        .context("baking probe encodings")?;
    let eval = eval_points(args.eval_points, extent, args.seed ^ 0x9e37_79b9);
    info!(
        "baked {} probes and placed {} evaluation points in {:.2?}",
        probes.len(),
        eval.len(),
        start.elapsed()
    );

    let config = config_from(&args);
    config.validate().context("invalid decimation settings")?;
    let mut engine = DecimationEngine::from_config(config);

    let cancel = CancellationToken::new();
    let report = engine
        .decimate(&probes, &eval, &cancel, |event| {
            if event.candidate + 1 == event.candidates {
                info!(
                    "iteration {}: {} probes, error {:.4}, best candidate {:?}",
                    event.iteration, event.probe_count, event.current_error, event.best_cost
                );
            }
        })
        .context("decimation failed")?;

    println!(
        "{:?}: {} -> {} probes after {} iterations, error {:.4}",
        report.termination,
        probes.len(),
        report.probes.len(),
        report.iterations,
        report.final_error
    );
    println!("{}", engine.timings().summary());

    if args.json {
        println!("{}", serde_json::to_string_pretty(engine.telemetry())?);
    }

    Ok(())
}
