//! Decimate the same baked grid under every metric and solver.
//!
//! Run with: cargo run --release --bin compare_metrics
//!
//! Each combination removes probes down to the same count; the table shows
//! which probes each choice keeps by reporting the error the result has under
//! the plain RGB average-percentage measure.

mod sky;

use anyhow::{Context, Result};
use clap::Parser;
use probecrate_core::{Point3f, ProbeSet};
use probecrate_decimation::{
    CancellationToken, DecimationConfig, DecimationEngine, FixedPattern, Metric, SamplingMode,
    Solver,
};
use sky::AnalyticSkyBaker;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "compare_metrics")]
#[command(about = "Compare probe decimation under each metric and solver")]
struct Args {
    /// Probes per axis
    #[arg(long, default_value_t = 4)]
    size: usize,

    /// Probes left after decimation
    #[arg(long, default_value_t = 32)]
    keep: usize,

    #[arg(short, long, default_value_t = 7)]
    seed: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).init();

    let extent = (args.size.max(2) - 1) as f32;
    let positions: Vec<Point3f> = (0..args.size.pow(3))
        .map(|i| {
            let (x, y, z) = (i / (args.size * args.size), (i / args.size) % args.size, i % args.size);
            Point3f::new(x as f32, y as f32, z as f32)
        })
        .collect();
    let baker = AnalyticSkyBaker::new(256, args.seed)
        .with_canopy(0.0, 0.0, extent * 0.5, extent, extent * 0.8);
    let probes = ProbeSet::bake(positions, &baker).context("baking probe encodings")?;
    let eval: Vec<Point3f> = probes
        .positions()
        .iter()
        .filter(|p| p.x < extent && p.y < extent && p.z < extent)
        .map(|p| Point3f::new(p.x + 0.5, p.y + 0.5, p.z + 0.5))
        .collect();

    println!(
        "{:<12} {:<24} {:>10} {:>12} {:>10}",
        "metric", "solver", "probes", "rgb avg %", "time"
    );
    for metric in Metric::ALL {
        for solver in Solver::ALL {
            let config = DecimationConfig::default()
                .with_min_probes(args.keep)
                .without_max_error()
                .with_metric(metric)
                .with_solver(solver)
                .with_directions(SamplingMode::Fixed(FixedPattern::Six))
                .with_seed(args.seed);
            let mut engine = DecimationEngine::from_config(config);

            let start = Instant::now();
            let report = engine.decimate(&probes, &eval, &CancellationToken::new(), |_| {})?;
            let elapsed = start.elapsed();

            engine.set_config(
                engine
                    .config()
                    .clone()
                    .with_metric(Metric::Rgb)
                    .with_solver(Solver::AveragePercentageError),
            );
            engine.generate_reference(&probes, &eval)?;
            let rgb_error = engine.evaluate_error(&report.probes)?;

            println!(
                "{:<12} {:<24} {:>10} {:>12.4} {:>10.2?}",
                format!("{:?}", metric),
                format!("{:?}", solver),
                report.probes.len(),
                rgb_error,
                elapsed
            );
        }
    }

    Ok(())
}
