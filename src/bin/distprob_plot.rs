use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use windprob::core::LookupStrategy;
use windprob::io::plot::write_correlation_curves;
use windprob::{NeighborCorrelationModel, RunConfig};

/// Write probability against direction difference curves from a correlation table
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Neighbor-correlation count table
    #[arg(value_name = "DISTPROB_FILE")]
    table: PathBuf,
    /// Neighbor distance in km
    #[arg(value_name = "DISTANCE_KM")]
    distance: f64,
    /// Target wind speed in m/s
    #[arg(value_name = "SPEED")]
    speed: f64,
    /// Output text file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,
    /// JSON run configuration (axes, minimum samples)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Use nearest-bin lookup instead of interpolation
    #[arg(long)]
    nearest: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match &args.config {
        Some(path) => RunConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => RunConfig::default(),
    };
    let strategy = if args.nearest { LookupStrategy::Nearest } else { config.lookup };

    let model = NeighborCorrelationModel::read(&args.table, config.axes, config.min_samples)
        .with_context(|| format!("Failed to read correlation table {}", args.table.display()))?
        .with_strategy(strategy);

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut out = BufWriter::new(file);
    let lines = write_correlation_curves(&mut out, &model, args.distance, args.speed)
        .context("Failed to write curves")?;
    out.flush().context("Failed to flush curves")?;

    log::info!("Wrote {} curve points to {}", lines, args.output.display());
    Ok(())
}
