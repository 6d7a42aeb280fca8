use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use windprob::core::CorrelationTrainer;
use windprob::{CellGrid, NeighborCorrelationModel, RunConfig};

/// Accumulate a neighbor-correlation count table from resolved cell grids
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Output count table
    #[arg(value_name = "DISTPROB_FILE")]
    output: PathBuf,
    /// Cell files whose most probable directions are taken as truth
    #[arg(value_name = "OBPROB_FILE", required = true)]
    inputs: Vec<PathBuf>,
    /// JSON run configuration (geometry, encoding, axes)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Add to an existing table instead of starting empty
    #[arg(short, long, value_name = "TABLE")]
    append: Option<PathBuf>,
    /// Maximum pair distance in km (defaults to the distance axis range)
    #[arg(long)]
    max_distance: Option<f64>,
    /// Verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose > 0 { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match &args.config {
        Some(path) => RunConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => RunConfig::default(),
    };

    let mut trainer = match &args.append {
        Some(path) => {
            let model = NeighborCorrelationModel::read(path, config.axes, config.min_samples)
                .with_context(|| format!("Failed to read correlation table {}", path.display()))?;
            CorrelationTrainer::from_model(model)
        }
        None => CorrelationTrainer::new(config.axes, config.min_samples),
    };
    if let Some(max_distance) = args.max_distance {
        trainer = trainer.with_max_distance(max_distance);
    }

    for input in &args.inputs {
        let grid = CellGrid::read_from_file(input, config.geometry, config.encoding)
            .with_context(|| format!("Failed to read cell file {}", input.display()))?;
        trainer.add_grid(&grid);
    }

    let model = trainer.finish();
    model
        .write(&args.output)
        .with_context(|| format!("Failed to write correlation table {}", args.output.display()))?;

    Ok(())
}
