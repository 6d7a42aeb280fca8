use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use windprob::core::NeighborMode;
use windprob::io::{write_filter_products, ProductPaths};
use windprob::{CellGrid, GridSweepDriver, LookupStrategy, NeighborCorrelationModel, ProbEncoding, RunConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LookupArg {
    Nearest,
    Interpolated,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Distribution,
    Vector,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EncodingArg {
    Float32,
    Quantized16,
}

/// Propagate neighbor evidence through a grid of direction probabilities
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Neighbor-correlation count table
    #[arg(value_name = "DISTPROB_FILE")]
    distprob_file: PathBuf,
    /// Per-cell direction probability records
    #[arg(value_name = "OBPROB_FILE")]
    obprob_file: PathBuf,
    /// Correlated-model weight in [0, 1]
    #[arg(value_name = "GAMMA")]
    gamma: f32,
    /// Output file base name
    #[arg(value_name = "OUTPUT_BASE")]
    output_base: PathBuf,
    /// JSON run configuration; command-line options override it
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Neighborhood window size in cells
    #[arg(short, long)]
    window: Option<usize>,
    /// Number of relaxation passes
    #[arg(short, long)]
    passes: Option<usize>,
    /// Correlation table lookup strategy
    #[arg(long, value_enum)]
    lookup: Option<LookupArg>,
    /// Compare against whole neighbor distributions or only best vectors
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// Probability encoding of the cell records
    #[arg(long, value_enum)]
    encoding: Option<EncodingArg>,
    /// Verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn build_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => RunConfig::default(),
    };

    config.propagation.gamma = args.gamma;
    if let Some(window) = args.window {
        config.propagation.window = window;
    }
    if let Some(passes) = args.passes {
        config.sweep.passes = passes;
    }
    if let Some(lookup) = args.lookup {
        config.lookup = match lookup {
            LookupArg::Nearest => LookupStrategy::Nearest,
            LookupArg::Interpolated => LookupStrategy::Interpolated,
        };
    }
    if let Some(mode) = args.mode {
        config.propagation.mode = match mode {
            ModeArg::Distribution => NeighborMode::Distribution,
            ModeArg::Vector => NeighborMode::BestVector,
        };
    }
    if let Some(encoding) = args.encoding {
        config.encoding = match encoding {
            EncodingArg::Float32 => ProbEncoding::Float32,
            EncodingArg::Quantized16 => ProbEncoding::Quantized16,
        };
    }

    config.validate().context("Invalid run configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = build_config(&args)?;

    let model = NeighborCorrelationModel::read(&args.distprob_file, config.axes, config.min_samples)
        .with_context(|| format!("Failed to read correlation table {}", args.distprob_file.display()))?
        .with_strategy(config.lookup);

    let grid = CellGrid::read_from_file(&args.obprob_file, config.geometry, config.encoding)
        .with_context(|| format!("Failed to read cell file {}", args.obprob_file.display()))?;

    let driver = GridSweepDriver::new(config.propagation.clone(), config.sweep.clone(), &model)
        .context("Failed to set up sweep")?;
    let result = driver.run(&grid).context("Sweep failed")?;

    let paths = ProductPaths::new(&args.output_base, config.propagation.gamma);
    write_filter_products(&paths, &grid, &result, &config.plot, config.encoding)
        .with_context(|| format!("Failed to write products for {}", args.output_base.display()))?;

    Ok(())
}
