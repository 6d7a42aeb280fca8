use crate::core::grid::CellGrid;
use crate::core::sweep::{serpentine_order, SweepResult};
use crate::io::cell_file::CellWriter;
use crate::io::plot::{self, PlotParams};
use crate::types::{ProbEncoding, WindResult};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Output files of one filter run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPaths {
    /// Flowers of the revised cells
    pub flower: PathBuf,
    /// Best-direction vectors of the revised cells
    pub vector: PathBuf,
    /// Best-probability diamonds of the revised cells
    pub probability: PathBuf,
    /// Revised cell records
    pub cells: PathBuf,
    /// Best-direction vectors of the unfiltered input
    pub mle: PathBuf,
}

impl ProductPaths {
    /// `<base>.<gamma*100>.{flw,wnd,prb,opa}` and `<base>.mle`
    pub fn new<P: AsRef<Path>>(base: P, gamma: f32) -> Self {
        let base = base.as_ref().display().to_string();
        let tag = gamma_tag(gamma);
        Self {
            flower: PathBuf::from(format!("{}.{}.flw", base, tag)),
            vector: PathBuf::from(format!("{}.{}.wnd", base, tag)),
            probability: PathBuf::from(format!("{}.{}.prb", base, tag)),
            cells: PathBuf::from(format!("{}.{}.opa", base, tag)),
            mle: PathBuf::from(format!("{}.mle", base)),
        }
    }
}

pub fn gamma_tag(gamma: f32) -> u32 {
    (gamma * 100.0).round().max(0.0) as u32
}

/// What was written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductSummary {
    pub flowers: usize,
    pub vectors: usize,
    pub diamonds: usize,
    pub cells: usize,
    pub mle_vectors: usize,
}

fn create(path: &Path) -> WindResult<BufWriter<File>> {
    log::debug!("Creating output file: {}", path.display());
    Ok(BufWriter::new(File::create(path)?))
}

/// Write the plot glyphs and revised records of a sweep, plus the input's
/// maximum-likelihood vectors. Any I/O failure aborts the whole write.
pub fn write_filter_products(
    paths: &ProductPaths,
    input: &CellGrid,
    result: &SweepResult,
    plot_params: &PlotParams,
    encoding: ProbEncoding,
) -> WindResult<ProductSummary> {
    let mut summary = ProductSummary::default();

    let mut flowers = create(&paths.flower)?;
    let mut vectors = create(&paths.vector)?;
    let mut diamonds = create(&paths.probability)?;
    let mut records = CellWriter::new(create(&paths.cells)?, encoding);

    for cell in &result.cells {
        plot::write_flower(&mut flowers, cell, plot_params.flower_scale)?;
        summary.flowers += 1;
        if plot::write_best_vector(&mut vectors, cell, plot_params.vector_scale)? {
            summary.vectors += 1;
        }
        if plot::write_best_probability(&mut diamonds, cell, plot_params.diamond_scale)? {
            summary.diamonds += 1;
        }
        records.write_cell(cell)?;
    }
    summary.cells = records.records_written();

    flowers.flush()?;
    vectors.flush()?;
    diamonds.flush()?;
    records.finish()?;

    let mut mle = create(&paths.mle)?;
    for (cti, ati) in serpentine_order(input.geometry()) {
        if let Some(cell) = input.get(cti, ati) {
            if plot::write_best_vector(&mut mle, cell, plot_params.vector_scale)? {
                summary.mle_vectors += 1;
            }
        }
    }
    mle.flush()?;

    log::info!(
        "Wrote {} flowers, {} vectors, {} diamonds, {} records, {} input vectors",
        summary.flowers,
        summary.vectors,
        summary.diamonds,
        summary.cells,
        summary.mle_vectors
    );
    Ok(summary)
}
