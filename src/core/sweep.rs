use crate::core::cell::DirectionSpeedCell;
use crate::core::correlation::NeighborCompatibility;
use crate::core::grid::CellGrid;
use crate::core::propagate::{LocalProbabilityPropagator, Propagation, PropagationParams};
use crate::types::{GridGeometry, WindError, WindResult};
use serde::{Deserialize, Serialize};

/// Sweep parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepParams {
    /// Number of relaxation passes. Pass n > 1 reads the output of pass n - 1.
    pub passes: usize,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self { passes: 1 }
    }
}

impl SweepParams {
    pub fn validate(&self) -> WindResult<()> {
        if self.passes == 0 {
            return Err(WindError::Config("At least one sweep pass is required".to_string()));
        }
        Ok(())
    }
}

/// Per-pass counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub passes: usize,
    pub cells_processed: usize,
    pub empty_positions: usize,
    pub neighbors_used: usize,
    pub neighbors_rejected: usize,
}

/// Output of a sweep: revised cells of the final pass in sweep order
#[derive(Debug, Clone)]
pub struct SweepResult {
    pub geometry: GridGeometry,
    pub cells: Vec<DirectionSpeedCell>,
    pub stats: SweepStats,
}

impl SweepResult {
    pub fn into_grid(self) -> WindResult<CellGrid> {
        CellGrid::from_cells(self.geometry, self.cells)
    }
}

/// Serpentine (boustrophedon) visiting order: along-track rows in
/// increasing order, even rows left to right, odd rows right to left.
pub fn serpentine_order(geometry: GridGeometry) -> impl Iterator<Item = (usize, usize)> {
    let ct_width = geometry.ct_width;
    (0..geometry.at_width).flat_map(move |ati| {
        (0..ct_width).map(move |i| {
            let cti = if ati % 2 == 0 { i } else { ct_width - 1 - i };
            (cti, ati)
        })
    })
}

/// Applies the local propagator over a whole grid.
///
/// The grid read by a pass is never modified; outputs go to a separate
/// buffer, so cells can be processed in any order or in parallel.
pub struct GridSweepDriver<'a, M: NeighborCompatibility + ?Sized> {
    propagator: LocalProbabilityPropagator<'a, M>,
    params: SweepParams,
}

impl<'a, M: NeighborCompatibility + ?Sized> GridSweepDriver<'a, M> {
    pub fn new(propagation: PropagationParams, sweep: SweepParams, model: &'a M) -> WindResult<Self> {
        propagation.validate()?;
        sweep.validate()?;
        Ok(Self {
            propagator: LocalProbabilityPropagator::new(propagation, model),
            params: sweep,
        })
    }

    pub fn propagator(&self) -> &LocalProbabilityPropagator<'a, M> {
        &self.propagator
    }

    pub fn run(&self, grid: &CellGrid) -> WindResult<SweepResult> {
        let geometry = grid.geometry();
        log::info!(
            "Sweeping {}x{} grid ({} cells), {} pass(es), gamma {:.2}",
            geometry.ct_width,
            geometry.at_width,
            grid.len(),
            self.params.passes,
            self.propagator.params().gamma
        );
        log::debug!("Propagation parameters: {:?}", self.propagator.params());

        let (mut cells, mut stats) = self.sweep_pass(grid);
        for pass in 2..=self.params.passes {
            let relaxed = CellGrid::from_cells(geometry, cells)?;
            let (next_cells, next_stats) = self.sweep_pass(&relaxed);
            log::debug!("Pass {}: {:?}", pass, next_stats);
            cells = next_cells;
            stats = next_stats;
        }
        stats.passes = self.params.passes;

        log::info!(
            "Sweep complete: {} cells processed, {} empty positions, {} neighbors used, {} rejected",
            stats.cells_processed,
            stats.empty_positions,
            stats.neighbors_used,
            stats.neighbors_rejected
        );

        Ok(SweepResult { geometry, cells, stats })
    }

    fn sweep_pass(&self, grid: &CellGrid) -> (Vec<DirectionSpeedCell>, SweepStats) {
        let results = self.propagate_all(grid);

        let mut stats = SweepStats::default();
        let mut cells = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Some(p) => {
                    stats.cells_processed += 1;
                    stats.neighbors_used += p.neighbors_used;
                    stats.neighbors_rejected += p.neighbors_rejected;
                    cells.push(p.cell);
                }
                None => stats.empty_positions += 1,
            }
        }
        (cells, stats)
    }

    /// Propagate every position, results in sweep order
    #[cfg(feature = "parallel")]
    fn propagate_all(&self, grid: &CellGrid) -> Vec<Option<Propagation>> {
        use rayon::prelude::*;

        let order: Vec<(usize, usize)> = serpentine_order(grid.geometry()).collect();
        order
            .into_par_iter()
            .map(|(cti, ati)| self.propagator.propagate(grid, cti, ati))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn propagate_all(&self, grid: &CellGrid) -> Vec<Option<Propagation>> {
        serpentine_order(grid.geometry())
            .map(|(cti, ati)| self.propagator.propagate(grid, cti, ati))
            .collect()
    }
}
