//! Accumulation of the neighbor-correlation table from resolved wind fields.

use crate::core::cell::bin_separation;
use crate::core::correlation::{CorrelationAxes, NeighborCorrelationModel};
use crate::core::grid::CellGrid;
use crate::types::CELL_RESOLUTION_KM;

/// Counts of pairs seen while training
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainingStats {
    pub grids: usize,
    pub pairs_recorded: u64,
    /// Pairs whose quadruple fell outside the table axes
    pub pairs_rejected: u64,
}

/// Builds a correlation table from grids whose cells are reduced to their
/// most probable direction and its speed.
///
/// Every ordered pair of resolved cells within `max_distance_km` adds one
/// observation (distance, target speed, Δspeed, |Δdirection|).
pub struct CorrelationTrainer {
    model: NeighborCorrelationModel,
    max_distance_km: f64,
    stats: TrainingStats,
}

impl CorrelationTrainer {
    pub fn new(axes: CorrelationAxes, min_samples: u64) -> Self {
        let max_distance_km = axes.distance_km.max() + axes.distance_km.step / 2.0;
        Self {
            model: NeighborCorrelationModel::new(axes, min_samples),
            max_distance_km,
            stats: TrainingStats::default(),
        }
    }

    pub fn with_max_distance(mut self, max_distance_km: f64) -> Self {
        self.max_distance_km = max_distance_km;
        self
    }

    /// Resume accumulation on top of an existing table
    pub fn from_model(model: NeighborCorrelationModel) -> Self {
        let axes = *model.axes();
        let max_distance_km = axes.distance_km.max() + axes.distance_km.step / 2.0;
        Self {
            model,
            max_distance_km,
            stats: TrainingStats::default(),
        }
    }

    pub fn stats(&self) -> TrainingStats {
        self.stats
    }

    pub fn add_grid(&mut self, grid: &CellGrid) {
        let reach = (self.max_distance_km / CELL_RESOLUTION_KM).ceil() as usize;
        let window = 2 * reach + 1;
        let before = self.stats;

        for target in grid.cells() {
            let Some(b0) = target.best_dir_idx() else { continue };
            let s0 = target.speed(b0) as f64;

            for neighbor in grid.neighbors(target.cti, target.ati, window) {
                let Some(b1) = neighbor.best_dir_idx() else { continue };
                let distance = target.km_distance(neighbor);
                if distance > self.max_distance_km {
                    continue;
                }
                let delta_speed = neighbor.speed(b1) as f64 - s0;
                match self.model.record(distance, s0, delta_speed, bin_separation(b0, b1)) {
                    Ok(()) => self.stats.pairs_recorded += 1,
                    Err(_) => self.stats.pairs_rejected += 1,
                }
            }
        }

        self.stats.grids += 1;
        log::debug!(
            "Training grid {}: {} pairs recorded, {} outside the table",
            self.stats.grids,
            self.stats.pairs_recorded - before.pairs_recorded,
            self.stats.pairs_rejected - before.pairs_rejected
        );
    }

    pub fn finish(mut self) -> NeighborCorrelationModel {
        self.model.recompute_totals();
        log::info!(
            "Correlation table trained on {} grids: {} pairs recorded, {} rejected",
            self.stats.grids,
            self.stats.pairs_recorded,
            self.stats.pairs_rejected
        );
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cell::DirectionSpeedCell;
    use crate::core::correlation::{AxisSpec, Lookup, LookupStrategy};
    use crate::types::{GridGeometry, DIR_BINS};
    use std::f64::consts::PI;

    fn resolved(cti: usize, ati: usize, bin: usize, speed: f32) -> DirectionSpeedCell {
        let mut cell = DirectionSpeedCell::new(cti, ati);
        cell.set_probability(bin, 1.0);
        for idx in 0..DIR_BINS {
            cell.set_speed(idx, speed);
        }
        cell
    }

    #[test]
    fn test_uniform_field_trains_zero_difference() {
        let axes = CorrelationAxes {
            distance_km: AxisSpec::new(25.0, 25.0, 2),
            speed: AxisSpec::new(0.0, 1.0, 11),
            delta_speed: AxisSpec::new(-2.0, 1.0, 5),
            delta_direction: AxisSpec::new(0.0, PI / 36.0, 37),
        };
        let geometry = GridGeometry { ct_width: 3, at_width: 3 };
        let cells = (0..3).flat_map(|a| (0..3).map(move |c| resolved(c, a, 10, 6.0)));
        let grid = CellGrid::from_cells(geometry, cells).unwrap();

        let mut trainer = CorrelationTrainer::new(axes, 1).with_max_distance(40.0);
        trainer.add_grid(&grid);
        let stats = trainer.stats();
        // 12 orthogonal adjacencies and 8 diagonals, each seen from both ends
        assert_eq!(stats.pairs_recorded, 40);
        assert_eq!(stats.pairs_rejected, 0);

        let model = trainer.finish().with_strategy(LookupStrategy::Nearest);
        assert_eq!(model.total_observations(), 40);
        assert_eq!(model.probability(25.0, 6.0, 0.0, 0.0), Lookup::Probability(1.0));
        assert_eq!(model.probability(25.0, 6.0, 0.0, PI / 2.0), Lookup::Probability(0.0));
    }
}
