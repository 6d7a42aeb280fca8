//! Local probability propagation.
//!
//! For one target cell, every usable neighbor in a window produces an
//! evidence distribution over the target's direction bins. The evidence is
//! combined two ways, by summation (errors fully correlated between
//! neighbors) and by product (errors independent), and the two are blended
//! with the tunable γ.

use crate::core::cell::{bin_separation, DirectionSpeedCell};
use crate::core::correlation::{Lookup, NeighborCompatibility};
use crate::core::grid::CellGrid;
use crate::types::{WindError, WindResult, DIR_BINS};
use serde::{Deserialize, Serialize};

/// Which part of a neighbor's solution is compared against the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NeighborMode {
    /// Every direction bin of the neighbor, weighted by its probability
    #[default]
    Distribution,
    /// Only the neighbor's most probable direction
    BestVector,
}

/// Propagation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationParams {
    /// Neighborhood window size in cells (odd sizes are symmetric)
    pub window: usize,
    /// Weight of the correlated (additive) model; 0 is fully multiplicative
    pub gamma: f32,
    /// Probability floor applied to the multiplicative accumulator
    pub min_prob: f32,
    pub mode: NeighborMode,
    /// Also weight the blended neighbor evidence by the target's own
    /// distribution (off by default)
    pub use_own_likelihood: bool,
}

impl Default for PropagationParams {
    fn default() -> Self {
        Self {
            window: 7,
            gamma: 0.5,
            min_prob: 1e-4,
            mode: NeighborMode::Distribution,
            use_own_likelihood: false,
        }
    }
}

impl PropagationParams {
    pub fn validate(&self) -> WindResult<()> {
        if self.window == 0 {
            return Err(WindError::Config("Window size must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(WindError::Config(format!("Gamma {} is outside [0, 1]", self.gamma)));
        }
        // Below 1/DIR_BINS the largest bin of a normalized cell always survives
        let ceiling = 1.0 / DIR_BINS as f32;
        if !(self.min_prob >= 0.0 && self.min_prob < ceiling) {
            return Err(WindError::Config(format!(
                "Probability floor {} must lie in [0, {})",
                self.min_prob, ceiling
            )));
        }
        Ok(())
    }
}

/// Result of propagating one cell
#[derive(Debug, Clone, PartialEq)]
pub struct Propagation {
    pub cell: DirectionSpeedCell,
    pub neighbors_used: usize,
    pub neighbors_rejected: usize,
}

/// Computes revised direction probabilities for single cells
pub struct LocalProbabilityPropagator<'a, M: NeighborCompatibility + ?Sized> {
    params: PropagationParams,
    model: &'a M,
}

impl<'a, M: NeighborCompatibility + ?Sized> LocalProbabilityPropagator<'a, M> {
    pub fn new(params: PropagationParams, model: &'a M) -> Self {
        Self { params, model }
    }

    pub fn params(&self) -> &PropagationParams {
        &self.params
    }

    /// Revised cell at `(cti, ati)`, or `None` if that slot is empty
    pub fn propagate(&self, grid: &CellGrid, cti: usize, ati: usize) -> Option<Propagation> {
        let target = grid.get(cti, ati)?;

        let mut correlated = DirectionSpeedCell::new(cti, ati);
        correlated.fill_probabilities(0.0);
        let mut uncorrelated = DirectionSpeedCell::new(cti, ati);
        uncorrelated.fill_probabilities(1.0);

        let mut used = 0;
        let mut rejected = 0;
        for neighbor in grid.neighbors(cti, ati, self.params.window) {
            match self.neighbor_evidence(target, neighbor) {
                Some(evidence) => {
                    correlated.add_cell(&evidence);
                    uncorrelated.multiply(&evidence);
                    uncorrelated.normalize_with_floor(self.params.min_prob);
                    used += 1;
                }
                None => rejected += 1,
            }
        }

        // With no usable neighbor the correlated accumulator stays all zero,
        // so at gamma = 1 the result carries no information.
        correlated.normalize();
        uncorrelated.normalize();
        let gamma = self.params.gamma;
        let mut result = DirectionSpeedCell::new(cti, ati);
        for idx in 0..DIR_BINS {
            let blended = (1.0 - gamma) * uncorrelated.probability(idx) + gamma * correlated.probability(idx);
            result.set_probability(idx, blended);
        }
        result.normalize();

        if self.params.use_own_likelihood {
            self.weight_by_own(&mut result, target, used);
        }
        result.copy_speeds(target);

        Some(Propagation {
            cell: result,
            neighbors_used: used,
            neighbors_rejected: rejected,
        })
    }

    /// Multiply the blended evidence by the target's own distribution.
    /// A product that vanishes leaves the evidence as it was.
    fn weight_by_own(&self, result: &mut DirectionSpeedCell, target: &DirectionSpeedCell, used: usize) {
        if target.probability_sum() <= 0.0 {
            return;
        }
        let mut weighted = target.clone();
        if used > 0 {
            weighted.multiply(result);
        }
        if weighted.probability_sum() > 0.0 {
            weighted.normalize();
            for idx in 0..DIR_BINS {
                result.set_probability(idx, weighted.probability(idx));
            }
        } else {
            log::trace!(
                "Cell ({}, {}) shares no direction with its neighbors, keeping neighbor evidence",
                target.cti,
                target.ati
            );
        }
    }

    /// Normalized evidence a neighbor lends to each target direction, or
    /// `None` if any lookup for this neighbor is unavailable.
    pub fn neighbor_evidence(
        &self,
        target: &DirectionSpeedCell,
        neighbor: &DirectionSpeedCell,
    ) -> Option<DirectionSpeedCell> {
        let distance = target.km_distance(neighbor);
        let mut evidence = DirectionSpeedCell::new(target.cti, target.ati);

        match self.params.mode {
            NeighborMode::Distribution => {
                for dir in 0..DIR_BINS {
                    let speed = target.speed(dir) as f64;
                    for other in 0..DIR_BINS {
                        let delta_speed = neighbor.speed(other) as f64 - speed;
                        let p = self.lookup(distance, speed, delta_speed, dir, other, neighbor)?;
                        evidence.add(dir, p * neighbor.probability(other));
                    }
                }
            }
            NeighborMode::BestVector => {
                let Some(best) = neighbor.best_dir_idx() else {
                    log::trace!(
                        "Neighbor ({}, {}) has no selected direction",
                        neighbor.cti,
                        neighbor.ati
                    );
                    return None;
                };
                for dir in 0..DIR_BINS {
                    let speed = target.speed(dir) as f64;
                    let delta_speed = neighbor.speed(best) as f64 - speed;
                    let p = self.lookup(distance, speed, delta_speed, dir, best, neighbor)?;
                    evidence.add(dir, p);
                }
            }
        }

        evidence.normalize();
        Some(evidence)
    }

    fn lookup(
        &self,
        distance: f64,
        speed: f64,
        delta_speed: f64,
        dir: usize,
        other: usize,
        neighbor: &DirectionSpeedCell,
    ) -> Option<f32> {
        match self
            .model
            .compatibility(distance, speed, delta_speed, bin_separation(dir, other))
        {
            Lookup::Probability(p) => Some(p),
            Lookup::Unavailable(miss) => {
                log::trace!(
                    "Dropping neighbor ({}, {}): {:?} at distance {:.1} km, speed {:.2}, Δspeed {:.2}",
                    neighbor.cti,
                    neighbor.ati,
                    miss,
                    distance,
                    speed,
                    delta_speed
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::correlation::Miss;
    use crate::types::GridGeometry;
    use approx::assert_relative_eq;

    fn spike(cti: usize, ati: usize, bin: usize, speed: f32) -> DirectionSpeedCell {
        let mut cell = DirectionSpeedCell::new(cti, ati);
        cell.set_probability(bin, 1.0);
        for idx in 0..DIR_BINS {
            cell.set_speed(idx, speed);
        }
        cell
    }

    fn always_one(_: f64, _: f64, _: f64, _: f64) -> Lookup {
        Lookup::Probability(1.0)
    }

    #[test]
    fn test_params_validation() {
        assert!(PropagationParams::default().validate().is_ok());
        assert!(!PropagationParams::default().use_own_likelihood);
        let bad_gamma = PropagationParams { gamma: 1.5, ..Default::default() };
        assert!(bad_gamma.validate().is_err());
        let bad_floor = PropagationParams { min_prob: 0.5, ..Default::default() };
        assert!(bad_floor.validate().is_err());
    }

    #[test]
    fn test_empty_slot_produces_nothing() {
        let grid = CellGrid::new(GridGeometry { ct_width: 3, at_width: 3 });
        let propagator = LocalProbabilityPropagator::new(PropagationParams::default(), &always_one);
        assert!(propagator.propagate(&grid, 1, 1).is_none());
    }

    #[test]
    fn test_isolated_cell_without_evidence() {
        let geometry = GridGeometry { ct_width: 3, at_width: 3 };
        let grid = CellGrid::from_cells(geometry, [spike(1, 1, 5, 7.0)]).unwrap();

        // Only the multiplicative accumulator (all ones) contributes
        let propagator = LocalProbabilityPropagator::new(PropagationParams::default(), &always_one);
        let out = propagator.propagate(&grid, 1, 1).unwrap();
        assert_eq!(out.neighbors_used, 0);
        for idx in 0..DIR_BINS {
            assert_relative_eq!(out.cell.probability(idx), 1.0 / DIR_BINS as f32, epsilon = 1e-6);
        }
        assert_relative_eq!(out.cell.speed(5), 7.0);

        // Fully correlated: the additive accumulator never received anything
        let params = PropagationParams { gamma: 1.0, ..Default::default() };
        let out = LocalProbabilityPropagator::new(params, &always_one)
            .propagate(&grid, 1, 1)
            .unwrap();
        assert_eq!(out.cell.probability_sum(), 0.0);
        assert_eq!(out.cell.best_dir_idx(), None);
    }

    #[test]
    fn test_own_likelihood_keeps_isolated_cell() {
        let geometry = GridGeometry { ct_width: 3, at_width: 3 };
        let grid = CellGrid::from_cells(geometry, [spike(1, 1, 5, 7.0)]).unwrap();
        for gamma in [0.0, 1.0] {
            let params = PropagationParams { gamma, use_own_likelihood: true, ..Default::default() };
            let out = LocalProbabilityPropagator::new(params, &always_one)
                .propagate(&grid, 1, 1)
                .unwrap();
            assert_relative_eq!(out.cell.probability(5), 1.0);
        }
    }

    #[test]
    fn test_own_likelihood_never_erases_evidence() {
        let geometry = GridGeometry { ct_width: 3, at_width: 1 };
        let grid = CellGrid::from_cells(
            geometry,
            [spike(0, 0, 40, 6.0), spike(1, 0, 2, 6.0), spike(2, 0, 40, 6.0)],
        )
        .unwrap();
        let aligned = |_: f64, _: f64, _: f64, delta_direction: f64| {
            Lookup::Probability(if delta_direction < 1e-9 { 1.0 } else { 0.0 })
        };
        let params = PropagationParams {
            window: 3,
            gamma: 0.0,
            use_own_likelihood: true,
            ..Default::default()
        };
        let out = LocalProbabilityPropagator::new(params, &aligned)
            .propagate(&grid, 1, 0)
            .unwrap();
        assert_eq!(out.neighbors_used, 2);
        assert_eq!(out.cell.best_dir_idx(), Some(40));
        assert_relative_eq!(out.cell.probability_sum(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_best_vector_mode_rejects_unresolved_neighbor() {
        let geometry = GridGeometry { ct_width: 3, at_width: 1 };
        let unresolved = DirectionSpeedCell::new(0, 0);
        let grid = CellGrid::from_cells(
            geometry,
            [unresolved, spike(1, 0, 3, 6.0), spike(2, 0, 3, 6.0)],
        )
        .unwrap();
        let params = PropagationParams {
            window: 3,
            mode: NeighborMode::BestVector,
            ..Default::default()
        };
        let propagator = LocalProbabilityPropagator::new(params, &always_one);
        let out = propagator.propagate(&grid, 1, 0).unwrap();
        assert_eq!(out.neighbors_used, 1);
        assert_eq!(out.neighbors_rejected, 1);
    }

    #[test]
    fn test_single_unavailable_pair_drops_whole_neighbor() {
        let target = spike(0, 0, 0, 8.0);
        let mut neighbor = spike(1, 0, 0, 8.0);
        neighbor.set_speed(17, 30.0);

        let model = |_: f64, speed: f64, delta: f64, _: f64| {
            if speed + delta > 20.0 {
                Lookup::Unavailable(Miss::Undersampled { total: 0 })
            } else {
                Lookup::Probability(1.0)
            }
        };
        let propagator = LocalProbabilityPropagator::new(PropagationParams::default(), &model);
        assert!(propagator.neighbor_evidence(&target, &neighbor).is_none());
        neighbor.set_speed(17, 8.0);
        assert!(propagator.neighbor_evidence(&target, &neighbor).is_some());
    }
}
