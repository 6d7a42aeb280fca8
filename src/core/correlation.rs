//! Empirical neighbor-consistency model.
//!
//! A 4D histogram of counts indexed by (distance, speed, Δspeed, Δdirection)
//! gives the probability that a neighbor at some distance carries a given
//! speed and direction difference, conditioned on the distance and on the
//! target's own speed.

use crate::io::table_file;
use crate::types::{WindError, WindResult};
use ndarray::{Array2, Array4, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

const BRACKET_TOLERANCE: f64 = 1e-6;

/// Uniformly spaced bin centers `min + i * step`, `i < count`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub min: f64,
    pub step: f64,
    pub count: usize,
}

impl AxisSpec {
    pub fn new(min: f64, step: f64, count: usize) -> Self {
        Self { min, step, count }
    }

    pub fn center(&self, idx: usize) -> f64 {
        self.min + idx as f64 * self.step
    }

    pub fn max(&self) -> f64 {
        self.center(self.count.saturating_sub(1))
    }

    /// Index of the nearest center, `None` outside the axis
    pub fn nearest(&self, value: f64) -> Option<usize> {
        let rounded = ((value - self.min) / self.step).round();
        if rounded >= 0.0 && rounded < self.count as f64 {
            Some(rounded as usize)
        } else {
            None
        }
    }

    /// Lower bracketing index and the interpolation weight of the upper
    /// neighbor. Values must lie within the first and last centers.
    pub fn bracket(&self, value: f64) -> Option<(usize, f64)> {
        let f = (value - self.min) / self.step;
        let last = self.count.saturating_sub(1) as f64;
        if !(f >= -BRACKET_TOLERANCE && f <= last + BRACKET_TOLERANCE) {
            return None;
        }
        if self.count == 1 {
            return Some((0, 0.0));
        }
        let f = f.clamp(0.0, last);
        let lower = (f.floor() as usize).min(self.count - 2);
        Some((lower, f - lower as f64))
    }

    fn validate(&self, name: &str) -> WindResult<()> {
        if self.count == 0 {
            return Err(WindError::Config(format!("{} axis has no bins", name)));
        }
        if !(self.step > 0.0) || !self.min.is_finite() {
            return Err(WindError::Config(format!(
                "{} axis needs a finite origin and positive step (min {}, step {})",
                name, self.min, self.step
            )));
        }
        Ok(())
    }
}

/// The four table dimensions, in storage order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    Distance,
    Speed,
    DeltaSpeed,
    DeltaDirection,
}

/// Binning of the four table axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationAxes {
    /// Neighbor distance in km
    pub distance_km: AxisSpec,
    /// Target speed in m/s
    pub speed: AxisSpec,
    /// Neighbor speed minus target speed in m/s
    pub delta_speed: AxisSpec,
    /// Absolute direction difference in radians, 0..=π
    pub delta_direction: AxisSpec,
}

impl Default for CorrelationAxes {
    fn default() -> Self {
        Self {
            distance_km: AxisSpec::new(25.0, 25.0, 12),
            speed: AxisSpec::new(0.0, 1.0, 31),
            delta_speed: AxisSpec::new(-15.0, 1.0, 31),
            delta_direction: AxisSpec::new(0.0, PI / 36.0, 37),
        }
    }
}

impl CorrelationAxes {
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (
            self.distance_km.count,
            self.speed.count,
            self.delta_speed.count,
            self.delta_direction.count,
        )
    }

    pub fn bin_count(&self) -> usize {
        let (d, s, ds, dd) = self.shape();
        d * s * ds * dd
    }

    pub fn validate(&self) -> WindResult<()> {
        self.distance_km.validate("distance")?;
        self.speed.validate("speed")?;
        self.delta_speed.validate("delta speed")?;
        self.delta_direction.validate("delta direction")
    }

    fn spec(&self, kind: AxisKind) -> &AxisSpec {
        match kind {
            AxisKind::Distance => &self.distance_km,
            AxisKind::Speed => &self.speed,
            AxisKind::DeltaSpeed => &self.delta_speed,
            AxisKind::DeltaDirection => &self.delta_direction,
        }
    }

    /// Nearest bin on every axis, or the first axis the quadruple falls off
    pub fn nearest_bins(&self, quad: [f64; 4]) -> Result<[usize; 4], AxisKind> {
        let mut bins = [0usize; 4];
        for (slot, (kind, value)) in bins.iter_mut().zip(KINDS.iter().zip(quad)) {
            *slot = self.spec(*kind).nearest(value).ok_or(*kind)?;
        }
        Ok(bins)
    }
}

const KINDS: [AxisKind; 4] = [
    AxisKind::Distance,
    AxisKind::Speed,
    AxisKind::DeltaSpeed,
    AxisKind::DeltaDirection,
];

/// How a continuous quadruple is mapped onto the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LookupStrategy {
    /// Single nearest bin on every axis
    Nearest,
    /// 16-term multilinear blend of the bracketing bins
    #[default]
    Interpolated,
}

/// Why a lookup produced no probability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    OutOfRange(AxisKind),
    Undersampled { total: u64 },
}

/// Outcome of a compatibility lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    Probability(f32),
    Unavailable(Miss),
}

impl Lookup {
    pub fn value(self) -> Option<f32> {
        match self {
            Lookup::Probability(p) => Some(p),
            Lookup::Unavailable(_) => None,
        }
    }
}

/// Pairwise compatibility of a target direction/speed with a neighbor's.
///
/// Arguments: distance (km), target speed, neighbor speed minus target
/// speed (m/s), absolute direction difference in [0, π].
pub trait NeighborCompatibility: Sync {
    fn compatibility(&self, distance_km: f64, speed: f64, delta_speed: f64, delta_direction: f64) -> Lookup;
}

impl<F> NeighborCompatibility for F
where
    F: Fn(f64, f64, f64, f64) -> Lookup + Sync,
{
    fn compatibility(&self, distance_km: f64, speed: f64, delta_speed: f64, delta_direction: f64) -> Lookup {
        self(distance_km, speed, delta_speed, delta_direction)
    }
}

/// Histogram-backed neighbor correlation model
#[derive(Debug, Clone)]
pub struct NeighborCorrelationModel {
    axes: CorrelationAxes,
    min_samples: u64,
    strategy: LookupStrategy,
    counts: Array4<u64>,
    /// Observations per (distance, speed) bin, always derived from `counts`
    totals: Array2<u64>,
}

impl NeighborCorrelationModel {
    /// Create an empty table
    pub fn new(axes: CorrelationAxes, min_samples: u64) -> Self {
        let (d, s, _, _) = axes.shape();
        Self {
            axes,
            min_samples,
            strategy: LookupStrategy::default(),
            counts: Array4::zeros(axes.shape()),
            totals: Array2::zeros((d, s)),
        }
    }

    /// Adopt an existing count array; totals are recomputed
    pub fn from_counts(axes: CorrelationAxes, min_samples: u64, counts: Array4<u64>) -> WindResult<Self> {
        if counts.dim() != axes.shape() {
            return Err(WindError::InvalidFormat(format!(
                "Count table shape {:?} does not match axes {:?}",
                counts.dim(),
                axes.shape()
            )));
        }
        let mut model = Self::new(axes, min_samples);
        model.counts = counts;
        model.recompute_totals();
        Ok(model)
    }

    /// Load a table dump written by [`NeighborCorrelationModel::write`]
    pub fn read<P: AsRef<Path>>(path: P, axes: CorrelationAxes, min_samples: u64) -> WindResult<Self> {
        log::info!("Reading correlation table from: {}", path.as_ref().display());
        let counts = table_file::read_counts(path.as_ref(), axes.shape())?;
        let model = Self::from_counts(axes, min_samples, counts)?;
        log::info!(
            "Correlation table loaded: {:?} bins, {} observations",
            axes.shape(),
            model.total_observations()
        );
        Ok(model)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> WindResult<()> {
        log::info!("Writing correlation table to: {}", path.as_ref().display());
        table_file::write_counts(path.as_ref(), &self.counts)
    }

    pub fn with_strategy(mut self, strategy: LookupStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn set_strategy(&mut self, strategy: LookupStrategy) {
        self.strategy = strategy;
    }

    pub fn strategy(&self) -> LookupStrategy {
        self.strategy
    }

    pub fn axes(&self) -> &CorrelationAxes {
        &self.axes
    }

    pub fn min_samples(&self) -> u64 {
        self.min_samples
    }

    pub fn counts(&self) -> &Array4<u64> {
        &self.counts
    }

    pub fn totals(&self) -> &Array2<u64> {
        &self.totals
    }

    pub fn total_observations(&self) -> u64 {
        self.totals.sum()
    }

    /// Rebuild the per-(distance, speed) totals from the counts
    pub fn recompute_totals(&mut self) {
        self.totals = self.counts.sum_axis(Axis(3)).sum_axis(Axis(2));
    }

    /// Add one observation by bin index. Totals are kept in step.
    pub fn increment(&mut self, bins: [usize; 4]) {
        self.counts[bins] += 1;
        self.totals[[bins[0], bins[1]]] += 1;
    }

    /// Add one observation in physical units, binned to the nearest centers.
    /// Returns the axis the quadruple fell off, if any.
    pub fn record(
        &mut self,
        distance_km: f64,
        speed: f64,
        delta_speed: f64,
        delta_direction: f64,
    ) -> Result<(), AxisKind> {
        let bins = self
            .axes
            .nearest_bins([distance_km, speed, delta_speed, delta_direction])?;
        self.increment(bins);
        Ok(())
    }

    /// Probability of one table bin.
    ///
    /// The Δdirection axis holds |Δ|, so interior bins carry the mass of
    /// both signs and are halved; the 0 and π bins are not.
    pub fn bin_probability(&self, bins: [usize; 4]) -> Lookup {
        let total = self.totals[[bins[0], bins[1]]];
        if total == 0 || total < self.min_samples {
            return Lookup::Unavailable(Miss::Undersampled { total });
        }
        let mut p = self.counts[bins] as f64 / total as f64;
        let last_dir = self.axes.delta_direction.count - 1;
        if bins[3] != 0 && bins[3] != last_dir {
            p *= 0.5;
        }
        Lookup::Probability(p as f32)
    }

    /// Probability for a quadruple using the model's configured strategy
    pub fn probability(&self, distance_km: f64, speed: f64, delta_speed: f64, delta_direction: f64) -> Lookup {
        self.probability_with(self.strategy, distance_km, speed, delta_speed, delta_direction)
    }

    /// Probability for a quadruple with an explicit strategy.
    /// A zero distance (the target itself) is always fully compatible.
    pub fn probability_with(
        &self,
        strategy: LookupStrategy,
        distance_km: f64,
        speed: f64,
        delta_speed: f64,
        delta_direction: f64,
    ) -> Lookup {
        if distance_km == 0.0 {
            return Lookup::Probability(1.0);
        }
        let quad = [distance_km, speed, delta_speed, delta_direction];
        match strategy {
            LookupStrategy::Nearest => match self.axes.nearest_bins(quad) {
                Ok(bins) => self.bin_probability(bins),
                Err(kind) => Lookup::Unavailable(Miss::OutOfRange(kind)),
            },
            LookupStrategy::Interpolated => self.interpolated(quad),
        }
    }

    fn interpolated(&self, quad: [f64; 4]) -> Lookup {
        let mut brackets = [(0usize, 0.0f64); 4];
        for (slot, (kind, value)) in brackets.iter_mut().zip(KINDS.iter().zip(quad)) {
            match self.axes.spec(*kind).bracket(value) {
                Some(b) => *slot = b,
                None => return Lookup::Unavailable(Miss::OutOfRange(*kind)),
            }
        }

        let mut blended = 0.0f64;
        for corner in 0..16usize {
            let mut bins = [0usize; 4];
            let mut weight = 1.0f64;
            for axis in 0..4 {
                let (lower, frac) = brackets[axis];
                if corner >> axis & 1 == 1 {
                    bins[axis] = lower + 1;
                    weight *= frac;
                } else {
                    bins[axis] = lower;
                    weight *= 1.0 - frac;
                }
            }
            if weight == 0.0 {
                continue;
            }
            match self.bin_probability(bins) {
                Lookup::Probability(p) => blended += weight * p as f64,
                miss => return miss,
            }
        }
        Lookup::Probability(blended as f32)
    }
}

impl NeighborCompatibility for NeighborCorrelationModel {
    fn compatibility(&self, distance_km: f64, speed: f64, delta_speed: f64, delta_direction: f64) -> Lookup {
        self.probability(distance_km, speed, delta_speed, delta_direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_axes() -> CorrelationAxes {
        CorrelationAxes {
            distance_km: AxisSpec::new(25.0, 25.0, 3),
            speed: AxisSpec::new(0.0, 1.0, 4),
            delta_speed: AxisSpec::new(-2.0, 1.0, 5),
            delta_direction: AxisSpec::new(0.0, PI / 4.0, 5),
        }
    }

    fn seeded_model(min_samples: u64) -> NeighborCorrelationModel {
        let mut model = NeighborCorrelationModel::new(unit_axes(), min_samples);
        for _ in 0..30 {
            model.increment([1, 2, 3, 0]);
            model.increment([1, 2, 3, 2]);
        }
        model
    }

    #[test]
    fn test_zero_distance_is_certain() {
        let model = NeighborCorrelationModel::new(unit_axes(), 1_000);
        for strategy in [LookupStrategy::Nearest, LookupStrategy::Interpolated] {
            assert_eq!(
                model.probability_with(strategy, 0.0, 99.0, -50.0, 7.0),
                Lookup::Probability(1.0)
            );
        }
    }

    #[test]
    fn test_interior_direction_bin_is_halved() {
        let model = seeded_model(10).with_strategy(LookupStrategy::Nearest);
        let endpoint = model.probability(50.0, 2.0, 1.0, 0.0);
        let interior = model.probability(50.0, 2.0, 1.0, PI / 2.0);
        assert_eq!(endpoint, Lookup::Probability(0.5));
        assert_eq!(interior, Lookup::Probability(0.25));
    }

    #[test]
    fn test_undersampled_bin_is_unavailable() {
        let model = seeded_model(61).with_strategy(LookupStrategy::Nearest);
        assert_eq!(
            model.probability(50.0, 2.0, 1.0, 0.0),
            Lookup::Unavailable(Miss::Undersampled { total: 60 })
        );
        let empty = model.probability(25.0, 0.0, 0.0, 0.0);
        assert_eq!(empty, Lookup::Unavailable(Miss::Undersampled { total: 0 }));
    }

    #[test]
    fn test_out_of_range_axes() {
        let model = seeded_model(1);
        for strategy in [LookupStrategy::Nearest, LookupStrategy::Interpolated] {
            assert_eq!(
                model.probability_with(strategy, 500.0, 2.0, 1.0, 0.0),
                Lookup::Unavailable(Miss::OutOfRange(AxisKind::Distance))
            );
            assert_eq!(
                model.probability_with(strategy, 50.0, 2.0, 9.0, 0.0),
                Lookup::Unavailable(Miss::OutOfRange(AxisKind::DeltaSpeed))
            );
        }
    }

    #[test]
    fn test_interpolation_blends_neighbors() {
        let model = seeded_model(1).with_strategy(LookupStrategy::Interpolated);
        // Halfway between the Δdir = 0 bin (0.5) and the Δdir = π/4 bin (0.0)
        let p = model.probability(50.0, 2.0, 1.0, PI / 8.0).value().unwrap();
        assert_relative_eq!(p, 0.25, epsilon = 1e-6);
        // Exactly on a center matches the nearest-bin lookup
        let on_center = model.probability(50.0, 2.0, 1.0, PI / 2.0).value().unwrap();
        assert_relative_eq!(on_center, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_interpolation_fails_if_a_corner_is_undersampled() {
        let model = seeded_model(1).with_strategy(LookupStrategy::Interpolated);
        // Between distance bins 1 (populated) and 2 (empty)
        let p = model.probability(62.5, 2.0, 1.0, 0.0);
        assert!(matches!(p, Lookup::Unavailable(Miss::Undersampled { total: 0 })));
    }

    #[test]
    fn test_totals_follow_counts() {
        let mut model = seeded_model(1);
        assert_eq!(model.totals()[[1, 2]], 60);
        model.record(50.0, 2.2, 0.9, 0.01).unwrap();
        assert_eq!(model.totals()[[1, 2]], 61);
        let snapshot = model.totals().clone();
        model.recompute_totals();
        assert_eq!(model.totals(), &snapshot);
        assert_eq!(model.record(50.0, 2.0, 1.0, 4.0), Err(AxisKind::DeltaDirection));
    }

    #[test]
    fn test_from_counts_rejects_wrong_shape() {
        let counts = Array4::<u64>::zeros((1, 1, 1, 1));
        assert!(NeighborCorrelationModel::from_counts(unit_axes(), 1, counts).is_err());
    }
}
