use crate::types::{CELL_RESOLUTION_KM, DIR_BINS, DIR_STEP, SPEED_SCALE};

/// One wind vector cell's probability over direction, with the best speed
/// estimate for each direction bin.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionSpeedCell {
    /// Cross-track index
    pub cti: usize,
    /// Along-track index
    pub ati: usize,
    probability: [f32; DIR_BINS],
    speed: [u16; DIR_BINS],
}

impl DirectionSpeedCell {
    /// Create an empty cell (all probabilities and speeds zero)
    pub fn new(cti: usize, ati: usize) -> Self {
        Self {
            cti,
            ati,
            probability: [0.0; DIR_BINS],
            speed: [0; DIR_BINS],
        }
    }

    /// Create a cell from per-bin probabilities and speeds in m/s
    pub fn from_parts(
        cti: usize,
        ati: usize,
        probability: [f32; DIR_BINS],
        speeds: [f32; DIR_BINS],
    ) -> Self {
        let mut cell = Self::new(cti, ati);
        cell.probability = probability;
        for (idx, &s) in speeds.iter().enumerate() {
            cell.set_speed(idx, s);
        }
        cell
    }

    /// Set every direction bin's probability to `value`
    pub fn fill_probabilities(&mut self, value: f32) {
        self.probability = [value; DIR_BINS];
    }

    /// Copy the per-direction speed estimates of another cell
    pub fn copy_speeds(&mut self, other: &DirectionSpeedCell) {
        self.speed = other.speed;
    }

    /// Best speed estimate (m/s) for a direction bin
    pub fn speed(&self, dir_idx: usize) -> f32 {
        self.speed[dir_idx] as f32 * SPEED_SCALE
    }

    /// Store a speed (m/s), quantized to `SPEED_SCALE`
    pub fn set_speed(&mut self, dir_idx: usize, speed: f32) {
        let quantized = (speed / SPEED_SCALE).round();
        self.speed[dir_idx] = quantized.clamp(0.0, u16::MAX as f32) as u16;
    }

    /// Quantized speed as stored on disk
    pub fn speed_raw(&self, dir_idx: usize) -> u16 {
        self.speed[dir_idx]
    }

    pub fn set_speed_raw(&mut self, dir_idx: usize, raw: u16) {
        self.speed[dir_idx] = raw;
    }

    /// Direction of a bin in radians, `2π·dir_idx/DIR_BINS`
    pub fn direction(dir_idx: usize) -> f64 {
        dir_idx as f64 * DIR_STEP
    }

    pub fn probability(&self, dir_idx: usize) -> f32 {
        self.probability[dir_idx]
    }

    pub fn set_probability(&mut self, dir_idx: usize, value: f32) {
        self.probability[dir_idx] = value;
    }

    pub fn probabilities(&self) -> &[f32; DIR_BINS] {
        &self.probability
    }

    /// Accumulate probability mass into one bin
    pub fn add(&mut self, dir_idx: usize, probability: f32) {
        self.probability[dir_idx] += probability;
    }

    /// Elementwise sum with another cell's probabilities
    pub fn add_cell(&mut self, other: &DirectionSpeedCell) {
        for (p, q) in self.probability.iter_mut().zip(other.probability.iter()) {
            *p += *q;
        }
    }

    /// Elementwise product with another cell's probabilities
    pub fn multiply(&mut self, other: &DirectionSpeedCell) {
        for (p, q) in self.probability.iter_mut().zip(other.probability.iter()) {
            *p *= *q;
        }
    }

    /// Sum of all bin probabilities, accumulated in f64
    pub fn probability_sum(&self) -> f64 {
        self.probability.iter().map(|&p| p as f64).sum()
    }

    /// Scale the bins to sum to one. A zero sum leaves the cell untouched.
    pub fn normalize(&mut self) {
        let sum = self.probability_sum();
        if sum == 0.0 {
            return;
        }
        for p in self.probability.iter_mut() {
            *p = (*p as f64 / sum) as f32;
        }
    }

    /// Normalize, zero every bin below `min_prob`, and renormalize if any
    /// bin was zeroed. Surviving bins only grow on renormalization, so
    /// afterwards every bin is either zero or at least `min_prob`.
    pub fn normalize_with_floor(&mut self, min_prob: f32) {
        self.normalize();
        let mut zeroed = false;
        for p in self.probability.iter_mut() {
            if *p != 0.0 && *p < min_prob {
                *p = 0.0;
                zeroed = true;
            }
        }
        if zeroed {
            self.normalize();
        }
    }

    /// Ground distance to another cell in km
    pub fn km_distance(&self, other: &DirectionSpeedCell) -> f64 {
        let dct = self.cti as f64 - other.cti as f64;
        let dat = self.ati as f64 - other.ati as f64;
        (dct * dct + dat * dat).sqrt() * CELL_RESOLUTION_KM
    }

    /// Index of the most probable bin, or `None` if every bin is zero
    pub fn best_dir_idx(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, &p) in self.probability.iter().enumerate() {
            if p > 0.0 && best.map_or(true, |(_, b)| p > b) {
                best = Some((idx, p));
            }
        }
        best.map(|(idx, _)| idx)
    }
}

/// Smallest angular separation in radians between two direction bins,
/// always in [0, π]
pub fn bin_separation(a: usize, b: usize) -> f64 {
    let k = (a as isize - b as isize).unsigned_abs() % DIR_BINS;
    k.min(DIR_BINS - k) as f64 * DIR_STEP
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn ramp_cell() -> DirectionSpeedCell {
        let mut cell = DirectionSpeedCell::new(3, 4);
        for i in 0..DIR_BINS {
            cell.set_probability(i, (i + 1) as f32);
            cell.set_speed(i, 5.0 + i as f32 * 0.1);
        }
        cell
    }

    #[test]
    fn test_normalize_sums_to_one() {
        let mut cell = ramp_cell();
        cell.normalize();
        assert_relative_eq!(cell.probability_sum(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_normalize_zero_sum_is_noop() {
        let mut cell = DirectionSpeedCell::new(0, 0);
        cell.normalize();
        assert_eq!(cell.probability_sum(), 0.0);
        assert!(cell.probabilities().iter().all(|p| !p.is_nan()));
        assert_eq!(cell.best_dir_idx(), None);
    }

    #[test]
    fn test_multiply_then_floor_leaves_no_small_bins() {
        let mut a = ramp_cell();
        let mut b = ramp_cell();
        b.set_probability(0, 1e-6);
        b.set_probability(1, 1e-5);
        a.normalize();
        b.normalize();
        a.multiply(&b);

        let floor = 1e-4;
        a.normalize_with_floor(floor);
        for &p in a.probabilities() {
            assert!(p == 0.0 || p >= floor, "bin value {} below floor", p);
        }
        assert_eq!(a.probability(0), 0.0);
        assert_relative_eq!(a.probability_sum(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_km_distance_symmetric() {
        let a = DirectionSpeedCell::new(2, 10);
        let b = DirectionSpeedCell::new(5, 14);
        assert_eq!(a.km_distance(&b), b.km_distance(&a));
        assert_eq!(a.km_distance(&a), 0.0);
        assert_relative_eq!(a.km_distance(&b), 5.0 * CELL_RESOLUTION_KM);
    }

    #[test]
    fn test_speed_quantization() {
        let mut cell = DirectionSpeedCell::new(0, 0);
        cell.set_speed(7, 12.347);
        assert_eq!(cell.speed_raw(7), 1235);
        assert_relative_eq!(cell.speed(7), 12.35, epsilon = 1e-4);
        cell.set_speed(8, -3.0);
        assert_eq!(cell.speed_raw(8), 0);
    }

    #[test]
    fn test_direction_and_separation() {
        assert_eq!(DirectionSpeedCell::direction(0), 0.0);
        assert_relative_eq!(DirectionSpeedCell::direction(DIR_BINS / 2), PI);
        assert_eq!(bin_separation(3, 3), 0.0);
        assert_relative_eq!(bin_separation(0, DIR_BINS - 1), DIR_STEP);
        assert_relative_eq!(bin_separation(0, DIR_BINS / 2), PI);
        assert_eq!(bin_separation(5, 20), bin_separation(20, 5));
    }

    #[test]
    fn test_best_dir_idx_and_copy_speeds() {
        let mut cell = DirectionSpeedCell::new(1, 1);
        cell.set_probability(9, 0.2);
        cell.set_probability(40, 0.7);
        assert_eq!(cell.best_dir_idx(), Some(40));

        let source = ramp_cell();
        cell.copy_speeds(&source);
        assert_eq!(cell.speed(40), source.speed(40));
        assert_eq!(cell.probability(40), 0.7);
    }

    #[test]
    fn test_add_and_fill() {
        let mut acc = DirectionSpeedCell::new(0, 0);
        acc.fill_probabilities(0.0);
        let mut one = DirectionSpeedCell::new(0, 0);
        one.fill_probabilities(0.5);
        acc.add_cell(&one);
        acc.add_cell(&one);
        acc.add(3, 1.0);
        assert_eq!(acc.probability(0), 1.0);
        assert_eq!(acc.probability(3), 2.0);
    }
}
