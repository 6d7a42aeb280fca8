//! Plot-ready text output.
//!
//! Every glyph is written as a comment line, a `cti ati` line, then one
//! `x y` vertex per line in grid-index units centered on the cell.

use crate::core::cell::DirectionSpeedCell;
use crate::core::correlation::{Lookup, NeighborCorrelationModel};
use crate::types::{WindResult, DIR_BINS};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::io::Write;

/// Radial scaling of a flower diagram
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FlowerScale {
    /// radius = probability * factor
    Factor(f32),
    /// The most probable bin is drawn at this radius
    MaxRadius(f32),
}

/// Glyph scaling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotParams {
    pub flower_scale: FlowerScale,
    /// Vector length per m/s of wind speed
    pub vector_scale: f32,
    /// Diamond half-diagonal per unit probability
    pub diamond_scale: f32,
}

impl Default for PlotParams {
    fn default() -> Self {
        Self {
            flower_scale: FlowerScale::MaxRadius(0.45),
            vector_scale: 0.05,
            diamond_scale: 0.45,
        }
    }
}

type Vertex = (f64, f64);

fn polar(cell: &DirectionSpeedCell, radius: f64, angle: f64) -> Vertex {
    (
        cell.cti as f64 + radius * angle.cos(),
        cell.ati as f64 + radius * angle.sin(),
    )
}

/// Closed polygon of probability against direction
pub fn flower_vertices(cell: &DirectionSpeedCell, scale: FlowerScale) -> Vec<Vertex> {
    let factor = match scale {
        FlowerScale::Factor(f) => f as f64,
        FlowerScale::MaxRadius(r) => {
            let max = cell.probabilities().iter().cloned().fold(0.0f32, f32::max);
            if max > 0.0 { r as f64 / max as f64 } else { 0.0 }
        }
    };

    let mut vertices: Vec<Vertex> = (0..DIR_BINS)
        .map(|idx| {
            let radius = cell.probability(idx) as f64 * factor;
            polar(cell, radius, DirectionSpeedCell::direction(idx))
        })
        .collect();
    vertices.push(vertices[0]);
    vertices
}

/// Arrow along the best direction: tail, head, left barb, head, right barb
pub fn vector_vertices(cell: &DirectionSpeedCell, scale: f32) -> Option<[Vertex; 5]> {
    let best = cell.best_dir_idx()?;
    let theta = DirectionSpeedCell::direction(best);
    let length = cell.speed(best) as f64 * scale as f64;
    let tail = polar(cell, 0.0, theta);
    let head = polar(cell, length, theta);
    let barb = 0.3 * length;
    let left = (
        head.0 + barb * (theta + 5.0 * PI / 6.0).cos(),
        head.1 + barb * (theta + 5.0 * PI / 6.0).sin(),
    );
    let right = (
        head.0 + barb * (theta - 5.0 * PI / 6.0).cos(),
        head.1 + barb * (theta - 5.0 * PI / 6.0).sin(),
    );
    Some([tail, head, left, head, right])
}

/// Closed diamond sized by the best direction's probability
pub fn diamond_vertices(cell: &DirectionSpeedCell, scale: f32) -> Option<[Vertex; 5]> {
    let best = cell.best_dir_idx()?;
    let h = cell.probability(best) as f64 * scale as f64;
    let (x, y) = (cell.cti as f64, cell.ati as f64);
    Some([(x + h, y), (x, y + h), (x - h, y), (x, y - h), (x + h, y)])
}

fn write_glyph<W: Write>(out: &mut W, label: &str, cell: &DirectionSpeedCell, vertices: &[Vertex]) -> WindResult<()> {
    writeln!(out, "# {}", label)?;
    writeln!(out, "{} {}", cell.cti, cell.ati)?;
    for (x, y) in vertices {
        writeln!(out, "{:.6} {:.6}", x, y)?;
    }
    Ok(())
}

pub fn write_flower<W: Write>(out: &mut W, cell: &DirectionSpeedCell, scale: FlowerScale) -> WindResult<()> {
    write_glyph(out, "flower", cell, &flower_vertices(cell, scale))
}

/// Write the best-direction arrow; returns false for a cell with no best direction
pub fn write_best_vector<W: Write>(out: &mut W, cell: &DirectionSpeedCell, scale: f32) -> WindResult<bool> {
    match vector_vertices(cell, scale) {
        Some(vertices) => {
            write_glyph(out, "vector", cell, &vertices)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Write the best-probability diamond; returns false for a cell with no best direction
pub fn write_best_probability<W: Write>(out: &mut W, cell: &DirectionSpeedCell, scale: f32) -> WindResult<bool> {
    match diamond_vertices(cell, scale) {
        Some(vertices) => {
            write_glyph(out, "diamond", cell, &vertices)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Probability against Δdirection (degrees) for one (distance, speed) pair,
/// one block per Δspeed bin. Unavailable entries are left out.
pub fn write_correlation_curves<W: Write>(
    out: &mut W,
    model: &NeighborCorrelationModel,
    distance_km: f64,
    speed: f64,
) -> WindResult<usize> {
    let axes = model.axes();
    let mut lines = 0;
    for ds in 0..axes.delta_speed.count {
        let delta_speed = axes.delta_speed.center(ds);
        writeln!(
            out,
            "# distance {:.1} km, speed {:.2} m/s, delta speed {:.2} m/s",
            distance_km, speed, delta_speed
        )?;
        for dd in 0..axes.delta_direction.count {
            let delta_direction = axes.delta_direction.center(dd);
            if let Lookup::Probability(p) = model.probability(distance_km, speed, delta_speed, delta_direction) {
                writeln!(out, "{:.3} {:.6e}", delta_direction.to_degrees(), p)?;
                lines += 1;
            }
        }
    }
    Ok(lines)
}
