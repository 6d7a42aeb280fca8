use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Number of direction bins per wind vector cell (5 degree spacing)
pub const DIR_BINS: usize = 72;

/// Wind speed quantum in m/s; speeds are stored as `round(speed / SPEED_SCALE)`
pub const SPEED_SCALE: f32 = 0.01;

/// Fixed-point scale for quantized probabilities (`round(p * PROB_SCALE)`)
pub const PROB_SCALE: f32 = 65535.0;

/// Ground resolution of one wind vector cell in km
pub const CELL_RESOLUTION_KM: f64 = 25.0;

/// Angular width of one direction bin in radians
pub const DIR_STEP: f64 = 2.0 * PI / DIR_BINS as f64;

/// Grid dimensions of a swath (cross-track x along-track)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub ct_width: usize,
    pub at_width: usize,
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self {
            ct_width: 76,   // 25 km SeaWinds swath
            at_width: 1624, // one rev
        }
    }
}

/// On-disk representation of the probability array in a cell record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbEncoding {
    /// Raw little-endian f32 per bin
    Float32,
    /// u16 fixed point, `p = stored / PROB_SCALE`
    Quantized16,
}

impl ProbEncoding {
    /// Size in bytes of one cell record in this encoding
    pub fn record_size(self) -> usize {
        let prob_bytes = match self {
            ProbEncoding::Float32 => 4,
            ProbEncoding::Quantized16 => 2,
        };
        4 + DIR_BINS * prob_bytes + DIR_BINS * 2
    }
}

impl std::fmt::Display for ProbEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbEncoding::Float32 => write!(f, "float32"),
            ProbEncoding::Quantized16 => write!(f, "quantized16"),
        }
    }
}

impl std::str::FromStr for ProbEncoding {
    type Err = WindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "float32" | "f32" | "float" => Ok(ProbEncoding::Float32),
            "quantized16" | "u16" | "quantized" => Ok(ProbEncoding::Quantized16),
            _ => Err(WindError::Config(format!("Invalid probability encoding: {}", s))),
        }
    }
}

/// Error types for wind ambiguity processing
#[derive(Debug, thiserror::Error)]
pub enum WindError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Short record: expected {expected} bytes, got {got}")]
    ShortRecord { expected: usize, got: usize },

    #[error("Cell ({cti}, {ati}) is outside the {ct_width}x{at_width} grid")]
    OutOfGrid {
        cti: i64,
        ati: i64,
        ct_width: usize,
        at_width: usize,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for wind processing operations
pub type WindResult<T> = Result<T, WindError>;
