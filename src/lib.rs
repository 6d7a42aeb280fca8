//! windprob: spatial probability propagation for scatterometer wind ambiguity removal
//!
//! Each wind vector cell carries a probability over discretized wind
//! directions. Neighboring cells are compared through an empirical
//! neighbor-correlation table, and their evidence is combined into a
//! spatially consistent direction probability for every cell of the swath.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    GridGeometry, ProbEncoding, WindError, WindResult,
    CELL_RESOLUTION_KM, DIR_BINS, PROB_SCALE, SPEED_SCALE,
};

pub use crate::core::{
    CellGrid, CorrelationAxes, DirectionSpeedCell, GridSweepDriver, LocalProbabilityPropagator,
    Lookup, LookupStrategy, NeighborCompatibility, NeighborCorrelationModel, PropagationParams,
    SweepParams,
};
pub use crate::io::RunConfig;
