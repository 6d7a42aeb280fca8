//! Core ambiguity removal components

pub mod cell;
pub mod grid;
pub mod correlation;
pub mod training;
pub mod propagate;
pub mod sweep;

// Re-export main types
pub use cell::{DirectionSpeedCell, bin_separation};
pub use grid::CellGrid;
pub use correlation::{
    AxisKind, AxisSpec, CorrelationAxes, Lookup, LookupStrategy, Miss,
    NeighborCompatibility, NeighborCorrelationModel,
};
pub use training::{CorrelationTrainer, TrainingStats};
pub use propagate::{LocalProbabilityPropagator, NeighborMode, Propagation, PropagationParams};
pub use sweep::{GridSweepDriver, SweepParams, SweepResult, SweepStats, serpentine_order};
