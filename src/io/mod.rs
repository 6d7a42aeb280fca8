//! I/O modules for cell records, correlation tables, configuration and plot output

pub mod cell_file;
pub mod table_file;
pub mod config;
pub mod plot;
pub mod products;

pub use cell_file::{CellReader, CellWriter, RawCellRecord, write_cells};
pub use config::RunConfig;
pub use plot::{FlowerScale, PlotParams};
pub use products::{ProductPaths, ProductSummary, write_filter_products};
