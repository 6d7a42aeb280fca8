use crate::core::cell::DirectionSpeedCell;
use crate::io::cell_file::CellReader;
use crate::types::{GridGeometry, ProbEncoding, WindError, WindResult};
use ndarray::Array2;
use std::path::Path;

/// Fixed-size swath grid of wind vector cells.
///
/// Slots are stored contiguously, row-major by along-track index
/// (`ati * ct_width + cti`); an empty slot is an off-swath or flagged cell.
#[derive(Debug, Clone)]
pub struct CellGrid {
    geometry: GridGeometry,
    slots: Array2<Option<DirectionSpeedCell>>,
}

impl CellGrid {
    /// Create an empty grid
    pub fn new(geometry: GridGeometry) -> Self {
        Self {
            geometry,
            slots: Array2::from_elem((geometry.at_width, geometry.ct_width), None),
        }
    }

    /// Build a grid from a set of cells, placing each by its own coordinates
    pub fn from_cells<I>(geometry: GridGeometry, cells: I) -> WindResult<Self>
    where
        I: IntoIterator<Item = DirectionSpeedCell>,
    {
        let mut grid = Self::new(geometry);
        for cell in cells {
            grid.insert(cell)?;
        }
        Ok(grid)
    }

    /// Load a grid by streaming cell records until EOF.
    ///
    /// A record whose coordinates fall outside the grid aborts the load.
    pub fn read_from_file<P: AsRef<Path>>(
        path: P,
        geometry: GridGeometry,
        encoding: ProbEncoding,
    ) -> WindResult<Self> {
        log::info!("Reading {} cell grid from: {}", encoding, path.as_ref().display());

        let mut reader = CellReader::open(path.as_ref(), encoding)?;
        let mut grid = Self::new(geometry);
        let mut records = 0usize;

        while let Some(raw) = reader.next_record()? {
            let cell = raw.into_cell(&geometry)?;
            if let Some(previous) = grid.insert(cell)? {
                log::warn!(
                    "Duplicate record for cell ({}, {}), keeping the later one",
                    previous.cti,
                    previous.ati
                );
            }
            records += 1;
        }

        log::info!("Loaded {} records, {} populated cells", records, grid.len());
        if grid.is_empty() {
            log::warn!("Cell file {} holds no cells", path.as_ref().display());
        }
        Ok(grid)
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    /// Bounds-checked lookup; `None` for out-of-range or empty slots
    pub fn get(&self, cti: usize, ati: usize) -> Option<&DirectionSpeedCell> {
        if cti >= self.geometry.ct_width || ati >= self.geometry.at_width {
            return None;
        }
        self.slots[[ati, cti]].as_ref()
    }

    /// Store a cell at its own coordinates, returning any cell it replaced
    pub fn insert(&mut self, cell: DirectionSpeedCell) -> WindResult<Option<DirectionSpeedCell>> {
        if cell.cti >= self.geometry.ct_width || cell.ati >= self.geometry.at_width {
            return Err(WindError::OutOfGrid {
                cti: cell.cti as i64,
                ati: cell.ati as i64,
                ct_width: self.geometry.ct_width,
                at_width: self.geometry.at_width,
            });
        }
        let (cti, ati) = (cell.cti, cell.ati);
        Ok(self.slots[[ati, cti]].replace(cell))
    }

    pub fn remove(&mut self, cti: usize, ati: usize) -> Option<DirectionSpeedCell> {
        if cti >= self.geometry.ct_width || ati >= self.geometry.at_width {
            return None;
        }
        self.slots[[ati, cti]].take()
    }

    /// Number of populated slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_none())
    }

    /// Populated cells in storage order
    pub fn cells(&self) -> impl Iterator<Item = &DirectionSpeedCell> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    /// Grid coordinates within `±window/2` of a center, clipped to the grid
    /// edges, excluding the center itself. Order is along-track major.
    pub fn window_coords(
        &self,
        cti: usize,
        ati: usize,
        window: usize,
    ) -> impl Iterator<Item = (usize, usize)> {
        let half = window / 2;
        let ct_start = cti.saturating_sub(half);
        let ct_end = cti.saturating_add(half + 1).min(self.geometry.ct_width);
        let at_start = ati.saturating_sub(half);
        let at_end = ati.saturating_add(half + 1).min(self.geometry.at_width);

        (at_start..at_end)
            .flat_map(move |a| (ct_start..ct_end).map(move |c| (c, a)))
            .filter(move |&(c, a)| c != cti || a != ati)
    }

    /// Populated neighbors of a center within the window
    pub fn neighbors(
        &self,
        cti: usize,
        ati: usize,
        window: usize,
    ) -> impl Iterator<Item = &DirectionSpeedCell> {
        self.window_coords(cti, ati, window)
            .filter_map(move |(c, a)| self.get(c, a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> GridGeometry {
        GridGeometry { ct_width: 4, at_width: 3 }
    }

    #[test]
    fn test_get_out_of_range_is_none() {
        let mut grid = CellGrid::new(small());
        grid.insert(DirectionSpeedCell::new(3, 2)).unwrap();
        assert!(grid.get(3, 2).is_some());
        assert!(grid.get(4, 2).is_none());
        assert!(grid.get(0, 3).is_none());
        assert!(grid.get(usize::MAX, usize::MAX).is_none());
        assert!(grid.get(0, 0).is_none());
    }

    #[test]
    fn test_insert_out_of_grid_fails() {
        let mut grid = CellGrid::new(small());
        let err = grid.insert(DirectionSpeedCell::new(4, 0)).unwrap_err();
        assert!(matches!(err, WindError::OutOfGrid { cti: 4, ati: 0, .. }));
    }

    #[test]
    fn test_insert_replaces() {
        let mut grid = CellGrid::new(small());
        assert!(grid.insert(DirectionSpeedCell::new(1, 1)).unwrap().is_none());
        assert!(grid.insert(DirectionSpeedCell::new(1, 1)).unwrap().is_some());
        assert_eq!(grid.len(), 1);
        assert!(grid.remove(1, 1).is_some());
        assert!(grid.is_empty());
    }

    #[test]
    fn test_window_interior_and_corner() {
        let grid = CellGrid::new(GridGeometry { ct_width: 5, at_width: 5 });
        let interior: Vec<_> = grid.window_coords(2, 2, 3).collect();
        assert_eq!(interior.len(), 8);
        assert!(!interior.contains(&(2, 2)));

        let corner: Vec<_> = grid.window_coords(0, 0, 3).collect();
        assert_eq!(corner, vec![(1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn test_window_larger_than_grid_is_clipped() {
        let grid = CellGrid::new(small());
        let coords: Vec<_> = grid.window_coords(0, 0, 101).collect();
        assert_eq!(coords.len(), 4 * 3 - 1);
        for (c, a) in coords {
            assert!(c < 4 && a < 3);
        }
    }
}
