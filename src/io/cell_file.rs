//! Flat binary wind vector cell records.
//!
//! Each record is little-endian: `cti: i16`, `ati: i16`, `DIR_BINS`
//! probabilities (f32 or u16 fixed point, see [`ProbEncoding`]) and
//! `DIR_BINS` quantized speeds (u16). Files are a plain sequence of
//! records terminated by EOF.

use crate::core::cell::DirectionSpeedCell;
use crate::types::{GridGeometry, ProbEncoding, WindError, WindResult, DIR_BINS, PROB_SCALE};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, ErrorKind, Read, Write};
use std::path::Path;

/// One record as it appears on disk, before grid placement
#[derive(Debug, Clone)]
pub struct RawCellRecord {
    pub cti: i16,
    pub ati: i16,
    pub probability: [f32; DIR_BINS],
    pub speed: [u16; DIR_BINS],
}

impl RawCellRecord {
    /// Convert to a cell, checking the embedded coordinates against the grid
    pub fn into_cell(self, geometry: &GridGeometry) -> WindResult<DirectionSpeedCell> {
        let out_of_grid = self.cti < 0
            || self.ati < 0
            || self.cti as usize >= geometry.ct_width
            || self.ati as usize >= geometry.at_width;
        if out_of_grid {
            return Err(WindError::OutOfGrid {
                cti: self.cti as i64,
                ati: self.ati as i64,
                ct_width: geometry.ct_width,
                at_width: geometry.at_width,
            });
        }

        let mut cell = DirectionSpeedCell::new(self.cti as usize, self.ati as usize);
        for idx in 0..DIR_BINS {
            cell.set_probability(idx, self.probability[idx]);
            cell.set_speed_raw(idx, self.speed[idx]);
        }
        Ok(cell)
    }
}

/// Streaming reader of fixed-size cell records
pub struct CellReader<R: Read> {
    inner: R,
    encoding: ProbEncoding,
    buffer: Vec<u8>,
}

impl CellReader<BufReader<File>> {
    pub fn open(path: &Path, encoding: ProbEncoding) -> WindResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), encoding))
    }
}

impl<R: Read> CellReader<R> {
    pub fn new(inner: R, encoding: ProbEncoding) -> Self {
        Self {
            inner,
            encoding,
            buffer: vec![0; encoding.record_size()],
        }
    }

    /// Next record, `None` at a clean EOF. A partial trailing record is an error.
    pub fn next_record(&mut self) -> WindResult<Option<RawCellRecord>> {
        let got = self.fill_buffer()?;
        if got == 0 {
            return Ok(None);
        }
        if got < self.buffer.len() {
            return Err(WindError::ShortRecord {
                expected: self.buffer.len(),
                got,
            });
        }

        let mut cursor = Cursor::new(&self.buffer[..]);
        let cti = cursor.read_i16::<LittleEndian>()?;
        let ati = cursor.read_i16::<LittleEndian>()?;

        let mut probability = [0.0f32; DIR_BINS];
        match self.encoding {
            ProbEncoding::Float32 => {
                cursor.read_f32_into::<LittleEndian>(&mut probability)?;
            }
            ProbEncoding::Quantized16 => {
                for p in probability.iter_mut() {
                    *p = cursor.read_u16::<LittleEndian>()? as f32 / PROB_SCALE;
                }
            }
        }

        let mut speed = [0u16; DIR_BINS];
        cursor.read_u16_into::<LittleEndian>(&mut speed)?;

        Ok(Some(RawCellRecord {
            cti,
            ati,
            probability,
            speed,
        }))
    }

    fn fill_buffer(&mut self) -> WindResult<usize> {
        let mut got = 0;
        while got < self.buffer.len() {
            match self.inner.read(&mut self.buffer[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(got)
    }
}

/// Writer of cell records in a fixed encoding
pub struct CellWriter<W: Write> {
    inner: W,
    encoding: ProbEncoding,
    written: usize,
}

impl CellWriter<BufWriter<File>> {
    pub fn create(path: &Path, encoding: ProbEncoding) -> WindResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), encoding))
    }
}

impl<W: Write> CellWriter<W> {
    pub fn new(inner: W, encoding: ProbEncoding) -> Self {
        Self {
            inner,
            encoding,
            written: 0,
        }
    }

    pub fn write_cell(&mut self, cell: &DirectionSpeedCell) -> WindResult<()> {
        let cti = i16::try_from(cell.cti).map_err(|_| {
            WindError::InvalidFormat(format!("Cross-track index {} does not fit a record", cell.cti))
        })?;
        let ati = i16::try_from(cell.ati).map_err(|_| {
            WindError::InvalidFormat(format!("Along-track index {} does not fit a record", cell.ati))
        })?;

        self.inner.write_i16::<LittleEndian>(cti)?;
        self.inner.write_i16::<LittleEndian>(ati)?;
        for &p in cell.probabilities() {
            match self.encoding {
                ProbEncoding::Float32 => self.inner.write_f32::<LittleEndian>(p)?,
                ProbEncoding::Quantized16 => {
                    let q = (p * PROB_SCALE).round().clamp(0.0, u16::MAX as f32) as u16;
                    self.inner.write_u16::<LittleEndian>(q)?
                }
            }
        }
        for idx in 0..DIR_BINS {
            self.inner.write_u16::<LittleEndian>(cell.speed_raw(idx))?;
        }
        self.written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.written
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> WindResult<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Write a sequence of cells to a new file
pub fn write_cells<'a, P, I>(path: P, encoding: ProbEncoding, cells: I) -> WindResult<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a DirectionSpeedCell>,
{
    let mut writer = CellWriter::create(path.as_ref(), encoding)?;
    for cell in cells {
        writer.write_cell(cell)?;
    }
    let count = writer.records_written();
    writer.finish()?;
    log::debug!("Wrote {} {} records to {}", count, encoding, path.as_ref().display());
    Ok(count)
}
