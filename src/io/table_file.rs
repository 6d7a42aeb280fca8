//! Headerless dump of the neighbor-correlation count table.
//!
//! Counts are little-endian u64 in row-major (distance, speed, Δspeed,
//! Δdirection) order. Dimensions are not stored; reader and writer must
//! agree on the axes.

use crate::types::{WindError, WindResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array4;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

pub fn read_counts(path: &Path, shape: (usize, usize, usize, usize)) -> WindResult<Array4<u64>> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    read_counts_from(BufReader::new(file), file_len, shape)
}

pub fn read_counts_from<R: Read>(
    mut reader: R,
    byte_len: u64,
    shape: (usize, usize, usize, usize),
) -> WindResult<Array4<u64>> {
    let bins = shape.0 * shape.1 * shape.2 * shape.3;
    let expected = bins as u64 * 8;
    if byte_len != expected {
        return Err(WindError::InvalidFormat(format!(
            "Count table holds {} bytes, {:?} bins need {}",
            byte_len, shape, expected
        )));
    }

    let mut counts = vec![0u64; bins];
    reader.read_u64_into::<LittleEndian>(&mut counts)?;
    Array4::from_shape_vec(shape, counts)
        .map_err(|e| WindError::InvalidFormat(format!("Failed to shape count table: {}", e)))
}

pub fn write_counts(path: &Path, counts: &Array4<u64>) -> WindResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_counts_to(&mut writer, counts)?;
    writer.flush()?;
    Ok(())
}

pub fn write_counts_to<W: Write>(writer: &mut W, counts: &Array4<u64>) -> WindResult<()> {
    for &count in counts.iter() {
        writer.write_u64::<LittleEndian>(count)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_round_trip_in_memory() {
        let shape = (2, 3, 2, 4);
        let counts = Array4::from_shape_fn(shape, |(a, b, c, d)| (a * 1000 + b * 100 + c * 10 + d) as u64);
        let mut bytes = Vec::new();
        write_counts_to(&mut bytes, &counts).unwrap();
        assert_eq!(bytes.len(), 2 * 3 * 2 * 4 * 8);

        let decoded = read_counts_from(&bytes[..], bytes.len() as u64, shape).unwrap();
        assert_eq!(decoded, counts);
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let bytes = vec![0u8; 8 * 5];
        let err = read_counts_from(&bytes[..], bytes.len() as u64, (2, 1, 1, 2)).unwrap_err();
        assert!(matches!(err, WindError::InvalidFormat(_)));
    }
}
