//! CRC-8 over little-endian 16-bit values (poly 0x31, init 0xFF, no
//! reflection, no final xor).

use crate::error::FrameError;

pub const CRC8_POLY: u8 = 0x31;
pub const CRC8_INIT: u8 = 0xFF;

fn update(mut crc: u8, byte: u8) -> u8 {
    crc ^= byte;
    for _ in 0..8 {
        crc = if crc & 0x80 != 0 {
            (crc << 1) ^ CRC8_POLY
        } else {
            crc << 1
        };
    }
    crc
}

/// Checksum of `values`, each fed LSB first.
pub fn compute(values: &[i16]) -> u8 {
    values
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .fold(CRC8_INIT, update)
}

pub fn verify(values: &[i16], expected: u8) -> bool {
    compute(values) == expected
}

/// Checksum of textual fields. A field that is not a valid i16 fails the
/// whole computation.
pub fn compute_fields<S: AsRef<str>>(fields: &[S]) -> Result<u8, FrameError> {
    let values = fields
        .iter()
        .map(|f| parse_i16(f.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(compute(&values))
}

pub(crate) fn parse_i16(field: &str) -> Result<i16, FrameError> {
    field
        .trim()
        .parse::<i16>()
        .map_err(|_| FrameError::FieldParseError(field.to_string()))
}
