//! Variable-length 7-bit integer encoding with optional zigzag transform.
//!
//! Each octet has a continuation bit (MSB) and 7 data bits. The least
//! significant group is written first; the last octet has continuation = 0.
//! Maximum 5 octets for 32-bit values, 10 octets for 64-bit values.
//!
//! Signierte Werte werden wahlweise per Zigzag transformiert
//! (`optimize_positive = false`, kleine Beträge bleiben kurz) oder roh als
//! Zweierkomplement encodiert (`optimize_positive = true`, nicht-negative
//! Werte sparen ein Byte, negative kosten die volle Länge). Die Wahl ist
//! Teil des Codecs, nicht des Streams — beide Seiten müssen übereinstimmen.
//!
//! Dieser Codec liegt unter jedem integralen Feld und jeder Länge, jedem
//! Zähler und jeder Referenz-Id im Stream.

use crate::bytestream::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// Maximum encoded length of a 32-bit varint.
pub const MAX_VARINT32_LEN: usize = 5;
/// Maximum encoded length of a 64-bit varint.
pub const MAX_VARINT64_LEN: usize = 10;

/// Zigzag transform: maps small-magnitude signed values to small unsigned ones.
#[inline]
pub fn zigzag_encode32(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

/// Inverse of [`zigzag_encode32`].
#[inline]
pub fn zigzag_decode32(v: u32) -> i32 {
    ((v >> 1) as i32) ^ -((v & 1) as i32)
}

/// Zigzag transform for 64-bit values.
#[inline]
pub fn zigzag_encode64(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Inverse of [`zigzag_encode64`].
#[inline]
pub fn zigzag_decode64(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Encodes a `u32` as 1-5 octets. Returns the number of octets written.
pub fn write_u32(out: &mut ByteWriter, value: u32) -> Result<usize> {
    if value < 0x80 {
        // Fast-Path: Single-Byte (häufigster Fall — kleine Längen und Ids)
        out.write_u8(value as u8)?;
        return Ok(1);
    }
    let mut v = value;
    let mut written = 0;
    loop {
        written += 1;
        let low7 = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.write_u8(low7)?;
            return Ok(written);
        }
        out.write_u8(0x80 | low7)?;
    }
}

/// Encodes a `u64` as 1-10 octets. Returns the number of octets written.
pub fn write_u64(out: &mut ByteWriter, value: u64) -> Result<usize> {
    if value < 0x80 {
        out.write_u8(value as u8)?;
        return Ok(1);
    }
    let mut v = value;
    let mut written = 0;
    loop {
        written += 1;
        let low7 = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.write_u8(low7)?;
            return Ok(written);
        }
        out.write_u8(0x80 | low7)?;
    }
}

/// Decodes a 32-bit varint.
///
/// Im fünften Octet sind nur die Daten-Bits 0-3 gültig (u32 hat 32 Bits)
/// und kein Continuation-Bit erlaubt; alles andere ist [`Error::MalformedVarint`].
pub fn read_u32(reader: &mut ByteReader<'_>) -> Result<u32> {
    let byte = reader.read_u8()?;
    if byte & 0x80 == 0 {
        return Ok(u32::from(byte));
    }
    let mut result = u32::from(byte & 0x7F);
    let mut shift: u32 = 7;
    loop {
        let byte = reader.read_u8()?;
        let data = u32::from(byte & 0x7F);
        if shift == 28 && (data > 0x0F || byte & 0x80 != 0) {
            return Err(Error::MalformedVarint);
        }
        result |= data << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Decodes a 64-bit varint.
///
/// Im zehnten Octet ist nur Daten-Bit 0 gültig (u64 hat 64 Bits) und kein
/// Continuation-Bit erlaubt.
pub fn read_u64(reader: &mut ByteReader<'_>) -> Result<u64> {
    let byte = reader.read_u8()?;
    if byte & 0x80 == 0 {
        return Ok(u64::from(byte));
    }
    let mut result = u64::from(byte & 0x7F);
    let mut shift: u32 = 7;
    loop {
        let byte = reader.read_u8()?;
        let data = u64::from(byte & 0x7F);
        if shift == 63 && (data > 1 || byte & 0x80 != 0) {
            return Err(Error::MalformedVarint);
        }
        result |= data << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Encodes an `i32`. Zigzag is applied unless `optimize_positive`.
pub fn write_i32(out: &mut ByteWriter, value: i32, optimize_positive: bool) -> Result<usize> {
    let raw = if optimize_positive {
        value as u32
    } else {
        zigzag_encode32(value)
    };
    write_u32(out, raw)
}

/// Encodes an `i64`. Zigzag is applied unless `optimize_positive`.
pub fn write_i64(out: &mut ByteWriter, value: i64, optimize_positive: bool) -> Result<usize> {
    let raw = if optimize_positive {
        value as u64
    } else {
        zigzag_encode64(value)
    };
    write_u64(out, raw)
}

/// Decodes an `i32`; reverses zigzag iff it was requested at encode time.
pub fn read_i32(reader: &mut ByteReader<'_>, optimize_positive: bool) -> Result<i32> {
    let raw = read_u32(reader)?;
    Ok(if optimize_positive {
        raw as i32
    } else {
        zigzag_decode32(raw)
    })
}

/// Decodes an `i64`; reverses zigzag iff it was requested at encode time.
pub fn read_i64(reader: &mut ByteReader<'_>, optimize_positive: bool) -> Result<i64> {
    let raw = read_u64(reader)?;
    Ok(if optimize_positive {
        raw as i64
    } else {
        zigzag_decode64(raw)
    })
}
