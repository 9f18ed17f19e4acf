//! Byte-level stream writer and reader.
//!
//! Alle Fixed-Width-Werte werden Big-Endian geschrieben und gelesen; die
//! Byte-Reihenfolge ist für den gesamten Stream einheitlich. Der Writer
//! wächst bis zu einem konfigurierten Maximum, der Reader wächst nie.
//! Invariante auf beiden Seiten: `0 <= position <= limit`.

use crate::{Error, Result};

/// Writes bytes into a growable buffer, bounded by a configured maximum size.
///
/// Schreiben über das Maximum hinaus schlägt mit [`Error::BufferOverflow`]
/// fehl; der Buffer bleibt dabei unverändert (kein partielles Schreiben).
pub struct ByteWriter {
    buf: Vec<u8>,
    max_size: usize,
}

impl ByteWriter {
    /// Creates an unbounded writer (maximum = `usize::MAX`).
    pub fn new() -> Self {
        Self::with_limits(0, usize::MAX)
    }

    /// Creates a writer with an initial capacity and a hard maximum size.
    pub fn with_limits(initial_capacity: usize, max_size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(initial_capacity),
            max_size,
        }
    }

    /// Prüft, ob `n` weitere Bytes unter dem Maximum bleiben.
    #[inline]
    fn require(&self, n: usize) -> Result<()> {
        let needed = self.buf.len().saturating_add(n);
        if needed > self.max_size {
            return Err(Error::BufferOverflow { needed, max: self.max_size });
        }
        Ok(())
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, val: u8) -> Result<()> {
        self.require(1)?;
        self.buf.push(val);
        Ok(())
    }

    /// Writes a raw byte slice verbatim.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.require(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Writes a 2-byte integer, big-endian.
    pub fn write_u16(&mut self, val: u16) -> Result<()> {
        self.write_raw(&val.to_be_bytes())
    }

    /// Writes a 4-byte integer, big-endian.
    pub fn write_u32(&mut self, val: u32) -> Result<()> {
        self.write_raw(&val.to_be_bytes())
    }

    /// Writes an 8-byte integer, big-endian.
    pub fn write_u64(&mut self, val: u64) -> Result<()> {
        self.write_raw(&val.to_be_bytes())
    }

    /// Writes a 4-byte IEEE-754 float, big-endian bit pattern.
    pub fn write_f32(&mut self, val: f32) -> Result<()> {
        self.write_raw(&val.to_bits().to_be_bytes())
    }

    /// Writes an 8-byte IEEE-754 float, big-endian bit pattern.
    pub fn write_f64(&mut self, val: f64) -> Result<()> {
        self.write_raw(&val.to_bits().to_be_bytes())
    }

    /// Returns the current write position (= number of bytes written).
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Discards all written bytes; capacity and maximum stay configured.
    ///
    /// Nach einem fehlgeschlagenen Encode ist der Bufferinhalt undefiniert —
    /// vor einer Wiederverwendung muss `reset()` gerufen werden.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Returns the written bytes so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Finalises the writer and returns the buffer.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for ByteWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads bytes from a borrowed slice with a cursor position.
///
/// Fehlgeschlagene Reads lassen die Position unverändert.
#[derive(Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a new reader over the given byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        let val = *self.data.get(self.pos).ok_or(Error::BufferUnderflow)?;
        self.pos += 1;
        Ok(val)
    }

    /// Reads `n` raw bytes as a sub-slice of the input.
    pub fn read_raw(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(Error::BufferUnderflow)?;
        if end > self.data.len() {
            return Err(Error::BufferUnderflow);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Reads a 2-byte integer, big-endian.
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes: [u8; 2] = self.read_raw(2)?.try_into().unwrap();
        Ok(u16::from_be_bytes(bytes))
    }

    /// Reads a 4-byte integer, big-endian.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self.read_raw(4)?.try_into().unwrap();
        Ok(u32::from_be_bytes(bytes))
    }

    /// Reads an 8-byte integer, big-endian.
    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes: [u8; 8] = self.read_raw(8)?.try_into().unwrap();
        Ok(u64::from_be_bytes(bytes))
    }

    /// Reads a 4-byte IEEE-754 float.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads an 8-byte IEEE-754 float.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Returns the current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Sets the read position for seeking/backtracking.
    ///
    /// # Panics
    ///
    /// Panics if `pos` exceeds the data length.
    pub fn set_position(&mut self, pos: usize) {
        assert!(
            pos <= self.data.len(),
            "position {pos} exceeds data length {}",
            self.data.len()
        );
        self.pos = pos;
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns the total input length in bytes.
    pub fn limit(&self) -> usize {
        self.data.len()
    }
}
