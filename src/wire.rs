//! Wire-level constants shared by encoder and decoder.
//!
//! Das Format ist bit-stabil: Tags, Marker und Präsenz-Bytes sind Teil des
//! Vertrags zwischen beiden Seiten und dürfen sich nicht ändern.
//!
//! Aufbau eines Werts in getaggter Position (Wurzel, Array-/List-Elemente,
//! Map-Schlüssel und -Werte, `Any`-Member):
//!
//! ```text
//! tag:u8  payload
//!   NULL    —
//!   BOOL    1 Byte (0/1)
//!   I32/I64 Zigzag-Varint
//!   F32/F64 4/8 Bytes big-endian
//!   STR     varint(len) + UTF-8
//!   BYTES   varint(len) + Rohbytes
//!   ARRAY/LIST/MAP/OBJECT  Referenz-Marker (s. u.)
//! ```
//!
//! Referenzverfolgte Werte beginnen mit genau einem Marker-Byte, das vor
//! jeder Id konsumiert wird:
//!
//! ```text
//! marker 0: null           (nur wo null erlaubt ist)
//! marker 1: erste Okkurrenz → varint(id), dann der Body
//! marker 2: Back-Referenz   → varint(id), sonst nichts
//! body ARRAY/LIST: varint(count) + Elemente (getaggt)
//! body MAP:        varint(count) + (Schlüssel Wert)*, Schlüssel zuerst
//! body OBJECT:     Name-Ref + Member in Deskriptor-Reihenfolge
//! name-ref: varint(code); 0 → varint(len) + UTF-8 (neuer Name),
//!           k>0 → zuvor internierter Name k-1
//! ```
//!
//! Member mit konkret deklariertem Kind stehen *ungetaggt* im Stream;
//! nullable Skalar-Member tragen ein Präsenz-Byte (0 = null, 1 = Wert).

use crate::{Error, Result};

/// Value tag byte for tagged positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Null = 0,
    Bool = 1,
    I32 = 2,
    I64 = 3,
    F32 = 4,
    F64 = 5,
    Str = 6,
    Bytes = 7,
    Array = 8,
    List = 9,
    Map = 10,
    Object = 11,
}

impl Tag {
    /// Parses a tag byte; unknown bytes are [`Error::InvalidTag`].
    pub fn from_byte(byte: u8) -> Result<Self> {
        Ok(match byte {
            0 => Self::Null,
            1 => Self::Bool,
            2 => Self::I32,
            3 => Self::I64,
            4 => Self::F32,
            5 => Self::F64,
            6 => Self::Str,
            7 => Self::Bytes,
            8 => Self::Array,
            9 => Self::List,
            10 => Self::Map,
            11 => Self::Object,
            other => return Err(Error::InvalidTag(other)),
        })
    }
}

/// Reference marker: null.
pub const MARKER_NULL: u8 = 0;
/// Reference marker: first occurrence, explicit id and body follow.
pub const MARKER_FIRST: u8 = 1;
/// Reference marker: back-reference, only the id follows.
pub const MARKER_BACKREF: u8 = 2;

/// Presence byte of a nullable scalar member: null.
pub const PRESENT_NULL: u8 = 0;
/// Presence byte of a nullable scalar member: value follows.
pub const PRESENT_VALUE: u8 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_tags_round_trip_through_from_byte() {
        for tag in [
            Tag::Null, Tag::Bool, Tag::I32, Tag::I64, Tag::F32, Tag::F64,
            Tag::Str, Tag::Bytes, Tag::Array, Tag::List, Tag::Map, Tag::Object,
        ] {
            assert_eq!(Tag::from_byte(tag as u8).unwrap(), tag);
        }
    }

    #[test]
    fn unknown_tag_byte_is_rejected() {
        assert_eq!(Tag::from_byte(12).unwrap_err(), Error::InvalidTag(12));
        assert_eq!(Tag::from_byte(0xFF).unwrap_err(), Error::InvalidTag(0xFF));
    }

    #[test]
    fn marker_values_are_distinct() {
        assert_ne!(MARKER_NULL, MARKER_FIRST);
        assert_ne!(MARKER_FIRST, MARKER_BACKREF);
        assert_ne!(MARKER_NULL, MARKER_BACKREF);
    }
}
