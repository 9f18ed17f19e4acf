//! Central error types for the serialization engine.
//!
//! Kein Fehler wird intern behandelt: jeder Fehler in einem Task-Step bricht
//! den gesamten Top-Level-Aufruf ab, der zugehörige Zustand (Cursor,
//! Referenztabellen, Continuation-Stack) wird verworfen. Die ursprüngliche
//! Ursache bleibt über [`Error::MemberContext`] erhalten.

use core::fmt;

/// All error conditions surfaced by encode/decode calls.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A read moved past the end of the input buffer.
    BufferUnderflow,
    /// A write would grow the output buffer past its configured maximum.
    BufferOverflow {
        /// Bytes the write needed in total.
        needed: usize,
        /// Configured maximum buffer size.
        max: usize,
    },
    /// A varint had its continuation bit set through the maximum byte count,
    /// or carried overflow bits in its final byte.
    MalformedVarint,
    /// A back-reference id was never registered in this stream.
    UnknownReference(u64),
    /// A first-occurrence reference id was out of dense assignment order.
    ///
    /// Ids werden in First-Seen-Reihenfolge lückenlos vergeben; eine Lücke
    /// im Stream ist Korruption, kein behandelbarer Zustand.
    ReferenceIdMismatch { expected: u64, found: u64 },
    /// A value cannot be described for serialization: unregistered type,
    /// member kind mismatch, or null in a non-nullable member.
    UnsupportedValue(String),
    /// Allocating or validating an object shell failed.
    ConstructionFailed {
        /// Type whose shell was being built or validated.
        type_name: String,
        /// Underlying cause, as reported by the constructor/validator.
        reason: String,
    },
    /// An unknown value tag byte was read.
    InvalidTag(u8),
    /// A decoded payload is structurally invalid (bad bool byte, broken
    /// UTF-8, null reference marker in non-null position, ...).
    InvalidValue(String),
    /// A declared length exceeds the configured maximum.
    LengthLimitExceeded { length: u64, max: u64 },
    /// Context wrapper: the error occurred while processing one member of a
    /// structured object. The original cause is preserved, never swallowed.
    MemberContext {
        type_name: String,
        member: String,
        cause: Box<Error>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferUnderflow => write!(f, "read past end of input buffer"),
            Self::BufferOverflow { needed, max } => {
                write!(f, "write of {needed} bytes exceeds maximum buffer size {max}")
            }
            Self::MalformedVarint => write!(f, "malformed varint: no terminating byte within maximum length"),
            Self::UnknownReference(id) => {
                write!(f, "back-reference id {id} was never registered in this stream")
            }
            Self::ReferenceIdMismatch { expected, found } => {
                write!(f, "first-occurrence reference id {found} out of sequence, expected {expected}")
            }
            Self::UnsupportedValue(msg) => write!(f, "unsupported value: {msg}"),
            Self::ConstructionFailed { type_name, reason } => {
                write!(f, "constructing '{type_name}' failed: {reason}")
            }
            Self::InvalidTag(tag) => write!(f, "invalid value tag byte 0x{tag:02X}"),
            Self::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
            Self::LengthLimitExceeded { length, max } => {
                write!(f, "declared length {length} exceeds configured maximum {max}")
            }
            Self::MemberContext { type_name, member, cause } => {
                write!(f, "in member '{member}' of '{type_name}': {cause}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MemberContext { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

impl Error {
    /// Erstellt einen `UnsupportedValue` Fehler.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedValue(msg.into())
    }

    /// Erstellt einen `InvalidValue` Fehler.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    /// Wickelt einen Fehler in Member-Kontext ein (Typ- und Member-Name).
    pub fn in_member(self, type_name: &str, member: &str) -> Self {
        Self::MemberContext {
            type_name: type_name.to_owned(),
            member: member.to_owned(),
            cause: Box::new(self),
        }
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
