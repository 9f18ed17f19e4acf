//! Type Descriptor Provider: declares the serializable members of object types.
//!
//! Der Provider ist die Schnittstelle, über die die Engine erfährt, welche
//! Member ein Objekttyp hat, mit welchem Codec jeder Member geschrieben wird
//! und ob Null erlaubt ist. Die Member-Reihenfolge eines Deskriptors **ist**
//! die Wire-Reihenfolge; sie wird beim Bau nach Member-Namen sortiert und
//! ist damit unabhängig von der zufälligen Deklarationsreihenfolge stabil.
//!
//! Eine Registry gehört dem Aufrufer und wird Encode/Decode-Aufrufen als
//! `&TypeRegistry` mitgegeben — kein globaler Zustand.

use std::fmt;
use std::rc::Rc;

use crate::bytestream::{ByteReader, ByteWriter};
use crate::value::{Object, Value};
use crate::{FastIndexMap, Result};

/// A caller-supplied codec for one already-encoded scalar.
///
/// Custom-Codecs sind terminal: sie schreiben und lesen ihre Bytes komplett
/// selbst und können nie suspendieren. Für alles Zusammengesetzte sind die
/// eingebauten Container-Kinds zuständig.
pub trait ScalarCodec {
    /// Writes the value's payload bytes.
    fn encode(&self, out: &mut ByteWriter, value: &Value) -> Result<()>;
    /// Reads one payload back into a value.
    fn decode(&self, reader: &mut ByteReader<'_>) -> Result<Value>;
}

/// Per-type validation hook, run after all members of a decoded object are
/// populated. Ein `Err` wird als
/// [`Error::ConstructionFailed`](crate::Error::ConstructionFailed) gemeldet.
pub type Validator = fn(&Object) -> core::result::Result<(), String>;

/// Declared kind of one member: selects the codec applied on the wire.
#[derive(Clone)]
pub enum MemberKind {
    /// Polymorphic member: value carries its own tag byte; null is always legal.
    Any,
    Bool,
    /// 32-bit varint. `optimize_positive` wählt Zweierkomplement statt Zigzag.
    I32 { optimize_positive: bool },
    /// 64-bit varint. `optimize_positive` wählt Zweierkomplement statt Zigzag.
    I64 { optimize_positive: bool },
    F32,
    F64,
    Str,
    Bytes,
    Array,
    List,
    Map,
    /// Object of a fixed declared type; the type name stays off the wire.
    Object(Rc<str>),
    /// Caller-supplied scalar codec.
    Custom(Rc<dyn ScalarCodec>),
}

impl MemberKind {
    /// Zigzag-encoded 32-bit integer (the default flavor).
    pub fn i32() -> Self {
        Self::I32 { optimize_positive: false }
    }

    /// Two's-complement 32-bit integer for values known to be non-negative.
    pub fn i32_positive() -> Self {
        Self::I32 { optimize_positive: true }
    }

    /// Zigzag-encoded 64-bit integer (the default flavor).
    pub fn i64() -> Self {
        Self::I64 { optimize_positive: false }
    }

    /// Two's-complement 64-bit integer for values known to be non-negative.
    pub fn i64_positive() -> Self {
        Self::I64 { optimize_positive: true }
    }

    /// Object member of a fixed type.
    pub fn object(type_name: impl Into<Rc<str>>) -> Self {
        Self::Object(type_name.into())
    }

    /// Member encoded by a caller-supplied codec.
    pub fn custom(codec: impl ScalarCodec + 'static) -> Self {
        Self::Custom(Rc::new(codec))
    }
}

impl fmt::Debug for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "Any"),
            Self::Bool => write!(f, "Bool"),
            Self::I32 { optimize_positive } => write!(f, "I32(optimize_positive={optimize_positive})"),
            Self::I64 { optimize_positive } => write!(f, "I64(optimize_positive={optimize_positive})"),
            Self::F32 => write!(f, "F32"),
            Self::F64 => write!(f, "F64"),
            Self::Str => write!(f, "Str"),
            Self::Bytes => write!(f, "Bytes"),
            Self::Array => write!(f, "Array"),
            Self::List => write!(f, "List"),
            Self::Map => write!(f, "Map"),
            Self::Object(name) => write!(f, "Object({name})"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// One serializable member: name, codec kind, nullability.
#[derive(Clone, Debug)]
pub struct MemberDescriptor {
    name: Rc<str>,
    kind: MemberKind,
    nullable: bool,
}

impl MemberDescriptor {
    /// Declares a non-nullable member.
    pub fn new(name: impl Into<Rc<str>>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
        }
    }

    /// Marks the member nullable. Skalare Member erhalten dafür ein
    /// Präsenz-Byte auf dem Stream, Container nutzen den Referenz-Marker.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Member name (also the sort key for wire order).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_rc(&self) -> Rc<str> {
        Rc::clone(&self.name)
    }

    /// Declared codec kind.
    pub fn kind(&self) -> &MemberKind {
        &self.kind
    }

    /// Whether null is legal for this member.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Ordered member list of one object type, plus an optional validation hook.
#[derive(Clone)]
pub struct TypeDescriptor {
    type_name: Rc<str>,
    // Rc<[_]>: Tasks halten während der Traversierung eigene Handles darauf.
    members: Rc<[MemberDescriptor]>,
    validator: Option<Validator>,
}

impl TypeDescriptor {
    /// Builds a descriptor. Members are sorted by name; the sorted order is
    /// the wire order.
    ///
    /// # Panics
    ///
    /// Panics on duplicate member names — ein Deskriptor mit doppelten
    /// Membern hätte keine eindeutige Wire-Reihenfolge.
    pub fn new(type_name: impl Into<Rc<str>>, mut members: Vec<MemberDescriptor>) -> Self {
        members.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in members.windows(2) {
            assert!(
                pair[0].name != pair[1].name,
                "duplicate member '{}' in type descriptor",
                pair[0].name
            );
        }
        Self {
            type_name: type_name.into(),
            members: members.into(),
            validator: None,
        }
    }

    /// Attaches a validation hook, run after decode populates all members.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// The described type's name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn type_name_rc(&self) -> Rc<str> {
        Rc::clone(&self.type_name)
    }

    /// Members in wire order.
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    pub(crate) fn members_rc(&self) -> Rc<[MemberDescriptor]> {
        Rc::clone(&self.members)
    }

    pub(crate) fn validator(&self) -> Option<Validator> {
        self.validator
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({}, {} members)", self.type_name, self.members.len())
    }
}

/// Registry of all object types known to one encode/decode call.
#[derive(Default)]
pub struct TypeRegistry {
    types: FastIndexMap<Rc<str>, TypeDescriptor>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor, replacing any previous one for the same type.
    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.type_name_rc(), descriptor);
    }

    /// Looks up the descriptor for a type name.
    pub fn get(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
