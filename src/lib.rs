//! ryko – continuation-based binary serializer for cyclic object graphs
//!
//! Serialisiert beliebige, auch zyklische Wertgraphen in einen kompakten
//! Byte-Stream und rekonstruiert daraus einen identitätstreuen Graphen.
//! Die Traversierung läuft über einen expliziten Continuation-Stack auf dem
//! Heap, nie über den nativen Call-Stack — beliebig tiefe Graphen sind damit
//! nur durch den Speicher begrenzt.
//!
//! # Beispiel
//!
//! ```
//! use ryko::{decode, encode, graph_eq, MemberDescriptor, MemberKind,
//!            TypeDescriptor, TypeRegistry, Value};
//!
//! let mut types = TypeRegistry::new();
//! types.register(TypeDescriptor::new("Point", vec![
//!     MemberDescriptor::new("x", MemberKind::i64()),
//!     MemberDescriptor::new("y", MemberKind::i64()),
//! ]));
//!
//! let point = Value::object("Point", [("x", Value::I64(-3)), ("y", Value::I64(7))]);
//! let bytes = encode(&point, &types).unwrap();
//! let decoded = decode(&bytes, &types).unwrap();
//! assert!(graph_eq(&point, &decoded));
//! ```
//!
//! Zyklen und geteilte Teilgraphen bleiben erhalten: zeigt ein Member auf
//! sein eigenes Objekt, zeigt es nach dem Round-Trip auf dieselbe decodierte
//! Instanz (Identität, nicht Kopie).

pub mod bytestream;
pub mod decoder;
pub mod descriptor;
pub mod encoder;
pub mod error;
pub mod name_table;
pub mod ref_table;
pub mod value;
pub mod varint;
pub mod wire;

pub use error::{Error, Result};

/// Ergebnis eines Task-Steps: fertig, oder suspendiert weil ein Kind-Task
/// gepusht wurde. Der Driver popt bei `Done` und lässt den Task bei
/// `Suspended` unter seinen Kindern auf dem Stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Done,
    Suspended,
}

/// HashMap mit ahash (schneller, nicht DoS-resistent — für interne Datenstrukturen).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// HashSet mit ahash.
pub(crate) type FastHashSet<K> = hashbrown::HashSet<K, ahash::RandomState>;

/// IndexMap mit ahash (deterministische Iteration + schnelles Hashing).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: Wertgraph
pub use value::{graph_eq, Object, Value};

// Public API: Type Descriptor Provider
pub use descriptor::{MemberDescriptor, MemberKind, ScalarCodec, TypeDescriptor, TypeRegistry};

// Public API: Encoder/Decoder
pub use decoder::{decode, decode_with_config, DecoderConfig};
pub use encoder::{encode, encode_with_config, EncoderConfig};

// Public API: Cursors (für eigene ScalarCodec-Implementierungen)
pub use bytestream::{ByteReader, ByteWriter};
