//! Decoder-Tests: Round-Trips über den Encoder plus eine Korruptions-Matrix
//! aus handgebauten Streams.

use super::*;
use crate::descriptor::{MemberDescriptor, TypeDescriptor};
use crate::encoder::encode;
use crate::value::graph_eq;

fn empty_types() -> TypeRegistry {
    TypeRegistry::new()
}

fn round_trip(value: &Value, types: &TypeRegistry) -> Value {
    let bytes = encode(value, types).unwrap();
    decode(&bytes, types).unwrap()
}

// --- Round-Trips ---

#[test]
fn scalar_round_trips() {
    let types = empty_types();
    for value in [
        Value::Null,
        Value::Bool(true),
        Value::Bool(false),
        Value::I32(0),
        Value::I32(i32::MIN),
        Value::I32(i32::MAX),
        Value::I64(0),
        Value::I64(-1),
        Value::I64(i64::MIN),
        Value::I64(i64::MAX),
        Value::F32(-0.5),
        Value::F64(f64::INFINITY),
        Value::str(""),
        Value::str("größer-als-ASCII ✓"),
        Value::Bytes(vec![]),
        Value::Bytes(vec![0xFF; 300]),
    ] {
        let decoded = round_trip(&value, &types);
        assert!(graph_eq(&value, &decoded), "round-trip failed for {value:?}");
    }
}

#[test]
fn container_round_trips_preserve_order() {
    let types = empty_types();
    let value = Value::list(vec![Value::str("a"), Value::str("b"), Value::str("c")]);
    let decoded = round_trip(&value, &types);
    let items = decoded.as_elements().unwrap().borrow();
    let texts: Vec<String> = items
        .iter()
        .map(|v| match v {
            Value::Str(s) => s.clone(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(texts, vec!["a", "b", "c"]);
}

#[test]
fn map_round_trip_preserves_entry_order() {
    let types = empty_types();
    let value = Value::map(vec![
        (Value::str("z"), Value::I64(1)),
        (Value::str("a"), Value::I64(2)),
        (Value::str("m"), Value::I64(3)),
    ]);
    let decoded = round_trip(&value, &types);
    let entries = decoded.as_map().unwrap().borrow();
    let keys: Vec<String> = entries
        .iter()
        .map(|(k, _)| match k {
            Value::Str(s) => s.clone(),
            other => panic!("unexpected key {other:?}"),
        })
        .collect();
    assert_eq!(keys, vec!["z", "a", "m"]);
}

#[test]
fn array_round_trip_keeps_kind_and_slots() {
    let types = empty_types();
    let value = Value::array(vec![Value::I32(1), Value::Null, Value::str("x")]);
    let decoded = round_trip(&value, &types);
    assert!(matches!(decoded, Value::Array(_)));
    assert!(graph_eq(&value, &decoded));
}

#[test]
fn object_round_trip_with_members() {
    let mut types = TypeRegistry::new();
    types.register(TypeDescriptor::new("Point", vec![
        MemberDescriptor::new("x", MemberKind::i64()),
        MemberDescriptor::new("y", MemberKind::i64()),
    ]));
    let value = Value::object("Point", [("x", Value::I64(-3)), ("y", Value::I64(7))]);
    let decoded = round_trip(&value, &types);
    assert!(graph_eq(&value, &decoded));
}

#[test]
fn nullable_members_round_trip() {
    let mut types = TypeRegistry::new();
    types.register(TypeDescriptor::new("T", vec![
        MemberDescriptor::new("a", MemberKind::Str).nullable(),
        MemberDescriptor::new("b", MemberKind::i32()).nullable(),
    ]));
    let value = Value::object("T", [("a", Value::Null), ("b", Value::I32(9))]);
    let decoded = round_trip(&value, &types);
    assert!(graph_eq(&value, &decoded));
}

#[test]
fn any_member_round_trips_polymorphically() {
    let mut types = TypeRegistry::new();
    types.register(TypeDescriptor::new("Box", vec![
        MemberDescriptor::new("v", MemberKind::Any),
    ]));
    for inner in [Value::Null, Value::I64(5), Value::str("s"), Value::list(vec![Value::Bool(true)])] {
        let value = Value::object("Box", [("v", inner)]);
        let decoded = round_trip(&value, &types);
        assert!(graph_eq(&value, &decoded));
    }
}

#[test]
fn decode_ignores_trailing_bytes() {
    let types = empty_types();
    let decoded = decode(&[0, 0xAB, 0xCD], &types).unwrap();
    assert!(decoded.is_null());
}

// --- Korruptions-Matrix ---

#[test]
fn empty_input_underflows() {
    assert_eq!(decode(&[], &empty_types()).unwrap_err(), Error::BufferUnderflow);
}

#[test]
fn unknown_tag_is_rejected() {
    assert_eq!(decode(&[12], &empty_types()).unwrap_err(), Error::InvalidTag(12));
    assert_eq!(decode(&[0xFF], &empty_types()).unwrap_err(), Error::InvalidTag(0xFF));
}

#[test]
fn invalid_bool_byte_is_rejected() {
    let err = decode(&[1, 7], &empty_types()).unwrap_err();
    assert!(matches!(err, Error::InvalidValue(_)), "{err}");
}

#[test]
fn invalid_reference_marker_is_rejected() {
    let err = decode(&[9, 3], &empty_types()).unwrap_err();
    assert!(err.to_string().contains("marker"), "{err}");
}

#[test]
fn null_marker_in_tagged_position_is_rejected() {
    let err = decode(&[9, 0], &empty_types()).unwrap_err();
    assert!(matches!(err, Error::InvalidValue(_)), "{err}");
}

#[test]
fn unknown_back_reference_is_fatal() {
    assert_eq!(
        decode(&[9, 2, 5], &empty_types()).unwrap_err(),
        Error::UnknownReference(5)
    );
}

#[test]
fn out_of_sequence_first_occurrence_id_is_corruption() {
    assert_eq!(
        decode(&[9, 1, 5, 0], &empty_types()).unwrap_err(),
        Error::ReferenceIdMismatch { expected: 0, found: 5 }
    );
}

#[test]
fn hostile_length_prefix_fails_before_allocation() {
    // String behauptet 200 Bytes, Input endet sofort
    assert_eq!(decode(&[6, 200, 1], &empty_types()).unwrap_err(), Error::BufferUnderflow);
    // Liste behauptet mehr Elemente als Bytes übrig sind
    assert_eq!(decode(&[9, 1, 0, 100], &empty_types()).unwrap_err(), Error::BufferUnderflow);
}

#[test]
fn length_limit_is_enforced() {
    let config = DecoderConfig { max_length: Some(4) };
    let err = decode_with_config(&[7, 5, 1, 2, 3, 4, 5], &empty_types(), &config).unwrap_err();
    assert_eq!(err, Error::LengthLimitExceeded { length: 5, max: 4 });
}

#[test]
fn invalid_utf8_string_is_rejected() {
    let err = decode(&[6, 1, 0xFF], &empty_types()).unwrap_err();
    assert!(err.to_string().contains("UTF-8"), "{err}");
}

#[test]
fn unregistered_type_is_unsupported() {
    let err = decode(&[11, 1, 0, 0, 1, b'X'], &empty_types()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedValue(_)), "{err}");
    assert!(err.to_string().contains("X"), "{err}");
}

#[test]
fn unknown_type_name_back_reference_is_fatal() {
    let err = decode(&[11, 1, 0, 9], &empty_types()).unwrap_err();
    assert_eq!(err, Error::UnknownReference(8));
}

#[test]
fn back_reference_kind_mismatch_is_rejected() {
    // Äußere Liste, Element behauptet Map-Back-Referenz auf die Liste selbst
    let err = decode(&[9, 1, 0, 1, 10, 2, 0], &empty_types()).unwrap_err();
    assert!(err.to_string().contains("map"), "{err}");
}

#[test]
fn member_errors_carry_type_and_member_context() {
    let mut types = TypeRegistry::new();
    types.register(TypeDescriptor::new("T", vec![
        MemberDescriptor::new("flag", MemberKind::Bool),
    ]));
    let err = decode(&[11, 1, 0, 0, 1, b'T', 7], &types).unwrap_err();
    match &err {
        Error::MemberContext { type_name, member, cause } => {
            assert_eq!(type_name, "T");
            assert_eq!(member, "flag");
            assert!(matches!(**cause, Error::InvalidValue(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("flag"), "{err}");
}

#[test]
fn invalid_presence_byte_is_rejected() {
    let mut types = TypeRegistry::new();
    types.register(TypeDescriptor::new("T", vec![
        MemberDescriptor::new("opt", MemberKind::Str).nullable(),
    ]));
    let err = decode(&[11, 1, 0, 0, 1, b'T', 9], &types).unwrap_err();
    assert!(err.to_string().contains("presence"), "{err}");
}

#[test]
fn truncated_member_payload_underflows_with_context() {
    let mut types = TypeRegistry::new();
    types.register(TypeDescriptor::new("T", vec![
        MemberDescriptor::new("x", MemberKind::F64),
    ]));
    let err = decode(&[11, 1, 0, 0, 1, b'T', 0x3F], &types).unwrap_err();
    match err {
        Error::MemberContext { cause, .. } => assert_eq!(*cause, Error::BufferUnderflow),
        other => panic!("unexpected error {other:?}"),
    }
}

// --- Validierungs-Hook ---

fn positive_x(object: &Object) -> core::result::Result<(), String> {
    match object.get("x") {
        Some(Value::I64(v)) if *v > 0 => Ok(()),
        Some(Value::I64(v)) => Err(format!("x must be positive, got {v}")),
        _ => Err("x is missing".into()),
    }
}

#[test]
fn validator_runs_after_members_are_populated() {
    let mut types = TypeRegistry::new();
    types.register(
        TypeDescriptor::new("Pos", vec![
            MemberDescriptor::new("x", MemberKind::i64()),
        ])
        .with_validator(positive_x),
    );

    let ok = Value::object("Pos", [("x", Value::I64(3))]);
    let decoded = round_trip(&ok, &types);
    assert!(graph_eq(&ok, &decoded));

    // Encode prüft nicht — erst der Decode lässt den Hook laufen
    let bad = Value::object("Pos", [("x", Value::I64(-5))]);
    let bytes = encode(&bad, &types).unwrap();
    let err = decode(&bytes, &types).unwrap_err();
    match &err {
        Error::ConstructionFailed { type_name, reason } => {
            assert_eq!(type_name, "Pos");
            assert!(reason.contains("-5"), "{reason}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn validator_on_memberless_type_runs_immediately() {
    fn always_fail(_: &Object) -> core::result::Result<(), String> {
        Err("nope".into())
    }
    let mut types = TypeRegistry::new();
    types.register(TypeDescriptor::new("Empty", vec![]).with_validator(always_fail));
    let bytes = encode(&Value::object("Empty", [] as [(&str, Value); 0]), &types).unwrap();
    let err = decode(&bytes, &types).unwrap_err();
    assert!(matches!(err, Error::ConstructionFailed { .. }), "{err}");
}

// --- Failed decode gibt nichts Halbes heraus ---

#[test]
fn failed_decode_returns_only_the_error() {
    let mut types = TypeRegistry::new();
    types.register(TypeDescriptor::new("Node", vec![
        MemberDescriptor::new("id", MemberKind::i64_positive()),
        MemberDescriptor::new("next", MemberKind::object("Node")).nullable(),
    ]));
    let tail = Value::object("Node", [("id", Value::I64(2)), ("next", Value::Null)]);
    let head = Value::object("Node", [("id", Value::I64(1)), ("next", tail)]);
    let mut bytes = encode(&head, &types).unwrap();
    // Stream mitten im inneren Objekt abschneiden
    bytes.truncate(bytes.len() - 1);
    let result = decode(&bytes, &types);
    assert!(result.is_err());
}
