//! Object-graph encoder: explicit continuation stack with inline-first stepping.
//!
//! Ein Top-Level-Encode besitzt Cursor, Referenztabelle, Namenstabelle und
//! Continuation-Stack exklusiv; nichts davon überlebt den Aufruf. Der Driver
//! popt den obersten Task, steppt ihn, und legt ihn bei Suspension unter das
//! frisch gepushte Kind zurück. Ein Step verarbeitet Kinder *inline zuerst*:
//! Skalare und Back-Referenzen werden direkt geschrieben, ohne den Stack zu
//! berühren, und der Task rückt im selben Step zum nächsten Kind vor. Nur
//! eine erste Okkurrenz eines Containers pusht einen Kind-Task; der Eltern-
//! Task hat seinen Cursor dann bereits weitergerückt und suspendiert.
//!
//! Tiefe ist damit reine Heap-Sache: eine Kette aus N einfeldrigen Objekten
//! belegt N Stack-Einträge im `Vec`, nie N native Stack-Frames.
//!
//! Fehlerpolitik: jeder Fehler bricht den gesamten Aufruf ab, der Zustand
//! wird verworfen. Der Inhalt eines teilweise beschriebenen Buffers ist
//! undefiniert.
//!
//! Das Byte-Format ist in [`crate::wire`] dokumentiert.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::bytestream::ByteWriter;
use crate::descriptor::{MemberDescriptor, MemberKind, TypeRegistry};
use crate::name_table::NameEncodeTable;
use crate::ref_table::WriteRefTable;
use crate::value::{Object, Value};
use crate::varint;
use crate::wire::{self, Tag};
use crate::{Error, Result, Step};


/// Encoder configuration.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Initial capacity of the output buffer in bytes.
    pub initial_capacity: usize,
    /// Hard maximum output size; exceeding it fails with
    /// [`Error::BufferOverflow`].
    pub max_buffer_size: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 256,
            max_buffer_size: usize::MAX,
        }
    }
}

/// Encodes one value graph with the default configuration.
pub fn encode(value: &Value, types: &TypeRegistry) -> Result<Vec<u8>> {
    encode_with_config(value, types, &EncoderConfig::default())
}

/// Encodes one value graph.
///
/// Zyklen und geteilte Container werden über die Referenztabelle genau
/// einmal geschrieben; jedes weitere Vorkommen ist eine Back-Referenz.
pub fn encode_with_config(
    value: &Value,
    types: &TypeRegistry,
    config: &EncoderConfig,
) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(types, config);
    encoder.run(value)?;
    debug!(
        "encoded {} bytes, {} containers interned, {} type names",
        encoder.out.position(),
        encoder.refs.len(),
        encoder.names.len()
    );
    Ok(encoder.out.into_vec())
}

/// Resumable unit of write work for one composite value.
///
/// Jede Variante hält genau den Zustand zum Fortsetzen: den Container und
/// den Cursor in dessen Sequenz. Skalare brauchen keinen Task — sie laufen
/// komplett inline.
enum WriteTask {
    /// Elements of a fixed-count container.
    ArrayElems {
        items: Rc<RefCell<Vec<Value>>>,
        index: usize,
    },
    /// Elements of a growable collection.
    ListElems {
        items: Rc<RefCell<Vec<Value>>>,
        index: usize,
    },
    /// Map entries, key before value. `cursor` zählt Hälften:
    /// Eintrag `cursor / 2`, gerade = Schlüssel, ungerade = Wert.
    MapEntries {
        entries: Rc<RefCell<Vec<(Value, Value)>>>,
        cursor: usize,
    },
    /// Members of a structured object, in descriptor (wire) order.
    ObjectFields {
        object: Rc<RefCell<Object>>,
        type_name: Rc<str>,
        members: Rc<[MemberDescriptor]>,
        member_num: usize,
    },
}

impl WriteTask {
    /// Processes children until the sequence is exhausted (`Done`) or a
    /// child pushed its own task (`Suspended`). Der Cursor ist beim
    /// Suspendieren bereits weitergerückt — das Fortsetzen beginnt beim
    /// nächsten Kind.
    fn step(&mut self, enc: &mut Encoder<'_>) -> Result<Step> {
        match self {
            Self::ArrayElems { items, index } | Self::ListElems { items, index } => loop {
                let child = {
                    let elems = items.borrow();
                    match elems.get(*index) {
                        Some(value) => value.clone(),
                        None => return Ok(Step::Done),
                    }
                };
                *index += 1;
                if enc.write_value(&child)? == Step::Suspended {
                    return Ok(Step::Suspended);
                }
            },
            Self::MapEntries { entries, cursor } => loop {
                let child = {
                    let pairs = entries.borrow();
                    match pairs.get(*cursor / 2) {
                        Some((key, value)) => {
                            if *cursor % 2 == 0 { key.clone() } else { value.clone() }
                        }
                        None => return Ok(Step::Done),
                    }
                };
                *cursor += 1;
                if enc.write_value(&child)? == Step::Suspended {
                    return Ok(Step::Suspended);
                }
            },
            Self::ObjectFields { object, type_name, members, member_num } => {
                while *member_num < members.len() {
                    let member = &members[*member_num];
                    *member_num += 1;
                    // Deklarierte, aber fehlende Member gehen als Null raus.
                    let value = object
                        .borrow()
                        .get(member.name())
                        .cloned()
                        .unwrap_or(Value::Null);
                    let outcome = enc
                        .write_member(&value, member)
                        .map_err(|e| e.in_member(type_name, member.name()))?;
                    if outcome == Step::Suspended {
                        return Ok(Step::Suspended);
                    }
                }
                Ok(Step::Done)
            }
        }
    }
}

/// State of one top-level encode call.
struct Encoder<'t> {
    types: &'t TypeRegistry,
    out: ByteWriter,
    refs: WriteRefTable,
    names: NameEncodeTable,
    stack: Vec<WriteTask>,
}

impl<'t> Encoder<'t> {
    fn new(types: &'t TypeRegistry, config: &EncoderConfig) -> Self {
        Self {
            types,
            out: ByteWriter::with_limits(config.initial_capacity, config.max_buffer_size),
            refs: WriteRefTable::new(),
            names: NameEncodeTable::new(),
            stack: Vec::new(),
        }
    }

    /// Driver loop: Pop → Step → bei Suspension unter die gepushten Kinder
    /// zurücklegen. Leerer Stack = Aufruf fertig.
    fn run(&mut self, root: &Value) -> Result<()> {
        self.write_value(root)?;
        while let Some(mut task) = self.stack.pop() {
            let floor = self.stack.len();
            match task.step(self)? {
                Step::Done => {}
                Step::Suspended => self.stack.insert(floor, task),
            }
        }
        Ok(())
    }

    /// Writes one value in tagged position.
    ///
    /// Inline-first: Skalare und Back-Referenzen sind mit der Rückkehr
    /// vollständig geschrieben (`Done`); eine erste Container-Okkurrenz
    /// pusht ihren Task und meldet `Suspended`.
    fn write_value(&mut self, value: &Value) -> Result<Step> {
        match value {
            Value::Null => {
                self.out.write_u8(Tag::Null as u8)?;
                Ok(Step::Done)
            }
            Value::Bool(v) => {
                self.out.write_u8(Tag::Bool as u8)?;
                self.out.write_u8(u8::from(*v))?;
                Ok(Step::Done)
            }
            Value::I32(v) => {
                self.out.write_u8(Tag::I32 as u8)?;
                varint::write_i32(&mut self.out, *v, false)?;
                Ok(Step::Done)
            }
            Value::I64(v) => {
                self.out.write_u8(Tag::I64 as u8)?;
                varint::write_i64(&mut self.out, *v, false)?;
                Ok(Step::Done)
            }
            Value::F32(v) => {
                self.out.write_u8(Tag::F32 as u8)?;
                self.out.write_f32(*v)?;
                Ok(Step::Done)
            }
            Value::F64(v) => {
                self.out.write_u8(Tag::F64 as u8)?;
                self.out.write_f64(*v)?;
                Ok(Step::Done)
            }
            Value::Str(s) => {
                self.out.write_u8(Tag::Str as u8)?;
                self.write_len_bytes(s.as_bytes())?;
                Ok(Step::Done)
            }
            Value::Bytes(b) => {
                self.out.write_u8(Tag::Bytes as u8)?;
                self.write_len_bytes(b)?;
                Ok(Step::Done)
            }
            Value::Array(_) => {
                self.out.write_u8(Tag::Array as u8)?;
                self.write_container(value, true)
            }
            Value::List(_) => {
                self.out.write_u8(Tag::List as u8)?;
                self.write_container(value, true)
            }
            Value::Map(_) => {
                self.out.write_u8(Tag::Map as u8)?;
                self.write_container(value, true)
            }
            Value::Object(_) => {
                self.out.write_u8(Tag::Object as u8)?;
                self.write_container(value, true)
            }
        }
    }

    /// Writes one member in untagged (declared-kind) position.
    fn write_member(&mut self, value: &Value, member: &MemberDescriptor) -> Result<Step> {
        match member.kind() {
            MemberKind::Any => self.write_value(value),
            MemberKind::Bool => {
                if self.write_presence(value, member)? {
                    let Value::Bool(v) = value else {
                        return Err(kind_mismatch(value, member));
                    };
                    self.out.write_u8(u8::from(*v))?;
                }
                Ok(Step::Done)
            }
            MemberKind::I32 { optimize_positive } => {
                if self.write_presence(value, member)? {
                    let Value::I32(v) = value else {
                        return Err(kind_mismatch(value, member));
                    };
                    varint::write_i32(&mut self.out, *v, *optimize_positive)?;
                }
                Ok(Step::Done)
            }
            MemberKind::I64 { optimize_positive } => {
                if self.write_presence(value, member)? {
                    let Value::I64(v) = value else {
                        return Err(kind_mismatch(value, member));
                    };
                    varint::write_i64(&mut self.out, *v, *optimize_positive)?;
                }
                Ok(Step::Done)
            }
            MemberKind::F32 => {
                if self.write_presence(value, member)? {
                    let Value::F32(v) = value else {
                        return Err(kind_mismatch(value, member));
                    };
                    self.out.write_f32(*v)?;
                }
                Ok(Step::Done)
            }
            MemberKind::F64 => {
                if self.write_presence(value, member)? {
                    let Value::F64(v) = value else {
                        return Err(kind_mismatch(value, member));
                    };
                    self.out.write_f64(*v)?;
                }
                Ok(Step::Done)
            }
            MemberKind::Str => {
                if self.write_presence(value, member)? {
                    let Value::Str(s) = value else {
                        return Err(kind_mismatch(value, member));
                    };
                    self.write_len_bytes(s.as_bytes())?;
                }
                Ok(Step::Done)
            }
            MemberKind::Bytes => {
                if self.write_presence(value, member)? {
                    let Value::Bytes(b) = value else {
                        return Err(kind_mismatch(value, member));
                    };
                    self.write_len_bytes(b)?;
                }
                Ok(Step::Done)
            }
            MemberKind::Custom(codec) => {
                if self.write_presence(value, member)? {
                    codec.encode(&mut self.out, value)?;
                }
                Ok(Step::Done)
            }
            MemberKind::Array => {
                if value.is_null() {
                    return self.write_null_container(member);
                }
                if !matches!(value, Value::Array(_)) {
                    return Err(kind_mismatch(value, member));
                }
                self.write_container(value, false)
            }
            MemberKind::List => {
                if value.is_null() {
                    return self.write_null_container(member);
                }
                if !matches!(value, Value::List(_)) {
                    return Err(kind_mismatch(value, member));
                }
                self.write_container(value, false)
            }
            MemberKind::Map => {
                if value.is_null() {
                    return self.write_null_container(member);
                }
                if !matches!(value, Value::Map(_)) {
                    return Err(kind_mismatch(value, member));
                }
                self.write_container(value, false)
            }
            MemberKind::Object(declared) => {
                if value.is_null() {
                    return self.write_null_container(member);
                }
                let Value::Object(object) = value else {
                    return Err(kind_mismatch(value, member));
                };
                let actual = object.borrow().type_name_rc();
                if actual != *declared {
                    return Err(Error::unsupported(format!(
                        "object of type '{actual}' in member declared as '{declared}'"
                    )));
                }
                // Deklarierte Position: der Typname bleibt vom Stream weg.
                self.write_container(value, false)
            }
        }
    }

    /// Reference marker + id + (bei erster Okkurrenz) Body.
    ///
    /// `with_name` steuert, ob ein Objekt seinen Typnamen mitschreibt —
    /// nur in polymorpher Position, deklarierte Member kennen ihn statisch.
    fn write_container(&mut self, value: &Value, with_name: bool) -> Result<Step> {
        let identity = value.identity().expect("container value has an identity");
        let (id, seen) = self.refs.intern(identity);
        if seen {
            self.out.write_u8(wire::MARKER_BACKREF)?;
            varint::write_u64(&mut self.out, id)?;
            return Ok(Step::Done);
        }
        self.out.write_u8(wire::MARKER_FIRST)?;
        varint::write_u64(&mut self.out, id)?;

        match value {
            Value::Array(items) => {
                let len = items.borrow().len();
                varint::write_u64(&mut self.out, len as u64)?;
                if len == 0 {
                    return Ok(Step::Done);
                }
                self.stack.push(WriteTask::ArrayElems { items: Rc::clone(items), index: 0 });
            }
            Value::List(items) => {
                let len = items.borrow().len();
                varint::write_u64(&mut self.out, len as u64)?;
                if len == 0 {
                    return Ok(Step::Done);
                }
                self.stack.push(WriteTask::ListElems { items: Rc::clone(items), index: 0 });
            }
            Value::Map(entries) => {
                let len = entries.borrow().len();
                varint::write_u64(&mut self.out, len as u64)?;
                if len == 0 {
                    return Ok(Step::Done);
                }
                self.stack.push(WriteTask::MapEntries { entries: Rc::clone(entries), cursor: 0 });
            }
            Value::Object(object) => {
                let types = self.types;
                let type_name = object.borrow().type_name_rc();
                let descriptor = types.get(&type_name).ok_or_else(|| {
                    Error::unsupported(format!("type '{type_name}' is not registered"))
                })?;
                if with_name {
                    self.write_type_name(&type_name)?;
                }
                if descriptor.members().is_empty() {
                    return Ok(Step::Done);
                }
                self.stack.push(WriteTask::ObjectFields {
                    object: Rc::clone(object),
                    type_name: descriptor.type_name_rc(),
                    members: descriptor.members_rc(),
                    member_num: 0,
                });
            }
            _ => unreachable!("scalars are never reference-tracked"),
        }
        Ok(Step::Suspended)
    }

    /// Null in deklarierter Container-Position: Marker 0, falls erlaubt.
    fn write_null_container(&mut self, member: &MemberDescriptor) -> Result<Step> {
        if !member.is_nullable() {
            return Err(Error::unsupported(format!(
                "null in non-nullable member of kind {:?}",
                member.kind()
            )));
        }
        self.out.write_u8(wire::MARKER_NULL)?;
        Ok(Step::Done)
    }

    /// Präsenz-Byte für Skalar-Member. Liefert `false`, wenn Null bereits
    /// vollständig geschrieben wurde.
    fn write_presence(&mut self, value: &Value, member: &MemberDescriptor) -> Result<bool> {
        if value.is_null() {
            if !member.is_nullable() {
                return Err(Error::unsupported(format!(
                    "null in non-nullable member of kind {:?}",
                    member.kind()
                )));
            }
            self.out.write_u8(wire::PRESENT_NULL)?;
            return Ok(false);
        }
        if member.is_nullable() {
            self.out.write_u8(wire::PRESENT_VALUE)?;
        }
        Ok(true)
    }

    /// Name-Ref: erster Okkurrenz folgt der UTF-8 Name, danach nur die Id.
    fn write_type_name(&mut self, name: &str) -> Result<()> {
        let (id, seen) = self.names.intern(name);
        if seen {
            varint::write_u64(&mut self.out, id + 1)?;
        } else {
            self.out.write_u8(0)?;
            self.write_len_bytes(name.as_bytes())?;
        }
        Ok(())
    }

    fn write_len_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        varint::write_u64(&mut self.out, bytes.len() as u64)?;
        self.out.write_raw(bytes)
    }
}

fn kind_mismatch(value: &Value, member: &MemberDescriptor) -> Error {
    Error::unsupported(format!(
        "member of kind {:?} cannot encode a {} value",
        member.kind(),
        value.kind_name()
    ))
}
