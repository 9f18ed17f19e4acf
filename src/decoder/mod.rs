//! Object-graph decoder: mirrors the encoder's continuation engine.
//!
//! Das tragende Detail für Zyklen: ein Container-*Shell* wird im Moment
//! seiner Allokation in der Referenztabelle registriert, strikt bevor
//! irgendein Element oder Member decodiert ist. Back-Referenzen späterer
//! Stream-Positionen lösen damit auf dieselbe Instanz auf, auch wenn die
//! noch mitten in der Befüllung steckt — Selbstreferenzen eingeschlossen.
//!
//! Weil der Shell sofort existiert, platzieren Read-Tasks jedes Kind sofort
//! an seinem Ziel: Arrays weisen per Slot-Index zu, Listen hängen in
//! Stream-Reihenfolge an, Maps fügen Paare in Stream-Reihenfolge ein,
//! Objekte setzen den Member. Einfüge-Reihenfolge == Encode-Reihenfolge.
//!
//! Längenangaben aus dem Stream werden vor jeder Allokation gegen den
//! Rest-Input geprüft (jedes Element kostet mindestens ein Byte) und
//! optional gegen [`DecoderConfig::max_length`] — ein manipulierter Stream
//! kann so keine unbegrenzten Allokationen erzwingen.
//!
//! Ein fehlgeschlagener Decode gibt niemals ein teilkonstruiertes Objekt
//! heraus; der gesamte Aufrufzustand wird verworfen.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::bytestream::ByteReader;
use crate::descriptor::{MemberDescriptor, MemberKind, TypeRegistry, Validator};
use crate::name_table::NameDecodeTable;
use crate::ref_table::ReadRefTable;
use crate::value::{Object, Value};
use crate::varint;
use crate::wire::{self, Tag};
use crate::{Error, Result, Step};

#[cfg(test)]
mod tests;

/// Decoder configuration.
#[derive(Debug, Clone, Default)]
pub struct DecoderConfig {
    /// Optional cap on every declared length in the stream (string and blob
    /// bytes, element and entry counts). `None` lässt nur die
    /// Plausibilitätsprüfung gegen den Rest-Input gelten.
    pub max_length: Option<u64>,
}

/// Decodes one value graph with the default configuration.
pub fn decode(bytes: &[u8], types: &TypeRegistry) -> Result<Value> {
    decode_with_config(bytes, types, &DecoderConfig::default())
}

/// Decodes one value graph.
///
/// Liest genau einen Wert; Bytes hinter dem Graphen bleiben unangetastet.
pub fn decode_with_config(
    bytes: &[u8],
    types: &TypeRegistry,
    config: &DecoderConfig,
) -> Result<Value> {
    let mut decoder = Decoder::new(bytes, types, config);
    let root = decoder.run()?;
    debug!(
        "decoded {} of {} input bytes, {} shells registered",
        decoder.input.position(),
        decoder.input.limit(),
        decoder.refs.len()
    );
    Ok(root)
}

/// Kopf eines referenzverfolgten Werts nach Marker + Id.
enum RefHead {
    Null,
    First(u64),
    Resolved(Value),
}

/// Resumable unit of read work for one composite value.
enum ReadTask {
    /// Fixed-count container: jedes decodierte Kind landet per Slot-Index
    /// im vorab allozierten Container.
    ArrayElems {
        slots: Rc<RefCell<Vec<Value>>>,
        index: usize,
        total: usize,
    },
    /// Growable collection: Kinder werden in Stream-Reihenfolge angehängt;
    /// die aktuelle Länge ist der Cursor.
    ListElems {
        items: Rc<RefCell<Vec<Value>>>,
        total: usize,
    },
    /// Map entries, key before value. Ein suspendierter Schlüssel parkt in
    /// `pending_key`, bis sein Teilbaum fertig ist und der Wert folgen kann.
    MapEntries {
        entries: Rc<RefCell<Vec<(Value, Value)>>>,
        total: usize,
        pending_key: Option<Value>,
    },
    /// Members of a structured object in descriptor order; nach dem letzten
    /// Member läuft genau einmal der Validierungs-Hook.
    ObjectFields {
        object: Rc<RefCell<Object>>,
        type_name: Rc<str>,
        members: Rc<[MemberDescriptor]>,
        member_num: usize,
        validator: Option<Validator>,
    },
}

impl ReadTask {
    fn step(&mut self, dec: &mut Decoder<'_, '_>) -> Result<Step> {
        match self {
            Self::ArrayElems { slots, index, total } => {
                while *index < *total {
                    let slot = *index;
                    *index += 1;
                    let (value, outcome) = dec.read_value()?;
                    slots.borrow_mut()[slot] = value;
                    if outcome == Step::Suspended {
                        return Ok(Step::Suspended);
                    }
                }
                Ok(Step::Done)
            }
            Self::ListElems { items, total } => {
                while items.borrow().len() < *total {
                    let (value, outcome) = dec.read_value()?;
                    items.borrow_mut().push(value);
                    if outcome == Step::Suspended {
                        return Ok(Step::Suspended);
                    }
                }
                Ok(Step::Done)
            }
            Self::MapEntries { entries, total, pending_key } => {
                loop {
                    if let Some(key) = pending_key.take() {
                        let (value, outcome) = dec.read_value()?;
                        entries.borrow_mut().push((key, value));
                        if outcome == Step::Suspended {
                            return Ok(Step::Suspended);
                        }
                        continue;
                    }
                    if entries.borrow().len() >= *total {
                        return Ok(Step::Done);
                    }
                    let (key, outcome) = dec.read_value()?;
                    *pending_key = Some(key);
                    if outcome == Step::Suspended {
                        return Ok(Step::Suspended);
                    }
                }
            }
            Self::ObjectFields { object, type_name, members, member_num, validator } => {
                while *member_num < members.len() {
                    let member = &members[*member_num];
                    *member_num += 1;
                    let (value, outcome) = dec
                        .read_member(member)
                        .map_err(|e| e.in_member(type_name, member.name()))?;
                    object.borrow_mut().set(member.name_rc(), value);
                    if outcome == Step::Suspended {
                        return Ok(Step::Suspended);
                    }
                }
                run_validator(*validator, object, type_name)?;
                Ok(Step::Done)
            }
        }
    }
}

fn run_validator(
    validator: Option<Validator>,
    object: &Rc<RefCell<Object>>,
    type_name: &str,
) -> Result<()> {
    if let Some(validate) = validator {
        validate(&object.borrow()).map_err(|reason| Error::ConstructionFailed {
            type_name: type_name.to_owned(),
            reason,
        })?;
    }
    Ok(())
}

/// State of one top-level decode call.
struct Decoder<'a, 't> {
    types: &'t TypeRegistry,
    input: ByteReader<'a>,
    refs: ReadRefTable,
    names: NameDecodeTable,
    stack: Vec<ReadTask>,
    max_length: Option<u64>,
}

impl<'a, 't> Decoder<'a, 't> {
    fn new(bytes: &'a [u8], types: &'t TypeRegistry, config: &DecoderConfig) -> Self {
        Self {
            types,
            input: ByteReader::new(bytes),
            refs: ReadRefTable::new(),
            names: NameDecodeTable::new(),
            stack: Vec::new(),
            max_length: config.max_length,
        }
    }

    /// Driver loop, identisch zum Encoder: Pop → Step → bei Suspension
    /// unter die gepushten Kinder zurücklegen. Der Wurzel-Shell existiert
    /// ab dem ersten `read_value`; vollständig ist er erst bei leerem Stack.
    fn run(&mut self) -> Result<Value> {
        let (root, _) = self.read_value()?;
        while let Some(mut task) = self.stack.pop() {
            let floor = self.stack.len();
            match task.step(self)? {
                Step::Done => {}
                Step::Suspended => self.stack.insert(floor, task),
            }
        }
        Ok(root)
    }

    /// Reads one value in tagged position.
    ///
    /// Liefert den Wert sofort — bei Containern den registrierten Shell —
    /// plus das Step-Ergebnis: `Suspended` heißt, die Befüllung läuft noch
    /// über den gerade gepushten Task.
    fn read_value(&mut self) -> Result<(Value, Step)> {
        let tag = Tag::from_byte(self.input.read_u8()?)?;
        match tag {
            Tag::Null => Ok((Value::Null, Step::Done)),
            Tag::Bool => Ok((Value::Bool(self.read_bool()?), Step::Done)),
            Tag::I32 => Ok((Value::I32(varint::read_i32(&mut self.input, false)?), Step::Done)),
            Tag::I64 => Ok((Value::I64(varint::read_i64(&mut self.input, false)?), Step::Done)),
            Tag::F32 => Ok((Value::F32(self.input.read_f32()?), Step::Done)),
            Tag::F64 => Ok((Value::F64(self.input.read_f64()?), Step::Done)),
            Tag::Str => Ok((Value::Str(self.read_string()?), Step::Done)),
            Tag::Bytes => {
                let len = self.read_len()?;
                Ok((Value::Bytes(self.input.read_raw(len)?.to_vec()), Step::Done))
            }
            Tag::Array => match self.read_ref_head()? {
                RefHead::Null => Err(null_in_tagged_position()),
                RefHead::Resolved(v) => Ok((expect_resolved_kind(v, "array")?, Step::Done)),
                RefHead::First(id) => self.read_array_body(id),
            },
            Tag::List => match self.read_ref_head()? {
                RefHead::Null => Err(null_in_tagged_position()),
                RefHead::Resolved(v) => Ok((expect_resolved_kind(v, "list")?, Step::Done)),
                RefHead::First(id) => self.read_list_body(id),
            },
            Tag::Map => match self.read_ref_head()? {
                RefHead::Null => Err(null_in_tagged_position()),
                RefHead::Resolved(v) => Ok((expect_resolved_kind(v, "map")?, Step::Done)),
                RefHead::First(id) => self.read_map_body(id),
            },
            Tag::Object => match self.read_ref_head()? {
                RefHead::Null => Err(null_in_tagged_position()),
                RefHead::Resolved(v) => Ok((expect_resolved_kind(v, "object")?, Step::Done)),
                RefHead::First(id) => {
                    let type_name = self.read_type_name()?;
                    self.read_object_body(id, type_name)
                }
            },
        }
    }

    /// Reads one member in untagged (declared-kind) position.
    fn read_member(&mut self, member: &MemberDescriptor) -> Result<(Value, Step)> {
        match member.kind() {
            MemberKind::Any => self.read_value(),
            MemberKind::Bool => {
                if self.read_presence(member)? {
                    Ok((Value::Bool(self.read_bool()?), Step::Done))
                } else {
                    Ok((Value::Null, Step::Done))
                }
            }
            MemberKind::I32 { optimize_positive } => {
                if self.read_presence(member)? {
                    let v = varint::read_i32(&mut self.input, *optimize_positive)?;
                    Ok((Value::I32(v), Step::Done))
                } else {
                    Ok((Value::Null, Step::Done))
                }
            }
            MemberKind::I64 { optimize_positive } => {
                if self.read_presence(member)? {
                    let v = varint::read_i64(&mut self.input, *optimize_positive)?;
                    Ok((Value::I64(v), Step::Done))
                } else {
                    Ok((Value::Null, Step::Done))
                }
            }
            MemberKind::F32 => {
                if self.read_presence(member)? {
                    Ok((Value::F32(self.input.read_f32()?), Step::Done))
                } else {
                    Ok((Value::Null, Step::Done))
                }
            }
            MemberKind::F64 => {
                if self.read_presence(member)? {
                    Ok((Value::F64(self.input.read_f64()?), Step::Done))
                } else {
                    Ok((Value::Null, Step::Done))
                }
            }
            MemberKind::Str => {
                if self.read_presence(member)? {
                    Ok((Value::Str(self.read_string()?), Step::Done))
                } else {
                    Ok((Value::Null, Step::Done))
                }
            }
            MemberKind::Bytes => {
                if self.read_presence(member)? {
                    let len = self.read_len()?;
                    Ok((Value::Bytes(self.input.read_raw(len)?.to_vec()), Step::Done))
                } else {
                    Ok((Value::Null, Step::Done))
                }
            }
            MemberKind::Custom(codec) => {
                if self.read_presence(member)? {
                    Ok((codec.decode(&mut self.input)?, Step::Done))
                } else {
                    Ok((Value::Null, Step::Done))
                }
            }
            MemberKind::Array => match self.read_ref_head()? {
                RefHead::Null => self.null_member(member),
                RefHead::Resolved(v) => Ok((expect_resolved_kind(v, "array")?, Step::Done)),
                RefHead::First(id) => self.read_array_body(id),
            },
            MemberKind::List => match self.read_ref_head()? {
                RefHead::Null => self.null_member(member),
                RefHead::Resolved(v) => Ok((expect_resolved_kind(v, "list")?, Step::Done)),
                RefHead::First(id) => self.read_list_body(id),
            },
            MemberKind::Map => match self.read_ref_head()? {
                RefHead::Null => self.null_member(member),
                RefHead::Resolved(v) => Ok((expect_resolved_kind(v, "map")?, Step::Done)),
                RefHead::First(id) => self.read_map_body(id),
            },
            MemberKind::Object(declared) => match self.read_ref_head()? {
                RefHead::Null => self.null_member(member),
                RefHead::Resolved(v) => {
                    match &v {
                        Value::Object(o) if o.borrow().type_name() == &**declared => {}
                        Value::Object(o) => {
                            return Err(Error::invalid(format!(
                                "back-reference resolves to object type '{}' where '{declared}' was declared",
                                o.borrow().type_name()
                            )));
                        }
                        other => {
                            return Err(Error::invalid(format!(
                                "back-reference resolves to {} where an object was declared",
                                other.kind_name()
                            )));
                        }
                    }
                    Ok((v, Step::Done))
                }
                // Deklarierte Position: kein Typname im Stream.
                RefHead::First(id) => self.read_object_body(id, Rc::clone(declared)),
            },
        }
    }

    // --- Bodies (erste Okkurrenz): Shell allozieren, registrieren, Task pushen ---

    fn read_array_body(&mut self, id: u64) -> Result<(Value, Step)> {
        let total = self.read_len()?;
        let slots = Rc::new(RefCell::new(vec![Value::Null; total]));
        let shell = Value::Array(Rc::clone(&slots));
        self.refs.register_shell(id, shell.clone())?;
        if total == 0 {
            return Ok((shell, Step::Done));
        }
        self.stack.push(ReadTask::ArrayElems { slots, index: 0, total });
        Ok((shell, Step::Suspended))
    }

    fn read_list_body(&mut self, id: u64) -> Result<(Value, Step)> {
        let total = self.read_len()?;
        let items = Rc::new(RefCell::new(Vec::with_capacity(total)));
        let shell = Value::List(Rc::clone(&items));
        self.refs.register_shell(id, shell.clone())?;
        if total == 0 {
            return Ok((shell, Step::Done));
        }
        self.stack.push(ReadTask::ListElems { items, total });
        Ok((shell, Step::Suspended))
    }

    fn read_map_body(&mut self, id: u64) -> Result<(Value, Step)> {
        let total = self.read_len()?;
        let entries = Rc::new(RefCell::new(Vec::with_capacity(total)));
        let shell = Value::Map(Rc::clone(&entries));
        self.refs.register_shell(id, shell.clone())?;
        if total == 0 {
            return Ok((shell, Step::Done));
        }
        self.stack.push(ReadTask::MapEntries { entries, total, pending_key: None });
        Ok((shell, Step::Suspended))
    }

    fn read_object_body(&mut self, id: u64, type_name: Rc<str>) -> Result<(Value, Step)> {
        let types = self.types;
        let descriptor = types.get(&type_name).ok_or_else(|| {
            Error::unsupported(format!("type '{type_name}' is not registered"))
        })?;
        let object = Rc::new(RefCell::new(Object::new(descriptor.type_name_rc())));
        let shell = Value::Object(Rc::clone(&object));
        // Registrierung VOR dem ersten Member: Selbstreferenzen im Body
        // lösen auf genau diesen Shell auf.
        self.refs.register_shell(id, shell.clone())?;
        if descriptor.members().is_empty() {
            run_validator(descriptor.validator(), &object, descriptor.type_name())?;
            return Ok((shell, Step::Done));
        }
        self.stack.push(ReadTask::ObjectFields {
            object,
            type_name: descriptor.type_name_rc(),
            members: descriptor.members_rc(),
            member_num: 0,
            validator: descriptor.validator(),
        });
        Ok((shell, Step::Suspended))
    }

    // --- Leaf-Leser ---

    fn read_bool(&mut self) -> Result<bool> {
        match self.input.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::invalid(format!("invalid bool byte 0x{other:02X}"))),
        }
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let bytes = self.input.read_raw(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| Error::invalid("string payload is not valid UTF-8"))?;
        Ok(s.to_owned())
    }

    /// Deklarierte Länge lesen und gegen Limits prüfen, bevor irgendetwas
    /// alloziert wird. Jedes Element kostet mindestens ein Byte — eine
    /// Länge über dem Rest-Input ist nie erfüllbar, also Korruption.
    fn read_len(&mut self) -> Result<usize> {
        let len = varint::read_u64(&mut self.input)?;
        if let Some(max) = self.max_length
            && len > max
        {
            return Err(Error::LengthLimitExceeded { length: len, max });
        }
        if len > self.input.remaining() as u64 {
            return Err(Error::BufferUnderflow);
        }
        Ok(len as usize)
    }

    fn read_ref_head(&mut self) -> Result<RefHead> {
        match self.input.read_u8()? {
            wire::MARKER_NULL => Ok(RefHead::Null),
            wire::MARKER_FIRST => Ok(RefHead::First(varint::read_u64(&mut self.input)?)),
            wire::MARKER_BACKREF => {
                let id = varint::read_u64(&mut self.input)?;
                Ok(RefHead::Resolved(self.refs.resolve(id)?))
            }
            other => Err(Error::invalid(format!(
                "invalid reference marker byte 0x{other:02X}"
            ))),
        }
    }

    fn read_presence(&mut self, member: &MemberDescriptor) -> Result<bool> {
        if !member.is_nullable() {
            return Ok(true);
        }
        match self.input.read_u8()? {
            wire::PRESENT_NULL => Ok(false),
            wire::PRESENT_VALUE => Ok(true),
            other => Err(Error::invalid(format!("invalid presence byte 0x{other:02X}"))),
        }
    }

    fn null_member(&self, member: &MemberDescriptor) -> Result<(Value, Step)> {
        if !member.is_nullable() {
            return Err(Error::invalid(format!(
                "null in non-nullable member of kind {:?}",
                member.kind()
            )));
        }
        Ok((Value::Null, Step::Done))
    }

    fn read_type_name(&mut self) -> Result<Rc<str>> {
        let code = varint::read_u64(&mut self.input)?;
        if code == 0 {
            let len = self.read_len()?;
            let bytes = self.input.read_raw(len)?;
            let name: Rc<str> = std::str::from_utf8(bytes)
                .map_err(|_| Error::invalid("type name is not valid UTF-8"))?
                .into();
            self.names.add(Rc::clone(&name));
            Ok(name)
        } else {
            self.names.get(code - 1)
        }
    }
}

fn null_in_tagged_position() -> Error {
    Error::invalid("null reference marker in tagged position")
}

/// Back-Referenzen prüfen: der aufgelöste Wert muss zur erwarteten Art passen.
fn expect_resolved_kind(value: Value, expected: &'static str) -> Result<Value> {
    if value.kind_name() == expected {
        Ok(value)
    } else {
        Err(Error::invalid(format!(
            "back-reference resolves to {} where {expected} was expected",
            value.kind_name()
        )))
    }
}
