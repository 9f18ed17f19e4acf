//! Dynamic value graph: the unit of serialization.
//!
//! Container-Werte (`Array`, `List`, `Map`, `Object`) sind `Rc<RefCell<_>>`
//! — geteilte, intern mutierbare Knoten. Dadurch kann derselbe Knoten von
//! mehreren Stellen referenziert werden und Zyklen sind direkt darstellbar.
//! Identität (für die Referenztabelle) ist die `Rc`-Allokationsadresse,
//! niemals strukturelle Gleichheit.
//!
//! `Rc` ist bewusst nicht `Send`: ein Graph gehört genau einem Thread, das
//! erzwingt der Compiler.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::{FastHashMap, FastHashSet};

/// A structured object: a type name plus a member map.
///
/// Welche Member auf den Stream gehen und in welcher Reihenfolge bestimmt
/// allein der registrierte [`TypeDescriptor`](crate::TypeDescriptor) —
/// Member ohne Deklaration werden ignoriert, deklarierte aber fehlende
/// Member werden als Null behandelt.
#[derive(Clone)]
pub struct Object {
    type_name: Rc<str>,
    members: FastHashMap<Rc<str>, Value>,
}

impl Object {
    /// Creates an empty object of the given type.
    pub fn new(type_name: impl Into<Rc<str>>) -> Self {
        Self {
            type_name: type_name.into(),
            members: FastHashMap::default(),
        }
    }

    /// Returns the object's type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn type_name_rc(&self) -> Rc<str> {
        Rc::clone(&self.type_name)
    }

    /// Looks up a member value.
    pub fn get(&self, member: &str) -> Option<&Value> {
        self.members.get(member)
    }

    /// Sets a member value, replacing any previous one.
    pub fn set(&mut self, member: impl Into<Rc<str>>, value: Value) {
        self.members.insert(member.into(), value);
    }

    /// Number of members currently present.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if no members are present.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterates over all present members in unspecified order.
    pub fn members(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.members.iter().map(|(k, v)| (k.as_ref(), v))
    }

    /// Removes all members. Löst Kanten im Graphen — nützlich, um sehr
    /// tiefe Ketten vor dem Drop iterativ zu entkoppeln (rekursives Drop
    /// einer langen `Rc`-Kette würde sonst den nativen Stack sprengen).
    pub fn clear(&mut self) {
        self.members.clear();
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({}, {} members)", self.type_name, self.members.len())
    }
}

/// One node of a value graph.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Fixed element count on the wire; decoded slot by slot.
    Array(Rc<RefCell<Vec<Value>>>),
    /// Growable collection; decoded by appending in stream order.
    List(Rc<RefCell<Vec<Value>>>),
    /// Ordered entry list. Keys tragen keine `Eq`/`Hash`-Pflicht; die
    /// Einfüge-Reihenfolge entspricht exakt der Stream-Reihenfolge.
    Map(Rc<RefCell<Vec<(Value, Value)>>>),
    Object(Rc<RefCell<Object>>),
}

impl Value {
    /// Wraps element values as an `Array`.
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    /// Wraps element values as a `List`.
    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    /// Wraps entry pairs as a `Map`.
    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        Self::Map(Rc::new(RefCell::new(entries)))
    }

    /// Builds an `Object` value from a type name and member pairs.
    pub fn object<K>(type_name: impl Into<Rc<str>>, members: impl IntoIterator<Item = (K, Value)>) -> Self
    where
        K: Into<Rc<str>>,
    {
        let mut object = Object::new(type_name);
        for (name, value) in members {
            object.set(name, value);
        }
        Self::Object(Rc::new(RefCell::new(object)))
    }

    /// Builds a `Str` value.
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// True for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convenience accessor for tests and callers walking decoded graphs.
    pub fn as_object(&self) -> Option<&Rc<RefCell<Object>>> {
        match self {
            Self::Object(rc) => Some(rc),
            _ => None,
        }
    }

    /// Accessor for `Array` and `List` containers.
    pub fn as_elements(&self) -> Option<&Rc<RefCell<Vec<Value>>>> {
        match self {
            Self::Array(rc) | Self::List(rc) => Some(rc),
            _ => None,
        }
    }

    /// Accessor for `Map` containers.
    pub fn as_map(&self) -> Option<&Rc<RefCell<Vec<(Value, Value)>>>> {
        match self {
            Self::Map(rc) => Some(rc),
            _ => None,
        }
    }

    /// Kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::Array(_) => "array",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
        }
    }

    /// Identity token for reference tracking: the `Rc` allocation address.
    /// `None` für Skalare — die werden nie referenzverfolgt.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Self::Array(rc) | Self::List(rc) => Some(Rc::as_ptr(rc) as usize),
            Self::Map(rc) => Some(Rc::as_ptr(rc) as usize),
            Self::Object(rc) => Some(Rc::as_ptr(rc) as usize),
            _ => None,
        }
    }
}

// Flaches Debug: Container zeigen nur Art und Länge. Ein rekursives Debug
// würde auf zyklischen Graphen endlos laufen.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(v) => write!(f, "Bool({v})"),
            Self::I32(v) => write!(f, "I32({v})"),
            Self::I64(v) => write!(f, "I64({v})"),
            Self::F32(v) => write!(f, "F32({v})"),
            Self::F64(v) => write!(f, "F64({v})"),
            Self::Str(v) => write!(f, "Str({v:?})"),
            Self::Bytes(v) => write!(f, "Bytes({} bytes)", v.len()),
            Self::Array(rc) => write!(f, "Array(len={})", rc.borrow().len()),
            Self::List(rc) => write!(f, "List(len={})", rc.borrow().len()),
            Self::Map(rc) => write!(f, "Map(len={})", rc.borrow().len()),
            Self::Object(rc) => write!(f, "{:?}", rc.borrow()),
        }
    }
}

/// Cycle-aware structural equivalence of two value graphs.
///
/// Skalare vergleichen nach Wert (Floats bit-exakt, NaN == NaN), Container
/// strukturell. Bereits besuchte Knotenpaare gelten als gleich — damit
/// terminiert der Vergleich auch auf zyklischen Graphen (Bisimulation).
/// Läuft über eine explizite Worklist, nie über native Rekursion.
pub fn graph_eq(a: &Value, b: &Value) -> bool {
    let mut seen: FastHashSet<(usize, usize)> = FastHashSet::default();
    let mut work: Vec<(Value, Value)> = vec![(a.clone(), b.clone())];

    while let Some((a, b)) = work.pop() {
        match (&a, &b) {
            (Value::Null, Value::Null) => {}
            (Value::Bool(x), Value::Bool(y)) if x == y => {}
            (Value::I32(x), Value::I32(y)) if x == y => {}
            (Value::I64(x), Value::I64(y)) if x == y => {}
            (Value::F32(x), Value::F32(y)) if x.to_bits() == y.to_bits() => {}
            (Value::F64(x), Value::F64(y)) if x.to_bits() == y.to_bits() => {}
            (Value::Str(x), Value::Str(y)) if x == y => {}
            (Value::Bytes(x), Value::Bytes(y)) if x == y => {}
            (Value::Array(x), Value::Array(y)) | (Value::List(x), Value::List(y)) => {
                if !seen.insert((Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize)) {
                    continue;
                }
                let (bx, by) = (x.borrow(), y.borrow());
                if bx.len() != by.len() {
                    return false;
                }
                for (cx, cy) in bx.iter().zip(by.iter()) {
                    work.push((cx.clone(), cy.clone()));
                }
            }
            (Value::Map(x), Value::Map(y)) => {
                if !seen.insert((Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize)) {
                    continue;
                }
                let (bx, by) = (x.borrow(), y.borrow());
                if bx.len() != by.len() {
                    return false;
                }
                for ((kx, vx), (ky, vy)) in bx.iter().zip(by.iter()) {
                    work.push((kx.clone(), ky.clone()));
                    work.push((vx.clone(), vy.clone()));
                }
            }
            (Value::Object(x), Value::Object(y)) => {
                if !seen.insert((Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize)) {
                    continue;
                }
                let (bx, by) = (x.borrow(), y.borrow());
                if bx.type_name != by.type_name || bx.len() != by.len() {
                    return false;
                }
                for (name, vx) in bx.members() {
                    match by.get(name) {
                        Some(vy) => work.push((vx.clone(), vy.clone())),
                        None => return false,
                    }
                }
            }
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_compare_by_value() {
        assert!(graph_eq(&Value::I64(7), &Value::I64(7)));
        assert!(!graph_eq(&Value::I64(7), &Value::I64(8)));
        assert!(!graph_eq(&Value::I64(7), &Value::I32(7)));
        assert!(graph_eq(&Value::Null, &Value::Null));
    }

    #[test]
    fn floats_compare_bitwise() {
        assert!(graph_eq(&Value::F64(f64::NAN), &Value::F64(f64::NAN)));
        assert!(!graph_eq(&Value::F64(0.0), &Value::F64(-0.0)));
    }

    #[test]
    fn lists_compare_structurally() {
        let a = Value::list(vec![Value::I32(1), Value::str("x")]);
        let b = Value::list(vec![Value::I32(1), Value::str("x")]);
        assert!(graph_eq(&a, &b));

        let c = Value::list(vec![Value::I32(1)]);
        assert!(!graph_eq(&a, &c));
    }

    #[test]
    fn array_and_list_are_distinct_kinds() {
        let a = Value::array(vec![Value::I32(1)]);
        let l = Value::list(vec![Value::I32(1)]);
        assert!(!graph_eq(&a, &l));
    }

    #[test]
    fn maps_compare_in_order() {
        let a = Value::map(vec![(Value::str("k"), Value::I32(1))]);
        let b = Value::map(vec![(Value::str("k"), Value::I32(1))]);
        assert!(graph_eq(&a, &b));

        // Gleiche Einträge, andere Reihenfolge → ungleich (Reihenfolge ist Teil des Werts)
        let c = Value::map(vec![
            (Value::str("a"), Value::I32(1)),
            (Value::str("b"), Value::I32(2)),
        ]);
        let d = Value::map(vec![
            (Value::str("b"), Value::I32(2)),
            (Value::str("a"), Value::I32(1)),
        ]);
        assert!(!graph_eq(&c, &d));
    }

    #[test]
    fn objects_compare_by_type_and_members() {
        let a = Value::object("Point", [("x", Value::I64(1)), ("y", Value::I64(2))]);
        let b = Value::object("Point", [("y", Value::I64(2)), ("x", Value::I64(1))]);
        assert!(graph_eq(&a, &b));

        let c = Value::object("Punkt", [("x", Value::I64(1)), ("y", Value::I64(2))]);
        assert!(!graph_eq(&a, &c));

        let d = Value::object("Point", [("x", Value::I64(1))]);
        assert!(!graph_eq(&a, &d));
    }

    #[test]
    fn self_referential_graphs_terminate() {
        let a = Value::list(vec![]);
        a.as_elements().unwrap().borrow_mut().push(a.clone());
        let b = Value::list(vec![]);
        b.as_elements().unwrap().borrow_mut().push(b.clone());
        assert!(graph_eq(&a, &b));

        // Entkoppeln, sonst hält der Zyklus die Allokation am Leben
        a.as_elements().unwrap().borrow_mut().clear();
        b.as_elements().unwrap().borrow_mut().clear();
    }

    #[test]
    fn identity_only_for_containers() {
        assert!(Value::I64(1).identity().is_none());
        assert!(Value::str("x").identity().is_none());
        assert!(Value::list(vec![]).identity().is_some());
        assert!(Value::object("T", [] as [(&str, Value); 0]).identity().is_some());
    }

    #[test]
    fn shared_rc_has_same_identity() {
        let shared = Value::list(vec![]);
        let alias = shared.clone();
        assert_eq!(shared.identity(), alias.identity());

        let other = Value::list(vec![]);
        assert_ne!(shared.identity(), other.identity());
    }

    #[test]
    fn object_member_access() {
        let mut o = Object::new("Node");
        assert!(o.is_empty());
        o.set("next", Value::Null);
        assert_eq!(o.len(), 1);
        assert!(o.get("next").unwrap().is_null());
        assert!(o.get("prev").is_none());
        o.clear();
        assert!(o.is_empty());
    }

    #[test]
    fn debug_output_is_shallow() {
        let l = Value::list(vec![Value::I32(1), Value::I32(2)]);
        assert_eq!(format!("{l:?}"), "List(len=2)");

        // Debug auf zyklischem Wert darf nicht endlos rekursieren
        l.as_elements().unwrap().borrow_mut().push(l.clone());
        assert_eq!(format!("{l:?}"), "List(len=3)");
        l.as_elements().unwrap().borrow_mut().clear();
    }
}
