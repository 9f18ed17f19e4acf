//! Gemeinsame Helfer für die Integrationstests.
#![allow(dead_code)] // nicht jede Test-Binary nutzt jeden Helfer

use std::collections::HashSet;
use std::rc::Rc;

use ryko::{MemberDescriptor, MemberKind, TypeDescriptor, TypeRegistry, Value};

/// Registry mit einem verketteten `Node`-Typ (id + optionaler Nachfolger).
pub fn node_types() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types.register(TypeDescriptor::new("Node", vec![
        MemberDescriptor::new("id", MemberKind::i64_positive()),
        MemberDescriptor::new("next", MemberKind::object("Node")).nullable(),
    ]));
    types
}

/// Baut eine Kette aus `n` einfeldrigen Objekten, Kopf zuerst.
pub fn build_chain(n: usize) -> Value {
    let mut next = Value::Null;
    for id in (1..=n).rev() {
        next = Value::object("Node", [
            ("id", Value::I64(id as i64)),
            ("next", next),
        ]);
    }
    next
}

/// Läuft eine `Node`-Kette ab und liefert ihre Länge.
pub fn chain_len(head: &Value) -> usize {
    let mut len = 0;
    let mut cursor = head.clone();
    while let Value::Object(rc) = cursor {
        len += 1;
        let next = rc.borrow().get("next").cloned().unwrap_or(Value::Null);
        cursor = next;
    }
    len
}

/// Löst alle Kanten eines Graphen iterativ auf.
///
/// Das rekursive Drop einer zehntausende Ebenen tiefen `Rc`-Kette würde den
/// nativen Stack sprengen — genau das Problem, das die Engine selbst per
/// Continuation-Stack vermeidet. Nach dem Entkoppeln sind alle Drops flach.
pub fn dismantle(root: &Value) {
    let mut seen: HashSet<usize> = HashSet::new();
    let mut work = vec![root.clone()];
    let mut containers = Vec::new();

    while let Some(value) = work.pop() {
        match &value {
            Value::Array(rc) | Value::List(rc) => {
                if seen.insert(Rc::as_ptr(rc) as usize) {
                    work.extend(rc.borrow().iter().cloned());
                    containers.push(value.clone());
                }
            }
            Value::Map(rc) => {
                if seen.insert(Rc::as_ptr(rc) as usize) {
                    for (key, val) in rc.borrow().iter() {
                        work.push(key.clone());
                        work.push(val.clone());
                    }
                    containers.push(value.clone());
                }
            }
            Value::Object(rc) => {
                if seen.insert(Rc::as_ptr(rc) as usize) {
                    work.extend(rc.borrow().members().map(|(_, v)| v.clone()));
                    containers.push(value.clone());
                }
            }
            _ => {}
        }
    }

    for value in &containers {
        match value {
            Value::Array(rc) | Value::List(rc) => rc.borrow_mut().clear(),
            Value::Map(rc) => rc.borrow_mut().clear(),
            Value::Object(rc) => rc.borrow_mut().clear(),
            _ => {}
        }
    }
}
