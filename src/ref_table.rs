//! Reference tables: object identity tracking for shared and cyclic graphs.
//!
//! Lebensdauer beider Seiten ist genau ein Top-Level-Aufruf; danach werden
//! sie verworfen. Ids werden lückenlos ab 0 in First-Seen-Reihenfolge
//! vergeben — die Leseseite kann eine First-Occurrence-Id deshalb gegen die
//! erwartete dichte Folge prüfen und Korruption sofort melden.
//!
//! Entscheidend für Zyklen: auf der Leseseite wird ein Objekt-*Shell* im
//! Moment seiner Allokation registriert, strikt bevor irgendein Member
//! decodiert ist. Ein Member, das auf seinen eigenen (noch unfertigen)
//! Container zurückzeigt, löst damit auf dieselbe Instanz auf.

use hashbrown::hash_map::Entry;

use crate::value::Value;
use crate::{Error, FastHashMap, Result};

/// Write side: maps container identity (allocation address) to a dense id.
#[derive(Default)]
pub struct WriteRefTable {
    ids: FastHashMap<usize, u64>,
}

impl WriteRefTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns an identity. Returns the id and whether it was already seen.
    ///
    /// Erster Aufruf für eine Identität vergibt die nächste dichte Id;
    /// jeder weitere liefert dieselbe Id mit `already_seen = true`.
    pub fn intern(&mut self, identity: usize) -> (u64, bool) {
        let next = self.ids.len() as u64;
        match self.ids.entry(identity) {
            Entry::Occupied(entry) => (*entry.get(), true),
            Entry::Vacant(entry) => {
                entry.insert(next);
                (next, false)
            }
        }
    }

    /// Number of interned identities.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if nothing is interned yet.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Read side: slot table from id to (possibly still unpopulated) value.
#[derive(Default)]
pub struct ReadRefTable {
    slots: Vec<Value>,
}

impl ReadRefTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly allocated shell under the given id.
    ///
    /// Muss in dichter Reihenfolge passieren; eine Lücke ist Stream-Korruption.
    pub fn register_shell(&mut self, id: u64, shell: Value) -> Result<()> {
        let expected = self.slots.len() as u64;
        if id != expected {
            return Err(Error::ReferenceIdMismatch { expected, found: id });
        }
        self.slots.push(shell);
        Ok(())
    }

    /// Resolves a back-reference id to the registered value.
    pub fn resolve(&self, id: u64) -> Result<Value> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.slots.get(idx))
            .cloned()
            .ok_or(Error::UnknownReference(id))
    }

    /// Number of registered shells.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no shells are registered yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
