//! Identifier interning.
//!
//! Every CURIE handed to a glom engine is stored once and referred to by a
//! dense `u32` id, which lets the union-find run over plain vectors.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Interned identifier id (dense, starts at 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct IdentId(u32);

impl IdentId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// String interner: maps CURIEs to compact ids and back.
#[derive(Debug, Default, Clone)]
pub struct IdentifierInterner {
    str_to_id: AHashMap<String, IdentId>,
    id_to_str: Vec<String>,
}

impl IdentifierInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its id and whether it was newly added.
    pub fn intern(&mut self, s: &str) -> (IdentId, bool) {
        if let Some(id) = self.str_to_id.get(s) {
            return (*id, false);
        }
        let id = IdentId(self.id_to_str.len() as u32);
        self.str_to_id.insert(s.to_string(), id);
        self.id_to_str.push(s.to_string());
        (id, true)
    }

    /// Look up an existing id without inserting.
    pub fn id_of(&self, s: &str) -> Option<IdentId> {
        self.str_to_id.get(s).copied()
    }

    pub fn lookup(&self, id: IdentId) -> Option<&str> {
        self.id_to_str.get(id.index()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.id_to_str.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_str.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IdentId, &str)> {
        self.id_to_str
            .iter()
            .enumerate()
            .map(|(i, s)| (IdentId(i as u32), s.as_str()))
    }
}
