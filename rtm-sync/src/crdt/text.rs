//! Character-level collaborative text.
//!
//! A replicated-growable-array variant: every character is an atom with a
//! unique stamp and an origin (the atom it was inserted after). Deletion
//! tombstones the atom. Materialization orders siblings by stamp descending,
//! which places later insertions at the same point first and is the standard
//! RGA resolution for concurrent inserts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::stamp::{LamportClock, Stamp, StateVector};

/// One inserted character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    /// Atom this one was inserted after; `None` means document start.
    pub origin: Option<Stamp>,
    pub ch: char,
}

/// Character CRDT for one text field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextCrdt {
    /// Insert operations, keyed by their stamp.
    atoms: BTreeMap<Stamp, Atom>,
    /// Tombstones: deleted atom id -> stamp of the delete operation. The
    /// delete stamp only drives delta extraction; ties keep the smaller
    /// stamp so merges stay order-independent.
    deletes: BTreeMap<Stamp, Stamp>,
}

impl TextCrdt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atoms(&self) -> &BTreeMap<Stamp, Atom> {
        &self.atoms
    }

    pub fn deletes(&self) -> &BTreeMap<Stamp, Stamp> {
        &self.deletes
    }

    /// Atom ids in document order (tombstones included).
    fn ordered_ids(&self) -> Vec<Stamp> {
        let mut children: BTreeMap<Option<Stamp>, Vec<Stamp>> = BTreeMap::new();
        for (id, atom) in &self.atoms {
            children.entry(atom.origin).or_default().push(*id);
        }

        let mut order = Vec::with_capacity(self.atoms.len());
        // Stack-based preorder; sibling lists are ascending, so popping
        // yields the largest (newest) sibling first.
        let mut stack: Vec<Stamp> = children.get(&None).cloned().unwrap_or_default();
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(kids) = children.get(&Some(id)) {
                stack.extend(kids.iter().copied());
            }
        }
        order
    }

    /// Visible atom ids in document order.
    fn visible_ids(&self) -> Vec<Stamp> {
        self.ordered_ids()
            .into_iter()
            .filter(|id| !self.deletes.contains_key(id))
            .collect()
    }

    /// Current text.
    pub fn text(&self) -> String {
        self.visible_ids()
            .iter()
            .map(|id| self.atoms[id].ch)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.visible_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `text` before visible position `pos` (clamped to the end).
    pub fn insert(
        &mut self,
        pos: usize,
        text: &str,
        clock: &mut LamportClock,
        vector: &mut StateVector,
    ) {
        let visible = self.visible_ids();
        let pos = pos.min(visible.len());
        let mut origin = if pos == 0 {
            None
        } else {
            Some(visible[pos - 1])
        };

        for ch in text.chars() {
            let id = clock.tick();
            vector.observe(id);
            self.atoms.insert(id, Atom { origin, ch });
            origin = Some(id);
        }
    }

    /// Tombstone `len` visible characters starting at `pos`.
    pub fn delete(
        &mut self,
        pos: usize,
        len: usize,
        clock: &mut LamportClock,
        vector: &mut StateVector,
    ) {
        let visible = self.visible_ids();
        for id in visible.iter().skip(pos).take(len) {
            let stamp = clock.tick();
            vector.observe(stamp);
            self.deletes.insert(*id, stamp);
        }
    }

    /// Replace the whole text, editing only the differing middle so
    /// unchanged characters keep their identity (and concurrent edits to
    /// them still merge).
    pub fn set_text(&mut self, new: &str, clock: &mut LamportClock, vector: &mut StateVector) {
        let old: Vec<char> = self.text().chars().collect();
        let new_chars: Vec<char> = new.chars().collect();

        let mut prefix = 0;
        while prefix < old.len()
            && prefix < new_chars.len()
            && old[prefix] == new_chars[prefix]
        {
            prefix += 1;
        }
        let mut suffix = 0;
        while suffix < old.len() - prefix
            && suffix < new_chars.len() - prefix
            && old[old.len() - 1 - suffix] == new_chars[new_chars.len() - 1 - suffix]
        {
            suffix += 1;
        }

        let remove = old.len() - prefix - suffix;
        if remove > 0 {
            self.delete(prefix, remove, clock, vector);
        }
        let insert: String = new_chars[prefix..new_chars.len() - suffix].iter().collect();
        if !insert.is_empty() {
            self.insert(prefix, &insert, clock, vector);
        }
    }

    /// Union with another replica's state. Commutative, associative,
    /// idempotent.
    pub fn merge(&mut self, other: &TextCrdt) {
        for (id, atom) in &other.atoms {
            self.atoms.entry(*id).or_insert(*atom);
        }
        for (target, stamp) in &other.deletes {
            self.merge_delete(*target, *stamp);
        }
    }

    /// Insert one remote atom.
    pub fn merge_atom(&mut self, id: Stamp, atom: Atom) {
        self.atoms.entry(id).or_insert(atom);
    }

    /// Insert one remote tombstone, keeping the smaller delete stamp on
    /// conflict.
    pub fn merge_delete(&mut self, target: Stamp, stamp: Stamp) {
        self.deletes
            .entry(target)
            .and_modify(|existing| {
                if stamp < *existing {
                    *existing = stamp;
                }
            })
            .or_insert(stamp);
    }
}
