//! `Record`: the row of bindings that flows between operators (SPEC_FULL.md
//! §3.2). Grounded on the original's `Record` — a fixed-size array of typed
//! entries addressed by an alias-to-slot mapping shared across the whole
//! plan, rather than a growable per-row map.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::graph_store::{EdgeId, NodeId};
use crate::value::Value;

/// Maps alias names to slot indices in every `Record` produced under a given
/// plan segment. Shared (via `Arc`) across all operators in that segment so
/// cloning a record never needs to clone the mapping.
#[derive(Debug, Default)]
pub struct RecordMap {
    slots: BTreeMap<String, usize>,
}

impl RecordMap {
    pub fn new() -> Self {
        RecordMap { slots: BTreeMap::new() }
    }

    /// Returns the existing slot for `alias`, or appends a new one.
    pub fn get_or_add(&mut self, alias: &str) -> usize {
        if let Some(&idx) = self.slots.get(alias) {
            return idx;
        }
        let idx = self.slots.len();
        self.slots.insert(alias.to_string(), idx);
        idx
    }

    pub fn slot_of(&self, alias: &str) -> Option<usize> {
        self.slots.get(alias).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Unset,
    Node(NodeId),
    Edge(EdgeId),
    Scalar(Value),
}

impl Entry {
    pub fn as_value(&self) -> Value {
        match self {
            Entry::Unset => Value::Null,
            Entry::Node(id) => Value::Integer(id.0 as i64),
            Entry::Edge(id) => Value::Integer(id.0 as i64),
            Entry::Scalar(v) => v.clone(),
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Entry::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<EdgeId> {
        match self {
            Entry::Edge(id) => Some(*id),
            _ => None,
        }
    }
}

/// A single row flowing through the operator tree. `entries` is indexed by
/// the owning segment's `RecordMap`; entries past a producing operator's
/// reach stay `Entry::Unset` until bound.
#[derive(Debug, Clone)]
pub struct Record {
    map: Arc<RecordMap>,
    entries: Vec<Entry>,
}

impl Record {
    pub fn new(map: Arc<RecordMap>) -> Self {
        let n = map.len();
        Record { map, entries: vec![Entry::Unset; n] }
    }

    pub fn map(&self) -> &Arc<RecordMap> {
        &self.map
    }

    pub fn get(&self, alias: &str) -> Option<&Entry> {
        self.map.slot_of(alias).and_then(|i| self.entries.get(i))
    }

    pub fn get_value(&self, alias: &str) -> Value {
        self.get(alias).map(Entry::as_value).unwrap_or(Value::Null)
    }

    pub fn set(&mut self, alias: &str, entry: Entry) {
        if let Some(idx) = self.map.slot_of(alias) {
            if idx >= self.entries.len() {
                self.entries.resize(idx + 1, Entry::Unset);
            }
            self.entries[idx] = entry;
        }
    }

    pub fn set_node(&mut self, alias: &str, id: NodeId) {
        self.set(alias, Entry::Node(id));
    }

    pub fn set_edge(&mut self, alias: &str, id: EdgeId) {
        self.set(alias, Entry::Edge(id));
    }

    pub fn set_scalar(&mut self, alias: &str, value: Value) {
        self.set(alias, Entry::Scalar(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let mut map = RecordMap::new();
        map.get_or_add("n");
        let map = Arc::new(map);
        let mut rec = Record::new(map);
        rec.set_node("n", NodeId(3));
        assert_eq!(rec.get("n").unwrap().as_node(), Some(NodeId(3)));
        assert!(rec.get("missing").is_none());
    }
}
