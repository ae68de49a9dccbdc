//! `Node` and `Edge` entity records (SPEC_FULL.md §3.1).

use std::collections::BTreeMap;

use super::schema::{AttributeId, LabelId, RelTypeId};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub u32);

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<LabelId>,
    pub attributes: BTreeMap<AttributeId, Value>,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Node { id, labels: Vec::new(), attributes: BTreeMap::new() }
    }

    pub fn has_label(&self, label: LabelId) -> bool {
        self.labels.contains(&label)
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub rel_type: RelTypeId,
    pub src: NodeId,
    pub dest: NodeId,
    pub attributes: BTreeMap<AttributeId, Value>,
}

impl Edge {
    pub fn new(id: EdgeId, rel_type: RelTypeId, src: NodeId, dest: NodeId) -> Self {
        Edge { id, rel_type, src, dest, attributes: BTreeMap::new() }
    }
}
