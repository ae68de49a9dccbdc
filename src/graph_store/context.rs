//! `GraphContext`: the in-memory graph a session executes against.
//!
//! Grounded on `graphcontext.c`'s `GraphContext` (schemas + string mapping +
//! the underlying `Graph`), minus everything tied to the Redis keyspace
//! (refcounting, `GraphContext_Retrieve`/`Release`, replication hand-off).
//! Locking follows SPEC_FULL.md §5: a `parking_lot::RwLock` guards the graph
//! data itself (many concurrent readers, one writer), and a separate
//! `parking_lot::Mutex` serializes the commit/key-space phase so that only
//! one writer at a time can be mid-commit even across multiple graphs.

use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};

use super::entities::{Edge, EdgeId, Node, NodeId};
use super::schema::{AttributeId, LabelId, NameRegistry, RelTypeId};
use crate::matrix::Matrix;
use crate::value::Value;

#[derive(Default)]
struct GraphStorage {
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    label_matrices: Vec<Matrix>,
    relation_matrices: Vec<Matrix>,
    node_count: usize,
    edge_count: usize,
    indices: Vec<IndexSpec>,
}

/// A declared (label, attribute) index. Exploited by the IndexScan operator
/// and listable through `db.indexes` (SPEC_FULL.md §4.7) — there is no actual
/// secondary structure behind it yet, so lookups still scan, but declaring
/// one documents intent and is enough for the procedure-level contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub label: String,
    pub attribute: String,
}

impl GraphStorage {
    fn ensure_label_matrix(&mut self, label: LabelId) {
        let idx = label.0 as usize;
        if idx >= self.label_matrices.len() {
            self.label_matrices.resize_with(idx + 1, || Matrix::new(0, 0));
        }
        let dim = self.nodes.len() as u32;
        self.label_matrices[idx].resize(dim, dim);
    }

    fn ensure_relation_matrix(&mut self, rel_type: RelTypeId) {
        let idx = rel_type.0 as usize;
        if idx >= self.relation_matrices.len() {
            self.relation_matrices.resize_with(idx + 1, || Matrix::new(0, 0));
        }
        let dim = self.nodes.len() as u32;
        self.relation_matrices[idx].resize(dim, dim);
    }

    fn grow_matrices_for_new_node(&mut self) {
        let dim = self.nodes.len() as u32;
        for m in &mut self.label_matrices {
            m.resize(dim, dim);
        }
        for m in &mut self.relation_matrices {
            m.resize(dim, dim);
        }
    }
}

pub struct GraphContext {
    pub name: String,
    storage: RwLock<GraphStorage>,
    commit_lock: Mutex<()>,
    node_schemas: RwLock<NameRegistry<LabelId>>,
    relation_schemas: RwLock<NameRegistry<RelTypeId>>,
    attributes: RwLock<NameRegistry<AttributeId>>,
}

/// Held across a write transaction's commit phase. Dropping it always
/// releases the commit lock, even on an early return or panic unwind — the
/// safety net called for in SPEC_FULL.md §5.
pub struct CommitGuard<'a> {
    _guard: parking_lot::MutexGuard<'a, ()>,
}

impl GraphContext {
    pub fn new(name: impl Into<String>) -> Self {
        GraphContext {
            name: name.into(),
            storage: RwLock::new(GraphStorage::default()),
            commit_lock: Mutex::new(()),
            node_schemas: RwLock::new(NameRegistry::new()),
            relation_schemas: RwLock::new(NameRegistry::new()),
            attributes: RwLock::new(NameRegistry::new()),
        }
    }

    /// Acquires the commit lock for the duration of a write transaction's
    /// apply phase. Only one writer across the whole graph may hold this at
    /// a time; readers are unaffected since they only take `storage`'s
    /// shared lock.
    pub fn begin_commit(&self) -> CommitGuard<'_> {
        CommitGuard { _guard: self.commit_lock.lock() }
    }

    pub fn label_id(&self, name: &str) -> Option<LabelId> {
        self.node_schemas.read().id_of(name)
    }

    pub fn label_name(&self, id: LabelId) -> Option<String> {
        self.node_schemas.read().name_of(id).map(str::to_string)
    }

    pub fn get_or_create_label(&self, name: &str) -> LabelId {
        self.node_schemas.write().get_or_create(name)
    }

    pub fn rel_type_id(&self, name: &str) -> Option<RelTypeId> {
        self.relation_schemas.read().id_of(name)
    }

    pub fn rel_type_name(&self, id: RelTypeId) -> Option<String> {
        self.relation_schemas.read().name_of(id).map(str::to_string)
    }

    pub fn get_or_create_rel_type(&self, name: &str) -> RelTypeId {
        self.relation_schemas.write().get_or_create(name)
    }

    pub fn attribute_id(&self, name: &str) -> Option<AttributeId> {
        self.attributes.read().id_of(name)
    }

    pub fn attribute_name(&self, id: AttributeId) -> Option<String> {
        self.attributes.read().name_of(id).map(str::to_string)
    }

    pub fn get_or_create_attribute(&self, name: &str) -> AttributeId {
        self.attributes.write().get_or_create(name)
    }

    pub fn labels(&self) -> Vec<String> {
        self.node_schemas.read().iter().map(|(_, n)| n.to_string()).collect()
    }

    pub fn rel_types(&self) -> Vec<String> {
        self.relation_schemas.read().iter().map(|(_, n)| n.to_string()).collect()
    }

    pub fn property_keys(&self) -> Vec<String> {
        self.attributes.read().iter().map(|(_, n)| n.to_string()).collect()
    }

    pub fn node_count(&self) -> usize {
        self.storage.read().node_count
    }

    pub fn edge_count(&self) -> usize {
        self.storage.read().edge_count
    }

    pub fn get_node(&self, id: NodeId) -> Option<Node> {
        self.storage.read().nodes.get(id.0 as usize).and_then(|n| n.clone())
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<Edge> {
        self.storage.read().edges.get(id.0 as usize).and_then(|e| e.clone())
    }

    pub fn add_node(&self, labels: &[LabelId], attributes: BTreeMap<AttributeId, Value>) -> NodeId {
        let mut storage = self.storage.write();
        let id = NodeId(storage.nodes.len() as u32);
        let mut node = Node::new(id);
        node.labels = labels.to_vec();
        node.attributes = attributes;
        storage.nodes.push(Some(node));
        storage.node_count += 1;
        storage.grow_matrices_for_new_node();
        for &label in labels {
            storage.ensure_label_matrix(label);
            storage.label_matrices[label.0 as usize].set(id.0, id.0);
        }
        id
    }

    pub fn create_edge(
        &self,
        rel_type: RelTypeId,
        src: NodeId,
        dest: NodeId,
        attributes: BTreeMap<AttributeId, Value>,
    ) -> EdgeId {
        let mut storage = self.storage.write();
        let id = EdgeId(storage.edges.len() as u32);
        let mut edge = Edge::new(id, rel_type, src, dest);
        edge.attributes = attributes;
        storage.edges.push(Some(edge));
        storage.edge_count += 1;
        storage.ensure_relation_matrix(rel_type);
        storage.relation_matrices[rel_type.0 as usize].set(src.0, dest.0);
        id
    }

    pub fn delete_node(&self, id: NodeId) -> Option<Node> {
        let mut storage = self.storage.write();
        let node = storage.nodes.get_mut(id.0 as usize)?.take()?;
        storage.node_count -= 1;
        for &label in &node.labels {
            if let Some(m) = storage.label_matrices.get_mut(label.0 as usize) {
                m.unset(id.0, id.0);
            }
        }
        Some(node)
    }

    pub fn delete_edge(&self, id: EdgeId) -> Option<Edge> {
        let mut storage = self.storage.write();
        let edge = storage.edges.get_mut(id.0 as usize)?.take()?;
        storage.edge_count -= 1;
        if let Some(m) = storage.relation_matrices.get_mut(edge.rel_type.0 as usize) {
            m.unset(edge.src.0, edge.dest.0);
        }
        Some(edge)
    }

    pub fn set_node_attribute(&self, id: NodeId, attr: AttributeId, value: Value) {
        let mut storage = self.storage.write();
        if let Some(Some(node)) = storage.nodes.get_mut(id.0 as usize) {
            if value.is_null() {
                node.attributes.remove(&attr);
            } else {
                node.attributes.insert(attr, value);
            }
        }
    }

    pub fn set_edge_attribute(&self, id: EdgeId, attr: AttributeId, value: Value) {
        let mut storage = self.storage.write();
        if let Some(Some(edge)) = storage.edges.get_mut(id.0 as usize) {
            if value.is_null() {
                edge.attributes.remove(&attr);
            } else {
                edge.attributes.insert(attr, value);
            }
        }
    }

    pub fn add_node_label(&self, id: NodeId, label: LabelId) {
        let mut storage = self.storage.write();
        storage.ensure_label_matrix(label);
        if let Some(Some(node)) = storage.nodes.get_mut(id.0 as usize) {
            if !node.labels.contains(&label) {
                node.labels.push(label);
                storage.label_matrices[label.0 as usize].set(id.0, id.0);
            }
        }
    }

    pub fn remove_node_label(&self, id: NodeId, label: LabelId) {
        let mut storage = self.storage.write();
        if let Some(Some(node)) = storage.nodes.get_mut(id.0 as usize) {
            node.labels.retain(|&l| l != label);
        }
        if let Some(m) = storage.label_matrices.get_mut(label.0 as usize) {
            m.unset(id.0, id.0);
        }
    }

    /// Boolean membership matrix for `label`: `(i, i)` set iff node `i`
    /// carries that label.
    pub fn label_matrix(&self, label: LabelId) -> Matrix {
        let storage = self.storage.read();
        storage.label_matrices.get(label.0 as usize).cloned().unwrap_or_else(|| {
            Matrix::new(storage.nodes.len() as u32, storage.nodes.len() as u32)
        })
    }

    /// Adjacency matrix for `rel_type`: `(src, dest)` set per live edge.
    pub fn relation_matrix(&self, rel_type: RelTypeId) -> Matrix {
        let storage = self.storage.read();
        storage.relation_matrices.get(rel_type.0 as usize).cloned().unwrap_or_else(|| {
            Matrix::new(storage.nodes.len() as u32, storage.nodes.len() as u32)
        })
    }

    /// Union of all relation-type matrices: the generic `()-[]->()` traversal.
    pub fn adjacency_matrix(&self) -> Matrix {
        let storage = self.storage.read();
        let dim = storage.nodes.len() as u32;
        storage
            .relation_matrices
            .iter()
            .fold(Matrix::new(dim, dim), |acc, m| acc.add(m))
    }

    pub fn all_node_ids(&self) -> Vec<NodeId> {
        let storage = self.storage.read();
        storage
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|_| NodeId(i as u32)))
            .collect()
    }

    pub fn create_index(&self, label: &str, attribute: &str) {
        let mut storage = self.storage.write();
        let spec = IndexSpec { label: label.to_string(), attribute: attribute.to_string() };
        if !storage.indices.contains(&spec) {
            storage.indices.push(spec);
        }
    }

    pub fn drop_index(&self, label: &str, attribute: &str) -> bool {
        let mut storage = self.storage.write();
        let before = storage.indices.len();
        storage.indices.retain(|i| !(i.label == label && i.attribute == attribute));
        storage.indices.len() != before
    }

    pub fn list_indices(&self) -> Vec<IndexSpec> {
        self.storage.read().indices.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_node_sets_label_matrix() {
        let ctx = GraphContext::new("g");
        let person = ctx.get_or_create_label("Person");
        let id = ctx.add_node(&[person], BTreeMap::new());
        assert!(ctx.label_matrix(person).get(id.0, id.0));
        assert_eq!(ctx.node_count(), 1);
    }

    #[test]
    fn create_edge_sets_relation_matrix() {
        let ctx = GraphContext::new("g");
        let person = ctx.get_or_create_label("Person");
        let knows = ctx.get_or_create_rel_type("KNOWS");
        let a = ctx.add_node(&[person], BTreeMap::new());
        let b = ctx.add_node(&[person], BTreeMap::new());
        ctx.create_edge(knows, a, b, BTreeMap::new());
        assert!(ctx.relation_matrix(knows).get(a.0, b.0));
    }

    #[test]
    fn delete_node_clears_label_bit() {
        let ctx = GraphContext::new("g");
        let person = ctx.get_or_create_label("Person");
        let id = ctx.add_node(&[person], BTreeMap::new());
        ctx.delete_node(id);
        assert!(!ctx.label_matrix(person).get(id.0, id.0));
        assert_eq!(ctx.node_count(), 0);
    }
}
