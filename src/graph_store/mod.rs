//! Graph storage layer (SPEC_FULL.md §3.1, §6): nodes, edges, the attribute
//! and label/relation-type registries, and the per-graph sparse matrices
//! traversal operators read from.

mod context;
mod entities;
mod registry;
mod schema;

pub use context::{CommitGuard, GraphContext, IndexSpec};
pub use entities::{Edge, EdgeId, Node, NodeId};
pub use registry::GraphRegistry;
pub use schema::{AttributeId, LabelId, NameRegistry, RelTypeId};
