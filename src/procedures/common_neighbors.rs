//! `algo.commonNeighbors(a, b)` — Jaccard-style similarity: the neighbor
//! nodes two given nodes share, via a boolean `AND` of their adjacency rows.

use super::Procedure;
use crate::errors::EngineError;
use crate::graph_store::{GraphContext, NodeId};
use crate::value::Value;

fn node_id_arg(args: &[Value], idx: usize) -> Result<NodeId, EngineError> {
    match args.get(idx) {
        Some(Value::Integer(i)) if *i >= 0 => Ok(NodeId(*i as u32)),
        _ => Err(EngineError::procedure(format!("argument {idx} must be a non-negative node id"))),
    }
}

#[derive(Default)]
pub struct CommonNeighbors {
    rows: Vec<NodeId>,
    pos: usize,
}

impl Procedure for CommonNeighbors {
    fn invoke(&mut self, graph: &GraphContext, args: &[Value]) -> Result<(), EngineError> {
        let a = node_id_arg(args, 0)?;
        let b = node_id_arg(args, 1)?;
        let adjacency = graph.adjacency_matrix();
        let a_neighbors = adjacency.row(a.0).cloned().unwrap_or_default();
        let b_neighbors = adjacency.row(b.0).cloned().unwrap_or_default();
        let shared = a_neighbors & b_neighbors;
        self.rows = shared.iter().map(NodeId).collect();
        self.pos = 0;
        Ok(())
    }

    fn step(&mut self) -> Option<Vec<Value>> {
        let node = *self.rows.get(self.pos)?;
        self.pos += 1;
        Some(vec![Value::Integer(node.0 as i64)])
    }

    fn columns(&self) -> &[&'static str] {
        &["neighbor"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_shared_neighbor() {
        let graph = GraphContext::new("g");
        let label = graph.get_or_create_label("N");
        let a = graph.add_node(&[label], Default::default());
        let b = graph.add_node(&[label], Default::default());
        let shared = graph.add_node(&[label], Default::default());
        let rel = graph.get_or_create_rel_type("KNOWS");
        graph.create_edge(rel, a, shared, Default::default());
        graph.create_edge(rel, b, shared, Default::default());

        let mut proc = CommonNeighbors::default();
        proc.invoke(&graph, &[Value::Integer(a.0 as i64), Value::Integer(b.0 as i64)]).unwrap();
        assert_eq!(proc.step(), Some(vec![Value::Integer(shared.0 as i64)]));
        assert_eq!(proc.step(), None);
    }
}
