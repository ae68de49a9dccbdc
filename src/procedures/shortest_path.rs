//! `algo.shortestPath(src, dest)` / `algo.singleSourceShortestPath(src)` —
//! BFS-based hop-count shortest paths, the procedure-level counterpart to
//! `ShortestPathTraverse` (SPEC_FULL.md §4.2.2, §4.7). Takes node ids
//! directly rather than aliases since a standalone `CALL` has no upstream
//! pattern binding to read them from.

use std::collections::{HashMap, VecDeque};

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

fn bfs_parents(graph: &GraphContext, src: NodeId) -> HashMap<NodeId, NodeId> {
    let adjacency = graph.adjacency_matrix();
    let mut parents = HashMap::new();
    let mut queue = VecDeque::new();
    queue.push_back(src);
    while let Some(node) = queue.pop_front() {
        if let Some(row) = adjacency.row(node.0) {
            for next in row.iter() {
                let next_id = NodeId(next);
                if next_id != src && !parents.contains_key(&next_id) {
                    parents.insert(next_id, node);
                    queue.push_back(next_id);
                }
            }
        }
    }
    parents
}

fn reconstruct(parents: &HashMap<NodeId, NodeId>, src: NodeId, dest: NodeId) -> Option<Vec<NodeId>> {
    if src == dest {
        return Some(vec![src]);
    }
    let mut path = vec![dest];
    let mut cur = dest;
    while cur != src {
        cur = *parents.get(&cur)?;
        path.push(cur);
    }
    path.reverse();
    Some(path)
}

#[derive(Default)]
pub struct ShortestPath {
    path: Option<Vec<NodeId>>,
    emitted: bool,
}

impl Procedure for ShortestPath {
    fn invoke(&mut self, graph: &GraphContext, args: &[Value]) -> Result<(), EngineError> {
        let src = node_id_arg(args, 0)?;
        let dest = node_id_arg(args, 1)?;
        let parents = bfs_parents(graph, src);
        self.path = reconstruct(&parents, src, dest);
        self.emitted = false;
        Ok(())
    }

    fn step(&mut self) -> Option<Vec<Value>> {
        if self.emitted {
            return None;
        }
        self.emitted = true;
        let path = self.path.as_ref()?;
        Some(vec![
            Value::List(path.iter().map(|n| Value::Integer(n.0 as i64)).collect()),
            Value::Integer((path.len().saturating_sub(1)) as i64),
        ])
    }

    fn columns(&self) -> &[&'static str] {
        &["path", "length"]
    }
}

#[derive(Default)]
pub struct SingleSourceShortestPath {
    rows: Vec<(NodeId, Vec<NodeId>)>,
    pos: usize,
}

impl Procedure for SingleSourceShortestPath {
    fn invoke(&mut self, graph: &GraphContext, args: &[Value]) -> Result<(), EngineError> {
        let src = node_id_arg(args, 0)?;
        let parents = bfs_parents(graph, src);
        let mut rows: Vec<(NodeId, Vec<NodeId>)> = parents
            .keys()
            .filter_map(|&dest| reconstruct(&parents, src, dest).map(|p| (dest, p)))
            .collect();
        rows.push((src, vec![src]));
        rows.sort_by_key(|(dest, _)| dest.0);
        self.rows = rows;
        self.pos = 0;
        Ok(())
    }

    fn step(&mut self) -> Option<Vec<Value>> {
        let (dest, path) = self.rows.get(self.pos)?.clone();
        self.pos += 1;
        Some(vec![
            Value::Integer(dest.0 as i64),
            Value::List(path.iter().map(|n| Value::Integer(n.0 as i64)).collect()),
        ])
    }

    fn columns(&self) -> &[&'static str] {
        &["destination", "path"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_graph() -> (GraphContext, NodeId, NodeId, NodeId) {
        let graph = GraphContext::new("g");
        let label = graph.get_or_create_label("N");
        let a = graph.add_node(&[label], Default::default());
        let b = graph.add_node(&[label], Default::default());
        let c = graph.add_node(&[label], Default::default());
        let rel = graph.get_or_create_rel_type("NEXT");
        graph.create_edge(rel, a, b, Default::default());
        graph.create_edge(rel, b, c, Default::default());
        (graph, a, b, c)
    }

    #[test]
    fn finds_shortest_two_hop_path() {
        let (graph, a, _b, c) = line_graph();
        let mut proc = ShortestPath::default();
        proc.invoke(&graph, &[Value::Integer(a.0 as i64), Value::Integer(c.0 as i64)]).unwrap();
        let row = proc.step().unwrap();
        assert_eq!(row[1], Value::Integer(2));
    }

    #[test]
    fn single_source_reaches_every_node() {
        let (graph, a, _b, _c) = line_graph();
        let mut proc = SingleSourceShortestPath::default();
        proc.invoke(&graph, &[Value::Integer(a.0 as i64)]).unwrap();
        let mut count = 0;
        while proc.step().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }
}
