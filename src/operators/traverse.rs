//! Traversal operators: expand from an already-bound source node along an
//! algebraic expression over the per-relation-type adjacency matrices
//! (SPEC_FULL.md §4.2.2). `ConditionalTraverse` batches source rows before
//! materializing the combined frontier matrix, mirroring
//! `op_conditional_traverse.c`'s `record_cap`/`BATCH_SIZE` batching so a
//! single-row pull doesn't force a full matrix multiply per record.

use std::collections::VecDeque;

use super::*;
use crate::matrix::Matrix;

fn rel_matrix_for(ctx: &ExecCtx, rel_types: &[String], direction: Direction) -> Matrix {
    let dim = ctx.graph.node_count().max(1) as u32;
    let combined = if rel_types.is_empty() {
        ctx.graph.adjacency_matrix()
    } else {
        rel_types
            .iter()
            .filter_map(|name| ctx.graph.rel_type_id(name))
            .fold(Matrix::new(dim, dim), |acc, id| acc.add(&ctx.graph.relation_matrix(id)))
    };
    match direction {
        Direction::Outgoing => combined,
        Direction::Incoming => combined.transpose(),
        Direction::Either => {
            let t = combined.transpose();
            combined.add(&t)
        }
    }
}

fn find_edge(ctx: &ExecCtx, rel_types: &[String], direction: Direction, a: NodeId, b: NodeId) -> Option<EdgeId> {
    let (src, dest) = match direction {
        Direction::Outgoing => (a, b),
        Direction::Incoming => (b, a),
        Direction::Either => (a, b),
    };
    for id in 0..ctx.graph.edge_count() as u32 {
        if let Some(edge) = ctx.graph.get_edge(EdgeId(id)) {
            let type_ok = rel_types.is_empty()
                || rel_types.iter().any(|n| ctx.graph.rel_type_id(n) == Some(edge.rel_type));
            if !type_ok {
                continue;
            }
            if direction == Direction::Either {
                if (edge.src == a && edge.dest == b) || (edge.src == b && edge.dest == a) {
                    return Some(edge.id);
                }
            } else if edge.src == src && edge.dest == dest {
                return Some(edge.id);
            }
        }
    }
    None
}

pub fn consume(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    debug_assert_eq!(op.children.len(), 1);
    match &mut op.kind {
        OperatorKind::ConditionalTraverse(s) => conditional_traverse(s, &mut op.children[0], ctx),
        OperatorKind::ConditionalVarLenTraverse(s) => conditional_var_len(s, &mut op.children[0], ctx),
        OperatorKind::ExpandInto(s) => expand_into(s, &mut op.children[0], ctx),
        OperatorKind::ShortestPathTraverse(s) => shortest_path(s, &mut op.children[0], ctx),
        _ => unreachable!("traverse::consume called with a non-traversal operator"),
    }
}

fn conditional_traverse(
    s: &mut ConditionalTraverseState,
    child: &mut Operator,
    ctx: &ExecCtx,
) -> Result<Option<Record>, EngineError> {
    loop {
        if s.frontier_pos < s.frontier.len() {
            let (src_row_idx, dest) = s.frontier[s.frontier_pos];
            s.frontier_pos += 1;
            let src_rec = &s.batch[src_row_idx as usize];
            let mut rec = src_rec.clone();
            rec.set_node(&s.dest_alias, dest);
            if let Some(edge_alias) = &s.edge_alias {
                let src_id = src_rec.get(&s.src_alias).and_then(|e| e.as_node());
                if let Some(src_id) = src_id {
                    if let Some(edge_id) = find_edge(ctx, &s.rel_types, s.direction, src_id, dest) {
                        rec.set_edge(edge_alias, edge_id);
                    }
                }
            }
            return Ok(Some(rec));
        }

        // Refill the batch from upstream and recompute the frontier.
        s.batch.clear();
        while s.batch.len() < TRAVERSE_BATCH_SIZE {
            match child.consume(ctx)? {
                Some(rec) => s.batch.push(rec),
                None => break,
            }
        }
        if s.batch.is_empty() {
            return Ok(None);
        }

        let matrix = rel_matrix_for(ctx, &s.rel_types, s.direction);
        s.frontier.clear();
        s.frontier_pos = 0;
        for (row_idx, rec) in s.batch.iter().enumerate() {
            if let Some(src_id) = rec.get(&s.src_alias).and_then(|e| e.as_node()) {
                if let Some(row) = matrix.row(src_id.0) {
                    for dest in row.iter() {
                        s.frontier.push((row_idx as u32, NodeId(dest)));
                    }
                }
            }
        }
    }
}

fn conditional_var_len(
    s: &mut ConditionalVarLenState,
    child: &mut Operator,
    ctx: &ExecCtx,
) -> Result<Option<Record>, EngineError> {
    loop {
        if s.pos < s.results.len() {
            let (dest, path) = s.results[s.pos].clone();
            s.pos += 1;
            if let Some(mut rec) = s.current_source.clone() {
                rec.set_node(&s.dest_alias, dest);
                if let Some(path_alias) = &s.edge_alias {
                    rec.set_scalar(path_alias, Value::Path { nodes: path.clone(), edges: Vec::new() });
                }
                return Ok(Some(rec));
            }
            continue;
        }

        let Some(src_rec) = child.consume(ctx)? else {
            return Ok(None);
        };
        let Some(src_id) = src_rec.get(&s.src_alias).and_then(|e| e.as_node()) else {
            continue;
        };
        s.results = bfs_reachable(ctx, &s.rel_types, s.direction, src_id, s.min_hops, s.max_hops);
        s.pos = 0;
        s.current_source = Some(src_rec);
    }
}

/// BFS frontier expansion up to `max_hops` (or unbounded if `None`, capped by
/// the graph's node count so a cyclic graph can't loop forever). Returns
/// `(reached_node, node_path)` pairs with `min_hops..=max_hops` length.
fn bfs_reachable(
    ctx: &ExecCtx,
    rel_types: &[String],
    direction: Direction,
    start: NodeId,
    min_hops: u32,
    max_hops: Option<u32>,
) -> Vec<(NodeId, Vec<NodeId>)> {
    let matrix = rel_matrix_for(ctx, rel_types, direction);
    let hop_cap = max_hops.unwrap_or_else(|| ctx.graph.node_count().max(1) as u32);
    let mut out = Vec::new();
    let mut queue: VecDeque<(NodeId, Vec<NodeId>)> = VecDeque::new();
    queue.push_back((start, vec![start]));
    let mut visited_at_depth: std::collections::HashMap<NodeId, u32> = std::collections::HashMap::new();
    visited_at_depth.insert(start, 0);

    while let Some((node, path)) = queue.pop_front() {
        let depth = (path.len() - 1) as u32;
        if depth >= hop_cap {
            continue;
        }
        if let Some(row) = matrix.row(node.0) {
            for next in row.iter() {
                let next_id = NodeId(next);
                let next_depth = depth + 1;
                if visited_at_depth.get(&next_id).map(|&d| d <= next_depth).unwrap_or(false) {
                    continue;
                }
                visited_at_depth.insert(next_id, next_depth);
                let mut next_path = path.clone();
                next_path.push(next_id);
                if next_depth >= min_hops {
                    out.push((next_id, next_path.clone()));
                }
                queue.push_back((next_id, next_path));
            }
        }
    }
    out
}

fn expand_into(
    s: &mut ExpandIntoState,
    child: &mut Operator,
    ctx: &ExecCtx,
) -> Result<Option<Record>, EngineError> {
    loop {
        let Some(rec) = child.consume(ctx)? else {
            return Ok(None);
        };
        let src = rec.get(&s.src_alias).and_then(|e| e.as_node());
        let dest = rec.get(&s.dest_alias).and_then(|e| e.as_node());
        let (Some(src), Some(dest)) = (src, dest) else { continue };
        let matrix = rel_matrix_for(ctx, &s.rel_types, s.direction);
        if matrix.get(src.0, dest.0) {
            let mut rec = rec;
            if let Some(edge_alias) = &s.edge_alias {
                if let Some(edge_id) = find_edge(ctx, &s.rel_types, s.direction, src, dest) {
                    rec.set_edge(edge_alias, edge_id);
                }
            }
            return Ok(Some(rec));
        }
    }
}

fn shortest_path(
    s: &mut ShortestPathState,
    child: &mut Operator,
    ctx: &ExecCtx,
) -> Result<Option<Record>, EngineError> {
    loop {
        if s.pos < s.paths.len() {
            let (nodes, edges) = s.paths[s.pos].clone();
            s.pos += 1;
            if let Some(mut rec) = s.current_source.clone() {
                rec.set_scalar(&s.path_alias, path_value(&nodes, &edges));
                return Ok(Some(rec));
            }
            continue;
        }
        if !s.all_paths && s.emitted {
            return Ok(None);
        }
        let Some(rec) = child.consume(ctx)? else {
            return Ok(None);
        };
        let src = rec.get(&s.src_alias).and_then(|e| e.as_node());
        let dest = rec.get(&s.dest_alias).and_then(|e| e.as_node());
        let (Some(src), Some(dest)) = (src, dest) else { continue };
        s.paths = single_shortest_path(ctx, &s.rel_types, s.direction, src, dest);
        s.pos = 0;
        s.emitted = true;
        s.current_source = Some(rec);
    }
}

fn path_value(nodes: &[NodeId], edges: &[EdgeId]) -> Value {
    Value::Path { nodes: nodes.to_vec(), edges: edges.to_vec() }
}

fn single_shortest_path(
    ctx: &ExecCtx,
    rel_types: &[String],
    direction: Direction,
    src: NodeId,
    dest: NodeId,
) -> Vec<(Vec<NodeId>, Vec<EdgeId>)> {
    let matrix = rel_matrix_for(ctx, rel_types, direction);
    let mut queue = VecDeque::new();
    queue.push_back(vec![src]);
    let mut visited = std::collections::HashSet::new();
    visited.insert(src);
    while let Some(path) = queue.pop_front() {
        let last = *path.last().unwrap();
        if last == dest {
            let edges = path
                .windows(2)
                .filter_map(|w| find_edge(ctx, rel_types, direction, w[0], w[1]))
                .collect();
            return vec![(path, edges)];
        }
        if let Some(row) = matrix.row(last.0) {
            for next in row.iter() {
                let next_id = NodeId(next);
                if visited.insert(next_id) {
                    let mut next_path = path.clone();
                    next_path.push(next_id);
                    queue.push_back(next_path);
                }
            }
        }
    }
    Vec::new()
}
