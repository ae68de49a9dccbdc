//! `QueryGraph`: the pattern graph extracted from a clause's `MATCH`
//! patterns, used by the optimizer to decide scan order and traversal
//! direction before any operator tree exists (SPEC_FULL.md §3.4).
//!
//! Grounded on the teacher's `query_planner::analyzer` graph-shaped
//! intermediate representation, generalized from SQL join graphs to Cypher
//! pattern graphs (node/edge/path entities instead of tables/columns).

use crate::cypher_parser::ast::{Direction, NodePattern, Pattern, RelPattern, ShortestPathKind};

#[derive(Debug, Clone)]
pub struct QGNode {
    pub alias: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QGEdge {
    pub alias: Option<String>,
    /// Always set, even for an anonymous relationship (`_anon_edge_P_S`) —
    /// the record slot a traversal operator binds this edge's id (or, for a
    /// variable-length edge, its whole path) into.
    pub internal_alias: String,
    pub rel_types: Vec<String>,
    pub direction: Direction,
    pub src: String,
    pub dest: String,
    pub min_hops: u32,
    pub max_hops: Option<u32>,
}

impl QGEdge {
    pub fn is_variable_length(&self) -> bool {
        self.min_hops != 1 || self.max_hops != Some(1)
    }
}

#[derive(Debug, Clone)]
pub struct QGPath {
    pub alias: String,
    pub node_aliases: Vec<String>,
    pub edge_aliases: Vec<String>,
    /// `Some(all_paths)` if this path is bound by `shortestPath(...)`
    /// (`Some(false)`) or `allShortestPaths(...)` (`Some(true)`), `None` for
    /// an ordinary named path (`p = (a)-[r]->(b)`).
    pub shortest: Option<bool>,
}

/// A query graph: nodes and edges drawn from one or more pattern clauses,
/// plus named shortest paths. May be disconnected — `connected_components`
/// splits it into the independently-solvable sub-graphs the plan builder
/// turns into Cartesian-producted sub-plans.
#[derive(Debug, Clone, Default)]
pub struct QueryGraph {
    pub nodes: Vec<QGNode>,
    pub edges: Vec<QGEdge>,
    pub paths: Vec<QGPath>,
}

impl QueryGraph {
    pub fn new() -> Self {
        QueryGraph::default()
    }

    pub fn from_pattern(pattern: &Pattern) -> Self {
        Self::from_pattern_with_var(pattern, None)
    }

    /// `path_var` names the path bound by `p = (...)`, if the enclosing
    /// `MATCH`/`CREATE` clause assigned one.
    pub fn from_pattern_with_var(pattern: &Pattern, path_var: Option<&str>) -> Self {
        let mut qg = QueryGraph::new();
        for (path_idx, path) in pattern.paths.iter().enumerate() {
            let mut node_aliases = Vec::new();
            let mut edge_aliases = Vec::new();
            let start_alias = qg.add_node(&path.start, path_idx, 0);
            node_aliases.push(start_alias.clone());
            let mut prev_alias = start_alias;
            for (step_idx, (rel, node)) in path.steps.iter().enumerate() {
                let node_alias = qg.add_node(node, path_idx, step_idx + 1);
                let edge_alias = qg.add_edge(rel, &prev_alias, &node_alias, path_idx, step_idx);
                edge_aliases.push(edge_alias);
                node_aliases.push(node_alias.clone());
                prev_alias = node_alias;
            }
            let shortest = match path.shortest_path {
                ShortestPathKind::None => None,
                ShortestPathKind::Single => Some(false),
                ShortestPathKind::All => Some(true),
            };
            if shortest.is_some() || path_var.is_some() {
                let alias = path_var.map(str::to_string).unwrap_or_else(|| format!("_path_{path_idx}"));
                qg.paths.push(QGPath { alias, node_aliases, edge_aliases, shortest });
            }
        }
        qg
    }

    fn add_node(&mut self, pattern: &NodePattern, path_idx: usize, step_idx: usize) -> String {
        let alias = pattern
            .alias
            .clone()
            .unwrap_or_else(|| format!("_anon_node_{path_idx}_{step_idx}"));
        if !self.nodes.iter().any(|n| n.alias == alias) {
            self.nodes.push(QGNode { alias: alias.clone(), labels: pattern.labels.clone() });
        } else if let Some(existing) = self.nodes.iter_mut().find(|n| n.alias == alias) {
            for label in &pattern.labels {
                if !existing.labels.contains(label) {
                    existing.labels.push(label.clone());
                }
            }
        }
        alias
    }

    fn add_edge(&mut self, pattern: &RelPattern, src: &str, dest: &str, path_idx: usize, step_idx: usize) -> String {
        let alias = pattern
            .alias
            .clone()
            .unwrap_or_else(|| format!("_anon_edge_{path_idx}_{step_idx}"));
        self.edges.push(QGEdge {
            alias: pattern.alias.clone(),
            internal_alias: alias.clone(),
            rel_types: pattern.rel_types.clone(),
            direction: pattern.direction,
            src: src.to_string(),
            dest: dest.to_string(),
            min_hops: pattern.min_hops.unwrap_or(1),
            max_hops: pattern.max_hops,
        });
        alias
    }

    pub fn node(&self, alias: &str) -> Option<&QGNode> {
        self.nodes.iter().find(|n| n.alias == alias)
    }

    /// Splits the graph into its connected components, each independently
    /// plannable and later joined with a Cartesian product (SPEC_FULL.md
    /// §4.3, §4.5 "reduce cartesian product").
    pub fn connected_components(&self) -> Vec<QueryGraph> {
        let mut visited = vec![false; self.nodes.len()];
        let mut components = Vec::new();
        for start in 0..self.nodes.len() {
            if visited[start] {
                continue;
            }
            let mut stack = vec![start];
            let mut member_aliases = Vec::new();
            visited[start] = true;
            while let Some(idx) = stack.pop() {
                let alias = &self.nodes[idx].alias;
                member_aliases.push(alias.clone());
                for edge in &self.edges {
                    let neighbor = if &edge.src == alias {
                        Some(&edge.dest)
                    } else if &edge.dest == alias {
                        Some(&edge.src)
                    } else {
                        None
                    };
                    if let Some(neighbor) = neighbor {
                        if let Some(n_idx) = self.nodes.iter().position(|n| &n.alias == neighbor) {
                            if !visited[n_idx] {
                                visited[n_idx] = true;
                                stack.push(n_idx);
                            }
                        }
                    }
                }
            }
            let nodes: Vec<QGNode> =
                self.nodes.iter().filter(|n| member_aliases.contains(&n.alias)).cloned().collect();
            let edges: Vec<QGEdge> = self
                .edges
                .iter()
                .filter(|e| member_aliases.contains(&e.src) && member_aliases.contains(&e.dest))
                .cloned()
                .collect();
            components.push(QueryGraph { nodes, edges, paths: Vec::new() });
        }
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher_parser::parse;

    #[test]
    fn single_path_is_one_component() {
        let query = parse("MATCH (a:Person)-[:KNOWS]->(b:Person) RETURN a").unwrap();
        let pattern = match &query.clauses[0] {
            crate::cypher_parser::ast::Clause::Match(m) => &m.pattern,
            _ => panic!("expected match"),
        };
        let qg = QueryGraph::from_pattern(pattern);
        assert_eq!(qg.nodes.len(), 2);
        assert_eq!(qg.edges.len(), 1);
        assert_eq!(qg.connected_components().len(), 1);
    }

    #[test]
    fn disjoint_patterns_are_two_components() {
        let query = parse("MATCH (a:Person), (b:City) RETURN a").unwrap();
        let pattern = match &query.clauses[0] {
            crate::cypher_parser::ast::Clause::Match(m) => &m.pattern,
            _ => panic!("expected match"),
        };
        let qg = QueryGraph::from_pattern(pattern);
        assert_eq!(qg.connected_components().len(), 2);
    }
}
