//! Plan builder: turns a parsed `Query` into one `Operator` tree plus the
//! `RecordMap` every record produced by that tree is shaped against
//! (SPEC_FULL.md §4.3). Grounded on the teacher's `query_planner` — a
//! clause-by-clause walk that threads a growing "already bound" alias set
//! through the AST — generalized from SQL join/projection plans to Cypher
//! pattern/projection plans over the operator framework in `operators::`.
//!
//! `EXISTS { ... }` / `NOT EXISTS { ... }` predicates are rewritten into
//! `SemiApply`/`AntiSemiApply`/`ApplyMultiplexer` trees right here, before a
//! `WHERE` expression is ever handed to `FilterNode::from_expr` — see
//! `apply_where` below. A bare top-level conjunct (or negation of one) takes
//! the direct Semi/AntiSemiApply path; `EXISTS{}` combined with `AND`/`OR`/
//! `NOT` in any other position is rewritten recursively by
//! `build_exists_branch` into a tree of `ApplyMultiplexer` (OR/AND) and
//! `AntiSemiApply` (NOT) nodes, each branch itself rooted at an `Argument`
//! leaf so it can be seeded with the row under test. This mirrors what
//! `arithmetic::ArithmeticExpression::from_expr` already assumes of its
//! caller (its own `Expr::Exists` arm is never meant to run — every
//! `Expr::Exists` reaching a `WHERE`/`ON MATCH`/pattern filter has already
//! been rewritten away by the time `FilterNode`/`ArithmeticExpression` see
//! the expression tree).

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::arithmetic::ArithmeticExpression;
use crate::cypher_parser::ast::{
    CallClause, Clause, CreateClause, DeleteClause, Expr, ForeachClause, Literal, MatchClause, MergeClause,
    NodePattern, OrderItem, Pattern, ProjectionItem, Query, RelPattern, RemoveClause, RemoveItem, SetClause,
    SetItem, ShortestPathKind, UnionPart, UnwindClause, WithClause, ReturnClause,
};
use crate::errors::{EngineError, ErrorKind};
use crate::filter_tree::{CompareOp, FilterNode};
use crate::graph_store::GraphContext;
use crate::operators::{
    AggregateItem, AggregateState, ApplyKind, ApplyMultiplexerState, ApplyState, ArgumentState, CreateState,
    DeleteState, DistinctState, EdgePatternSpec, ForeachState, LimitState, MergeState, NodePatternSpec, Operator,
    OperatorKind, ProcedureCallState, ProjectState, ShortestPathState, SkipState, SortItem, SortState, UnionState,
    UnwindState, UpdateState,
};
use crate::query_graph::{QGEdge, QGPath, QueryGraph};
use crate::record::RecordMap;
use crate::value::Value;

pub struct PlanCtx {
    pub procedures: Arc<crate::procedures::ProcedureRegistry>,
    pub record_map: RecordMap,
}

pub struct PlanBuilder;

impl PlanBuilder {
    /// Builds the whole plan and the record layout it produces. `graph` is
    /// accepted (and unused beyond this signature) so callers don't need to
    /// special-case a graph-free build; a later pass may want it to resolve
    /// index eligibility ahead of execution.
    pub fn build(query: &Query, _graph: &Arc<GraphContext>) -> Result<(Operator, Arc<RecordMap>), EngineError> {
        let mut pctx = PlanCtx { procedures: crate::procedures::registry(), record_map: RecordMap::new() };
        collect_query_slots(query, &mut pctx.record_map);

        let mut bound: BTreeSet<String> = BTreeSet::new();
        let mut tree = build_clauses(&query.clauses, &mut bound, &mut pctx)?;

        for part in &query.unions {
            let mut branch_bound: BTreeSet<String> = BTreeSet::new();
            let branch = build_clauses(&part.clauses, &mut branch_bound, &mut pctx)?;
            tree = combine_union(tree, branch, part.all);
        }

        let plan = match tree {
            Some(tree) if matches!(tree.kind, OperatorKind::Results) => tree,
            Some(tree) => {
                let modifies = tree.modifies.clone();
                Operator::unary(OperatorKind::Results, modifies, tree)
            }
            None => Operator::leaf(OperatorKind::Results, Vec::new()),
        };
        Ok((plan, Arc::new(pctx.record_map)))
    }
}

fn build_clauses(
    clauses: &[Clause],
    bound: &mut BTreeSet<String>,
    pctx: &mut PlanCtx,
) -> Result<Option<Operator>, EngineError> {
    let mut stream: Option<Operator> = None;
    for clause in clauses {
        stream = Some(build_clause(clause, stream, bound, pctx)?);
    }
    Ok(stream)
}

/// Combines one `UNION`/`UNION ALL` branch (SPEC_FULL.md §4.2.3) onto the
/// accumulated result. Each branch can already be a fully-projected `Results`
/// tree (every part ends in its own `RETURN`) — unwrap that so `Union` joins
/// the two record streams directly rather than nesting a `Results` mid-plan.
/// A plain `UNION` wraps the combined stream in `Distinct`; `UNION ALL` keeps
/// every row.
fn combine_union(lhs: Option<Operator>, rhs: Option<Operator>, all: bool) -> Option<Operator> {
    let unwrap_results = |op: Operator| -> Operator {
        match op.kind {
            OperatorKind::Results if op.children.len() == 1 => {
                let mut children = op.children;
                children.remove(0)
            }
            _ => op,
        }
    };
    let lhs = lhs.map(unwrap_results).unwrap_or_else(empty_source);
    let rhs = rhs.map(unwrap_results).unwrap_or_else(empty_source);
    let modifies = lhs.modifies.clone();
    let combined = Operator::binary(OperatorKind::Union(UnionState { on_rhs: false }), modifies, lhs, rhs);
    Some(if all {
        combined
    } else {
        let modifies = combined.modifies.clone();
        Operator::unary(OperatorKind::Distinct(DistinctState::default()), modifies, combined)
    })
}

// ---------------------------------------------------------------------
// Slot collection: every alias and every synthetic property/function slot
// has to exist in the RecordMap before any Record is built (Record::new
// sizes its entries off the map's current length).
// ---------------------------------------------------------------------

fn collect_query_slots(query: &Query, map: &mut RecordMap) {
    for clause in &query.clauses {
        collect_clause_slots(clause, map);
    }
    for part in &query.unions {
        for clause in &part.clauses {
            collect_clause_slots(clause, map);
        }
    }
}

fn collect_clause_slots(clause: &Clause, map: &mut RecordMap) {
    match clause {
        Clause::Match(m) | Clause::OptionalMatch(m) => {
            collect_pattern_slots(&m.pattern, m.path_var.as_deref(), map);
            if let Some(w) = &m.where_clause {
                collect_expr_slots(w, map);
            }
        }
        Clause::Where(e) => collect_expr_slots(e, map),
        Clause::Create(c) => collect_pattern_slots(&c.pattern, None, map),
        Clause::Merge(m) => {
            collect_pattern_slots(&m.pattern, None, map);
            for item in m.on_match.iter().chain(&m.on_create) {
                collect_set_item_slots(item, map);
            }
        }
        Clause::Set(s) => {
            for item in &s.items {
                collect_set_item_slots(item, map);
            }
        }
        Clause::Remove(r) => {
            for item in &r.items {
                match item {
                    RemoveItem::Property { alias, .. } | RemoveItem::Label { alias, .. } => {
                        map.get_or_add(alias);
                    }
                }
            }
        }
        Clause::Delete(d) => {
            for e in &d.items {
                collect_expr_slots(e, map);
            }
        }
        Clause::With(w) => {
            for item in &w.items {
                collect_expr_slots(&item.expr, map);
                map.get_or_add(&item.alias.clone().unwrap_or_else(|| default_alias(&item.expr)));
            }
            if let Some(e) = &w.where_clause {
                collect_expr_slots(e, map);
            }
            for o in &w.order_by {
                collect_expr_slots(&o.expr, map);
            }
        }
        Clause::Return(r) => {
            for item in &r.items {
                collect_expr_slots(&item.expr, map);
                map.get_or_add(&item.alias.clone().unwrap_or_else(|| default_alias(&item.expr)));
            }
            for o in &r.order_by {
                collect_expr_slots(&o.expr, map);
            }
        }
        Clause::Unwind(u) => {
            collect_expr_slots(&u.expr, map);
            map.get_or_add(&u.alias);
        }
        Clause::Call(c) => {
            for a in &c.args {
                collect_expr_slots(a, map);
            }
            let cols = call_yield_columns(c);
            for col in cols {
                map.get_or_add(&col);
            }
        }
        Clause::CallSubquery(q) => collect_query_slots(q, map),
        Clause::Foreach(f) => {
            collect_expr_slots(&f.list, map);
            map.get_or_add(&f.var);
            for c in &f.clauses {
                collect_clause_slots(c, map);
            }
        }
    }
}

fn call_yield_columns(c: &CallClause) -> Vec<String> {
    if let Some(items) = &c.yield_items {
        return items.clone();
    }
    crate::procedures::registry()
        .create(&c.name)
        .map(|p| p.columns().iter().map(|s| s.to_string()).collect())
        .unwrap_or_default()
}

fn collect_expr_slots(expr: &Expr, map: &mut RecordMap) {
    match expr {
        Expr::Literal(_) | Expr::Parameter(_) => {}
        Expr::Variable(name) => {
            map.get_or_add(name);
        }
        Expr::Property { base, key } => {
            collect_expr_slots(base, map);
            if let Expr::Variable(alias) = base.as_ref() {
                map.get_or_add(&format!("{alias}.{key}"));
            }
        }
        Expr::List(items) => {
            for i in items {
                collect_expr_slots(i, map);
            }
        }
        Expr::FunctionCall { name, args, .. } => {
            for a in args {
                collect_expr_slots(a, map);
            }
            if let (true, [Expr::Variable(alias)]) =
                (matches!(name.to_ascii_lowercase().as_str(), "labels" | "type" | "properties"), args.as_slice())
            {
                map.get_or_add(&format!("{}({alias})", name.to_ascii_lowercase()));
            }
        }
        Expr::BinaryOp { lhs, rhs, .. } => {
            collect_expr_slots(lhs, map);
            collect_expr_slots(rhs, map);
        }
        Expr::Not(e) | Expr::IsNull(e) | Expr::IsNotNull(e) => collect_expr_slots(e, map),
        Expr::Exists { pattern, where_clause } => {
            collect_pattern_slots(pattern, None, map);
            if let Some(w) = where_clause {
                collect_expr_slots(w, map);
            }
        }
    }
}

fn collect_set_item_slots(item: &SetItem, map: &mut RecordMap) {
    match item {
        SetItem::Property { alias, value, .. } => {
            map.get_or_add(alias);
            collect_expr_slots(value, map);
        }
        SetItem::Labels { alias, .. } => {
            map.get_or_add(alias);
        }
    }
}

fn collect_pattern_slots(pattern: &Pattern, path_var: Option<&str>, map: &mut RecordMap) {
    let qg = QueryGraph::from_pattern_with_var(pattern, path_var);
    for n in &qg.nodes {
        map.get_or_add(&n.alias);
    }
    for e in &qg.edges {
        map.get_or_add(&e.internal_alias);
    }
    for p in &qg.paths {
        map.get_or_add(&p.alias);
    }
    for path in &pattern.paths {
        collect_node_pattern_slots(&path.start, map);
        for (rel, node) in &path.steps {
            collect_rel_pattern_slots(rel, map);
            collect_node_pattern_slots(node, map);
        }
    }
}

fn collect_node_pattern_slots(node: &NodePattern, map: &mut RecordMap) {
    if let Some(alias) = &node.alias {
        for (key, expr) in &node.properties {
            collect_expr_slots(expr, map);
            map.get_or_add(&format!("{alias}.{key}"));
        }
    }
}

fn collect_rel_pattern_slots(rel: &RelPattern, map: &mut RecordMap) {
    if let Some(alias) = &rel.alias {
        for (key, expr) in &rel.properties {
            collect_expr_slots(expr, map);
            map.get_or_add(&format!("{alias}.{key}"));
        }
    }
}

fn default_alias(expr: &Expr) -> String {
    match expr {
        Expr::Variable(name) => name.clone(),
        Expr::Parameter(name) => format!("${name}"),
        Expr::Property { base, key } => format!("{}.{key}", default_alias(base)),
        Expr::FunctionCall { name, args, .. } => {
            format!("{name}({})", args.iter().map(default_alias).collect::<Vec<_>>().join(", "))
        }
        Expr::Literal(Literal::String(s)) => format!("\"{s}\""),
        Expr::Literal(Literal::Integer(i)) => i.to_string(),
        Expr::Literal(Literal::Float(f)) => f.to_string(),
        Expr::Literal(Literal::Boolean(b)) => b.to_string(),
        Expr::Literal(Literal::Null) => "null".to_string(),
        Expr::Not(e) => format!("NOT {}", default_alias(e)),
        Expr::IsNull(e) => format!("{} IS NULL", default_alias(e)),
        Expr::IsNotNull(e) => format!("{} IS NOT NULL", default_alias(e)),
        Expr::BinaryOp { lhs, rhs, .. } => format!("{} {}", default_alias(lhs), default_alias(rhs)),
        Expr::List(_) | Expr::Exists { .. } => "expr".to_string(),
    }
}

fn empty_source() -> Operator {
    Operator::leaf(OperatorKind::Argument(ArgumentState::default()), Vec::new())
}

fn union_modifies(a: &[String], b: &[String]) -> Vec<String> {
    let mut out = a.to_vec();
    for x in b {
        if !out.contains(x) {
            out.push(x.clone());
        }
    }
    out
}

// ---------------------------------------------------------------------
// Clause dispatch
// ---------------------------------------------------------------------

fn build_clause(
    clause: &Clause,
    stream: Option<Operator>,
    bound: &mut BTreeSet<String>,
    pctx: &mut PlanCtx,
) -> Result<Operator, EngineError> {
    match clause {
        Clause::Match(m) => build_match(m, false, stream, bound, pctx),
        Clause::OptionalMatch(m) => build_match(m, true, stream, bound, pctx),
        Clause::Where(e) => apply_where(stream.unwrap_or_else(empty_source), e, bound, pctx),
        Clause::Create(c) => build_create(c, stream, bound, pctx),
        Clause::Merge(m) => build_merge(m, stream, bound, pctx),
        Clause::Set(s) => build_set(s, stream),
        Clause::Remove(r) => build_remove(r, stream),
        Clause::Delete(d) => build_delete(d, stream),
        Clause::With(w) => build_with(w, stream, bound, pctx),
        Clause::Return(r) => build_return(r, stream, bound, pctx),
        Clause::Unwind(u) => build_unwind(u, stream, bound),
        Clause::Call(c) => build_call(c, stream, bound, pctx),
        Clause::CallSubquery(q) => build_call_subquery(q, stream, bound, pctx),
        Clause::Foreach(f) => build_foreach(f, stream, pctx),
    }
}

// ---------------------------------------------------------------------
// MATCH / OPTIONAL MATCH
// ---------------------------------------------------------------------

/// `shortestPath(...)`/`allShortestPaths(...)` (SPEC_FULL.md §4.2.2) bind
/// exactly one relationship between two named endpoints — unlike an
/// ordinary pattern, a missing alias here isn't "anonymous", it's a query
/// that can never be matched against a concrete shortest path.
fn validate_shortest_paths(pattern: &Pattern) -> Result<(), EngineError> {
    for path in &pattern.paths {
        if path.shortest_path == ShortestPathKind::None {
            continue;
        }
        if path.steps.len() != 1 {
            return Err(EngineError::new(
                ErrorKind::UnresolvedReference,
                "shortestPath requires exactly one relationship between its two endpoints",
            ));
        }
        if path.start.alias.is_none() || path.steps[0].1.alias.is_none() {
            return Err(EngineError::new(
                ErrorKind::UnresolvedReference,
                "shortestPath requires both endpoints to be bound to a variable",
            ));
        }
    }
    Ok(())
}

fn build_match(
    m: &MatchClause,
    optional: bool,
    stream: Option<Operator>,
    bound: &mut BTreeSet<String>,
    pctx: &mut PlanCtx,
) -> Result<Operator, EngineError> {
    validate_shortest_paths(&m.pattern)?;
    let qg = QueryGraph::from_pattern_with_var(&m.pattern, m.path_var.as_deref());
    let mut match_tree = build_query_graph(&qg, bound)?;
    if let Some(prop_filter) = pattern_property_filter(&m.pattern) {
        match_tree = wrap_filter(match_tree, prop_filter);
    }
    if let Some(where_expr) = &m.where_clause {
        match_tree = apply_where(match_tree, where_expr, bound, pctx)?;
    }
    for n in &qg.nodes {
        bound.insert(n.alias.clone());
    }
    for e in &qg.edges {
        bound.insert(e.internal_alias.clone());
        if let Some(a) = &e.alias {
            bound.insert(a.clone());
        }
    }
    for p in &qg.paths {
        bound.insert(p.alias.clone());
    }

    Ok(match (stream, optional) {
        (None, false) => match_tree,
        (None, true) => combine_apply(empty_source(), match_tree, ApplyKind::Optional),
        (Some(s), false) => combine_cartesian(s, match_tree),
        (Some(s), true) => combine_apply(s, match_tree, ApplyKind::Optional),
    })
}

/// Builds a match sub-tree for every connected component of `qg`, joined by
/// `CartesianProduct` (SPEC_FULL.md §4.3, §4.5 "reduce cartesian product" —
/// that pass later rewrites the ones it can turn into a join).
fn build_query_graph(qg: &QueryGraph, bound: &BTreeSet<String>) -> Result<Operator, EngineError> {
    let mut components = qg.connected_components();
    if components.is_empty() {
        return Ok(empty_source());
    }
    let mut tree = build_component(components.remove(0), qg, bound)?;
    for comp in components {
        let rhs = build_component(comp, qg, bound)?;
        tree = combine_cartesian(tree, rhs);
    }
    Ok(tree)
}

/// A shortest-path component is exactly one path's worth of nodes/edges
/// (validated by `validate_shortest_paths` before the query graph is even
/// built), so it's handled before the generic per-edge walk below rather
/// than threaded through it.
fn shortest_path_for_component<'a>(comp: &QueryGraph, qg: &'a QueryGraph) -> Option<&'a crate::query_graph::QGPath> {
    qg.paths.iter().find(|p| {
        p.shortest.is_some()
            && p.node_aliases.len() == comp.nodes.len()
            && p.node_aliases.iter().all(|a| comp.nodes.iter().any(|n| &n.alias == a))
    })
}

fn build_shortest_path_component(
    comp: QueryGraph,
    path: &crate::query_graph::QGPath,
    bound: &BTreeSet<String>,
) -> Result<Operator, EngineError> {
    let edge = comp
        .edges
        .first()
        .ok_or_else(|| EngineError::new(ErrorKind::UnresolvedReference, "shortestPath requires a relationship"))?;
    let src_tree = scan_for_node(&edge.src, comp.node(&edge.src), bound);
    let dest_tree = scan_for_node(&edge.dest, comp.node(&edge.dest), bound);
    let mut modifies = union_modifies(&[edge.src.clone()], &[edge.dest.clone()]);
    if let Some(a) = &edge.alias {
        modifies = union_modifies(&modifies, &[a.clone()]);
    }
    modifies.push(path.alias.clone());
    let tree = Operator::unary(
        OperatorKind::ShortestPathTraverse(ShortestPathState {
            src_alias: edge.src.clone(),
            dest_alias: edge.dest.clone(),
            path_alias: path.alias.clone(),
            rel_types: edge.rel_types.clone(),
            direction: edge.direction,
            all_paths: path.shortest == Some(true),
            emitted: false,
            paths: Vec::new(),
            pos: 0,
            current_source: None,
        }),
        modifies,
        combine_cartesian(src_tree, dest_tree),
    );
    Ok(tree)
}

fn build_component(comp: QueryGraph, qg: &QueryGraph, bound: &BTreeSet<String>) -> Result<Operator, EngineError> {
    if let Some(path) = shortest_path_for_component(&comp, qg) {
        return build_shortest_path_component(comp, path, bound);
    }

    let start_alias = comp
        .nodes
        .iter()
        .find(|n| bound.contains(&n.alias))
        .or_else(|| comp.nodes.first())
        .map(|n| n.alias.clone())
        .unwrap_or_default();

    let mut modifies = vec![start_alias.clone()];
    let mut tree = scan_for_node(&start_alias, comp.node(&start_alias), bound);
    let mut visited: BTreeSet<String> = BTreeSet::new();
    visited.insert(start_alias.clone());

    let mut remaining: Vec<&QGEdge> = comp.edges.iter().collect();
    while !remaining.is_empty() {
        let pos = remaining.iter().position(|e| visited.contains(&e.src) || visited.contains(&e.dest));
        let Some(pos) = pos else { break };
        let edge = remaining.remove(pos);

        let (known_alias, unknown_alias, flip) = if visited.contains(&edge.src) {
            (edge.src.clone(), edge.dest.clone(), false)
        } else {
            (edge.dest.clone(), edge.src.clone(), true)
        };
        let direction = if flip { flip_direction(edge.direction) } else { edge.direction };
        let dest_already_bound = visited.contains(&unknown_alias);

        tree = if dest_already_bound {
            Operator::unary(
                OperatorKind::ExpandInto(crate::operators::ExpandIntoState {
                    src_alias: known_alias,
                    dest_alias: unknown_alias.clone(),
                    edge_alias: Some(edge.internal_alias.clone()),
                    rel_types: edge.rel_types.clone(),
                    direction,
                }),
                modifies.clone(),
                tree,
            )
        } else if edge.is_variable_length() {
            modifies.push(unknown_alias.clone());
            Operator::unary(
                OperatorKind::ConditionalVarLenTraverse(crate::operators::ConditionalVarLenState {
                    src_alias: known_alias,
                    dest_alias: unknown_alias.clone(),
                    edge_alias: Some(edge.internal_alias.clone()),
                    rel_types: edge.rel_types.clone(),
                    direction,
                    min_hops: edge.min_hops,
                    max_hops: edge.max_hops,
                    results: Vec::new(),
                    pos: 0,
                    current_source: None,
                }),
                union_modifies(&modifies, &[edge.internal_alias.clone()]),
                tree,
            )
        } else {
            modifies.push(unknown_alias.clone());
            Operator::unary(
                OperatorKind::ConditionalTraverse(crate::operators::ConditionalTraverseState {
                    src_alias: known_alias,
                    dest_alias: unknown_alias.clone(),
                    edge_alias: Some(edge.internal_alias.clone()),
                    rel_types: edge.rel_types.clone(),
                    direction,
                    batch: Vec::new(),
                    batch_pos: 0,
                    frontier: Vec::new(),
                    frontier_pos: 0,
                }),
                union_modifies(&modifies, &[edge.internal_alias.clone()]),
                tree,
            )
        };
        if !dest_already_bound {
            modifies = union_modifies(&modifies, &[edge.internal_alias.clone()]);
            if let Some(label_filter) = label_filter_node(&unknown_alias, comp.node(&unknown_alias)) {
                tree = wrap_filter(tree, label_filter);
            }
        }
        if let Some(a) = &edge.alias {
            modifies = union_modifies(&modifies, &[a.clone()]);
        }
        visited.insert(unknown_alias);
    }

    for path in &qg.paths {
        let is_member = path.shortest.is_none() && path.node_aliases.iter().all(|a| visited.contains(a));
        if is_member {
            tree = bind_path(tree, path, qg, &mut modifies);
        }
    }

    tree.modifies = modifies;
    Ok(tree)
}

fn flip_direction(d: crate::cypher_parser::ast::Direction) -> crate::cypher_parser::ast::Direction {
    use crate::cypher_parser::ast::Direction;
    match d {
        Direction::Outgoing => Direction::Incoming,
        Direction::Incoming => Direction::Outgoing,
        Direction::Either => Direction::Either,
    }
}

fn scan_for_node(alias: &str, node: Option<&crate::query_graph::QGNode>, bound: &BTreeSet<String>) -> Operator {
    if bound.contains(alias) {
        return Operator::leaf(OperatorKind::Argument(ArgumentState::default()), vec![alias.to_string()]);
    }
    let labels = node.map(|n| n.labels.as_slice()).unwrap_or(&[]);
    let mut tree = match labels.first() {
        Some(first) => Operator::leaf(
            OperatorKind::LabelScan(crate::operators::LabelScanState {
                alias: alias.to_string(),
                label: first.clone(),
                ids: Vec::new(),
                pos: 0,
            }),
            vec![alias.to_string()],
        ),
        None => Operator::leaf(
            OperatorKind::AllNodeScan(crate::operators::AllNodeScanState { alias: alias.to_string(), next: 0 }),
            vec![alias.to_string()],
        ),
    };
    if labels.len() > 1 {
        if let Some(filter) = label_filter_node(alias, node) {
            tree = wrap_filter(tree, filter);
        }
    }
    tree
}

/// Extra labels a node pattern carries beyond the one used to pick a scan
/// (`scan_for_node` uses only the first; the rest become a post-scan filter).
fn label_filter_node(alias: &str, node: Option<&crate::query_graph::QGNode>) -> Option<FilterNode> {
    let labels = node.map(|n| n.labels.as_slice()).unwrap_or(&[]);
    let extra = if labels.len() > 1 { &labels[1..] } else { return None };
    let mut tree: Option<FilterNode> = None;
    for label in extra {
        let predicate = FilterNode::Expression(ArithmeticExpression::Operation {
            name: "in".to_string(),
            args: vec![
                ArithmeticExpression::Constant(Value::Str(label.clone())),
                ArithmeticExpression::Operation {
                    name: "labels".to_string(),
                    args: vec![ArithmeticExpression::Variable(alias.to_string())],
                    distinct: false,
                },
            ],
            distinct: false,
        });
        tree = Some(match tree {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
    }
    tree
}

fn wrap_filter(tree: Operator, filter: FilterNode) -> Operator {
    let modifies = tree.modifies.clone();
    Operator::unary(OperatorKind::Filter(crate::operators::FilterState { tree: filter }), modifies, tree)
}

fn combine_cartesian(lhs: Operator, rhs: Operator) -> Operator {
    let modifies = union_modifies(&lhs.modifies, &rhs.modifies);
    Operator::binary(OperatorKind::CartesianProduct(Default::default()), modifies, lhs, rhs)
}

fn combine_apply(lhs: Operator, rhs: Operator, kind: ApplyKind) -> Operator {
    // Semi/AntiSemiApply return the lhs record unmodified (see
    // `combine::rollup_apply`/`semi_apply`) — rhs aliases never actually land
    // in the output, so they must not be advertised as bound.
    let modifies = match kind {
        ApplyKind::SemiApply | ApplyKind::AntiSemiApply => lhs.modifies.clone(),
        ApplyKind::Apply | ApplyKind::Optional => union_modifies(&lhs.modifies, &rhs.modifies),
    };
    Operator::binary(
        OperatorKind::Apply(ApplyState { kind, lhs_record: None, rhs_produced: false }),
        modifies,
        lhs,
        rhs,
    )
}

/// Turns inline pattern properties (`(n {age: 30})`) into equality
/// predicates — used both as a post-match `WHERE`-equivalent filter and (for
/// `MERGE`) as the identity the match sub-plan checks before falling back to
/// create.
fn pattern_property_filter(pattern: &Pattern) -> Option<FilterNode> {
    let mut acc: Option<FilterNode> = None;
    for path in &pattern.paths {
        accumulate_node_filter(&path.start, &mut acc);
        for (rel, node) in &path.steps {
            accumulate_rel_filter(rel, &mut acc);
            accumulate_node_filter(node, &mut acc);
        }
    }
    acc
}

fn and_into(acc: &mut Option<FilterNode>, node: FilterNode) {
    *acc = Some(match acc.take() {
        Some(existing) => existing.and(node),
        None => node,
    });
}

fn property_predicate(alias: &str, key: &str, value: &Expr) -> FilterNode {
    FilterNode::Predicate {
        op: CompareOp::Eq,
        lhs: ArithmeticExpression::Property {
            base: Box::new(ArithmeticExpression::Variable(alias.to_string())),
            key: key.to_string(),
        },
        rhs: ArithmeticExpression::from_expr(value),
    }
}

fn accumulate_node_filter(node: &NodePattern, acc: &mut Option<FilterNode>) {
    let Some(alias) = &node.alias else { return };
    for (key, expr) in &node.properties {
        and_into(acc, property_predicate(alias, key, expr));
    }
}

fn accumulate_rel_filter(rel: &RelPattern, acc: &mut Option<FilterNode>) {
    let Some(alias) = &rel.alias else { return };
    for (key, expr) in &rel.properties {
        and_into(acc, property_predicate(alias, key, expr));
    }
}

/// Projects a named path variable (`p = (a)-[r]->(b)`) from its component
/// nodes/edges. A path whose single edge is variable-length already carries
/// its own `Value::Path` (bound by `ConditionalVarLenTraverse` under the
/// edge's internal alias) — that case is aliased directly rather than
/// reassembled via `topath`.
fn bind_path(tree: Operator, path: &QGPath, qg: &QueryGraph, modifies: &mut Vec<String>) -> Operator {
    modifies.push(path.alias.clone());
    if path.edge_aliases.len() == 1 {
        if let Some(edge) = qg.edges.iter().find(|e| e.internal_alias == path.edge_aliases[0]) {
            if edge.is_variable_length() {
                let expr = ArithmeticExpression::Variable(edge.internal_alias.clone());
                let m = modifies.clone();
                return Operator::unary(
                    OperatorKind::Project(ProjectState { items: vec![(expr, path.alias.clone())], keep_existing: true }),
                    m,
                    tree,
                );
            }
        }
    }
    let mut args = Vec::new();
    let mut nodes_iter = path.node_aliases.iter();
    if let Some(n) = nodes_iter.next() {
        args.push(ArithmeticExpression::Variable(n.clone()));
    }
    for (edge_alias, node_alias) in path.edge_aliases.iter().zip(nodes_iter) {
        args.push(ArithmeticExpression::Variable(edge_alias.clone()));
        args.push(ArithmeticExpression::Variable(node_alias.clone()));
    }
    let expr = ArithmeticExpression::Operation { name: "topath".to_string(), args, distinct: false };
    let m = modifies.clone();
    Operator::unary(
        OperatorKind::Project(ProjectState { items: vec![(expr, path.alias.clone())], keep_existing: true }),
        m,
        tree,
    )
}

// ---------------------------------------------------------------------
// WHERE / EXISTS rewriting
// ---------------------------------------------------------------------

fn apply_where(
    source: Operator,
    expr: &Expr,
    bound: &BTreeSet<String>,
    pctx: &mut PlanCtx,
) -> Result<Operator, EngineError> {
    let mut tree = source;
    let mut plain: Vec<Expr> = Vec::new();
    for conjunct in split_and(expr) {
        match exists_form(&conjunct) {
            Some((pattern, where_clause, negated)) => {
                let sub = build_exists_subplan(pattern, where_clause, bound, pctx)?;
                let kind = if negated { ApplyKind::AntiSemiApply } else { ApplyKind::SemiApply };
                tree = combine_apply(tree, sub, kind);
            }
            None if contains_exists(&conjunct) => {
                let branch = build_exists_branch(&conjunct, bound, pctx)?;
                tree = combine_apply(tree, branch, ApplyKind::SemiApply);
            }
            None => plain.push(conjunct),
        }
    }
    if let Some(combined) = combine_and(plain) {
        tree = wrap_filter(tree, FilterNode::from_expr(&combined));
    }
    Ok(tree)
}

/// Builds the right-hand sub-plan for a bare `EXISTS { pattern [WHERE w] }`:
/// the pattern's query graph, its inline property predicates, and its own
/// nested `WHERE` (which may itself contain further `EXISTS`).
fn build_exists_subplan(
    pattern: &Pattern,
    where_clause: &Option<Box<Expr>>,
    bound: &BTreeSet<String>,
    pctx: &mut PlanCtx,
) -> Result<Operator, EngineError> {
    validate_shortest_paths(pattern)?;
    let qg = QueryGraph::from_pattern(pattern);
    let mut sub = build_query_graph(&qg, bound)?;
    if let Some(pf) = pattern_property_filter(pattern) {
        sub = wrap_filter(sub, pf);
    }
    if let Some(w) = where_clause {
        sub = apply_where(sub, w, bound, pctx)?;
    }
    Ok(sub)
}

/// True if `EXISTS { ... }` appears anywhere in `expr`'s tree, including
/// nested under `AND`/`OR`/`NOT` — the general case `apply_where`'s
/// top-level-conjunct fast path doesn't cover (SPEC_FULL.md §4.2.5).
fn contains_exists(expr: &Expr) -> bool {
    match expr {
        Expr::Exists { .. } => true,
        Expr::Not(inner) | Expr::IsNull(inner) | Expr::IsNotNull(inner) => contains_exists(inner),
        Expr::BinaryOp { lhs, rhs, .. } => contains_exists(lhs) || contains_exists(rhs),
        Expr::FunctionCall { args, .. } | Expr::List(args) => args.iter().any(contains_exists),
        _ => false,
    }
}

/// Recursively lowers a boolean expression containing `EXISTS{}` in a
/// non-top-level position (`OR`, `NOT` of a compound, `AND` nested under an
/// `OR`, ...) into a self-contained branch: an operator tree rooted at one
/// or more `Argument` leaves whose "produces a row" signal equals the
/// expression's truth value for the seeded row. Each branch is combined
/// with its siblings using `ApplyMultiplexer` (`AND`/`OR`) or a nested
/// `AntiSemiApply` (`NOT`), exactly the operators SPEC_FULL.md §4.2.5 names
/// for this rewrite. Callers splice the resulting branch back into the
/// outer plan with a plain `SemiApply` (see `apply_where`), since "branch
/// produced a row" already means "expression is true".
fn build_exists_branch(expr: &Expr, bound: &BTreeSet<String>, pctx: &mut PlanCtx) -> Result<Operator, EngineError> {
    match expr {
        Expr::Exists { pattern, where_clause } => build_exists_subplan(pattern, where_clause, bound, pctx),
        Expr::Not(inner) => {
            let lhs = empty_source();
            let rhs = build_exists_branch(inner, bound, pctx)?;
            Ok(combine_apply(lhs, rhs, ApplyKind::AntiSemiApply))
        }
        Expr::BinaryOp { op: crate::cypher_parser::ast::BinOp::And, lhs, rhs } => {
            build_multiplexer(lhs, rhs, false, bound, pctx)
        }
        Expr::BinaryOp { op: crate::cypher_parser::ast::BinOp::Or, lhs, rhs } => {
            build_multiplexer(lhs, rhs, true, bound, pctx)
        }
        other => {
            // A leaf with no EXISTS of its own (e.g. `x = 1` inside
            // `x = 1 OR EXISTS{p}`) — test it against a single replayed row.
            let modifies: Vec<String> = bound.iter().cloned().collect();
            Ok(Operator::unary(
                OperatorKind::Filter(crate::operators::FilterState { tree: FilterNode::from_expr(other) }),
                modifies,
                empty_source(),
            ))
        }
    }
}

fn build_multiplexer(
    lhs: &Expr,
    rhs: &Expr,
    or_semantics: bool,
    bound: &BTreeSet<String>,
    pctx: &mut PlanCtx,
) -> Result<Operator, EngineError> {
    let lhs_branch = build_exists_branch(lhs, bound, pctx)?;
    let rhs_branch = build_exists_branch(rhs, bound, pctx)?;
    let modifies: Vec<String> = bound.iter().cloned().collect();
    let mut op = Operator::leaf(
        OperatorKind::ApplyMultiplexer(ApplyMultiplexerState { or_semantics, lhs_record: None }),
        modifies,
    );
    op.children = vec![empty_source(), lhs_branch, rhs_branch];
    Ok(op)
}

fn split_and(expr: &Expr) -> Vec<Expr> {
    match expr {
        Expr::BinaryOp { op: crate::cypher_parser::ast::BinOp::And, lhs, rhs } => {
            let mut out = split_and(lhs);
            out.extend(split_and(rhs));
            out
        }
        other => vec![other.clone()],
    }
}

fn combine_and(exprs: Vec<Expr>) -> Option<Expr> {
    let mut iter = exprs.into_iter();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, e| Expr::BinaryOp {
        op: crate::cypher_parser::ast::BinOp::And,
        lhs: Box::new(acc),
        rhs: Box::new(e),
    }))
}

fn exists_form(expr: &Expr) -> Option<(&Pattern, &Option<Box<Expr>>, bool)> {
    match expr {
        Expr::Exists { pattern, where_clause } => Some((pattern, where_clause, false)),
        Expr::Not(inner) => match inner.as_ref() {
            Expr::Exists { pattern, where_clause } => Some((pattern, where_clause, true)),
            _ => None,
        },
        _ => None,
    }
}

// ---------------------------------------------------------------------
// CREATE / MERGE
// ---------------------------------------------------------------------

fn pattern_node_specs(pattern: &Pattern) -> Vec<NodePatternSpec> {
    let mut specs = Vec::new();
    let mut seen = BTreeSet::new();
    for (path_idx, path) in pattern.paths.iter().enumerate() {
        push_node_spec(&path.start, path_idx, 0, &mut specs, &mut seen);
        for (step_idx, (_, node)) in path.steps.iter().enumerate() {
            push_node_spec(node, path_idx, step_idx + 1, &mut specs, &mut seen);
        }
    }
    specs
}

fn push_node_spec(
    node: &NodePattern,
    path_idx: usize,
    step_idx: usize,
    specs: &mut Vec<NodePatternSpec>,
    seen: &mut BTreeSet<String>,
) {
    let alias = node.alias.clone().unwrap_or_else(|| format!("_anon_node_{path_idx}_{step_idx}"));
    if !seen.insert(alias.clone()) {
        return;
    }
    let properties = node.properties.iter().map(|(k, e)| (k.clone(), ArithmeticExpression::from_expr(e))).collect();
    specs.push(NodePatternSpec { alias, labels: node.labels.clone(), properties });
}

fn pattern_edge_specs(pattern: &Pattern) -> Vec<(String, EdgePatternSpec, String)> {
    let mut out = Vec::new();
    for (path_idx, path) in pattern.paths.iter().enumerate() {
        let mut prev_alias = path.start.alias.clone().unwrap_or_else(|| format!("_anon_node_{path_idx}_0"));
        for (step_idx, (rel, node)) in path.steps.iter().enumerate() {
            let node_alias = node.alias.clone().unwrap_or_else(|| format!("_anon_node_{path_idx}_{}", step_idx + 1));
            let rel_type = rel.rel_types.first().cloned().unwrap_or_default();
            let properties = rel.properties.iter().map(|(k, e)| (k.clone(), ArithmeticExpression::from_expr(e))).collect();
            out.push((
                prev_alias.clone(),
                EdgePatternSpec { alias: rel.alias.clone(), rel_type, direction: rel.direction, properties },
                node_alias.clone(),
            ));
            prev_alias = node_alias;
        }
    }
    out
}

fn new_pattern_aliases(nodes: &[NodePatternSpec], edges: &[(String, EdgePatternSpec, String)]) -> Vec<String> {
    let mut out: Vec<String> = nodes.iter().map(|n| n.alias.clone()).collect();
    for (_, e, _) in edges {
        if let Some(a) = &e.alias {
            out.push(a.clone());
        }
    }
    out
}

fn build_create(
    c: &CreateClause,
    stream: Option<Operator>,
    bound: &mut BTreeSet<String>,
    _pctx: &mut PlanCtx,
) -> Result<Operator, EngineError> {
    let nodes = pattern_node_specs(&c.pattern);
    let edges = pattern_edge_specs(&c.pattern);
    let new_aliases = new_pattern_aliases(&nodes, &edges);
    let base = stream.unwrap_or_else(empty_source);
    let modifies = union_modifies(&base.modifies, &new_aliases);
    for a in &new_aliases {
        bound.insert(a.clone());
    }
    Ok(Operator::unary(OperatorKind::Create(CreateState { nodes, edges, done: false }), modifies, base))
}

/// Builds `MERGE`. `match_plan` is re-seeded and re-run once per row of
/// `stream` (or once for a bare `MERGE` with no upstream), the way the Apply
/// family threads an outer row into a sub-plan — every match it produces is
/// emitted with `ON MATCH` applied, falling back to `CREATE` + `ON CREATE`
/// only for an outer row with zero matches. See `MergeState`.
fn build_merge(
    m: &MergeClause,
    stream: Option<Operator>,
    bound: &mut BTreeSet<String>,
    _pctx: &mut PlanCtx,
) -> Result<Operator, EngineError> {
    if m.pattern.paths.iter().any(|p| p.shortest_path != ShortestPathKind::None) {
        return Err(EngineError::new(ErrorKind::ParseError, "shortestPath is not allowed in a MERGE pattern"));
    }
    let nodes = pattern_node_specs(&m.pattern);
    let edges = pattern_edge_specs(&m.pattern);
    let qg = QueryGraph::from_pattern(&m.pattern);
    let mut match_plan = build_query_graph(&qg, bound)?;
    if let Some(pf) = pattern_property_filter(&m.pattern) {
        match_plan = wrap_filter(match_plan, pf);
    }
    let new_aliases = new_pattern_aliases(&nodes, &edges);
    let base = stream.unwrap_or_else(empty_source);
    let modifies = union_modifies(&base.modifies, &new_aliases);
    for a in &new_aliases {
        bound.insert(a.clone());
    }
    let state = MergeState {
        nodes,
        edges,
        on_match: m.on_match.clone(),
        on_create: m.on_create.clone(),
        match_plan: Box::new(match_plan),
        done: false,
        active: false,
        matched_any: false,
        current_outer: None,
    };
    Ok(Operator::unary(OperatorKind::Merge(state), modifies, base))
}

// ---------------------------------------------------------------------
// SET / REMOVE / DELETE
// ---------------------------------------------------------------------

fn build_set(s: &SetClause, stream: Option<Operator>) -> Result<Operator, EngineError> {
    let base = stream.unwrap_or_else(empty_source);
    let modifies = base.modifies.clone();
    Ok(Operator::unary(
        OperatorKind::Update(UpdateState { items: s.items.clone(), label_removes: Vec::new() }),
        modifies,
        base,
    ))
}

fn build_remove(r: &RemoveClause, stream: Option<Operator>) -> Result<Operator, EngineError> {
    let base = stream.unwrap_or_else(empty_source);
    let mut set_items = Vec::new();
    let mut label_removes: Vec<(String, Vec<String>)> = Vec::new();
    for item in &r.items {
        match item {
            RemoveItem::Property { alias, key } => {
                set_items.push(SetItem::Property { alias: alias.clone(), key: key.clone(), value: Expr::Literal(Literal::Null) });
            }
            RemoveItem::Label { alias, label } => match label_removes.iter_mut().find(|(a, _)| a == alias) {
                Some((_, labels)) => labels.push(label.clone()),
                None => label_removes.push((alias.clone(), vec![label.clone()])),
            },
        }
    }
    let modifies = base.modifies.clone();
    Ok(Operator::unary(OperatorKind::Update(UpdateState { items: set_items, label_removes }), modifies, base))
}

fn build_delete(d: &DeleteClause, stream: Option<Operator>) -> Result<Operator, EngineError> {
    let base = stream.unwrap_or_else(empty_source);
    let aliases = d.items.iter().map(ArithmeticExpression::from_expr).collect();
    let modifies = base.modifies.clone();
    Ok(Operator::unary(OperatorKind::Delete(DeleteState { detach: d.detach, aliases }), modifies, base))
}

// ---------------------------------------------------------------------
// WITH / RETURN
// ---------------------------------------------------------------------

fn build_projection(base: Operator, items: &[ProjectionItem], distinct: bool) -> Operator {
    let arith_items: Vec<(ArithmeticExpression, String)> = items
        .iter()
        .map(|it| {
            let expr = ArithmeticExpression::from_expr(&it.expr);
            let alias = it.alias.clone().unwrap_or_else(|| default_alias(&it.expr));
            (expr, alias)
        })
        .collect();
    let has_agg = arith_items.iter().any(|(e, _)| e.is_aggregate());
    let tree = if has_agg {
        let mut keys = Vec::new();
        let mut aggregates = Vec::new();
        for (expr, alias) in &arith_items {
            if expr.is_aggregate() {
                let (func, inner, item_distinct) = extract_aggregate(expr);
                aggregates.push(AggregateItem { expr: inner, alias: alias.clone(), func, distinct: item_distinct });
            } else {
                keys.push((expr.clone(), alias.clone()));
            }
        }
        let modifies: Vec<String> = arith_items.iter().map(|(_, a)| a.clone()).collect();
        Operator::unary(
            OperatorKind::Aggregate(AggregateState { keys, aggregates, groups: None, pos: 0 }),
            modifies,
            base,
        )
    } else {
        let modifies: Vec<String> = arith_items.iter().map(|(_, a)| a.clone()).collect();
        Operator::unary(OperatorKind::Project(ProjectState { items: arith_items, keep_existing: false }), modifies, base)
    };
    if distinct {
        let m = tree.modifies.clone();
        Operator::unary(OperatorKind::Distinct(DistinctState::default()), m, tree)
    } else {
        tree
    }
}

/// Only bare top-level aggregate calls (`count(n)`) are recognized as a
/// group's aggregate slot — an aggregate nested inside a larger expression
/// (`count(n) + 1`) is not split out into its own accumulator. See
/// DESIGN.md.
fn extract_aggregate(expr: &ArithmeticExpression) -> (String, ArithmeticExpression, bool) {
    match expr {
        ArithmeticExpression::Operation { name, args, distinct } => {
            let inner = args.first().cloned().unwrap_or(ArithmeticExpression::Constant(Value::Null));
            (name.clone(), inner, *distinct)
        }
        _ => (String::new(), expr.clone(), false),
    }
}

fn apply_order_skip_limit(tree: Operator, order_by: &[OrderItem], skip: Option<i64>, limit: Option<i64>) -> Operator {
    let mut tree = tree;
    if !order_by.is_empty() {
        let items: Vec<SortItem> =
            order_by.iter().map(|o| SortItem { expr: ArithmeticExpression::from_expr(&o.expr), desc: o.desc }).collect();
        let m = tree.modifies.clone();
        tree = Operator::unary(OperatorKind::Sort(SortState { items, buffer: None, pos: 0 }), m, tree);
    }
    if let Some(n) = skip {
        let m = tree.modifies.clone();
        tree = Operator::unary(OperatorKind::Skip(SkipState { count: n, skipped: 0 }), m, tree);
    }
    if let Some(n) = limit {
        let m = tree.modifies.clone();
        tree = Operator::unary(OperatorKind::Limit(LimitState { count: n, emitted: 0 }), m, tree);
    }
    tree
}

fn build_with(
    w: &WithClause,
    stream: Option<Operator>,
    bound: &mut BTreeSet<String>,
    pctx: &mut PlanCtx,
) -> Result<Operator, EngineError> {
    let base = stream.unwrap_or_else(empty_source);
    let mut tree = build_projection(base, &w.items, w.distinct);
    if let Some(where_expr) = &w.where_clause {
        tree = apply_where(tree, where_expr, bound, pctx)?;
    }
    tree = apply_order_skip_limit(tree, &w.order_by, w.skip, w.limit);
    bound.clear();
    for item in &w.items {
        bound.insert(item.alias.clone().unwrap_or_else(|| default_alias(&item.expr)));
    }
    Ok(tree)
}

fn build_return(
    r: &ReturnClause,
    stream: Option<Operator>,
    bound: &mut BTreeSet<String>,
    _pctx: &mut PlanCtx,
) -> Result<Operator, EngineError> {
    let base = stream.unwrap_or_else(empty_source);
    let mut tree = build_projection(base, &r.items, r.distinct);
    tree = apply_order_skip_limit(tree, &r.order_by, r.skip, r.limit);
    bound.clear();
    for item in &r.items {
        bound.insert(item.alias.clone().unwrap_or_else(|| default_alias(&item.expr)));
    }
    let modifies = tree.modifies.clone();
    Ok(Operator::unary(OperatorKind::Results, modifies, tree))
}

// ---------------------------------------------------------------------
// UNWIND / CALL / FOREACH
// ---------------------------------------------------------------------

fn build_unwind(u: &UnwindClause, stream: Option<Operator>, bound: &mut BTreeSet<String>) -> Result<Operator, EngineError> {
    let base = stream.unwrap_or_else(empty_source);
    let expr = ArithmeticExpression::from_expr(&u.expr);
    bound.insert(u.alias.clone());
    let modifies = union_modifies(&base.modifies, &[u.alias.clone()]);
    Ok(Operator::unary(
        OperatorKind::Unwind(UnwindState { alias: u.alias.clone(), expr, items: None, pos: 0, source: None }),
        modifies,
        base,
    ))
}

fn build_call(
    c: &CallClause,
    stream: Option<Operator>,
    bound: &mut BTreeSet<String>,
    pctx: &mut PlanCtx,
) -> Result<Operator, EngineError> {
    let base = stream.unwrap_or_else(empty_source);
    let args = c.args.iter().map(ArithmeticExpression::from_expr).collect();
    let yield_items = match &c.yield_items {
        Some(items) => items.clone(),
        None => pctx
            .procedures
            .create(&c.name)
            .map(|p| p.columns().iter().map(|s| s.to_string()).collect())
            .unwrap_or_default(),
    };
    for y in &yield_items {
        bound.insert(y.clone());
    }
    let modifies = union_modifies(&base.modifies, &yield_items);
    Ok(Operator::unary(
        OperatorKind::ProcedureCall(ProcedureCallState {
            name: c.name.clone(),
            args,
            yield_items,
            rows: None,
            pos: 0,
            source: None,
        }),
        modifies,
        base,
    ))
}

fn build_call_subquery(
    q: &Query,
    stream: Option<Operator>,
    bound: &mut BTreeSet<String>,
    pctx: &mut PlanCtx,
) -> Result<Operator, EngineError> {
    let base = stream.unwrap_or_else(empty_source);
    let mut sub_bound = bound.clone();
    let mut sub_stream: Option<Operator> =
        Some(Operator::leaf(OperatorKind::Argument(ArgumentState::default()), base.modifies.clone()));
    for clause in &q.clauses {
        sub_stream = Some(build_clause(clause, sub_stream, &mut sub_bound, pctx)?);
    }
    let sub = sub_stream.unwrap_or_else(empty_source);
    for a in &sub.modifies {
        bound.insert(a.clone());
    }
    Ok(combine_apply(base, sub, ApplyKind::Apply))
}

/// The loop body is rooted at its own `Argument` leaf so the already-bound
/// outer row (plus the loop variable) replays into it once per list item,
/// the same way an `Apply` right-hand side does (`consume_foreach` seeds it
/// via `Operator::seed_argument`).
fn build_foreach(f: &ForeachClause, stream: Option<Operator>, pctx: &mut PlanCtx) -> Result<Operator, EngineError> {
    let base = stream.unwrap_or_else(empty_source);
    let list = ArithmeticExpression::from_expr(&f.list);
    let mut body_bound: BTreeSet<String> = base.modifies.iter().cloned().collect();
    body_bound.insert(f.var.clone());
    let mut body_stream: Option<Operator> =
        Some(Operator::leaf(OperatorKind::Argument(ArgumentState::default()), vec![f.var.clone()]));
    for clause in &f.clauses {
        body_stream = Some(build_clause(clause, body_stream, &mut body_bound, pctx)?);
    }
    let body = body_stream.unwrap_or_else(empty_source);
    let modifies = base.modifies.clone();
    Ok(Operator::unary(
        OperatorKind::Foreach(ForeachState { var: f.var.clone(), list, body: Box::new(body) }),
        modifies,
        base,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher_parser::parse;
    use crate::graph_store::GraphContext;

    fn build(cypher: &str) -> (Operator, Arc<RecordMap>) {
        let query = parse(cypher).unwrap();
        let graph = Arc::new(GraphContext::new("test"));
        PlanBuilder::build(&query, &graph).unwrap()
    }

    #[test]
    fn simple_match_return_ends_in_results() {
        let (plan, map) = build("MATCH (n:Person) RETURN n.name");
        assert!(matches!(plan.kind, OperatorKind::Results));
        assert!(map.slot_of("n").is_some());
        assert!(map.slot_of("n.name").is_some());
    }

    #[test]
    fn create_binds_new_alias() {
        let (plan, map) = build("CREATE (a:Person {name: 'Ada'})");
        assert!(map.slot_of("a").is_some());
        assert!(matches!(plan.kind, OperatorKind::Results));
        // The writer sits directly under the terminal Results wrapper.
        assert!(plan.children[0].is_writer());
    }

    #[test]
    fn where_exists_becomes_semi_apply() {
        let (plan, _map) =
            build("MATCH (a:Person) WHERE EXISTS { MATCH (a)-[:KNOWS]->(:Person) } RETURN a");
        fn contains_semi_apply(op: &Operator) -> bool {
            matches!(&op.kind, OperatorKind::Apply(s) if s.kind == ApplyKind::SemiApply)
                || op.children.iter().any(contains_semi_apply)
        }
        assert!(contains_semi_apply(&plan));
    }

    #[test]
    fn named_path_is_projected_with_topath() {
        let (plan, map) = build("MATCH p = (a)-[r:KNOWS]->(b) RETURN p");
        assert!(map.slot_of("p").is_some());
        fn contains_topath(op: &Operator) -> bool {
            if let OperatorKind::Project(s) = &op.kind {
                if s.items.iter().any(|(e, _)| matches!(e, ArithmeticExpression::Operation { name, .. } if name == "topath")) {
                    return true;
                }
            }
            op.children.iter().any(contains_topath)
        }
        assert!(contains_topath(&plan));
    }

    #[test]
    fn unwind_with_no_upstream_gets_argument_source() {
        let (plan, _map) = build("UNWIND [1, 2, 3] AS x RETURN x");
        fn finds_unwind(op: &Operator) -> bool {
            matches!(op.kind, OperatorKind::Unwind(_)) || op.children.iter().any(finds_unwind)
        }
        assert!(finds_unwind(&plan));
    }
}
