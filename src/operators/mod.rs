//! The physical operator tree (SPEC_FULL.md §4). Every operator kind is a
//! variant of [`OperatorKind`] carrying its own mutable execution state;
//! dispatch is a single `match` in [`Operator::consume`] rather than a
//! `dyn Operator` trait object tree — the original's `OpBase` vtable
//! (`init`/`consume`/`reset`/`clone`/`free` function pointers) becomes plain
//! Rust enum matching plus ordinary `Drop`.
//!
//! Children are owned directly (`Vec<Operator>`) rather than addressed by
//! arena index: every `consume` call only ever needs `&mut self` on one
//! operator and `&mut` on its owned children, which the borrow checker
//! already grants for free through disjoint field access, so there is no
//! need for the indirection an index arena would buy.

mod combine;
mod misc;
mod project;
mod scans;
mod traverse;
mod write_ops;

pub use combine::{ApplyKind, JoinKey};
pub use project::{AggregateItem, SortItem};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::arithmetic::ArithmeticExpression;
use crate::cypher_parser::ast::{Direction, SetItem};
use crate::errors::EngineError;
use crate::filter_tree::FilterNode;
use crate::graph_store::{AttributeId, Edge, EdgeId, GraphContext, LabelId, Node, NodeId, RelTypeId};
use crate::record::{Record, RecordMap};
use crate::value::Value;

/// Shared, read-mostly state every operator consults while pulling records:
/// the graph it runs against, query parameters, the record layout, and the
/// write transaction's staged-but-not-yet-committed changes.
pub struct ExecCtx {
    pub graph: Arc<GraphContext>,
    pub params: BTreeMap<String, Value>,
    pub record_map: Arc<RecordMap>,
    pub pending: RefCell<PendingChanges>,
    pub procedures: Arc<crate::procedures::ProcedureRegistry>,
}

impl ExecCtx {
    pub fn new(graph: Arc<GraphContext>, record_map: Arc<RecordMap>, params: BTreeMap<String, Value>) -> Self {
        ExecCtx {
            graph,
            params,
            record_map,
            pending: RefCell::new(PendingChanges::default()),
            procedures: crate::procedures::registry(),
        }
    }

    pub fn new_record(&self) -> Record {
        Record::new(self.record_map.clone())
    }
}

/// Resolves every `alias.key` property read an expression touches into a
/// `"alias.key"` record slot, reading the live attribute off the bound
/// node/edge. `ArithmeticExpression::evaluate` has no graph handle of its own
/// (SPEC_FULL.md §3.6 keeps it a pure record/params evaluator), so operators
/// that evaluate an expression containing a `Property` node call this first.
pub fn materialize_properties(ctx: &ExecCtx, rec: &mut Record, expr: &ArithmeticExpression) {
    match expr {
        ArithmeticExpression::Property { base, key } => {
            materialize_properties(ctx, rec, base);
            if let ArithmeticExpression::Variable(alias) = base.as_ref() {
                let slot = format!("{alias}.{key}");
                // A write operator earlier in this pull chain (`SET`) may already have
                // stashed the post-write value here; don't clobber it with the
                // pre-write value still sitting in the graph store until commit.
                if matches!(rec.get(&slot), Some(crate::record::Entry::Scalar(_))) {
                    return;
                }
                let value = match rec.get(alias) {
                    Some(crate::record::Entry::Node(id)) => ctx
                        .graph
                        .attribute_id(key)
                        .and_then(|attr| ctx.graph.get_node(*id).and_then(|n| n.attributes.get(&attr).cloned()))
                        .unwrap_or(Value::Null),
                    Some(crate::record::Entry::Edge(id)) => ctx
                        .graph
                        .attribute_id(key)
                        .and_then(|attr| ctx.graph.get_edge(*id).and_then(|e| e.attributes.get(&attr).cloned()))
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                };
                rec.set_scalar(&slot, value);
            }
        }
        ArithmeticExpression::Operation { name, args, .. } => {
            for arg in args {
                materialize_properties(ctx, rec, arg);
            }
            if let (true, [ArithmeticExpression::Variable(alias)]) =
                (matches!(name.as_str(), "labels" | "type" | "properties"), args.as_slice())
            {
                let value = match (name.as_str(), rec.get(alias)) {
                    ("labels", Some(crate::record::Entry::Node(id))) => ctx
                        .graph
                        .get_node(*id)
                        .map(|n| {
                            Value::List(
                                n.labels
                                    .iter()
                                    .filter_map(|l| ctx.graph.label_name(*l))
                                    .map(Value::Str)
                                    .collect(),
                            )
                        })
                        .unwrap_or(Value::Null),
                    ("type", Some(crate::record::Entry::Edge(id))) => ctx
                        .graph
                        .get_edge(*id)
                        .and_then(|e| ctx.graph.rel_type_name(e.rel_type))
                        .map(Value::Str)
                        .unwrap_or(Value::Null),
                    ("properties", Some(crate::record::Entry::Node(id))) => ctx
                        .graph
                        .get_node(*id)
                        .map(|n| attrs_to_map(ctx, &n.attributes))
                        .unwrap_or(Value::Null),
                    ("properties", Some(crate::record::Entry::Edge(id))) => ctx
                        .graph
                        .get_edge(*id)
                        .map(|e| attrs_to_map(ctx, &e.attributes))
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                };
                rec.set_scalar(&format!("{name}({alias})"), value);
            }
        }
        _ => {}
    }
}

fn attrs_to_map(ctx: &ExecCtx, attrs: &BTreeMap<AttributeId, Value>) -> Value {
    let mut map = BTreeMap::new();
    for (attr, value) in attrs {
        if let Some(name) = ctx.graph.attribute_name(*attr) {
            map.insert(name, value.clone());
        }
    }
    Value::Map(map)
}

/// Write-operator staging area. Mutations accumulate here during the pull
/// phase and are only applied to the graph under the commit lock, in the
/// order first reached (SPEC_FULL.md §9, decided: a `BTreeMap` standing in
/// for the original's "rax", giving deterministic last-write-wins replay).
#[derive(Default)]
pub struct PendingChanges {
    pub node_creates: Vec<(Vec<LabelId>, BTreeMap<AttributeId, Value>)>,
    pub edge_creates: Vec<(RelTypeId, NodeId, NodeId, BTreeMap<AttributeId, Value>)>,
    pub node_updates: BTreeMap<NodeId, BTreeMap<AttributeId, Value>>,
    pub edge_updates: BTreeMap<EdgeId, BTreeMap<AttributeId, Value>>,
    pub node_label_adds: BTreeMap<NodeId, Vec<LabelId>>,
    pub node_label_removes: BTreeMap<NodeId, Vec<LabelId>>,
    pub node_deletes: std::collections::BTreeSet<NodeId>,
    pub edge_deletes: std::collections::BTreeSet<EdgeId>,
    pub stats: CommitStats,
}

#[derive(Default, Debug, Clone, Copy)]
pub struct CommitStats {
    pub nodes_created: u64,
    pub edges_created: u64,
    pub nodes_deleted: u64,
    pub edges_deleted: u64,
    pub properties_set: u64,
    pub labels_added: u64,
}

impl PendingChanges {
    /// Applies every staged change to `graph`, under that graph's commit
    /// lock, and returns summary counters for `EXPLAIN`/CLI reporting.
    pub fn commit(self, graph: &GraphContext) -> CommitStats {
        let _guard = graph.begin_commit();
        let mut stats = self.stats;
        for (labels, attrs) in self.node_creates {
            stats.properties_set += attrs.len() as u64;
            stats.labels_added += labels.len() as u64;
            graph.add_node(&labels, attrs);
            stats.nodes_created += 1;
        }
        for (rel_type, src, dest, attrs) in self.edge_creates {
            stats.properties_set += attrs.len() as u64;
            graph.create_edge(rel_type, src, dest, attrs);
            stats.edges_created += 1;
        }
        for (node, attrs) in self.node_updates {
            for (attr, value) in attrs {
                graph.set_node_attribute(node, attr, value);
                stats.properties_set += 1;
            }
        }
        for (edge, attrs) in self.edge_updates {
            for (attr, value) in attrs {
                graph.set_edge_attribute(edge, attr, value);
                stats.properties_set += 1;
            }
        }
        for (node, labels) in self.node_label_adds {
            for label in labels {
                graph.add_node_label(node, label);
                stats.labels_added += 1;
            }
        }
        for (node, labels) in self.node_label_removes {
            for label in labels {
                graph.remove_node_label(node, label);
            }
        }
        for node in self.node_deletes {
            if graph.delete_node(node).is_some() {
                stats.nodes_deleted += 1;
            }
        }
        for edge in self.edge_deletes {
            if graph.delete_edge(edge).is_some() {
                stats.edges_deleted += 1;
            }
        }
        stats
    }
}

#[derive(Debug, Clone)]
pub struct NodePatternSpec {
    pub alias: String,
    pub labels: Vec<String>,
    pub properties: Vec<(String, ArithmeticExpression)>,
}

#[derive(Debug, Clone)]
pub struct EdgePatternSpec {
    pub alias: Option<String>,
    pub rel_type: String,
    pub direction: Direction,
    pub properties: Vec<(String, ArithmeticExpression)>,
}

#[derive(Debug, Clone)]
pub struct Operator {
    pub kind: OperatorKind,
    pub children: Vec<Operator>,
    /// Aliases this operator's subtree binds, used by the optimizer's filter
    /// placement pass.
    pub modifies: Vec<String>,
}

impl Operator {
    pub fn leaf(kind: OperatorKind, modifies: Vec<String>) -> Self {
        Operator { kind, children: Vec::new(), modifies }
    }

    pub fn unary(kind: OperatorKind, modifies: Vec<String>, child: Operator) -> Self {
        Operator { kind, children: vec![child], modifies }
    }

    pub fn binary(kind: OperatorKind, modifies: Vec<String>, lhs: Operator, rhs: Operator) -> Self {
        Operator { kind, children: vec![lhs, rhs], modifies }
    }

    pub fn is_writer(&self) -> bool {
        matches!(
            self.kind,
            OperatorKind::Create(_)
                | OperatorKind::Merge(_)
                | OperatorKind::Update(_)
                | OperatorKind::Delete(_)
                | OperatorKind::Foreach(_)
        ) || self.children.iter().any(Operator::is_writer)
    }

    pub fn reset(&mut self) {
        combine::reset(self);
        project::reset(self);
        write_ops::reset(self);
        misc::reset(self);
        for c in &mut self.children {
            c.reset();
        }
    }

    /// Seeds every `Argument` leaf in this subtree with the outer row it
    /// should replay. Used by the Apply family (SPEC_FULL.md §4.2.4) to
    /// thread an already-bound left-hand record into a right-hand sub-plan
    /// that is re-run once per left-hand row, without rescanning aliases the
    /// outer plan already resolved.
    pub fn seed_argument(&mut self, rec: &Record) {
        if let OperatorKind::Argument(s) = &mut self.kind {
            s.bound = Some(rec.clone());
            s.emitted = false;
        }
        for c in &mut self.children {
            c.seed_argument(rec);
        }
    }

    pub fn init(&mut self, ctx: &ExecCtx) -> Result<(), EngineError> {
        scans::init(self, ctx)?;
        for c in &mut self.children {
            c.init(ctx)?;
        }
        Ok(())
    }

    pub fn consume(&mut self, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
        match &mut self.kind {
            OperatorKind::AllNodeScan(_)
            | OperatorKind::LabelScan(_)
            | OperatorKind::LabelAndIdRangeScan(_)
            | OperatorKind::NodeByIdSeek(_)
            | OperatorKind::IndexScan(_)
            | OperatorKind::Argument(_) => scans::consume(self, ctx),

            OperatorKind::ConditionalTraverse(_)
            | OperatorKind::ConditionalVarLenTraverse(_)
            | OperatorKind::ExpandInto(_)
            | OperatorKind::ShortestPathTraverse(_) => traverse::consume(self, ctx),

            OperatorKind::CartesianProduct(_)
            | OperatorKind::ValueHashJoin(_)
            | OperatorKind::Union(_)
            | OperatorKind::Apply(_)
            | OperatorKind::ApplyMultiplexer(_)
            | OperatorKind::RollupApply(_) => combine::consume(self, ctx),

            OperatorKind::Filter(_) => project::consume_filter(self, ctx),
            OperatorKind::Project(_) => project::consume_project(self, ctx),
            OperatorKind::Aggregate(_) => project::consume_aggregate(self, ctx),
            OperatorKind::Distinct(_) => project::consume_distinct(self, ctx),
            OperatorKind::Sort(_) => project::consume_sort(self, ctx),
            OperatorKind::Skip(_) => project::consume_skip(self, ctx),
            OperatorKind::Limit(_) => project::consume_limit(self, ctx),
            OperatorKind::Results => project::consume_results(self, ctx),

            OperatorKind::Create(_)
            | OperatorKind::Merge(_)
            | OperatorKind::Update(_)
            | OperatorKind::Delete(_)
            | OperatorKind::Foreach(_) => write_ops::consume(self, ctx),

            OperatorKind::ProcedureCall(_) | OperatorKind::Unwind(_) => misc::consume(self, ctx),
        }
    }
}

/// Replays a single outer row once, unmodified. The leaf a right-hand
/// Apply sub-plan is rooted at when it needs to see aliases the left-hand
/// side already bound, rather than rescanning them (SPEC_FULL.md §4.3,
/// §4.5 pass 9 "Migrate Arguments").
#[derive(Debug, Clone, Default)]
pub struct ArgumentState {
    pub bound: Option<Record>,
    pub emitted: bool,
}

#[derive(Debug, Clone)]
pub struct AllNodeScanState {
    pub alias: String,
    pub next: u32,
}

#[derive(Debug, Clone)]
pub struct LabelScanState {
    pub alias: String,
    pub label: String,
    pub ids: Vec<NodeId>,
    pub pos: usize,
}

#[derive(Debug, Clone)]
pub struct LabelAndIdRangeState {
    pub alias: String,
    pub label: String,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub ids: Vec<NodeId>,
    pub pos: usize,
}

#[derive(Debug, Clone)]
pub struct NodeByIdSeekState {
    pub alias: String,
    pub id: i64,
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct IndexScanState {
    pub alias: String,
    pub label: String,
    pub attribute: String,
    pub op: crate::filter_tree::CompareOp,
    pub value: ArithmeticExpression,
    pub ids: Vec<NodeId>,
    pub pos: usize,
}

#[derive(Debug, Clone)]
pub struct ConditionalTraverseState {
    pub src_alias: String,
    pub dest_alias: String,
    pub edge_alias: Option<String>,
    pub rel_types: Vec<String>,
    pub direction: Direction,
    pub batch: Vec<Record>,
    pub batch_pos: usize,
    pub frontier: Vec<(NodeId, NodeId)>,
    pub frontier_pos: usize,
}

pub const TRAVERSE_BATCH_SIZE: usize = 16;

#[derive(Debug, Clone)]
pub struct ConditionalVarLenState {
    pub src_alias: String,
    pub dest_alias: String,
    pub edge_alias: Option<String>,
    pub rel_types: Vec<String>,
    pub direction: Direction,
    pub min_hops: u32,
    pub max_hops: Option<u32>,
    pub results: Vec<(NodeId, Vec<NodeId>)>,
    pub pos: usize,
    pub current_source: Option<Record>,
}

#[derive(Debug, Clone)]
pub struct ExpandIntoState {
    pub src_alias: String,
    pub dest_alias: String,
    pub edge_alias: Option<String>,
    pub rel_types: Vec<String>,
    pub direction: Direction,
}

#[derive(Debug, Clone)]
pub struct ShortestPathState {
    pub src_alias: String,
    pub dest_alias: String,
    pub path_alias: String,
    pub rel_types: Vec<String>,
    pub direction: Direction,
    pub all_paths: bool,
    pub emitted: bool,
    pub paths: Vec<(Vec<NodeId>, Vec<EdgeId>)>,
    pub pos: usize,
    pub current_source: Option<Record>,
}

#[derive(Debug, Clone, Default)]
pub struct CartesianProductState {
    pub lhs_buffer: Option<Vec<Record>>,
    pub lhs_pos: usize,
}

#[derive(Debug, Clone, Default)]
pub struct UnionState {
    pub on_rhs: bool,
}

#[derive(Debug, Clone)]
pub struct ValueHashJoinState {
    pub lhs_key: JoinKey,
    pub rhs_key: JoinKey,
    pub build: Option<std::collections::HashMap<crate::value::HashKey, Vec<Record>>>,
    pub probe_matches: Vec<Record>,
    pub probe_pos: usize,
    pub current_probe: Option<Record>,
}

#[derive(Debug, Clone)]
pub struct ApplyState {
    pub kind: ApplyKind,
    pub lhs_record: Option<Record>,
    pub rhs_produced: bool,
}

#[derive(Debug, Clone)]
pub struct ApplyMultiplexerState {
    pub or_semantics: bool,
    pub lhs_record: Option<Record>,
}

#[derive(Debug, Clone)]
pub struct RollupApplyState {
    pub alias: String,
    pub lhs_record: Option<Record>,
}

#[derive(Debug, Clone)]
pub struct FilterState {
    pub tree: FilterNode,
}

#[derive(Debug, Clone)]
pub struct ProjectState {
    pub items: Vec<(ArithmeticExpression, String)>,
    pub keep_existing: bool,
}

#[derive(Debug, Clone)]
pub struct AggregateState {
    pub keys: Vec<(ArithmeticExpression, String)>,
    pub aggregates: Vec<AggregateItem>,
    pub groups: Option<Vec<Record>>,
    pub pos: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DistinctState {
    pub seen: std::collections::HashSet<crate::value::HashKey>,
}

#[derive(Debug, Clone)]
pub struct SortState {
    pub items: Vec<SortItem>,
    pub buffer: Option<Vec<Record>>,
    pub pos: usize,
}

#[derive(Debug, Clone)]
pub struct SkipState {
    pub count: i64,
    pub skipped: i64,
}

#[derive(Debug, Clone)]
pub struct LimitState {
    pub count: i64,
    pub emitted: i64,
}

#[derive(Debug, Clone)]
pub struct CreateState {
    pub nodes: Vec<NodePatternSpec>,
    pub edges: Vec<(String, EdgePatternSpec, String)>,
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct MergeState {
    pub nodes: Vec<NodePatternSpec>,
    pub edges: Vec<(String, EdgePatternSpec, String)>,
    pub on_match: Vec<SetItem>,
    pub on_create: Vec<SetItem>,
    /// A scan/traverse sub-tree over the same pattern, re-run once per
    /// incoming record (seeded via `seed_argument` the way the Apply family
    /// threads an outer row into a sub-plan), used to check for an existing
    /// match before falling back to create.
    pub match_plan: Box<Operator>,
    pub done: bool,
    /// `true` while `match_plan` is being drained for the current outer row
    /// — every row it produces is emitted, not just the first.
    pub active: bool,
    /// Whether `match_plan` has produced at least one row for the current
    /// outer row; decides whether that row falls back to CREATE once
    /// `match_plan` is exhausted.
    pub matched_any: bool,
    /// The outer row `match_plan` is currently seeded with, kept around so
    /// the CREATE fallback starts from it rather than a fresh record.
    pub current_outer: Option<Record>,
}

#[derive(Debug, Clone)]
pub struct UpdateState {
    pub items: Vec<SetItem>,
    /// `REMOVE n:Label` pieces — no value to evaluate, so kept apart from
    /// the SET-shaped `items`.
    pub label_removes: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone)]
pub struct DeleteState {
    pub detach: bool,
    pub aliases: Vec<ArithmeticExpression>,
}

#[derive(Debug, Clone)]
pub struct ForeachState {
    pub var: String,
    pub list: ArithmeticExpression,
    pub body: Box<Operator>,
}

#[derive(Debug, Clone)]
pub struct ProcedureCallState {
    pub name: String,
    pub args: Vec<ArithmeticExpression>,
    pub yield_items: Vec<String>,
    pub rows: Option<Vec<Vec<Value>>>,
    pub pos: usize,
    pub source: Option<Record>,
}

#[derive(Debug, Clone)]
pub struct UnwindState {
    pub alias: String,
    pub expr: ArithmeticExpression,
    pub items: Option<Vec<Value>>,
    pub pos: usize,
    pub source: Option<Record>,
}

/// One variant per operator family in SPEC_FULL.md §4.2; each variant's
/// payload is the operator's mutable execution state.
#[derive(Debug, Clone)]
pub enum OperatorKind {
    Argument(ArgumentState),
    AllNodeScan(AllNodeScanState),
    LabelScan(LabelScanState),
    LabelAndIdRangeScan(LabelAndIdRangeState),
    NodeByIdSeek(NodeByIdSeekState),
    IndexScan(IndexScanState),

    ConditionalTraverse(ConditionalTraverseState),
    ConditionalVarLenTraverse(ConditionalVarLenState),
    ExpandInto(ExpandIntoState),
    ShortestPathTraverse(ShortestPathState),

    CartesianProduct(CartesianProductState),
    ValueHashJoin(ValueHashJoinState),
    Union(UnionState),
    Apply(ApplyState),
    ApplyMultiplexer(ApplyMultiplexerState),
    RollupApply(RollupApplyState),

    Filter(FilterState),
    Project(ProjectState),
    Aggregate(AggregateState),
    Distinct(DistinctState),
    Sort(SortState),
    Skip(SkipState),
    Limit(LimitState),
    Results,

    Create(CreateState),
    Merge(MergeState),
    Update(UpdateState),
    Delete(DeleteState),
    Foreach(ForeachState),

    ProcedureCall(ProcedureCallState),
    Unwind(UnwindState),
}
