//! `Session`: the entry points a collaborator (CLI, test harness, future
//! network-facing dispatcher) calls to run a query against a graph
//! (SPEC_FULL.md §6) — parse, build a plan, execute it, or render its shape
//! for `EXPLAIN`, without ever touching the operator tree directly.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cypher_parser;
use crate::errors::{EngineError, ErrorKind};
use crate::graph_store::GraphContext;
use crate::operators::{CommitStats, ExecCtx, Operator, OperatorKind};
use crate::optimizer;
use crate::plan::PlanBuilder;
use crate::record::RecordMap;
use crate::value::Value;

/// A built, not-yet-run plan plus the record layout its rows are shaped
/// against. Returned by [`Session::build_plan`]; consumed by
/// [`Session::execute`] / [`Session::explain`].
pub struct Plan {
    root: Operator,
    record_map: Arc<RecordMap>,
}

/// Everything `ExecutePlan` hands back: the projected rows plus the write
/// statistics committed once the plan finished draining (SPEC_FULL.md §6).
#[derive(Debug, Default, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub stats: CommitStats,
}

/// One graph to run Cypher against. Cheap to construct — the only state is
/// the `Arc<GraphContext>` handle; build a fresh `Session` per request, or
/// keep one per open graph, as the caller prefers.
pub struct Session {
    pub graph: Arc<GraphContext>,
}

impl Session {
    pub fn new(graph: Arc<GraphContext>) -> Self {
        Session { graph }
    }

    /// `BuildPlan(ast, graph_ctx) -> plan`: parses `text`, builds the
    /// operator tree, and runs it through every optimizer pass
    /// (SPEC_FULL.md §4.5).
    pub fn build_plan(&self, text: &str) -> Result<Plan, EngineError> {
        let query = cypher_parser::parse(text)?;
        let (root, record_map) = PlanBuilder::build(&query, &self.graph)?;
        let root = optimizer::optimize(root, self.graph.clone())
            .map_err(|e| EngineError::new(ErrorKind::InvalidFilterPlacement, e.to_string()))?;
        Ok(Plan { root, record_map })
    }

    /// `ExecutePlan(plan, result_set)`: drains `plan` to completion and
    /// commits whatever it staged. Output columns are the final operator's
    /// `modifies` list, which the plan builder keeps in `RETURN`/`WITH`
    /// item order (see `plan::build_projection`).
    pub fn execute(&self, plan: &mut Plan, params: BTreeMap<String, Value>) -> Result<QueryResult, EngineError> {
        let ctx = ExecCtx::new(self.graph.clone(), plan.record_map.clone(), params);
        plan.root.reset();
        plan.root.init(&ctx)?;
        let columns = plan.root.modifies.clone();
        let mut rows = Vec::new();
        while let Some(rec) = plan.root.consume(&ctx)? {
            rows.push(columns.iter().map(|c| rec.get_value(c)).collect());
        }
        let stats = ctx.pending.into_inner().commit(&self.graph);
        Ok(QueryResult { columns, rows, stats })
    }

    /// `ExplainPlan(plan) -> string tree`: a pre-order textual dump of the
    /// operator shape, one line per node indented by depth.
    pub fn explain(&self, plan: &Plan) -> String {
        let mut out = String::new();
        explain_node(&plan.root, 0, &mut out);
        out
    }

    /// Convenience wrapping parse -> build -> execute for the CLI and
    /// tests (SPEC_FULL.md §6 `Session::run`).
    pub fn run(&self, text: &str) -> Result<QueryResult, EngineError> {
        let mut plan = self.build_plan(text)?;
        self.execute(&mut plan, BTreeMap::new())
    }
}

fn explain_node(op: &Operator, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&operator_label(op));
    out.push('\n');
    for child in &op.children {
        explain_node(child, depth + 1, out);
    }
}

fn operator_label(op: &Operator) -> String {
    let cols = op.modifies.join(", ");
    match &op.kind {
        OperatorKind::Argument(_) => format!("Argument [{cols}]"),
        OperatorKind::AllNodeScan(s) => format!("AllNodeScan ({})", s.alias),
        OperatorKind::LabelScan(s) => format!("LabelScan ({}:{})", s.alias, s.label),
        OperatorKind::LabelAndIdRangeScan(s) => format!("LabelAndIdRangeScan ({}:{})", s.alias, s.label),
        OperatorKind::NodeByIdSeek(s) => format!("NodeByIdSeek ({}={})", s.alias, s.id),
        OperatorKind::IndexScan(s) => format!("IndexScan ({}:{}.{})", s.alias, s.label, s.attribute),
        OperatorKind::ConditionalTraverse(s) => {
            format!("ConditionalTraverse ({})-[{}]->({})", s.src_alias, s.rel_types.join("|"), s.dest_alias)
        }
        OperatorKind::ConditionalVarLenTraverse(s) => format!(
            "ConditionalVarLenTraverse ({})-[{}*{}..{}]->({})",
            s.src_alias,
            s.rel_types.join("|"),
            s.min_hops,
            s.max_hops.map(|m| m.to_string()).unwrap_or_default(),
            s.dest_alias
        ),
        OperatorKind::ExpandInto(s) => format!("ExpandInto ({})-[{}]->({})", s.src_alias, s.rel_types.join("|"), s.dest_alias),
        OperatorKind::ShortestPathTraverse(s) => format!("ShortestPath ({})->({})", s.src_alias, s.dest_alias),
        OperatorKind::CartesianProduct(_) => "CartesianProduct".to_string(),
        OperatorKind::ValueHashJoin(_) => "ValueHashJoin".to_string(),
        OperatorKind::Union(_) => "Union".to_string(),
        OperatorKind::Apply(s) => format!("Apply ({:?})", s.kind),
        OperatorKind::ApplyMultiplexer(_) => "ApplyMultiplexer".to_string(),
        OperatorKind::RollupApply(s) => format!("RollupApply ({})", s.alias),
        OperatorKind::Filter(_) => "Filter".to_string(),
        OperatorKind::Project(_) => format!("Project [{cols}]"),
        OperatorKind::Aggregate(_) => format!("Aggregate [{cols}]"),
        OperatorKind::Distinct(_) => "Distinct".to_string(),
        OperatorKind::Sort(_) => "Sort".to_string(),
        OperatorKind::Skip(s) => format!("Skip ({})", s.count),
        OperatorKind::Limit(s) => format!("Limit ({})", s.count),
        OperatorKind::Results => format!("Results [{cols}]"),
        OperatorKind::Create(_) => "Create".to_string(),
        OperatorKind::Merge(_) => "Merge".to_string(),
        OperatorKind::Update(_) => "Update".to_string(),
        OperatorKind::Delete(_) => "Delete".to_string(),
        OperatorKind::Foreach(s) => format!("Foreach ({})", s.var),
        OperatorKind::ProcedureCall(s) => format!("ProcedureCall ({})", s.name),
        OperatorKind::Unwind(s) => format!("Unwind ({})", s.alias),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_returns_projected_rows() {
        let graph = Arc::new(GraphContext::new("test"));
        graph.add_node(&[graph.get_or_create_label("Person")], {
            let mut m = BTreeMap::new();
            m.insert(graph.get_or_create_attribute("name"), Value::Str("Ann".into()));
            m
        });
        let session = Session::new(graph);
        let result = session.run("MATCH (n:Person) RETURN n.name AS name").unwrap();
        assert_eq!(result.columns, vec!["name".to_string()]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], Value::Str("Ann".into()));
    }

    #[test]
    fn create_commits_a_node_and_reports_stats() {
        let graph = Arc::new(GraphContext::new("test"));
        let session = Session::new(graph);
        let result = session.run("CREATE (n:Person {name: 'Bo'})").unwrap();
        assert_eq!(result.stats.nodes_created, 1);
        assert_eq!(result.stats.properties_set, 1);
    }

    #[test]
    fn explain_renders_a_pre_order_tree() {
        let graph = Arc::new(GraphContext::new("test"));
        let session = Session::new(graph);
        let plan = session.build_plan("MATCH (n:Person) RETURN n").unwrap();
        let text = session.explain(&plan);
        assert!(text.starts_with("Results"));
        assert!(text.contains("LabelScan"));
    }
}
