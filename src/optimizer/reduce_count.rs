//! Pass 2: `RETURN count(*)` (no grouping keys, no filter) over a bare
//! all-node scan doesn't need to stream a single row — the graph already
//! tracks its own node count (SPEC_FULL.md §4.5 #2).

use crate::arithmetic::ArithmeticExpression;
use crate::operators::{AggregateState, Operator, OperatorKind, ProjectState};
use crate::value::Value;

use super::optimizer_pass::{OptCtx, OptimizerPass, OptimizerResult};
use super::Transformed;

pub struct ReduceCount;

impl OptimizerPass for ReduceCount {
    fn name(&self) -> &'static str {
        "reduce_count"
    }

    fn optimize(&self, plan: Operator, ctx: &mut OptCtx) -> OptimizerResult<Transformed<Operator>> {
        let mut changed = false;
        let plan = rewrite(plan, ctx, &mut changed);
        Ok(if changed { Transformed::Yes(plan) } else { Transformed::No(plan) })
    }
}

fn rewrite(mut op: Operator, ctx: &mut OptCtx, changed: &mut bool) -> Operator {
    op.children = op.children.into_iter().map(|c| rewrite(c, ctx, changed)).collect();
    let OperatorKind::Aggregate(state) = &op.kind else { return op };
    if !is_bare_count_star(state) {
        return op;
    }
    let Some(n) = bare_scan_cardinality(&op.children[0], ctx) else { return op };

    let alias = state.aggregates[0].alias.clone();
    let modifies = op.modifies.clone();
    *changed = true;
    Operator::leaf(
        OperatorKind::Project(ProjectState {
            items: vec![(ArithmeticExpression::Constant(Value::Integer(n as i64)), alias)],
            keep_existing: false,
        }),
        modifies,
    )
}

/// `count(*)` with no grouping keys and no row-shaping ancestor in between —
/// the whole graph's node (or edge) count answers it directly.
fn is_bare_count_star(state: &AggregateState) -> bool {
    state.keys.is_empty()
        && state.aggregates.len() == 1
        && state.aggregates[0].func == "count"
        && !state.aggregates[0].distinct
        && matches!(&state.aggregates[0].expr, ArithmeticExpression::Variable(v) if v == "*")
}

/// An unfiltered `AllNodeScan` with no upstream of its own — any `Filter`,
/// `LabelScan`, or traversal between the scan and the count means some rows
/// are excluded, so the stored total no longer answers the query. There is
/// no standalone all-edge scan operator (edges only ever arrive through a
/// traversal), so this pass only ever fires for node counts.
fn bare_scan_cardinality(child: &Operator, ctx: &OptCtx) -> Option<u64> {
    match &child.kind {
        OperatorKind::AllNodeScan(_) if child.children.is_empty() => Some(ctx.graph.node_count() as u64),
        _ => None,
    }
}
