//! Pass "utilize indices" / "scan selection" (SPEC_FULL.md §4.5): rewrites a
//! `Filter` sitting directly over a bare node scan into the narrower scan
//! operator the predicate shape actually allows — `NodeByIdSeek`/
//! `LabelAndIdRangeScan` for an `id(n)` predicate, `IndexScan` for a
//! `n.attr OP value` predicate over a labeled scan. Grounded on the
//! teacher's `query_planner::optimizer::utilize_indices` pass, which does
//! the same label/predicate inspection to swap a full scan for an index
//! lookup; here the "index" is the attribute-filtered linear pass
//! `operators::scans::filter_by_attribute` already implements.
//!
//! Only fires when the filter's *entire* tree reduces to id/attribute
//! bounds on the scanned alias — a conjunct mixing an id predicate with an
//! unrelated one is left as a generic `Filter` over the scan, since folding
//! it would silently drop the other half of the condition.

use crate::arithmetic::ArithmeticExpression;
use crate::filter_tree::{CompareOp, FilterNode};
use crate::operators::{
    AllNodeScanState, IndexScanState, LabelAndIdRangeState, LabelScanState, NodeByIdSeekState, Operator, OperatorKind,
};
use crate::value::Value;

use super::optimizer_pass::{OptCtx, OptimizerPass, OptimizerResult};
use super::Transformed;

pub struct ScanSelection;

impl OptimizerPass for ScanSelection {
    fn name(&self) -> &'static str {
        "scan_selection"
    }

    fn optimize(&self, plan: Operator, _ctx: &mut OptCtx) -> OptimizerResult<Transformed<Operator>> {
        let mut changed = false;
        let plan = rewrite(plan, &mut changed);
        Ok(if changed { Transformed::Yes(plan) } else { Transformed::No(plan) })
    }
}

fn rewrite(mut op: Operator, changed: &mut bool) -> Operator {
    op.children = op.children.into_iter().map(|c| rewrite(c, changed)).collect();

    let OperatorKind::Filter(state) = &op.kind else { return op };
    if op.children.len() != 1 {
        return op;
    }
    let scan = &op.children[0];
    if !scan.children.is_empty() {
        return op;
    }

    let rewritten = match &scan.kind {
        OperatorKind::AllNodeScan(AllNodeScanState { alias, .. }) => id_bounds(&state.tree, alias).and_then(|(min, max)| {
            match (min, max) {
                (Some(id), Some(m)) if id == m => Some(Operator::leaf(
                    OperatorKind::NodeByIdSeek(NodeByIdSeekState { alias: alias.clone(), id, done: false }),
                    op.modifies.clone(),
                )),
                _ => None,
            }
        }),
        OperatorKind::LabelScan(LabelScanState { alias, label, .. }) => {
            if let Some((min, max)) = id_bounds(&state.tree, alias) {
                Some(Operator::leaf(
                    OperatorKind::LabelAndIdRangeScan(LabelAndIdRangeState {
                        alias: alias.clone(),
                        label: label.clone(),
                        min,
                        max,
                        ids: Vec::new(),
                        pos: 0,
                    }),
                    op.modifies.clone(),
                ))
            } else {
                attribute_predicate(&state.tree, alias).map(|(attribute, cmp_op, value)| {
                    Operator::leaf(
                        OperatorKind::IndexScan(IndexScanState {
                            alias: alias.clone(),
                            label: label.clone(),
                            attribute,
                            op: cmp_op,
                            value,
                            ids: Vec::new(),
                            pos: 0,
                        }),
                        op.modifies.clone(),
                    )
                })
            }
        }
        _ => None,
    };

    match rewritten {
        Some(new_op) => {
            *changed = true;
            new_op
        }
        None => op,
    }
}

/// Reads every `id(alias) <op> K` conjunct out of `tree`, folding them into
/// an inclusive `(min, max)` bound. Returns `None` if any conjunct isn't an
/// id-bound on `alias` — the caller must not apply a range/seek rewrite
/// when part of the original condition would be lost.
fn id_bounds(tree: &FilterNode, alias: &str) -> Option<(Option<i64>, Option<i64>)> {
    let mut min = None;
    let mut max = None;
    if !collect_id_bounds(tree, alias, &mut min, &mut max) {
        return None;
    }
    if min.is_none() && max.is_none() {
        return None;
    }
    Some((min, max))
}

fn collect_id_bounds(tree: &FilterNode, alias: &str, min: &mut Option<i64>, max: &mut Option<i64>) -> bool {
    match tree {
        FilterNode::And(l, r) => collect_id_bounds(l, alias, min, max) && collect_id_bounds(r, alias, min, max),
        FilterNode::Predicate { op, lhs, rhs } => {
            let Some(k) = id_predicate(lhs, alias, rhs).or_else(|| id_predicate(rhs, alias, lhs)) else {
                return false;
            };
            match op {
                CompareOp::Eq => {
                    *min = Some(k);
                    *max = Some(k);
                    true
                }
                CompareOp::Ge | CompareOp::Gt => {
                    *min = Some(if *op == CompareOp::Gt { k + 1 } else { k });
                    true
                }
                CompareOp::Le | CompareOp::Lt => {
                    *max = Some(if *op == CompareOp::Lt { k - 1 } else { k });
                    true
                }
                _ => false,
            }
        }
        _ => false,
    }
}

/// `id(alias)` on one side of a comparison, with the other side a constant
/// integer — returns that integer.
fn id_predicate(candidate: &ArithmeticExpression, alias: &str, other: &ArithmeticExpression) -> Option<i64> {
    let ArithmeticExpression::Operation { name, args, .. } = candidate else { return None };
    if name != "id" || args.len() != 1 {
        return None;
    }
    let ArithmeticExpression::Variable(v) = &args[0] else { return None };
    if v != alias {
        return None;
    }
    match other {
        ArithmeticExpression::Constant(Value::Integer(i)) => Some(*i),
        _ => None,
    }
}

/// A bare `alias.attribute <op> <constant>` predicate, the whole filter
/// tree and nothing else.
fn attribute_predicate(tree: &FilterNode, alias: &str) -> Option<(String, CompareOp, ArithmeticExpression)> {
    let FilterNode::Predicate { op, lhs, rhs } = tree else { return None };
    if let Some(attr) = property_of(lhs, alias) {
        if matches!(rhs, ArithmeticExpression::Constant(_)) {
            return Some((attr, *op, rhs.clone()));
        }
    }
    None
}

fn property_of(expr: &ArithmeticExpression, alias: &str) -> Option<String> {
    match expr {
        ArithmeticExpression::Property { base, key } => match base.as_ref() {
            ArithmeticExpression::Variable(v) if v == alias => Some(key.clone()),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_store::GraphContext;
    use std::sync::Arc;

    fn build(query: &str) -> Operator {
        let parsed = crate::cypher_parser::parse(query).unwrap();
        let graph = Arc::new(GraphContext::new("test"));
        let (plan, _) = crate::plan::PlanBuilder::build(&parsed, &graph).unwrap();
        plan
    }

    fn find<'a>(op: &'a Operator, pred: impl Fn(&OperatorKind) -> bool + Copy) -> Option<&'a Operator> {
        if pred(&op.kind) {
            return Some(op);
        }
        op.children.iter().find_map(|c| find(c, pred))
    }

    #[test]
    fn id_equality_over_all_node_scan_becomes_seek() {
        let graph = Arc::new(GraphContext::new("test"));
        let plan = build("MATCH (n) WHERE id(n) = 3 RETURN n");
        let mut ctx = OptCtx { graph };
        let out = ScanSelection.optimize(plan, &mut ctx).unwrap().get_plan();
        assert!(find(&out, |k| matches!(k, OperatorKind::NodeByIdSeek(_))).is_some());
    }

    #[test]
    fn attribute_equality_over_label_scan_becomes_index_scan() {
        let graph = Arc::new(GraphContext::new("test"));
        let plan = build("MATCH (n:Person) WHERE n.age = 30 RETURN n");
        let mut ctx = OptCtx { graph };
        let out = ScanSelection.optimize(plan, &mut ctx).unwrap().get_plan();
        assert!(find(&out, |k| matches!(k, OperatorKind::IndexScan(_))).is_some());
    }

    #[test]
    fn mixed_conjunct_is_left_alone() {
        let graph = Arc::new(GraphContext::new("test"));
        let plan = build("MATCH (n:Person) WHERE id(n) > 0 AND n.age = 30 RETURN n");
        let mut ctx = OptCtx { graph };
        let out = ScanSelection.optimize(plan, &mut ctx).unwrap().get_plan();
        assert!(find(&out, |k| matches!(k, OperatorKind::IndexScan(_) | OperatorKind::LabelAndIdRangeScan(_))).is_none());
    }
}
