//! Pass 3: decompose a `Filter`'s conjunction and sink each conjunct to just
//! below the first (deepest) operator that resolves every alias it reads,
//! instead of leaving it sitting wherever the plan builder happened to
//! attach the clause's `WHERE` (SPEC_FULL.md §4.5 #3).
//!
//! Pushing a conjunct into one side of a `CartesianProduct`/`Apply` is sound
//! whenever that side alone already provides every alias it needs — doing
//! so only discards rows earlier, which never changes the final row set.
//! `Skip`/`Limit` are the one shape this does not push through: they are
//! positional, so filtering before them can change which rows survive.

use std::collections::BTreeSet;

use crate::filter_tree::FilterNode;
use crate::operators::{FilterState, Operator, OperatorKind};

use super::optimizer_pass::{OptCtx, OptimizerPass, OptimizerResult};
use super::Transformed;

pub struct FilterPlacement;

impl OptimizerPass for FilterPlacement {
    fn name(&self) -> &'static str {
        "filter_placement"
    }

    fn optimize(&self, plan: Operator, _ctx: &mut OptCtx) -> OptimizerResult<Transformed<Operator>> {
        let mut changed = false;
        let plan = rewrite(plan, &mut changed);
        Ok(if changed { Transformed::Yes(plan) } else { Transformed::No(plan) })
    }
}

fn rewrite(mut op: Operator, changed: &mut bool) -> Operator {
    op.children = op.children.into_iter().map(|c| rewrite(c, changed)).collect();
    let OperatorKind::Filter(_) = &op.kind else { return op };
    let OperatorKind::Filter(state) = op.kind else { unreachable!() };
    let child = op.children.into_iter().next().expect("Filter always has exactly one child");

    let mut tree = child;
    for conjunct in state.tree.sub_trees() {
        let needed = conjunct.collect_modified();
        let (next, sunk) = sink(tree, conjunct, &needed);
        tree = next;
        *changed |= sunk;
    }
    tree
}

/// Pushes one conjunct as far down `op` as `needed` allows. Returns the
/// rebuilt tree and whether the conjunct ended up strictly below `op`
/// (i.e. this call actually moved something, as opposed to wrapping `op`
/// right back where the original `Filter` stood).
fn sink(mut op: Operator, conjunct: FilterNode, needed: &BTreeSet<String>) -> (Operator, bool) {
    let blocks_sinking = matches!(op.kind, OperatorKind::Skip(_) | OperatorKind::Limit(_));
    let is_two_stream = matches!(op.kind, OperatorKind::CartesianProduct(_) | OperatorKind::Apply(_))
        && op.children.len() == 2;

    if !blocks_sinking && is_two_stream {
        for side in 0..2 {
            let side_modifies: BTreeSet<String> = op.children[side].modifies.iter().cloned().collect();
            if needed.is_subset(&side_modifies) {
                let placeholder = Operator::leaf(OperatorKind::Results, Vec::new());
                let branch = std::mem::replace(&mut op.children[side], placeholder);
                let (new_branch, _) = sink(branch, conjunct, needed);
                op.children[side] = new_branch;
                return (op, true);
            }
        }
    } else if !blocks_sinking && op.children.len() == 1 {
        let child_modifies: BTreeSet<String> = op.children[0].modifies.iter().cloned().collect();
        if needed.is_subset(&child_modifies) {
            let placeholder = Operator::leaf(OperatorKind::Results, Vec::new());
            let child = std::mem::replace(&mut op.children[0], placeholder);
            let (new_child, _) = sink(child, conjunct, needed);
            op.children[0] = new_child;
            return (op, true);
        }
    }

    let modifies = op.modifies.clone();
    (Operator::unary(OperatorKind::Filter(FilterState { tree: conjunct }), modifies, op), false)
}
