//! Pass 9: fold a `CartesianProduct` whose one side is a bare `Argument`
//! leaf re-asserting aliases the other side already provides back down to
//! just that other side (SPEC_FULL.md §4.5 #9).
//!
//! This arises when a later clause repeats a pattern made entirely of
//! already-bound aliases (`MATCH (a) WITH a MATCH (a) RETURN a`) — the
//! second `MATCH` resolves to nothing but an `Argument` replay of `a`, and
//! `combine_cartesian` stitches it onto the prior stream even though it
//! contributes no new rows or columns. The plan builder already avoids
//! emitting a real scan for a bound alias (`scan_for_node` returns an
//! `Argument` leaf directly), so unlike the teacher's SQL-table-scan
//! version of this pass there is no scan operator left to delete — only
//! the now-pointless `CartesianProduct` wrapper.

use std::collections::BTreeSet;

use crate::operators::{Operator, OperatorKind};

use super::optimizer_pass::{OptCtx, OptimizerPass, OptimizerResult};
use super::Transformed;

pub struct MigrateArguments;

impl OptimizerPass for MigrateArguments {
    fn name(&self) -> &'static str {
        "migrate_arguments"
    }

    fn optimize(&self, plan: Operator, _ctx: &mut OptCtx) -> OptimizerResult<Transformed<Operator>> {
        let mut changed = false;
        let plan = rewrite(plan, &mut changed);
        Ok(if changed { Transformed::Yes(plan) } else { Transformed::No(plan) })
    }
}

fn is_bare_argument(op: &Operator) -> bool {
    matches!(op.kind, OperatorKind::Argument(_)) && op.children.is_empty()
}

fn rewrite(mut op: Operator, changed: &mut bool) -> Operator {
    op.children = op.children.into_iter().map(|c| rewrite(c, changed)).collect();
    let OperatorKind::CartesianProduct(_) = &op.kind else { return op };
    if op.children.len() != 2 {
        return op;
    }

    let (lhs_bare, rhs_bare) = (is_bare_argument(&op.children[0]), is_bare_argument(&op.children[1]));
    let keep_idx = if rhs_bare && subset(&op.children[1].modifies, &op.children[0].modifies) {
        Some(0)
    } else if lhs_bare && subset(&op.children[0].modifies, &op.children[1].modifies) {
        Some(1)
    } else {
        None
    };

    match keep_idx {
        Some(idx) => {
            *changed = true;
            op.children.into_iter().nth(idx).expect("checked above: exactly 2 children")
        }
        None => op,
    }
}

fn subset(needle: &[String], haystack: &[String]) -> bool {
    let haystack: BTreeSet<&String> = haystack.iter().collect();
    needle.iter().all(|a| haystack.contains(a))
}
