//! Pass 11: an `Aggregate` already emits one row per distinct grouping key,
//! so a `Distinct` sitting directly above one never removes anything —
//! drop it (SPEC_FULL.md §4.5 #11).

use crate::operators::{Operator, OperatorKind};

use super::optimizer_pass::{OptCtx, OptimizerPass, OptimizerResult};
use super::Transformed;

pub struct ReduceDistinct;

impl OptimizerPass for ReduceDistinct {
    fn name(&self) -> &'static str {
        "reduce_distinct"
    }

    fn optimize(&self, plan: Operator, _ctx: &mut OptCtx) -> OptimizerResult<Transformed<Operator>> {
        let mut changed = false;
        let plan = rewrite(plan, &mut changed);
        Ok(if changed { Transformed::Yes(plan) } else { Transformed::No(plan) })
    }
}

fn rewrite(mut op: Operator, changed: &mut bool) -> Operator {
    op.children = op.children.into_iter().map(|c| rewrite(c, changed)).collect();
    let OperatorKind::Distinct(_) = &op.kind else { return op };
    if matches!(op.children[0].kind, OperatorKind::Aggregate(_)) {
        *changed = true;
        return op.children.into_iter().next().expect("Distinct always has one child");
    }
    op
}
