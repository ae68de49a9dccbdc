//! Pass 1: fold a `Filter` directly above another `Filter` into one
//! conjunction (SPEC_FULL.md §4.5 #1). The plan builder already combines a
//! clause's own conjuncts into a single `Filter`, but stacked clauses (a
//! pattern's inline property filter immediately under a `WHERE`, or a
//! `WHERE EXISTS{}` rewrite's leftover conjuncts) can still leave two
//! `Filter` nodes back to back.

use crate::operators::{FilterState, Operator, OperatorKind};

use super::optimizer_pass::{OptCtx, OptimizerPass, OptimizerResult};
use super::Transformed;

pub struct CompactFilters;

impl OptimizerPass for CompactFilters {
    fn name(&self) -> &'static str {
        "compact_filters"
    }

    fn optimize(&self, plan: Operator, _ctx: &mut OptCtx) -> OptimizerResult<Transformed<Operator>> {
        let mut changed = false;
        let plan = rewrite(plan, &mut changed);
        Ok(if changed { Transformed::Yes(plan) } else { Transformed::No(plan) })
    }
}

fn rewrite(mut op: Operator, changed: &mut bool) -> Operator {
    op.children = op.children.into_iter().map(|c| rewrite(c, changed)).collect();
    loop {
        let OperatorKind::Filter(_) = &op.kind else { return op };
        let OperatorKind::Filter(_) = &op.children[0].kind else { return op };
        let OperatorKind::Filter(outer) = op.kind else { unreachable!() };
        let mut grandchild = op.children.into_iter().next().unwrap();
        let OperatorKind::Filter(inner) = std::mem::replace(&mut grandchild.kind, OperatorKind::Results) else {
            unreachable!()
        };
        op = Operator::unary(
            OperatorKind::Filter(FilterState { tree: inner.tree.and(outer.tree) }),
            grandchild.modifies.clone(),
            grandchild.children.into_iter().next().unwrap(),
        );
        *changed = true;
    }
}
