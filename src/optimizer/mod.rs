//! Plan optimizer: a fixed sequence of rewrite passes run over the operator
//! tree the plan builder produced (SPEC_FULL.md §4.5). Grounded on the
//! teacher's `query_planner::optimizer` driver (`initial_optimization` /
//! `final_optimization`), its `OptimizerPass` trait, and its `Transformed<T>`
//! marker used to fixed-point passes that can fire more than once.
//!
//! SPEC_FULL.md §4.5 lists twelve passes. Six are implemented here as real
//! rewrites over the operator tree: compact filters, reduce count, scan
//! selection (utilize indices), filter placement, migrate arguments, reduce
//! distinct. Three more are not separate passes in this engine: the plan
//! builder (`plan::PlanBuilder`) already produces their output directly
//! while it walks the query graph (bound-alias `Argument` substitution up
//! front, Semi/AntiSemiApply/ApplyMultiplexer for `WHERE EXISTS{}` at the
//! point the filter is built, `topath` projected straight into a named
//! path's slot). DESIGN.md records this as a deliberate timing difference
//! from the spec's pass-numbered placement, not a missing feature — the
//! resulting tree shape is the same either way.
//!
//! The remaining three — reduce scans, traversal ordering, reduce cartesian
//! product — are genuinely unimplemented: the plan builder always walks a
//! connected component node-by-node in pattern order and joins disjoint
//! components left-to-right, so a query with several viable scan orders or
//! several cartesian-joinable components doesn't get cost-based reordering.
//! DESIGN.md tracks this as a real gap, not a relocated pass.

pub mod compact_filters;
pub mod filter_placement;
pub mod migrate_arguments;
pub mod optimizer_pass;
pub mod reduce_count;
pub mod reduce_distinct;
pub mod scan_selection;
pub mod transformed;

use std::sync::Arc;

pub use optimizer_pass::{OptCtx, OptimizerError, OptimizerPass, OptimizerResult};
pub use transformed::Transformed;

use crate::graph_store::GraphContext;
use crate::operators::Operator;

/// Filter placement can move a conjunct past more than one operator in a
/// single call already (`sink` recurses to the deepest valid point), so in
/// practice one round always reaches its fixed point; the cap just bounds
/// the loop against a future change to that pass.
const MAX_FILTER_PLACEMENT_ROUNDS: usize = 8;

/// Runs every implemented pass once, in the fixed order SPEC_FULL.md §4.5
/// lists them, and returns the rewritten tree.
pub fn optimize(plan: Operator, graph: Arc<GraphContext>) -> OptimizerResult<Operator> {
    let mut ctx = OptCtx { graph };
    log::debug!("running optimizer passes");

    let mut plan = compact_filters::CompactFilters.optimize(plan, &mut ctx)?.get_plan();
    plan = reduce_count::ReduceCount.optimize(plan, &mut ctx)?.get_plan();

    for _ in 0..MAX_FILTER_PLACEMENT_ROUNDS {
        let transformed = filter_placement::FilterPlacement.optimize(plan, &mut ctx)?;
        let progressed = transformed.is_yes();
        plan = transformed.get_plan();
        if !progressed {
            break;
        }
    }

    plan = scan_selection::ScanSelection.optimize(plan, &mut ctx)?.get_plan();
    plan = migrate_arguments::MigrateArguments.optimize(plan, &mut ctx)?.get_plan();
    plan = reduce_distinct::ReduceDistinct.optimize(plan, &mut ctx)?.get_plan();

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_store::GraphContext;

    fn build(query: &str) -> Operator {
        let parsed = crate::cypher_parser::parse(query).unwrap();
        let graph = Arc::new(GraphContext::new("test"));
        let (plan, _) = crate::plan::PlanBuilder::build(&parsed, &graph).unwrap();
        plan
    }

    #[test]
    fn count_star_over_bare_scan_becomes_a_constant_project() {
        let graph = Arc::new(GraphContext::new("test"));
        let plan = build("MATCH (n) RETURN count(*) AS c");
        let optimized = optimize(plan, graph).unwrap();
        // `Results` wraps the final projection.
        assert!(matches!(optimized.kind, crate::operators::OperatorKind::Results));
        assert!(matches!(optimized.children[0].kind, crate::operators::OperatorKind::Project(_)));
    }

    #[test]
    fn count_star_over_filtered_scan_is_left_alone() {
        let graph = Arc::new(GraphContext::new("test"));
        let plan = build("MATCH (n:Person) WHERE n.age > 30 RETURN count(*) AS c");
        let optimized = optimize(plan, graph).unwrap();
        let agg = &optimized.children[0];
        assert!(matches!(agg.kind, crate::operators::OperatorKind::Aggregate(_)));
    }

    #[test]
    fn adjacent_filters_compact_into_one() {
        let graph = Arc::new(GraphContext::new("test"));
        let plan = build("MATCH (n:Person {name: 'Ann'}) WHERE n.age > 30 RETURN n");
        let optimized = optimize(plan, graph).unwrap();
        fn count_filters(op: &Operator) -> usize {
            let here = matches!(op.kind, crate::operators::OperatorKind::Filter(_)) as usize;
            here + op.children.iter().map(count_filters).sum::<usize>()
        }
        // One filter for the label-scope label check plus one for the
        // property/age conjunction, both already adjacent to the scan —
        // compaction should leave at most the conjuncts that can't share
        // an operator (label-membership vs. inline-property vs. WHERE all
        // fold into as few `Filter` nodes as the tree shape allows).
        assert!(count_filters(&optimized) <= 2);
    }
}
