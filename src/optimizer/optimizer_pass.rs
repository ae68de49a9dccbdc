//! The `OptimizerPass` trait every pass implements, plus the context a pass
//! consults (the graph it's planning against) and its error type. Ported
//! from the teacher's `query_planner::optimizer::optimizer_pass`; the
//! teacher's `optimizer::errors` module is declared but absent from the
//! example pack, so `OptimizerError` is defined fresh here.

use std::sync::Arc;
use thiserror::Error;

use crate::graph_store::GraphContext;
use crate::operators::Operator;

use super::Transformed;

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("optimizer pass '{pass}' could not place a filter: {detail}")]
    FilterPlacement { pass: &'static str, detail: String },
}

pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Read-only state a pass may need beyond the plan tree itself — currently
/// just the graph being queried, so "reduce count" can read its stored
/// cardinalities instead of counting rows.
pub struct OptCtx {
    pub graph: Arc<GraphContext>,
}

pub trait OptimizerPass {
    fn name(&self) -> &'static str;
    fn optimize(&self, plan: Operator, ctx: &mut OptCtx) -> OptimizerResult<Transformed<Operator>>;
}
