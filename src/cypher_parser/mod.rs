//! Cypher-subset parser.
//!
//! Out of scope per SPEC_FULL.md §1: this grammar only needs to be good
//! enough to drive the execution engine end-to-end in tests and the CLI, not
//! to be a complete or hardened OpenCypher implementation.

pub mod ast;
mod clauses;
mod common;
mod expression;
mod pattern;

pub use ast::Query;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse Cypher query at: {0:.80}")]
    Syntax(String),
    #[error("trailing input after query: {0:.80}")]
    TrailingInput(String),
}

#[cfg(test)]
pub fn expression_for_test(input: &str) -> ast::Expr {
    expression::parse_expression(input).expect("valid test expression").1
}

/// Parses a full Cypher query. Corresponds to the out-of-scope `ParseError`
/// kind in SPEC_FULL.md §7 — the engine only forwards these upward.
pub fn parse(input: &str) -> Result<Query, ParseError> {
    match clauses::parse_query(input) {
        Ok((rest, query)) => {
            let rest = rest.trim();
            if rest.is_empty() || rest == ";" {
                Ok(query)
            } else {
                Err(ParseError::TrailingInput(rest.to_string()))
            }
        }
        Err(e) => Err(ParseError::Syntax(e.to_string())),
    }
}
