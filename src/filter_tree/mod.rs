//! Filter tree: the boolean-condition representation shared by `WHERE`
//! clauses, filter placement, and index-selection (SPEC_FULL.md §3.5).
//!
//! Grounded on the original's `FT_FilterNode` (a tagged union of `AND`/`OR`/
//! `NOT`/predicate leaf nodes) and on the teacher's `expression_parser`/
//! `filter_parser` modules for how a parsed boolean expression gets folded
//! into a tree the optimizer can push down and split apart.

use std::collections::BTreeSet;

use crate::arithmetic::ArithmeticExpression;
use crate::cypher_parser::ast::{BinOp, Expr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    In,
    StartsWith,
    EndsWith,
    Contains,
}

#[derive(Debug, Clone)]
pub enum FilterNode {
    And(Box<FilterNode>, Box<FilterNode>),
    Or(Box<FilterNode>, Box<FilterNode>),
    Xor(Box<FilterNode>, Box<FilterNode>),
    Not(Box<FilterNode>),
    /// A leaf boolean predicate: `lhs <op> rhs`.
    Predicate { op: CompareOp, lhs: ArithmeticExpression, rhs: ArithmeticExpression },
    /// A leaf that is itself an arbitrary arithmetic/boolean expression,
    /// e.g. a bare function call used as a predicate (`exists(n.age)`).
    Expression(ArithmeticExpression),
}

impl FilterNode {
    pub fn from_expr(expr: &Expr) -> Self {
        match expr {
            Expr::BinaryOp { op: BinOp::And, lhs, rhs } => {
                FilterNode::And(Box::new(Self::from_expr(lhs)), Box::new(Self::from_expr(rhs)))
            }
            Expr::BinaryOp { op: BinOp::Or, lhs, rhs } => {
                FilterNode::Or(Box::new(Self::from_expr(lhs)), Box::new(Self::from_expr(rhs)))
            }
            Expr::BinaryOp { op: BinOp::Xor, lhs, rhs } => {
                FilterNode::Xor(Box::new(Self::from_expr(lhs)), Box::new(Self::from_expr(rhs)))
            }
            Expr::Not(inner) => FilterNode::Not(Box::new(Self::from_expr(inner))),
            Expr::BinaryOp { op, lhs, rhs } => {
                if let Some(cmp) = compare_op(*op) {
                    FilterNode::Predicate {
                        op: cmp,
                        lhs: ArithmeticExpression::from_expr(lhs),
                        rhs: ArithmeticExpression::from_expr(rhs),
                    }
                } else {
                    FilterNode::Expression(ArithmeticExpression::from_expr(expr))
                }
            }
            other => FilterNode::Expression(ArithmeticExpression::from_expr(other)),
        }
    }

    /// Aliases referenced anywhere under this node, recursively — used for
    /// filter placement regardless of how the tree is later split apart.
    pub fn collect_modified(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_modified_into(&mut out);
        out
    }

    fn collect_modified_into(&self, out: &mut BTreeSet<String>) {
        match self {
            FilterNode::And(l, r) | FilterNode::Or(l, r) | FilterNode::Xor(l, r) => {
                l.collect_modified_into(out);
                r.collect_modified_into(out);
            }
            FilterNode::Not(inner) => inner.collect_modified_into(out),
            FilterNode::Predicate { lhs, rhs, .. } => {
                lhs.collect_aliases_into(out);
                rhs.collect_aliases_into(out);
            }
            FilterNode::Expression(e) => e.collect_aliases_into(out),
        }
    }

    /// Splits a top-level conjunction into its conjuncts. Only `AND` is
    /// decomposed — `OR`/`XOR`/`NOT` subtrees stay intact as a single unit,
    /// since splitting them would change which rows satisfy the whole
    /// expression (SPEC_FULL.md §9, decided).
    pub fn sub_trees(self) -> Vec<FilterNode> {
        match self {
            FilterNode::And(l, r) => {
                let mut out = l.sub_trees();
                out.extend(r.sub_trees());
                out
            }
            other => vec![other],
        }
    }

    pub fn and(self, other: FilterNode) -> FilterNode {
        FilterNode::And(Box::new(self), Box::new(other))
    }
}

fn compare_op(op: BinOp) -> Option<CompareOp> {
    match op {
        BinOp::Eq => Some(CompareOp::Eq),
        BinOp::Ne => Some(CompareOp::Ne),
        BinOp::Lt => Some(CompareOp::Lt),
        BinOp::Gt => Some(CompareOp::Gt),
        BinOp::Le => Some(CompareOp::Le),
        BinOp::Ge => Some(CompareOp::Ge),
        BinOp::In => Some(CompareOp::In),
        BinOp::StartsWith => Some(CompareOp::StartsWith),
        BinOp::EndsWith => Some(CompareOp::EndsWith),
        BinOp::Contains => Some(CompareOp::Contains),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher_parser::expression_for_test;

    #[test]
    fn and_splits_into_two_predicates() {
        let expr = expression_for_test("a.age > 21 AND a.name = 'Bob'");
        let tree = FilterNode::from_expr(&expr);
        let parts = tree.sub_trees();
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn or_stays_whole() {
        let expr = expression_for_test("a.age > 21 OR a.name = 'Bob'");
        let tree = FilterNode::from_expr(&expr);
        let parts = tree.sub_trees();
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn collect_modified_is_recursive_through_or() {
        let expr = expression_for_test("a.age > 21 OR b.name = 'Bob'");
        let tree = FilterNode::from_expr(&expr);
        let aliases = tree.collect_modified();
        assert!(aliases.contains("a"));
        assert!(aliases.contains("b"));
    }
}
