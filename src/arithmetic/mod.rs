//! Arithmetic expression tree: scalar and aggregate expression evaluation
//! over a `Record` (SPEC_FULL.md §3.6). Grounded on
//! `arithmetic_expression_construct.c`'s split between scalar operator nodes
//! and aggregate-marked ones (`op.f->aggregate`), generalized here into an
//! `Operand`/`Op` tree evaluated directly against the new owned-String AST
//! rather than libcypher-parser's `cypher_astnode_t`.

mod functions;

pub use functions::is_aggregate;

use std::collections::BTreeMap;

use crate::cypher_parser::ast::{BinOp, Expr, Literal};
use crate::errors::EngineError;
use crate::record::Record;
use crate::value::{HashKey, Value};

#[derive(Debug, Clone)]
pub enum ArithmeticExpression {
    Constant(Value),
    Variable(String),
    Property { base: Box<ArithmeticExpression>, key: String },
    Operation { name: String, args: Vec<ArithmeticExpression>, distinct: bool },
}

impl ArithmeticExpression {
    pub fn from_expr(expr: &Expr) -> Self {
        match expr {
            Expr::Literal(lit) => ArithmeticExpression::Constant(literal_to_value(lit)),
            Expr::Variable(name) => ArithmeticExpression::Variable(name.clone()),
            Expr::Parameter(name) => ArithmeticExpression::Variable(format!("${name}")),
            Expr::Property { base, key } => {
                ArithmeticExpression::Property { base: Box::new(Self::from_expr(base)), key: key.clone() }
            }
            Expr::List(items) => ArithmeticExpression::Operation {
                name: "list".to_string(),
                args: items.iter().map(Self::from_expr).collect(),
                distinct: false,
            },
            Expr::FunctionCall { name, args, distinct } => ArithmeticExpression::Operation {
                name: name.to_ascii_lowercase(),
                args: args.iter().map(Self::from_expr).collect(),
                distinct: *distinct,
            },
            Expr::BinaryOp { op, lhs, rhs } => ArithmeticExpression::Operation {
                name: binop_name(*op).to_string(),
                args: vec![Self::from_expr(lhs), Self::from_expr(rhs)],
                distinct: false,
            },
            Expr::Not(inner) => ArithmeticExpression::Operation {
                name: "not".to_string(),
                args: vec![Self::from_expr(inner)],
                distinct: false,
            },
            Expr::IsNull(inner) => ArithmeticExpression::Operation {
                name: "is_null".to_string(),
                args: vec![Self::from_expr(inner)],
                distinct: false,
            },
            Expr::IsNotNull(inner) => ArithmeticExpression::Operation {
                name: "is_not_null".to_string(),
                args: vec![Self::from_expr(inner)],
                distinct: false,
            },
            Expr::Exists { .. } => {
                // Rewritten into a Semi-Apply operator by the plan builder
                // (SPEC_FULL.md §4.2.5); never evaluated as arithmetic.
                ArithmeticExpression::Constant(Value::Bool(true))
            }
        }
    }

    pub fn collect_aliases_into(&self, out: &mut std::collections::BTreeSet<String>) {
        match self {
            ArithmeticExpression::Constant(_) => {}
            ArithmeticExpression::Variable(name) => {
                if !name.starts_with('$') {
                    out.insert(name.clone());
                }
            }
            ArithmeticExpression::Property { base, .. } => base.collect_aliases_into(out),
            ArithmeticExpression::Operation { args, .. } => {
                for a in args {
                    a.collect_aliases_into(out);
                }
            }
        }
    }

    pub fn is_aggregate(&self) -> bool {
        match self {
            ArithmeticExpression::Operation { name, args, .. } => {
                functions::is_aggregate(name) || args.iter().any(|a| a.is_aggregate())
            }
            _ => false,
        }
    }

    /// Evaluates against a single record. Aggregate calls are not valid here
    /// — they're handled by `AggregateAccumulator` in the Aggregate operator.
    pub fn evaluate(&self, record: &Record, params: &BTreeMap<String, Value>) -> Result<Value, EngineError> {
        match self {
            ArithmeticExpression::Constant(v) => Ok(v.clone()),
            ArithmeticExpression::Variable(name) => {
                if let Some(key) = name.strip_prefix('$') {
                    Ok(params.get(key).cloned().unwrap_or(Value::Null))
                } else {
                    Ok(record.get_value(name))
                }
            }
            ArithmeticExpression::Property { base, key } => {
                let _ = base.evaluate(record, params)?;
                // Property access on a bound node/edge resolves through the
                // graph store at the operator layer, which already knows
                // the entity id; here we only need the base alias.
                if let ArithmeticExpression::Variable(alias) = base.as_ref() {
                    Ok(record.get_value(&format!("{alias}.{key}")))
                } else {
                    Ok(Value::Null)
                }
            }
            ArithmeticExpression::Operation { name, args, .. } => {
                if let (true, [ArithmeticExpression::Variable(alias)]) =
                    (matches!(name.as_str(), "labels" | "type" | "properties"), args.as_slice())
                {
                    // Resolved against the live graph store by
                    // `operators::materialize_properties` before evaluation;
                    // here we only read back the slot it populated.
                    return Ok(record.get_value(&format!("{name}({alias})")));
                }
                let values: Result<Vec<Value>, EngineError> =
                    args.iter().map(|a| a.evaluate(record, params)).collect();
                functions::call_scalar(name, &values?)
            }
        }
    }
}

fn binop_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Mod => "mod",
        BinOp::Eq => "eq",
        BinOp::Ne => "ne",
        BinOp::Lt => "lt",
        BinOp::Gt => "gt",
        BinOp::Le => "le",
        BinOp::Ge => "ge",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::Xor => "xor",
        BinOp::In => "in",
        BinOp::StartsWith => "starts_with",
        BinOp::EndsWith => "ends_with",
        BinOp::Contains => "contains",
    }
}

fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Integer(i) => Value::Integer(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::String(s) => Value::Str(s.clone()),
        Literal::Null => Value::Null,
    }
}

/// Per-group accumulator state for an aggregate call (`count`, `sum`, ...),
/// keyed externally by a `HashKey` of the non-aggregate projection items.
#[derive(Debug, Clone)]
pub struct AggregateAccumulator {
    name: String,
    distinct: bool,
    seen: std::collections::HashSet<HashKey>,
    count: i64,
    sum: f64,
    min: Option<Value>,
    max: Option<Value>,
    collected: Vec<Value>,
}

impl AggregateAccumulator {
    pub fn new(name: &str, distinct: bool) -> Self {
        AggregateAccumulator {
            name: name.to_string(),
            distinct,
            seen: std::collections::HashSet::new(),
            count: 0,
            sum: 0.0,
            min: None,
            max: None,
            collected: Vec::new(),
        }
    }

    pub fn accumulate(&mut self, value: Value) {
        if value.is_null() && self.name != "count" {
            return;
        }
        if self.distinct {
            let key = HashKey(vec![value.clone()]);
            if !self.seen.insert(key) {
                return;
            }
        }
        self.count += 1;
        match self.name.as_str() {
            "sum" | "avg" => {
                if let Some(f) = value.as_f64() {
                    self.sum += f;
                }
            }
            "min" => {
                self.min = Some(match self.min.take() {
                    Some(cur) if cur.partial_compare(&value) == Some(std::cmp::Ordering::Less) => cur,
                    Some(_) | None => value.clone(),
                });
            }
            "max" => {
                self.max = Some(match self.max.take() {
                    Some(cur) if cur.partial_compare(&value) == Some(std::cmp::Ordering::Greater) => cur,
                    Some(_) | None => value.clone(),
                });
            }
            "collect" => self.collected.push(value.clone()),
            _ => {}
        }
    }

    pub fn finish(self) -> Value {
        match self.name.as_str() {
            "count" => Value::Integer(self.count),
            "sum" => Value::Float(self.sum),
            "avg" => {
                if self.count == 0 {
                    Value::Null
                } else {
                    Value::Float(self.sum / self.count as f64)
                }
            }
            "min" => self.min.unwrap_or(Value::Null),
            "max" => self.max.unwrap_or(Value::Null),
            "collect" => Value::List(self.collected),
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher_parser::expression_for_test;
    use crate::record::RecordMap;
    use std::sync::Arc;

    #[test]
    fn evaluates_arithmetic_and_comparisons() {
        let expr = expression_for_test("1 + 2 * 3");
        let ae = ArithmeticExpression::from_expr(&expr);
        let map = Arc::new(RecordMap::new());
        let record = Record::new(map);
        let result = ae.evaluate(&record, &BTreeMap::new()).unwrap();
        assert_eq!(result, Value::Integer(7));
    }

    #[test]
    fn count_aggregate_ignores_nothing() {
        let mut acc = AggregateAccumulator::new("count", false);
        acc.accumulate(Value::Integer(1));
        acc.accumulate(Value::Null);
        assert_eq!(acc.finish(), Value::Integer(2));
    }

    #[test]
    fn distinct_sum_counts_each_value_once() {
        let mut acc = AggregateAccumulator::new("sum", true);
        acc.accumulate(Value::Integer(5));
        acc.accumulate(Value::Integer(5));
        acc.accumulate(Value::Integer(3));
        assert_eq!(acc.finish(), Value::Float(8.0));
    }
}
