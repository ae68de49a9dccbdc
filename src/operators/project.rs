//! Filter and projection operators: everything downstream of pattern
//! matching that shapes rows into the final result set (SPEC_FULL.md
//! §4.2.5, §4.2.6).

use super::*;
use crate::arithmetic::AggregateAccumulator;
use crate::value::HashKey;

#[derive(Debug, Clone)]
pub struct AggregateItem {
    pub expr: ArithmeticExpression,
    pub alias: String,
    pub func: String,
    pub distinct: bool,
}

#[derive(Debug, Clone)]
pub struct SortItem {
    pub expr: ArithmeticExpression,
    pub desc: bool,
}

/// Clears buffered/accumulated state so a blocking operator (one that must
/// drain its child before emitting anything) starts fresh the next time an
/// enclosing Apply re-runs this subtree for a new outer row.
pub fn reset(op: &mut Operator) {
    match &mut op.kind {
        OperatorKind::Aggregate(s) => {
            s.groups = None;
            s.pos = 0;
        }
        OperatorKind::Distinct(s) => s.seen.clear(),
        OperatorKind::Sort(s) => {
            s.buffer = None;
            s.pos = 0;
        }
        OperatorKind::Skip(s) => s.skipped = 0,
        OperatorKind::Limit(s) => s.emitted = 0,
        _ => {}
    }
}

pub fn consume_filter(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let OperatorKind::Filter(s) = &op.kind else { unreachable!() };
    let tree = s.tree.clone();
    loop {
        let Some(mut rec) = op.children[0].consume(ctx)? else {
            return Ok(None);
        };
        if evaluate_filter(ctx, &tree, &mut rec)? {
            return Ok(Some(rec));
        }
    }
}

fn evaluate_filter(ctx: &ExecCtx, node: &FilterNode, rec: &mut Record) -> Result<bool, EngineError> {
    match node {
        FilterNode::And(l, r) => Ok(evaluate_filter(ctx, l, rec)? && evaluate_filter(ctx, r, rec)?),
        FilterNode::Or(l, r) => Ok(evaluate_filter(ctx, l, rec)? || evaluate_filter(ctx, r, rec)?),
        FilterNode::Xor(l, r) => Ok(evaluate_filter(ctx, l, rec)? ^ evaluate_filter(ctx, r, rec)?),
        FilterNode::Not(inner) => Ok(!evaluate_filter(ctx, inner, rec)?),
        FilterNode::Predicate { op, lhs, rhs } => {
            super::materialize_properties(ctx, rec, lhs);
            super::materialize_properties(ctx, rec, rhs);
            let lv = lhs.evaluate(rec, &ctx.params)?;
            let rv = rhs.evaluate(rec, &ctx.params)?;
            Ok(predicate_matches(*op, &lv, &rv))
        }
        FilterNode::Expression(e) => {
            super::materialize_properties(ctx, rec, e);
            Ok(e.evaluate(rec, &ctx.params)?.truthy())
        }
    }
}

fn predicate_matches(op: crate::filter_tree::CompareOp, lhs: &Value, rhs: &Value) -> bool {
    use crate::filter_tree::CompareOp;
    use std::cmp::Ordering;
    match op {
        CompareOp::Eq => lhs.partial_compare(rhs) == Some(Ordering::Equal),
        CompareOp::Ne => lhs.partial_compare(rhs) != Some(Ordering::Equal),
        CompareOp::Lt => lhs.partial_compare(rhs) == Some(Ordering::Less),
        CompareOp::Gt => lhs.partial_compare(rhs) == Some(Ordering::Greater),
        CompareOp::Le => matches!(lhs.partial_compare(rhs), Some(Ordering::Less) | Some(Ordering::Equal)),
        CompareOp::Ge => matches!(lhs.partial_compare(rhs), Some(Ordering::Greater) | Some(Ordering::Equal)),
        CompareOp::In => rhs.as_list().map(|l| l.iter().any(|v| v.partial_compare(lhs) == Some(Ordering::Equal))).unwrap_or(false),
        CompareOp::StartsWith => matches!((lhs.as_str(), rhs.as_str()), (Some(a), Some(b)) if a.starts_with(b)),
        CompareOp::EndsWith => matches!((lhs.as_str(), rhs.as_str()), (Some(a), Some(b)) if a.ends_with(b)),
        CompareOp::Contains => matches!((lhs.as_str(), rhs.as_str()), (Some(a), Some(b)) if a.contains(b)),
    }
}

pub fn consume_project(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let Some(mut rec) = op.children[0].consume(ctx)? else {
        return Ok(None);
    };
    let OperatorKind::Project(s) = &op.kind else { unreachable!() };
    let mut out = if s.keep_existing { rec.clone() } else { ctx.new_record() };
    for (expr, alias) in &s.items {
        super::materialize_properties(ctx, &mut rec, expr);
        let value = expr.evaluate(&rec, &ctx.params)?;
        out.set_scalar(alias, value);
    }
    Ok(Some(out))
}

pub fn consume_aggregate(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    if matches!(&op.kind, OperatorKind::Aggregate(s) if s.groups.is_none()) {
        let mut groups: std::collections::HashMap<HashKey, (Record, Vec<AggregateAccumulator>)> =
            std::collections::HashMap::new();
        let mut order: Vec<HashKey> = Vec::new();
        let (keys, aggregates) = if let OperatorKind::Aggregate(s) = &op.kind {
            (s.keys.clone(), s.aggregates.clone())
        } else {
            unreachable!()
        };
        while let Some(mut rec) = op.children[0].consume(ctx)? {
            for (e, _) in &keys {
                super::materialize_properties(ctx, &mut rec, e);
            }
            for item in &aggregates {
                super::materialize_properties(ctx, &mut rec, &item.expr);
            }
            let key_values: Vec<Value> =
                keys.iter().map(|(e, _)| e.evaluate(&rec, &ctx.params)).collect::<Result<_, _>>()?;
            let key = HashKey(key_values.clone());
            let entry = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                let mut group_rec = ctx.new_record();
                for ((_, alias), value) in keys.iter().zip(key_values.iter()) {
                    group_rec.set_scalar(alias, value.clone());
                }
                let accs = aggregates.iter().map(|a| AggregateAccumulator::new(&a.func, a.distinct)).collect();
                (group_rec, accs)
            });
            for (acc, item) in entry.1.iter_mut().zip(aggregates.iter()) {
                let value = item.expr.evaluate(&rec, &ctx.params)?;
                acc.accumulate(value);
            }
        }
        let mut out_records = Vec::new();
        for key in order {
            if let Some((mut rec, accs)) = groups.remove(&key) {
                for (acc, item) in accs.into_iter().zip(aggregates.iter()) {
                    rec.set_scalar(&item.alias, acc.finish());
                }
                out_records.push(rec);
            }
        }
        if let OperatorKind::Aggregate(s) = &mut op.kind {
            s.groups = Some(out_records);
            s.pos = 0;
        }
    }
    if let OperatorKind::Aggregate(s) = &mut op.kind {
        let groups = s.groups.as_ref().unwrap();
        if s.pos < groups.len() {
            let rec = groups[s.pos].clone();
            s.pos += 1;
            return Ok(Some(rec));
        }
    }
    Ok(None)
}

pub fn consume_distinct(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    loop {
        let Some(rec) = op.children[0].consume(ctx)? else {
            return Ok(None);
        };
        let map = rec.map().clone();
        let key = HashKey(map.aliases().map(|a| rec.get_value(a)).collect());
        if let OperatorKind::Distinct(s) = &mut op.kind {
            if s.seen.insert(key) {
                return Ok(Some(rec));
            }
        }
    }
}

pub fn consume_sort(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    if matches!(&op.kind, OperatorKind::Sort(s) if s.buffer.is_none()) {
        let mut buf = Vec::new();
        while let Some(rec) = op.children[0].consume(ctx)? {
            buf.push(rec);
        }
        let items = if let OperatorKind::Sort(s) = &op.kind { s.items.clone() } else { unreachable!() };
        let mut keyed: Vec<(Vec<Value>, Record)> = Vec::new();
        for mut rec in buf {
            for item in &items {
                super::materialize_properties(ctx, &mut rec, &item.expr);
            }
            let keys: Vec<Value> =
                items.iter().map(|item| item.expr.evaluate(&rec, &ctx.params)).collect::<Result<_, _>>()?;
            keyed.push((keys, rec));
        }
        keyed.sort_by(|a, b| {
            for (idx, item) in items.iter().enumerate() {
                let ord = a.0[idx].partial_compare(&b.0[idx]).unwrap_or(std::cmp::Ordering::Equal);
                let ord = if item.desc { ord.reverse() } else { ord };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });
        if let OperatorKind::Sort(s) = &mut op.kind {
            s.buffer = Some(keyed.into_iter().map(|(_, r)| r).collect());
            s.pos = 0;
        }
    }
    if let OperatorKind::Sort(s) = &mut op.kind {
        let buf = s.buffer.as_ref().unwrap();
        if s.pos < buf.len() {
            let rec = buf[s.pos].clone();
            s.pos += 1;
            return Ok(Some(rec));
        }
    }
    Ok(None)
}

pub fn consume_skip(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    loop {
        let Some(rec) = op.children[0].consume(ctx)? else {
            return Ok(None);
        };
        if let OperatorKind::Skip(s) = &mut op.kind {
            if s.skipped < s.count {
                s.skipped += 1;
                continue;
            }
        }
        return Ok(Some(rec));
    }
}

pub fn consume_limit(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let at_limit = matches!(&op.kind, OperatorKind::Limit(s) if s.emitted >= s.count);
    if at_limit {
        return Ok(None);
    }
    let Some(rec) = op.children[0].consume(ctx)? else {
        return Ok(None);
    };
    if let OperatorKind::Limit(s) = &mut op.kind {
        s.emitted += 1;
    }
    Ok(Some(rec))
}

pub fn consume_results(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    op.children[0].consume(ctx)
}
