//! Scan operators: every way the plan can seed a record with a bound node
//! or edge without reading from an existing binding (SPEC_FULL.md §4.2.1).

use super::*;

pub fn init(op: &mut Operator, ctx: &ExecCtx) -> Result<(), EngineError> {
    match &mut op.kind {
        OperatorKind::AllNodeScan(s) => {
            s.next = 0;
        }
        OperatorKind::LabelScan(s) => {
            s.ids = label_node_ids(ctx, &s.label);
            s.pos = 0;
        }
        OperatorKind::LabelAndIdRangeScan(s) => {
            let mut ids = label_node_ids(ctx, &s.label);
            ids.retain(|id| {
                let within_min = s.min.map(|m| id.0 as i64 >= m).unwrap_or(true);
                let within_max = s.max.map(|m| id.0 as i64 <= m).unwrap_or(true);
                within_min && within_max
            });
            s.ids = ids;
            s.pos = 0;
        }
        OperatorKind::NodeByIdSeek(s) => {
            s.done = false;
        }
        OperatorKind::IndexScan(s) => {
            let label_ids = label_node_ids(ctx, &s.label);
            s.ids = filter_by_attribute(ctx, &label_ids, &s.attribute, s.op, &s.value);
            s.pos = 0;
        }
        _ => {}
    }
    Ok(())
}

pub fn label_node_ids(ctx: &ExecCtx, label: &str) -> Vec<NodeId> {
    match ctx.graph.label_id(label) {
        Some(id) => {
            let matrix = ctx.graph.label_matrix(id);
            matrix.tuples().map(|(row, _)| NodeId(row)).collect()
        }
        None => Vec::new(),
    }
}

fn filter_by_attribute(
    ctx: &ExecCtx,
    ids: &[NodeId],
    attribute: &str,
    op: crate::filter_tree::CompareOp,
    value_expr: &ArithmeticExpression,
) -> Vec<NodeId> {
    let target = value_expr.evaluate(&ctx.new_record(), &ctx.params).unwrap_or(Value::Null);
    let Some(attr_id) = ctx.graph.attribute_id(attribute) else {
        return Vec::new();
    };
    ids.iter()
        .copied()
        .filter(|id| {
            ctx.graph
                .get_node(*id)
                .and_then(|n| n.attributes.get(&attr_id).cloned())
                .map(|v| compare_matches(&v, op, &target))
                .unwrap_or(false)
        })
        .collect()
}

fn compare_matches(lhs: &Value, op: crate::filter_tree::CompareOp, rhs: &Value) -> bool {
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

pub fn consume(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    match &mut op.kind {
        OperatorKind::Argument(s) => {
            if s.emitted {
                return Ok(None);
            }
            s.emitted = true;
            Ok(Some(s.bound.clone().unwrap_or_else(|| ctx.new_record())))
        }
        OperatorKind::AllNodeScan(s) => {
            let total = ctx.graph.node_count() as u32;
            while s.next < total {
                let id = NodeId(s.next);
                s.next += 1;
                if let Some(_node) = ctx.graph.get_node(id) {
                    let mut rec = ctx.new_record();
                    rec.set_node(&s.alias, id);
                    return Ok(Some(rec));
                }
            }
            Ok(None)
        }
        OperatorKind::LabelScan(s) => {
            if s.pos < s.ids.len() {
                let id = s.ids[s.pos];
                s.pos += 1;
                let mut rec = ctx.new_record();
                rec.set_node(&s.alias, id);
                Ok(Some(rec))
            } else {
                Ok(None)
            }
        }
        OperatorKind::LabelAndIdRangeScan(s) => {
            if s.pos < s.ids.len() {
                let id = s.ids[s.pos];
                s.pos += 1;
                let mut rec = ctx.new_record();
                rec.set_node(&s.alias, id);
                Ok(Some(rec))
            } else {
                Ok(None)
            }
        }
        OperatorKind::NodeByIdSeek(s) => {
            if s.done {
                return Ok(None);
            }
            s.done = true;
            if s.id < 0 {
                return Ok(None);
            }
            let id = NodeId(s.id as u32);
            if ctx.graph.get_node(id).is_some() {
                let mut rec = ctx.new_record();
                rec.set_node(&s.alias, id);
                Ok(Some(rec))
            } else {
                Ok(None)
            }
        }
        OperatorKind::IndexScan(s) => {
            if s.pos < s.ids.len() {
                let id = s.ids[s.pos];
                s.pos += 1;
                let mut rec = ctx.new_record();
                rec.set_node(&s.alias, id);
                Ok(Some(rec))
            } else {
                Ok(None)
            }
        }
        _ => unreachable!("scans::consume called with a non-scan operator"),
    }
}
