//! `ProcedureCall` and `Unwind` (SPEC_FULL.md §4.2.8, §4.3): the two
//! operators that turn something other than a pattern match into a stream of
//! records — a registered procedure's output rows, or a list expression's
//! elements.

use super::*;

/// Clears buffered rows/items so a re-run under an enclosing Apply
/// re-invokes the procedure / re-evaluates the list expression instead of
/// replaying the previous outer row's results.
pub fn reset(op: &mut Operator) {
    match &mut op.kind {
        OperatorKind::ProcedureCall(s) => {
            s.rows = None;
            s.pos = 0;
            s.source = None;
        }
        OperatorKind::Unwind(s) => {
            s.items = None;
            s.pos = 0;
            s.source = None;
        }
        _ => {}
    }
}

pub fn consume(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    match &op.kind {
        OperatorKind::ProcedureCall(_) => consume_procedure_call(op, ctx),
        OperatorKind::Unwind(_) => consume_unwind(op, ctx),
        _ => unreachable!("misc::consume called with neither ProcedureCall nor Unwind"),
    }
}

fn consume_procedure_call(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    loop {
        let needs_invoke = matches!(&op.kind, OperatorKind::ProcedureCall(s) if s.rows.is_none());
        if needs_invoke {
            let mut source_rec = match op.children.first_mut() {
                Some(child) => match child.consume(ctx)? {
                    Some(rec) => Some(rec),
                    None => return Ok(None),
                },
                None => None,
            };
            let (name, args) = if let OperatorKind::ProcedureCall(s) = &op.kind {
                (s.name.clone(), s.args.clone())
            } else {
                unreachable!()
            };
            let mut blank = ctx.new_record();
            let arg_rec = source_rec.as_mut().unwrap_or(&mut blank);
            for a in &args {
                super::materialize_properties(ctx, arg_rec, a);
            }
            let arg_values: Vec<Value> =
                args.iter().map(|a| a.evaluate(arg_rec, &ctx.params)).collect::<Result<_, _>>()?;
            let mut proc = ctx
                .procedures
                .create(&name)
                .ok_or_else(|| EngineError::procedure(format!("no such procedure: {name}")))?;
            proc.invoke(&ctx.graph, &arg_values)?;
            let mut rows = Vec::new();
            while let Some(row) = proc.step() {
                rows.push(row);
            }
            if let OperatorKind::ProcedureCall(s) = &mut op.kind {
                s.rows = Some(rows);
                s.pos = 0;
                s.source = source_rec;
            }
        }

        match emit_procedure_row(op, ctx)? {
            Some(rec) => return Ok(Some(rec)),
            None => {
                if op.children.is_empty() {
                    return Ok(None);
                }
                if let OperatorKind::ProcedureCall(s) = &mut op.kind {
                    s.rows = None;
                }
            }
        }
    }
}

fn emit_procedure_row(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let OperatorKind::ProcedureCall(s) = &mut op.kind else { unreachable!() };
    let Some(rows) = s.rows.as_ref() else { return Ok(None) };
    if s.pos >= rows.len() {
        return Ok(None);
    }
    let row = rows[s.pos].clone();
    s.pos += 1;
    let columns = s.yield_items.clone();
    let mut rec = s.source.clone().unwrap_or_else(|| ctx.new_record());
    for (alias, value) in columns.iter().zip(row.into_iter()) {
        rec.set_scalar(alias, value);
    }
    Ok(Some(rec))
}

fn consume_unwind(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    loop {
        let needs_source = matches!(&op.kind, OperatorKind::Unwind(s) if s.items.is_none());
        if needs_source {
            let Some(mut source_rec) = op.children[0].consume(ctx)? else {
                return Ok(None);
            };
            let expr = if let OperatorKind::Unwind(s) = &op.kind { s.expr.clone() } else { unreachable!() };
            super::materialize_properties(ctx, &mut source_rec, &expr);
            let list = expr.evaluate(&source_rec, &ctx.params)?;
            let items = list.as_list().map(|l| l.to_vec()).unwrap_or_default();
            if let OperatorKind::Unwind(s) = &mut op.kind {
                s.items = Some(items);
                s.pos = 0;
                s.source = Some(source_rec);
            }
        }

        let OperatorKind::Unwind(s) = &mut op.kind else { unreachable!() };
        let items = s.items.as_ref().unwrap();
        if s.pos < items.len() {
            let value = items[s.pos].clone();
            s.pos += 1;
            let mut rec = s.source.clone().unwrap_or_else(|| ctx.new_record());
            rec.set_scalar(&s.alias, value);
            return Ok(Some(rec));
        }
        s.items = None;
    }
}
