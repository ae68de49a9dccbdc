//! Write operators: stage mutations into `ExecCtx::pending` rather than
//! mutating the graph inline, so a `MATCH ... WHERE ... DELETE n` can finish
//! reading before anything is removed (SPEC_FULL.md §4.2.7, §9 decided).

use super::*;

fn resolve_label(ctx: &ExecCtx, name: &str) -> LabelId {
    ctx.graph.get_or_create_label(name)
}

fn resolve_rel_type(ctx: &ExecCtx, name: &str) -> RelTypeId {
    ctx.graph.get_or_create_rel_type(name)
}

fn eval_properties(
    ctx: &ExecCtx,
    rec: &mut Record,
    properties: &[(String, ArithmeticExpression)],
) -> Result<BTreeMap<AttributeId, Value>, EngineError> {
    let mut out = BTreeMap::new();
    for (key, expr) in properties {
        super::materialize_properties(ctx, rec, expr);
        let value = expr.evaluate(rec, &ctx.params)?;
        if !value.is_null() {
            out.insert(ctx.graph.get_or_create_attribute(key), value);
        }
    }
    Ok(out)
}

/// Materializes one pattern (nodes + edges) against `rec`, creating fresh
/// entities for every alias not already bound, and staging the result in
/// `ctx.pending`. Returns the (possibly updated) record with new aliases
/// bound so later clauses in the same query can see them.
fn create_pattern(
    ctx: &ExecCtx,
    rec: &mut Record,
    nodes: &[NodePatternSpec],
    edges: &[(String, EdgePatternSpec, String)],
) -> Result<(), EngineError> {
    let mut new_node_ids: BTreeMap<String, NodeId> = BTreeMap::new();
    for node in nodes {
        if rec.get(&node.alias).and_then(|e| e.as_node()).is_some() {
            continue;
        }
        let labels: Vec<LabelId> = node.labels.iter().map(|l| resolve_label(ctx, l)).collect();
        let attrs = eval_properties(ctx, rec, &node.properties)?;
        let placeholder_id = NodeId(u32::MAX - ctx.pending.borrow().node_creates.len() as u32);
        ctx.pending.borrow_mut().node_creates.push((labels, attrs));
        new_node_ids.insert(node.alias.clone(), placeholder_id);
        rec.set_node(&node.alias, placeholder_id);
    }
    for (src_alias, edge, dest_alias) in edges {
        let src = rec.get(src_alias).and_then(|e| e.as_node());
        let dest = rec.get(dest_alias).and_then(|e| e.as_node());
        let (Some(src), Some(dest)) = (src, dest) else { continue };
        let rel_type = resolve_rel_type(ctx, &edge.rel_type);
        let attrs = eval_properties(ctx, rec, &edge.properties)?;
        let (src, dest) = match edge.direction {
            Direction::Incoming => (dest, src),
            _ => (src, dest),
        };
        ctx.pending.borrow_mut().edge_creates.push((rel_type, src, dest, attrs));
        if let Some(alias) = &edge.alias {
            // Created edges don't have a real id yet; bind a placeholder so
            // a later `RETURN r` at least reflects that something was
            // created. Resolved for real once the transaction commits.
            rec.set_edge(alias, EdgeId(u32::MAX));
        }
    }
    Ok(())
}

/// Clears the one-shot `done` latch (and the nested match sub-plan) so a
/// `CREATE`/`MERGE` with no upstream child can fire again when an enclosing
/// Apply re-runs this subtree per outer row.
pub fn reset(op: &mut Operator) {
    match &mut op.kind {
        OperatorKind::Create(s) => s.done = false,
        OperatorKind::Merge(s) => {
            s.done = false;
            s.active = false;
            s.matched_any = false;
            s.current_outer = None;
            s.match_plan.reset();
        }
        _ => {}
    }
}

pub fn consume(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    match &mut op.kind {
        OperatorKind::Create(_) => consume_create(op, ctx),
        OperatorKind::Merge(_) => consume_merge(op, ctx),
        OperatorKind::Update(_) => consume_update(op, ctx),
        OperatorKind::Delete(_) => consume_delete(op, ctx),
        OperatorKind::Foreach(_) => consume_foreach(op, ctx),
        _ => unreachable!("write_ops::consume called with a non-write operator"),
    }
}

fn consume_create(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    if let Some(child) = op.children.first_mut() {
        let Some(mut rec) = child.consume(ctx)? else {
            return Ok(None);
        };
        let OperatorKind::Create(s) = &op.kind else { unreachable!() };
        create_pattern(ctx, &mut rec, &s.nodes, &s.edges)?;
        return Ok(Some(rec));
    }
    let OperatorKind::Create(s) = &mut op.kind else { unreachable!() };
    if s.done {
        return Ok(None);
    }
    s.done = true;
    let (nodes, edges) = (s.nodes.clone(), s.edges.clone());
    let mut rec = ctx.new_record();
    create_pattern(ctx, &mut rec, &nodes, &edges)?;
    Ok(Some(rec))
}

/// Drives `MERGE` from its incoming stream one outer row at a time: each
/// row re-seeds and re-runs `match_plan` (the Apply family's pattern, not a
/// one-shot check), and every row `match_plan` produces is emitted with
/// `ON MATCH` applied. Only once `match_plan` is exhausted with nothing
/// found does this outer row fall back to `CREATE` + `ON CREATE`
/// (SPEC_FULL.md §4.2.7).
fn consume_merge(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    loop {
        let OperatorKind::Merge(s) = &mut op.kind else { unreachable!() };
        if s.active {
            if let Some(mut rec) = s.match_plan.consume(ctx)? {
                s.matched_any = true;
                let on_match = s.on_match.clone();
                apply_set_items(ctx, &mut rec, &on_match)?;
                return Ok(Some(rec));
            }
            s.active = false;
            if !s.matched_any {
                let (nodes, edges, on_create) = (s.nodes.clone(), s.edges.clone(), s.on_create.clone());
                let mut rec = s.current_outer.clone().unwrap_or_else(|| ctx.new_record());
                create_pattern(ctx, &mut rec, &nodes, &edges)?;
                apply_set_items(ctx, &mut rec, &on_create)?;
                return Ok(Some(rec));
            }
            continue;
        }

        let outer = if op.children.is_empty() {
            let OperatorKind::Merge(s) = &mut op.kind else { unreachable!() };
            if s.done {
                return Ok(None);
            }
            s.done = true;
            ctx.new_record()
        } else {
            let Some(rec) = op.children[0].consume(ctx)? else {
                return Ok(None);
            };
            rec
        };

        let OperatorKind::Merge(s) = &mut op.kind else { unreachable!() };
        s.match_plan.seed_argument(&outer);
        s.match_plan.reset();
        s.match_plan.init(ctx)?;
        s.active = true;
        s.matched_any = false;
        s.current_outer = Some(outer);
    }
}

fn apply_set_items(ctx: &ExecCtx, rec: &mut Record, items: &[SetItem]) -> Result<(), EngineError> {
    for item in items {
        match item {
            SetItem::Property { alias, key, value } => {
                let expr = ArithmeticExpression::from_expr(value);
                super::materialize_properties(ctx, rec, &expr);
                let v = expr.evaluate(rec, &ctx.params)?;
                let attr = ctx.graph.get_or_create_attribute(key);
                if let Some(node) = rec.get(alias).and_then(|e| e.as_node()) {
                    ctx.pending.borrow_mut().node_updates.entry(node).or_default().insert(attr, v.clone());
                } else if let Some(edge) = rec.get(alias).and_then(|e| e.as_edge()) {
                    ctx.pending.borrow_mut().edge_updates.entry(edge).or_default().insert(attr, v.clone());
                }
                // Staged updates aren't visible in the graph store until commit, so a
                // later read of the same property within this query (e.g. `SET`
                // followed by `RETURN`) would otherwise see the pre-`SET` value.
                rec.set_scalar(&format!("{alias}.{key}"), v);
            }
            SetItem::Labels { alias, labels } => {
                if let Some(node) = rec.get(alias).and_then(|e| e.as_node()) {
                    let ids: Vec<LabelId> = labels.iter().map(|l| resolve_label(ctx, l)).collect();
                    ctx.pending.borrow_mut().node_label_adds.entry(node).or_default().extend(ids);
                }
            }
        }
    }
    Ok(())
}

/// REMOVE label pieces don't fit `SetItem` (there's no value to evaluate),
/// so they're staged separately from the SET-shaped property/label writes.
fn apply_label_removes(ctx: &ExecCtx, rec: &Record, removes: &[(String, Vec<String>)]) -> Result<(), EngineError> {
    for (alias, labels) in removes {
        if let Some(node) = rec.get(alias).and_then(|e| e.as_node()) {
            let ids: Vec<LabelId> = labels.iter().map(|l| resolve_label(ctx, l)).collect();
            ctx.pending.borrow_mut().node_label_removes.entry(node).or_default().extend(ids);
        }
    }
    Ok(())
}

fn consume_update(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let Some(mut rec) = op.children[0].consume(ctx)? else {
        return Ok(None);
    };
    let OperatorKind::Update(s) = &op.kind else { unreachable!() };
    let items = s.items.clone();
    let label_removes = s.label_removes.clone();
    apply_set_items(ctx, &mut rec, &items)?;
    apply_label_removes(ctx, &rec, &label_removes)?;
    Ok(Some(rec))
}

fn consume_delete(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let Some(mut rec) = op.children[0].consume(ctx)? else {
        return Ok(None);
    };
    let OperatorKind::Delete(s) = &op.kind else { unreachable!() };
    let (detach, aliases) = (s.detach, s.aliases.clone());
    for expr in &aliases {
        super::materialize_properties(ctx, &mut rec, expr);
        let value = expr.evaluate(&rec, &ctx.params)?;
        if let ArithmeticExpression::Variable(alias) = expr {
            if let Some(node) = rec.get(alias).and_then(|e| e.as_node()) {
                if detach {
                    for id in 0..ctx.graph.edge_count() as u32 {
                        if let Some(edge) = ctx.graph.get_edge(EdgeId(id)) {
                            if edge.src == node || edge.dest == node {
                                ctx.pending.borrow_mut().edge_deletes.insert(edge.id);
                            }
                        }
                    }
                }
                ctx.pending.borrow_mut().node_deletes.insert(node);
                continue;
            }
            if let Some(edge) = rec.get(alias).and_then(|e| e.as_edge()) {
                ctx.pending.borrow_mut().edge_deletes.insert(edge);
                continue;
            }
        }
        let _ = value;
    }
    Ok(Some(rec))
}

fn consume_foreach(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let Some(mut rec) = op.children[0].consume(ctx)? else {
        return Ok(None);
    };
    let OperatorKind::Foreach(s) = &mut op.kind else { unreachable!() };
    super::materialize_properties(ctx, &mut rec, &s.list);
    let list = s.list.evaluate(&rec, &ctx.params)?;
    let items = list.as_list().map(|l| l.to_vec()).unwrap_or_default();
    for item in items {
        let mut loop_rec = rec.clone();
        loop_rec.set_scalar(&s.var, item);
        s.body.reset();
        s.body.seed_argument(&loop_rec);
        s.body.init(ctx)?;
        while s.body.consume(ctx)?.is_some() {}
    }
    Ok(Some(rec))
}
