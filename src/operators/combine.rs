//! Binary combination operators: Cartesian product, value-hash join, union,
//! and the Apply family that realizes `OPTIONAL MATCH`, `EXISTS {}`, and
//! `CALL {}` subqueries by re-running the right-hand plan once per
//! left-hand row (SPEC_FULL.md §4.2.3, §4.2.4).

use super::*;
use crate::value::HashKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyKind {
    /// Plain `CALL { ... }` subquery: every right-hand row is emitted.
    Apply,
    /// `OPTIONAL MATCH`: if the right-hand side produces nothing, emit the
    /// left-hand row once with the right-hand aliases left unbound.
    Optional,
    /// `WHERE EXISTS { ... }` / positive pattern predicate: emit the
    /// left-hand row once if the right-hand side produces anything.
    SemiApply,
    /// `WHERE NOT EXISTS { ... }`: emit the left-hand row once if the
    /// right-hand side produces nothing.
    AntiSemiApply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinKey;

pub fn reset(op: &mut Operator) {
    match &mut op.kind {
        OperatorKind::CartesianProduct(s) => {
            s.lhs_buffer = None;
            s.lhs_pos = 0;
        }
        OperatorKind::Union(s) => {
            s.on_rhs = false;
        }
        OperatorKind::ValueHashJoin(s) => {
            s.build = None;
            s.probe_matches.clear();
            s.probe_pos = 0;
            s.current_probe = None;
        }
        OperatorKind::Apply(s) => s.lhs_record = None,
        OperatorKind::ApplyMultiplexer(s) => s.lhs_record = None,
        OperatorKind::RollupApply(s) => s.lhs_record = None,
        OperatorKind::Argument(s) => s.emitted = false,
        _ => {}
    }
}

enum Dispatch {
    Cartesian,
    Join,
    Union,
    Apply,
    SemiApply,
    Multiplexer,
    Rollup,
}

pub fn consume(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let dispatch = match &op.kind {
        OperatorKind::CartesianProduct(_) => Dispatch::Cartesian,
        OperatorKind::ValueHashJoin(_) => Dispatch::Join,
        OperatorKind::Union(_) => Dispatch::Union,
        OperatorKind::Apply(s) if s.kind == ApplyKind::Apply || s.kind == ApplyKind::Optional => Dispatch::Apply,
        OperatorKind::Apply(_) => Dispatch::SemiApply,
        OperatorKind::ApplyMultiplexer(_) => Dispatch::Multiplexer,
        OperatorKind::RollupApply(_) => Dispatch::Rollup,
        _ => unreachable!("combine::consume called with a non-combining operator"),
    };
    match dispatch {
        Dispatch::Cartesian => cartesian_product(op, ctx),
        Dispatch::Join => value_hash_join(op, ctx),
        Dispatch::Union => union_op(op, ctx),
        Dispatch::Apply => apply(op, ctx),
        Dispatch::SemiApply => semi_apply(op, ctx),
        Dispatch::Multiplexer => apply_multiplexer(op, ctx),
        Dispatch::Rollup => rollup_apply(op, ctx),
    }
}

fn cartesian_product(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let (lhs, rhs) = op.children.split_at_mut(1);
    let lhs = &mut lhs[0];
    let rhs = &mut rhs[0];
    let OperatorKind::CartesianProduct(s) = &mut op.kind else { unreachable!() };
    loop {
        if s.lhs_buffer.is_none() {
            let mut buf = Vec::new();
            while let Some(rec) = lhs.consume(ctx)? {
                buf.push(rec);
            }
            if buf.is_empty() {
                return Ok(None);
            }
            s.lhs_buffer = Some(buf);
            s.lhs_pos = 0;
            rhs.seed_argument(&s.lhs_buffer.as_ref().unwrap()[0]);
            rhs.init(ctx)?;
        }
        let buf = s.lhs_buffer.as_ref().unwrap();
        if s.lhs_pos >= buf.len() {
            return Ok(None);
        }
        match rhs.consume(ctx)? {
            Some(rhs_rec) => {
                let merged = merge_records(&buf[s.lhs_pos], &rhs_rec);
                return Ok(Some(merged));
            }
            None => {
                s.lhs_pos += 1;
                if let Some(row) = buf.get(s.lhs_pos) {
                    rhs.seed_argument(row);
                }
                rhs.reset();
                rhs.init(ctx)?;
            }
        }
    }
}

fn merge_records(lhs: &Record, rhs: &Record) -> Record {
    let mut merged = lhs.clone();
    let rhs_map = rhs.map().clone();
    for alias in rhs_map.aliases() {
        if let Some(entry) = rhs.get(alias) {
            merged.set(alias, entry.clone());
        }
    }
    merged
}

fn union_op(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let (lhs, rhs) = op.children.split_at_mut(1);
    let lhs = &mut lhs[0];
    let rhs = &mut rhs[0];
    let OperatorKind::Union(s) = &mut op.kind else { unreachable!() };
    if !s.on_rhs {
        if let Some(rec) = lhs.consume(ctx)? {
            return Ok(Some(rec));
        }
        s.on_rhs = true;
    }
    rhs.consume(ctx)
}

fn value_hash_join(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let (lhs, rhs) = op.children.split_at_mut(1);
    let lhs = &mut lhs[0];
    let rhs = &mut rhs[0];
    let OperatorKind::ValueHashJoin(_) = &mut op.kind else { unreachable!() };

    loop {
        let build_ready = matches!(&op.kind, OperatorKind::ValueHashJoin(s) if s.build.is_some());
        if !build_ready {
            let mut table: std::collections::HashMap<HashKey, Vec<Record>> = std::collections::HashMap::new();
            while let Some(rec) = rhs.consume(ctx)? {
                let key = HashKey(vec![rec.get_value("__join_key__")]);
                table.entry(key).or_default().push(rec);
            }
            if let OperatorKind::ValueHashJoin(s) = &mut op.kind {
                s.build = Some(table);
            }
        }

        if let OperatorKind::ValueHashJoin(s) = &mut op.kind {
            if s.probe_pos < s.probe_matches.len() {
                let matched = s.probe_matches[s.probe_pos].clone();
                s.probe_pos += 1;
                if let Some(probe) = &s.current_probe {
                    return Ok(Some(merge_records(probe, &matched)));
                }
            }
        }

        let Some(probe_rec) = lhs.consume(ctx)? else {
            return Ok(None);
        };
        let key = HashKey(vec![probe_rec.get_value("__join_key__")]);
        if let OperatorKind::ValueHashJoin(s) = &mut op.kind {
            s.probe_matches = s.build.as_ref().and_then(|t| t.get(&key)).cloned().unwrap_or_default();
            s.probe_pos = 0;
            s.current_probe = Some(probe_rec);
        }
    }
}

fn apply(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let (lhs, rhs) = op.children.split_at_mut(1);
    let lhs = &mut lhs[0];
    let rhs = &mut rhs[0];
    loop {
        let needs_lhs = matches!(&op.kind, OperatorKind::Apply(s) if s.lhs_record.is_none());
        if needs_lhs {
            let Some(lhs_rec) = lhs.consume(ctx)? else {
                return Ok(None);
            };
            rhs.seed_argument(&lhs_rec);
            rhs.reset();
            rhs.init(ctx)?;
            if let OperatorKind::Apply(s) = &mut op.kind {
                s.lhs_record = Some(lhs_rec);
                s.rhs_produced = false;
            }
        }

        match rhs.consume(ctx)? {
            Some(rhs_rec) => {
                if let OperatorKind::Apply(s) = &mut op.kind {
                    s.rhs_produced = true;
                    if let Some(lhs_rec) = &s.lhs_record {
                        return Ok(Some(merge_records(lhs_rec, &rhs_rec)));
                    }
                }
            }
            None => {
                if let OperatorKind::Apply(s) = &mut op.kind {
                    let emit_unmatched = s.kind == ApplyKind::Optional && !s.rhs_produced;
                    let lhs_rec = s.lhs_record.take();
                    if emit_unmatched {
                        if let Some(lhs_rec) = lhs_rec {
                            return Ok(Some(lhs_rec));
                        }
                    }
                }
            }
        }
    }
}

fn semi_apply(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    let (lhs, rhs) = op.children.split_at_mut(1);
    let lhs = &mut lhs[0];
    let rhs = &mut rhs[0];
    loop {
        let Some(lhs_rec) = lhs.consume(ctx)? else {
            return Ok(None);
        };
        rhs.seed_argument(&lhs_rec);
        rhs.reset();
        rhs.init(ctx)?;
        let matched = rhs.consume(ctx)?.is_some();
        let anti = matches!(&op.kind, OperatorKind::Apply(s) if s.kind == ApplyKind::AntiSemiApply);
        if matched != anti {
            return Ok(Some(lhs_rec));
        }
    }
}

fn apply_multiplexer(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    // Evaluates every child against the same left-hand row and combines
    // matches with OR/AND semantics — used for multi-pattern EXISTS
    // predicates joined by boolean connectives.
    let or_semantics = matches!(&op.kind, OperatorKind::ApplyMultiplexer(s) if s.or_semantics);
    let (first, rest) = op.children.split_first_mut().expect("multiplexer has at least one branch");
    loop {
        let Some(lhs_rec) = first.consume(ctx)? else {
            return Ok(None);
        };
        let mut all_matched = true;
        let mut any_matched = false;
        for branch in rest.iter_mut() {
            branch.seed_argument(&lhs_rec);
            branch.reset();
            branch.init(ctx)?;
            let matched = branch.consume(ctx)?.is_some();
            any_matched |= matched;
            all_matched &= matched;
        }
        let satisfied = if or_semantics { any_matched } else { all_matched };
        if satisfied {
            return Ok(Some(lhs_rec));
        }
    }
}

fn rollup_apply(op: &mut Operator, ctx: &ExecCtx) -> Result<Option<Record>, EngineError> {
    // Collects every right-hand row's first column into a list bound to
    // `alias`, one list per left-hand row — the realization of
    // `COLLECT { MATCH ... }`/pattern-comprehension subqueries.
    let (lhs, rhs) = op.children.split_at_mut(1);
    let lhs = &mut lhs[0];
    let rhs = &mut rhs[0];
    let Some(mut lhs_rec) = lhs.consume(ctx)? else {
        return Ok(None);
    };
    rhs.seed_argument(&lhs_rec);
    rhs.reset();
    rhs.init(ctx)?;
    let mut collected = Vec::new();
    while let Some(rhs_rec) = rhs.consume(ctx)? {
        let map = rhs_rec.map().clone();
        if let Some(alias) = map.aliases().next() {
            collected.push(rhs_rec.get_value(alias));
        }
    }
    if let OperatorKind::RollupApply(s) = &op.kind {
        lhs_rec.set_scalar(&s.alias, Value::List(collected));
    }
    Ok(Some(lhs_rec))
}
