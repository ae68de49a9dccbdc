//! `db.indexes()` / `db.createIndex()` / `db.dropIndex()` — the index
//! management built-ins named in SPEC_FULL.md §4.7. There is no real
//! secondary structure behind a declared index yet (`IndexScan` still does a
//! linear attribute scan), but the declaration is tracked on `GraphContext`
//! so the catalog procedures and the plan builder's index-existence checks
//! have something real to consult.

use super::Procedure;
use crate::errors::EngineError;
use crate::graph_store::GraphContext;
use crate::value::Value;

#[derive(Default)]
pub struct DbIndexes {
    rows: Vec<(String, String)>,
    pos: usize,
}

impl Procedure for DbIndexes {
    fn invoke(&mut self, graph: &GraphContext, _args: &[Value]) -> Result<(), EngineError> {
        self.rows = graph.list_indices().into_iter().map(|i| (i.label, i.attribute)).collect();
        self.rows.sort();
        self.pos = 0;
        Ok(())
    }

    fn step(&mut self) -> Option<Vec<Value>> {
        let (label, attribute) = self.rows.get(self.pos)?.clone();
        self.pos += 1;
        Some(vec![Value::Str(label), Value::Str(attribute)])
    }

    fn columns(&self) -> &[&'static str] {
        &["label", "property"]
    }
}

fn string_arg(args: &[Value], idx: usize, name: &str) -> Result<String, EngineError> {
    args.get(idx)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| EngineError::procedure(format!("missing or non-string argument `{name}`")))
}

#[derive(Default)]
pub struct CreateIndex {
    done: bool,
}

impl Procedure for CreateIndex {
    fn invoke(&mut self, graph: &GraphContext, args: &[Value]) -> Result<(), EngineError> {
        let label = string_arg(args, 0, "label")?;
        let property = string_arg(args, 1, "property")?;
        graph.create_index(&label, &property);
        self.done = false;
        Ok(())
    }

    fn step(&mut self) -> Option<Vec<Value>> {
        if self.done {
            return None;
        }
        self.done = true;
        Some(vec![Value::Bool(true)])
    }

    fn columns(&self) -> &[&'static str] {
        &["created"]
    }
}

#[derive(Default)]
pub struct DropIndex {
    result: Option<bool>,
}

impl Procedure for DropIndex {
    fn invoke(&mut self, graph: &GraphContext, args: &[Value]) -> Result<(), EngineError> {
        let label = string_arg(args, 0, "label")?;
        let property = string_arg(args, 1, "property")?;
        self.result = Some(graph.drop_index(&label, &property));
        Ok(())
    }

    fn step(&mut self) -> Option<Vec<Value>> {
        let result = self.result.take()?;
        Some(vec![Value::Bool(result)])
    }

    fn columns(&self) -> &[&'static str] {
        &["dropped"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_list_then_drop() {
        let graph = GraphContext::new("g");
        let mut create = CreateIndex::default();
        create.invoke(&graph, &[Value::Str("Person".into()), Value::Str("name".into())]).unwrap();
        assert_eq!(create.step(), Some(vec![Value::Bool(true)]));

        let mut list = DbIndexes::default();
        list.invoke(&graph, &[]).unwrap();
        assert_eq!(list.step(), Some(vec![Value::Str("Person".into()), Value::Str("name".into())]));

        let mut drop = DropIndex::default();
        drop.invoke(&graph, &[Value::Str("Person".into()), Value::Str("name".into())]).unwrap();
        assert_eq!(drop.step(), Some(vec![Value::Bool(true)]));
    }
}
