//! `db.labels()` — every node label declared in the graph's schema.

use super::Procedure;
use crate::errors::EngineError;
use crate::graph_store::GraphContext;
use crate::value::Value;

#[derive(Default)]
pub struct DbLabels {
    rows: Vec<String>,
    pos: usize,
}

impl Procedure for DbLabels {
    fn invoke(&mut self, graph: &GraphContext, _args: &[Value]) -> Result<(), EngineError> {
        self.rows = graph.labels();
        self.rows.sort();
        self.pos = 0;
        Ok(())
    }

    fn step(&mut self) -> Option<Vec<Value>> {
        let label = self.rows.get(self.pos)?.clone();
        self.pos += 1;
        Some(vec![Value::Str(label)])
    }

    fn columns(&self) -> &[&'static str] {
        &["label"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_label_once() {
        let graph = GraphContext::new("g");
        graph.get_or_create_label("Person");
        graph.get_or_create_label("City");
        let mut proc = DbLabels::default();
        proc.invoke(&graph, &[]).unwrap();
        let mut seen = Vec::new();
        while let Some(row) = proc.step() {
            seen.push(row[0].clone());
        }
        assert_eq!(seen, vec![Value::Str("City".into()), Value::Str("Person".into())]);
    }
}
