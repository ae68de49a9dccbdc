//! `db.propertyKeys()` — every attribute name ever assigned on a node or edge.

use super::Procedure;
use crate::errors::EngineError;
use crate::graph_store::GraphContext;
use crate::value::Value;

#[derive(Default)]
pub struct DbPropertyKeys {
    rows: Vec<String>,
    pos: usize,
}

impl Procedure for DbPropertyKeys {
    fn invoke(&mut self, graph: &GraphContext, _args: &[Value]) -> Result<(), EngineError> {
        self.rows = graph.property_keys();
        self.rows.sort();
        self.pos = 0;
        Ok(())
    }

    fn step(&mut self) -> Option<Vec<Value>> {
        let key = self.rows.get(self.pos)?.clone();
        self.pos += 1;
        Some(vec![Value::Str(key)])
    }

    fn columns(&self) -> &[&'static str] {
        &["propertyKey"]
    }
}
