//! `db.relationshipTypes()` — every relationship type declared in the schema.

use super::Procedure;
use crate::errors::EngineError;
use crate::graph_store::GraphContext;
use crate::value::Value;

#[derive(Default)]
pub struct DbRelationshipTypes {
    rows: Vec<String>,
    pos: usize,
}

impl Procedure for DbRelationshipTypes {
    fn invoke(&mut self, graph: &GraphContext, _args: &[Value]) -> Result<(), EngineError> {
        self.rows = graph.rel_types();
        self.rows.sort();
        self.pos = 0;
        Ok(())
    }

    fn step(&mut self) -> Option<Vec<Value>> {
        let rel_type = self.rows.get(self.pos)?.clone();
        self.pos += 1;
        Some(vec![Value::Str(rel_type)])
    }

    fn columns(&self) -> &[&'static str] {
        &["relationshipType"]
    }
}
