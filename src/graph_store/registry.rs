//! Process-wide table of open graphs, keyed by name.
//!
//! The original keeps one `GraphContext` per Redis key, retrieved and
//! released around every command. Outside of a keyspace there is no
//! equivalent check-out step, so this is a plain concurrent map from graph
//! name to a shared, reference-counted `GraphContext` (grounded on the
//! `dashmap::DashMap` registries in `inputlayer-inputlayer`'s index and
//! catalog types).

use std::sync::Arc;

use dashmap::DashMap;

use super::context::GraphContext;

#[derive(Default)]
pub struct GraphRegistry {
    graphs: DashMap<String, Arc<GraphContext>>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        GraphRegistry { graphs: DashMap::new() }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<GraphContext> {
        self.graphs
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(GraphContext::new(name)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<GraphContext>> {
        self.graphs.get(name).map(|e| e.clone())
    }

    pub fn drop_graph(&self, name: &str) -> bool {
        self.graphs.remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.graphs.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_returns_same_context() {
        let registry = GraphRegistry::new();
        let a = registry.get_or_create("g1");
        let b = registry.get_or_create("g1");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
