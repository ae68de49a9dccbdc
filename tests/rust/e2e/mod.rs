//! End-to-end scenarios run through `Session::run` against a fresh,
//! in-process graph (SPEC_FULL.md §8 "End-to-end scenarios"). Each case
//! below is one row of that table.

use std::sync::Arc;

use graphwave::graph_store::GraphContext;
use graphwave::session::Session;
use graphwave::value::Value;

fn session() -> Session {
    Session::new(Arc::new(GraphContext::new("e2e")))
}

#[test]
fn create_node_pair_and_relationship_reports_full_stats() {
    let session = session();
    let result = session.run("CREATE (:Person {name:'a'})-[:KNOWS]->(:Person {name:'b'})").unwrap();
    assert_eq!(result.stats.nodes_created, 2);
    assert_eq!(result.stats.edges_created, 1);
    assert_eq!(result.stats.properties_set, 2);
    assert_eq!(result.stats.labels_added, 2);
}

#[test]
fn match_traversal_returns_both_endpoint_names() {
    let session = session();
    session.run("CREATE (:Person {name:'a'})-[:KNOWS]->(:Person {name:'b'})").unwrap();
    let result = session.run("MATCH (a:Person)-[:KNOWS]->(b) RETURN a.name, b.name").unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0], vec![Value::Str("a".into()), Value::Str("b".into())]);
}

#[test]
fn optional_match_with_no_match_yields_null_side() {
    let session = session();
    session.run("CREATE (:Person {name:'a'})-[:KNOWS]->(:Person {name:'b'})").unwrap();
    let result =
        session.run("MATCH (a:Person {name:'a'}) OPTIONAL MATCH (a)-[:LIKES]->(x) RETURN a.name, x").unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0], vec![Value::Str("a".into()), Value::Null]);
}

#[test]
fn unwind_feeds_sum_and_count_aggregates() {
    let session = session();
    let result = session.run("UNWIND [1,2,3] AS x RETURN sum(x), count(x)").unwrap();
    assert_eq!(result.rows.len(), 1);
    // `sum` accumulates into a float regardless of integer input (arithmetic::mod).
    assert_eq!(result.rows[0], vec![Value::Float(6.0), Value::Integer(3)]);
}

#[test]
fn merge_on_match_set_coalesce_increments_across_runs() {
    let session = session();
    const QUERY: &str = "MERGE (n:Person {name:'a'}) ON MATCH SET n.visits = coalesce(n.visits,0)+1 RETURN n.visits";
    // First run takes the create branch (no `ON CREATE` clause here), so
    // `ON MATCH SET` never fires and `visits` stays unset.
    let first = session.run(QUERY).unwrap();
    assert_eq!(first.rows[0][0], Value::Null);
    // From here on every run matches the node MERGE just created, so
    // `ON MATCH SET` fires and the `RETURN` in the same query sees its result.
    let second = session.run(QUERY).unwrap();
    assert_eq!(second.rows[0][0], Value::Integer(1));
    let third = session.run(QUERY).unwrap();
    assert_eq!(third.rows[0][0], Value::Integer(2));
}

#[test]
fn starts_with_filter_and_count_agree() {
    let session = session();
    session.run("CREATE (:Person {name:'a'})").unwrap();
    session.run("CREATE (:Person {name:'b'})").unwrap();
    let result = session.run("MATCH (a:Person) WHERE a.name STARTS WITH 'a' RETURN count(a)").unwrap();
    assert_eq!(result.rows[0][0], Value::Integer(1));
}

#[test]
fn named_var_length_path_reports_its_hop_count() {
    let session = session();
    session.run("CREATE (:Person {name:'a'})-[:KNOWS]->(:Person {name:'b'})").unwrap();
    let result = session.run("MATCH p = (a)-[:KNOWS*1..2]->(b) RETURN length(p)").unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], Value::Integer(1));
}
