//! Integration tests: scenarios that cross module boundaries within a single
//! `Session` but aren't part of the end-to-end scenario table in
//! `tests/rust/e2e/mod.rs` — procedure-registry wiring through the `CALL`
//! clause, optimizer passes observable through `Session::explain`, and
//! multi-clause `WITH` chains.

use std::sync::Arc;

use graphwave::graph_store::GraphContext;
use graphwave::session::Session;
use graphwave::value::Value;

fn session() -> Session {
    Session::new(Arc::new(GraphContext::new("integration")))
}

#[test]
fn call_db_labels_yields_every_registered_label() {
    let session = session();
    session.run("CREATE (:Person {name:'a'})").unwrap();
    session.run("CREATE (:City {name:'nyc'})").unwrap();
    let result = session.run("CALL db.labels() YIELD label RETURN label").unwrap();
    let mut labels: Vec<String> = result
        .rows
        .into_iter()
        .map(|row| match &row[0] {
            Value::Str(s) => s.clone(),
            other => panic!("expected a string label, got {other:?}"),
        })
        .collect();
    labels.sort();
    assert_eq!(labels, vec!["City".to_string(), "Person".to_string()]);
}

#[test]
fn call_algo_shortest_path_reports_hop_count_between_node_ids() {
    let session = session();
    session.run("CREATE (:Person {name:'a'})-[:KNOWS]->(:Person {name:'b'})-[:KNOWS]->(:Person {name:'c'})").unwrap();
    // `YIELD` binds positionally against the procedure's declared column
    // order (`path`, `length`); list every column the query touches so
    // `length` lands on the right slot rather than being paired with `path`.
    let result = session.run("CALL algo.shortestPath(0, 2) YIELD path, length RETURN length").unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], Value::Integer(2));
}

#[test]
fn call_without_yield_binds_every_declared_column() {
    let session = session();
    session.run("CREATE (:Person {name:'a'})").unwrap();
    let result = session.run("CALL db.labels()").unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0], vec![Value::Str("Person".into())]);
}

#[test]
fn with_chain_filters_then_aggregates_across_two_match_stages() {
    let session = session();
    session.run("CREATE (:Person {name:'a', age:30})").unwrap();
    session.run("CREATE (:Person {name:'b', age:17})").unwrap();
    session.run("CREATE (:Person {name:'c', age:45})").unwrap();
    let result = session
        .run("MATCH (p:Person) WITH p WHERE p.age >= 18 WITH count(p) AS adults RETURN adults")
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Integer(2)]]);
}

#[test]
fn explain_sinks_a_where_filter_below_the_cartesian_product() {
    let session = session();
    let plan = session.build_plan("MATCH (a:Person), (b:City) WHERE a.name = 'x' RETURN a, b").unwrap();
    let rendered = session.explain(&plan);
    // Filter placement (SPEC_FULL.md §4.5) sinks the `a.name` conjunct past
    // the CartesianProduct onto the `a` branch, so `Filter` appears nested
    // under the scan it actually depends on rather than sitting above both.
    let filter_line = rendered.lines().find(|l| l.trim_start().starts_with("Filter")).unwrap();
    let filter_depth = filter_line.len() - filter_line.trim_start().len();
    let cartesian_line = rendered.lines().find(|l| l.trim_start().starts_with("CartesianProduct")).unwrap();
    let cartesian_depth = cartesian_line.len() - cartesian_line.trim_start().len();
    assert!(filter_depth > cartesian_depth, "expected Filter sunk below CartesianProduct:\n{rendered}");
}

#[test]
fn shortest_path_binds_a_single_path_between_named_endpoints() {
    let session = session();
    session
        .run("CREATE (:Person {name:'a'})-[:KNOWS]->(:Person {name:'b'})-[:KNOWS]->(:Person {name:'c'})")
        .unwrap();
    session.run("MATCH (a:Person {name:'a'}), (c:Person {name:'c'}) CREATE (a)-[:KNOWS]->(c)").unwrap();
    let result = session
        .run("MATCH p = shortestPath((a:Person {name:'a'})-[:KNOWS*]->(c:Person {name:'c'})) RETURN length(p) AS len")
        .unwrap();
    // Two relationships (a)-[:KNOWS]->(b)-[:KNOWS]->(c) form a longer route,
    // but the direct (a)-[:KNOWS]->(c) edge created above is the shortest.
    assert_eq!(result.rows, vec![vec![Value::Integer(1)]]);
}

#[test]
fn shortest_path_rejects_an_unbound_endpoint() {
    let session = session();
    let err = session.build_plan("MATCH p = shortestPath((a)-[:KNOWS*]->(:Person)) RETURN p");
    assert!(err.is_err());
}

#[test]
fn merge_emits_every_existing_match_instead_of_just_the_first() {
    let session = session();
    session.run("CREATE (:Person {name:'a', age:30})").unwrap();
    session.run("CREATE (:Person {name:'a', age:40})").unwrap();
    let result = session.run("MERGE (p:Person {name:'a'}) ON MATCH SET p.seen = true RETURN p.age AS age").unwrap();
    let mut ages: Vec<i64> = result
        .rows
        .into_iter()
        .map(|row| match row[0] {
            Value::Integer(i) => i,
            other => panic!("expected an integer age, got {other:?}"),
        })
        .collect();
    ages.sort();
    assert_eq!(ages, vec![30, 40]);
}

#[test]
fn merge_creates_once_per_outer_row_with_no_match() {
    let session = session();
    session.run("CREATE (:Person {name:'a'})").unwrap();
    session.run("CREATE (:Person {name:'b'})").unwrap();
    let result = session.run("MATCH (p:Person) MERGE (t:Team {owner: p.name})").unwrap();
    assert_eq!(result.stats.nodes_created, 2);
}

#[test]
fn union_combines_two_branches_and_deduplicates() {
    let session = session();
    session.run("CREATE (:Person {name:'a'})").unwrap();
    session.run("CREATE (:City {name:'a'})").unwrap();
    let result = session
        .run("MATCH (p:Person) RETURN p.name AS name UNION MATCH (c:City) RETURN c.name AS name")
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Str("a".into())]]);
}

#[test]
fn union_all_keeps_duplicate_rows() {
    let session = session();
    session.run("CREATE (:Person {name:'a'})").unwrap();
    session.run("CREATE (:City {name:'a'})").unwrap();
    let result = session
        .run("MATCH (p:Person) RETURN p.name AS name UNION ALL MATCH (c:City) RETURN c.name AS name")
        .unwrap();
    assert_eq!(result.rows.len(), 2);
}

#[test]
fn delete_and_remove_label_write_paths_are_visible_after_commit() {
    let session = session();
    session.run("CREATE (:Person:Employee {name:'a'})").unwrap();
    session.run("MATCH (p:Person {name:'a'}) REMOVE p:Employee").unwrap();
    let after_remove = session.run("MATCH (p:Employee) RETURN p").unwrap();
    assert_eq!(after_remove.rows.len(), 0);

    let result = session.run("MATCH (p:Person {name:'a'}) DELETE p").unwrap();
    assert_eq!(result.stats.nodes_deleted, 1);
    let after_delete = session.run("MATCH (p:Person) RETURN p").unwrap();
    assert_eq!(after_delete.rows.len(), 0);
}
