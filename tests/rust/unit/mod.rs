//! Unit tests that exercise the public API from outside the crate:
//! tabular scalar-function checks via `test_case`, and `EngineConfig`'s
//! environment-variable overrides under `serial_test` since they mutate
//! process-wide environment state that would otherwise race with any other
//! test in this binary touching the same variables.

use std::sync::Arc;

use graphwave::config::EngineConfig;
use graphwave::graph_store::GraphContext;
use graphwave::session::Session;
use graphwave::value::Value;
use serial_test::serial;
use test_case::test_case;

fn eval(expr: &str) -> Value {
    let session = Session::new(Arc::new(GraphContext::new("unit")));
    let result = session.run(&format!("RETURN {expr}")).unwrap();
    result.rows[0][0].clone()
}

#[test_case("1 + 2", Value::Integer(3); "integer addition")]
#[test_case("1.5 + 2.5", Value::Float(4.0); "float addition")]
#[test_case("'a' + 'b'", Value::Str("ab".into()); "string concatenation via add")]
#[test_case("7 % 2", Value::Integer(1); "modulo")]
#[test_case("10 / 4", Value::Integer(2); "integer division truncates")]
#[test_case("abs(-3)", Value::Integer(3); "abs of a negative integer")]
#[test_case("toUpper('ab')", Value::Str("AB".into()); "toupper")]
#[test_case("size([1,2,3])", Value::Integer(3); "size of a list literal")]
#[test_case("'hello' STARTS WITH 'he'", Value::Bool(true); "starts with true case")]
#[test_case("'hello' STARTS WITH 'lo'", Value::Bool(false); "starts with false case")]
#[test_case("'hello' CONTAINS 'ell'", Value::Bool(true); "contains")]
#[test_case("coalesce(null, null, 5)", Value::Integer(5); "coalesce skips leading nulls")]
#[test_case("1 + null", Value::Null; "arithmetic on null propagates null")]
fn scalar_expression_evaluates_to(expr: &str, expected: Value) {
    assert_eq!(eval(expr), expected);
}

#[test]
#[serial]
fn engine_config_from_env_reads_overridden_batch_size() {
    std::env::set_var("GRAPHWAVE_BATCH_SIZE", "256");
    let config = EngineConfig::from_env().unwrap();
    assert_eq!(config.batch_size, 256);
    std::env::remove_var("GRAPHWAVE_BATCH_SIZE");
}

#[test]
#[serial]
fn engine_config_from_env_falls_back_to_defaults_when_unset() {
    std::env::remove_var("GRAPHWAVE_BATCH_SIZE");
    std::env::remove_var("GRAPHWAVE_RESULT_SET_CAP");
    let config = EngineConfig::from_env().unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
#[serial]
fn engine_config_from_env_rejects_unparsable_override() {
    std::env::set_var("GRAPHWAVE_WORKER_POOL_SIZE", "not-a-number");
    let err = EngineConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("GRAPHWAVE_WORKER_POOL_SIZE"));
    std::env::remove_var("GRAPHWAVE_WORKER_POOL_SIZE");
}

#[test]
fn graph_context_interns_the_same_label_to_the_same_id() {
    let graph = GraphContext::new("interning");
    let a = graph.get_or_create_label("Person");
    let b = graph.get_or_create_label("Person");
    assert_eq!(a, b);
}
