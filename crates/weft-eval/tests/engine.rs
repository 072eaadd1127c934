//! End-to-end engine tests: documents in, resolved documents out.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use weft_eval::Evaluator;
use weft_op::{MapEnv, Registry, StaticSecrets};
use weft_tree::{Cursor, Value};
use weft_util::{EnvOverrides, Error, Result};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        // DEBUG/TRACE pick the filter level; RUST_LOG still applies
        // when neither is set.
        let filter = match EnvOverrides::capture().log_filter() {
            Some(directive) => EnvFilter::new(directive),
            None => EnvFilter::from_default_env(),
        };
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(filter)
            .try_init();
    });
}

fn yaml(s: &str) -> Value {
    serde_yaml::from_str(s).unwrap()
}

fn eval(input: &str) -> Result<Value> {
    init_tracing();
    let registry = Registry::with_defaults();
    let evaluator = Evaluator::new(&registry);
    let mut tree = yaml(input);
    evaluator.evaluate(&mut tree)?;
    Ok(tree)
}

fn eval_ok(input: &str) -> Value {
    eval(input).unwrap_or_else(|e| panic!("evaluation failed: {}", e))
}

// =============================================================================
// CORE SCENARIOS
// =============================================================================

#[test]
fn test_reference_grab() {
    let tree = eval_ok("a: (( grab b ))\nb: value\n");
    assert_eq!(tree, yaml("a: value\nb: value\n"));
}

#[test]
fn test_nested_concat_grab() {
    let tree = eval_ok(
        r#"
meta:
  env: prod
config:
  prod:
    host: p.example.com
r: (( grab (concat "config." meta.env ".host") ))
"#,
    );
    assert_eq!(
        Cursor::parse("r").unwrap().resolve(&tree).unwrap(),
        &Value::from("p.example.com")
    );
}

#[test]
fn test_base64_of_concat() {
    let tree = eval_ok(
        r#"
user: alice
pass: secret123
enc: (( base64 (concat user ":" pass) ))
"#,
    );
    assert_eq!(
        Cursor::parse("enc").unwrap().resolve(&tree).unwrap(),
        &Value::from("YWxpY2U6c2VjcmV0MTIz")
    );
}

#[test]
fn test_keys_sorted() {
    let tree = eval_ok("m:\n  b: 1\n  a: 2\n  c: 3\nk: (( keys m ))\n");
    assert_eq!(
        Cursor::parse("k").unwrap().resolve(&tree).unwrap(),
        &yaml("- a\n- b\n- c\n")
    );
}

#[test]
fn test_cycle_reported_with_both_cursors() {
    let err = eval("a: (( grab b ))\nb: (( grab a ))\n").unwrap_err();
    match err {
        Error::Cycle { cursors } => {
            assert!(cursors.contains(&"a".to_string()), "cycle: {:?}", cursors);
            assert!(cursors.contains(&"b".to_string()), "cycle: {:?}", cursors);
        }
        other => panic!("expected cycle error, got {}", other),
    }
}

#[test]
fn test_ternary_lazy_branches() {
    let tree = eval_ok(
        "flag: true\na: present\nr: (( flag ? a : nonexistent.path ))\n",
    );
    assert_eq!(
        Cursor::parse("r").unwrap().resolve(&tree).unwrap(),
        &Value::from("present")
    );
}

// =============================================================================
// DEPENDENCY ORDERING
// =============================================================================

#[test]
fn test_chained_dependencies_resolve_in_order() {
    let tree = eval_ok(
        "a: (( grab b ))\nb: (( grab c ))\nc: bottom\n",
    );
    assert_eq!(tree, yaml("a: bottom\nb: bottom\nc: bottom\n"));
}

#[test]
fn test_dependency_through_concat() {
    let tree = eval_ok(
        r#"
host: (( concat name "." domain ))
name: web
domain: (( grab tld ))
tld: example.org
"#,
    );
    assert_eq!(
        Cursor::parse("host").unwrap().resolve(&tree).unwrap(),
        &Value::from("web.example.org")
    );
}

#[test]
fn test_no_expression_left_behind() {
    let tree = eval_ok(
        "a: (( grab b ))\nb: 2\nc:\n  - (( calc \"1 + 1\" ))\n  - plain\n",
    );

    fn assert_no_expressions(value: &Value) {
        match value {
            Value::String(s) => assert!(
                weft_par::extract_payload(s).is_none(),
                "unresolved expression: {}",
                s
            ),
            Value::List(items) => items.iter().for_each(assert_no_expressions),
            Value::Map(map) => map.values().for_each(assert_no_expressions),
            _ => {}
        }
    }
    assert_no_expressions(&tree);
}

// =============================================================================
// MERGE-PHASE OPERATORS
// =============================================================================

#[test]
fn test_inject_merges_into_parent() {
    let tree = eval_ok(
        r#"
defaults:
  cpu: 2
  mem: 8
web:
  base: (( inject defaults ))
  cpu: 4
"#,
    );

    let web = Cursor::parse("web").unwrap().resolve(&tree).unwrap();
    let map = web.as_map().unwrap();
    assert!(map.get("base").is_none(), "inject key must disappear");
    // Existing keys win over injected ones.
    assert_eq!(map.get("cpu"), Some(&Value::Int(4)));
    assert_eq!(map.get("mem"), Some(&Value::Int(8)));
}

#[test]
fn test_prune_removes_destination() {
    let tree = eval_ok("secret: (( prune ))\nkeep: 1\n");
    assert_eq!(tree, yaml("keep: 1\n"));
}

#[test]
fn test_param_surviving_merge_is_fatal() {
    let err = eval("must: (( param \"please supply a value\" ))\n").unwrap_err();
    match err {
        Error::Validation { path, message } => {
            assert_eq!(path, "must");
            assert_eq!(message, "please supply a value");
        }
        other => panic!("expected validation error, got {}", other),
    }
}

#[test]
fn test_param_replaced_by_later_document_is_fine() {
    init_tracing();
    let registry = Registry::with_defaults();
    let evaluator = Evaluator::new(&registry);

    let merged = evaluator
        .evaluate_documents(vec![
            yaml("env: (( param \"name the environment\" ))\n"),
            yaml("env: prod\n"),
        ])
        .unwrap();
    assert_eq!(merged, yaml("env: prod\n"));
}

// =============================================================================
// OPERATOR SURFACES
// =============================================================================

#[test]
fn test_defer_emits_expression_text() {
    let tree = eval_ok("d: (( defer grab a.b ))\n");
    assert_eq!(
        Cursor::parse("d").unwrap().resolve(&tree).unwrap(),
        &Value::from("(( grab a.b ))")
    );
}

#[test]
fn test_or_chain_fallback() {
    let tree = eval_ok("r: (( grab missing.key || \"default\" ))\n");
    assert_eq!(
        Cursor::parse("r").unwrap().resolve(&tree).unwrap(),
        &Value::from("default")
    );
}

#[test]
fn test_arithmetic_in_document() {
    let tree = eval_ok(
        "base: 3\ndouble: (( base * 2 ))\nexact: (( 6 / 3 ))\npromoted: (( 7 / 2 ))\n",
    );
    assert_eq!(
        Cursor::parse("double").unwrap().resolve(&tree).unwrap(),
        &Value::Int(6)
    );
    assert_eq!(
        Cursor::parse("exact").unwrap().resolve(&tree).unwrap(),
        &Value::Int(2)
    );
    assert_eq!(
        Cursor::parse("promoted").unwrap().resolve(&tree).unwrap(),
        &Value::Float(3.5)
    );
}

#[test]
fn test_env_var_lookup() {
    init_tracing();
    let registry = Registry::with_defaults();
    let env = MapEnv::from_pairs([("DEPLOY_REGION", "eu-central-1")]);
    let evaluator = Evaluator::new(&registry).with_env(&env);

    let mut tree = yaml("region: (( $DEPLOY_REGION ))\n");
    evaluator.evaluate(&mut tree).unwrap();
    assert_eq!(tree, yaml("region: eu-central-1\n"));
}

#[test]
fn test_secret_resolution() {
    init_tracing();
    let registry = Registry::with_defaults();
    let secrets = StaticSecrets::from_pairs([("secret/prod:password", "hunter2")]);
    let evaluator = Evaluator::new(&registry).with_secrets(&secrets);

    let mut tree = yaml(
        "meta:\n  env: prod\npw: (( vault \"secret/\" meta.env \":password\" ))\n",
    );
    evaluator.evaluate(&mut tree).unwrap();
    assert_eq!(
        Cursor::parse("pw").unwrap().resolve(&tree).unwrap(),
        &Value::from("hunter2")
    );

    // The external call is visible to the metrics collector.
    let metrics = evaluator.metrics();
    let (count, _) = metrics.external_stats("vault").unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_named_sequence_index() {
    let tree = eval_ok(
        r#"
jobs:
  - name: web
    port: 80
  - name: worker
    port: 0
r: (( grab jobs.web.port ))
"#,
    );
    assert_eq!(
        Cursor::parse("r").unwrap().resolve(&tree).unwrap(),
        &Value::Int(80)
    );
}

// =============================================================================
// FILTERS, BUDGETS, CANCELLATION
// =============================================================================

#[test]
fn test_skip_eval_leaves_expressions() {
    init_tracing();
    let registry = Registry::with_defaults();
    let evaluator = Evaluator::new(&registry).skip_eval();

    let mut tree = yaml("a: (( grab b ))\nb: 1\n");
    evaluator.evaluate(&mut tree).unwrap();
    assert_eq!(tree, yaml("a: (( grab b ))\nb: 1\n"));
}

#[test]
fn test_only_filter_restricts_evaluation() {
    init_tracing();
    let registry = Registry::with_defaults();
    let evaluator =
        Evaluator::new(&registry).with_only(vec![Cursor::parse("wanted").unwrap()]);

    let mut tree = yaml(
        "wanted:\n  x: (( grab src ))\nignored: (( grab src ))\nsrc: 7\n",
    );
    evaluator.evaluate(&mut tree).unwrap();
    assert_eq!(
        Cursor::parse("wanted.x").unwrap().resolve(&tree).unwrap(),
        &Value::Int(7)
    );
    assert_eq!(
        Cursor::parse("ignored").unwrap().resolve(&tree).unwrap(),
        &Value::from("(( grab src ))")
    );
}

#[test]
fn test_error_budget_aggregates() {
    init_tracing();
    let registry = Registry::with_defaults();
    let evaluator = Evaluator::new(&registry).with_error_budget(5);

    let mut tree = yaml("a: (( grab missing.one ))\nb: (( grab missing.two ))\nc: 1\n");
    let err = evaluator.evaluate(&mut tree).unwrap_err();
    match err {
        Error::Multi { errors } => assert_eq!(errors.len(), 2),
        other => panic!("expected aggregated errors, got {}", other),
    }
}

#[test]
fn test_error_budget_default_fails_fast() {
    let err = eval("a: (( grab missing.one ))\nb: (( grab missing.two ))\n").unwrap_err();
    assert!(!matches!(err, Error::Multi { .. }));
}

#[test]
fn test_cancellation_stops_evaluation() {
    init_tracing();
    let registry = Registry::with_defaults();
    let evaluator = Evaluator::new(&registry);
    evaluator.cancel_token().cancel();

    let mut tree = yaml("a: (( grab b ))\nb: 1\n");
    let err = evaluator.evaluate(&mut tree).unwrap_err();
    assert!(err.to_string().contains("cancelled"));
}

// =============================================================================
// PARALLEL EXECUTION
// =============================================================================

/// A document wide enough to clear the minimum-operations threshold,
/// with chains so the wave schedule is nontrivial.
fn wide_document() -> String {
    let mut doc = String::from("seed: 1\n");
    for i in 0..6 {
        doc.push_str(&format!("v{}: (( seed + {} ))\n", i, i));
    }
    for i in 0..6 {
        doc.push_str(&format!("w{}: (( v{} * 10 ))\n", i, i));
    }
    doc.push_str("total: (( w0 + w5 ))\n");
    doc
}

#[test]
fn test_parallel_matches_sequential() {
    init_tracing();
    let registry = Registry::with_defaults();
    let source = wide_document();

    let mut sequential = yaml(&source);
    Evaluator::new(&registry)
        .with_parallel(false)
        .evaluate(&mut sequential)
        .unwrap();

    let mut parallel = yaml(&source);
    Evaluator::new(&registry)
        .with_parallel(true)
        .evaluate(&mut parallel)
        .unwrap();

    assert_eq!(sequential, parallel);
    assert_eq!(
        Cursor::parse("total").unwrap().resolve(&parallel).unwrap(),
        &Value::Int(70)
    );
}

#[test]
fn test_parallel_with_unsafe_operator_still_correct() {
    init_tracing();
    let registry = Registry::with_defaults();
    let secrets = StaticSecrets::from_pairs([("secret/token", "s3cr3t")]);

    let mut source = wide_document();
    source.push_str("tok: (( vault \"secret/token\" ))\n");

    let mut tree = yaml(&source);
    Evaluator::new(&registry)
        .with_secrets(&secrets)
        .with_parallel(true)
        .evaluate(&mut tree)
        .unwrap();

    assert_eq!(
        Cursor::parse("tok").unwrap().resolve(&tree).unwrap(),
        &Value::from("s3cr3t")
    );
    assert_eq!(
        Cursor::parse("total").unwrap().resolve(&tree).unwrap(),
        &Value::Int(70)
    );
}

#[test]
fn test_parallel_cycle_still_detected() {
    init_tracing();
    let registry = Registry::with_defaults();

    let mut source = wide_document();
    source.push_str("x: (( grab y ))\ny: (( grab x ))\n");

    let mut tree = yaml(&source);
    let err = Evaluator::new(&registry)
        .with_parallel(true)
        .evaluate(&mut tree)
        .unwrap_err();
    assert!(matches!(err, Error::Cycle { .. }));
}

// =============================================================================
// METRICS
// =============================================================================

#[test]
fn test_metrics_record_parses_and_opcalls() {
    init_tracing();
    let registry = Registry::with_defaults();
    let evaluator = Evaluator::new(&registry);

    let mut tree = yaml("a: (( grab b ))\nb: (( concat \"x\" \"y\" ))\n");
    evaluator.evaluate(&mut tree).unwrap();

    let metrics = evaluator.metrics();
    assert!(metrics.parse_duration.count() >= 2);
    assert!(metrics.opcall_count() >= 2);
    assert!(metrics.operator_stats("grab").is_some());
    assert_eq!(metrics.eval_duration.count(), 1);
}
