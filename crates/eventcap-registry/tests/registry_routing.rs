//! Integration tests for named stream routing, defaults, and lookup modes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use eventcap_core::{
    AcceptHook, CaptureError, ConsolePolicy, EmitOptions, Filter, HookRef, HookResolver, Record,
    Stream, StreamOptions, StreamPatch, Workspace,
};
use eventcap_registry::Registry;
use serde_json::{json, Value};

fn fixed_clock() -> impl Fn() -> i64 + Send + Sync + 'static {
    || 5_000
}

#[test]
fn soft_lookup_returns_none_for_unknown_and_invalid_names() {
    let mut registry = Registry::new();
    registry
        .create("http", StreamOptions::default())
        .expect("create should succeed");

    assert!(registry.get("http").is_some());
    assert!(registry.get("  http  ").is_some());
    assert!(registry.get("nope").is_none());
    assert!(registry.get("").is_none());
    assert!(registry.get(Value::Null).is_none());
    assert!(registry.get(json!({"a": 1})).is_none());
}

#[test]
fn strict_lookup_errors_for_unknown_and_invalid_names() {
    let mut registry = Registry::new();
    registry
        .create("http", StreamOptions::default())
        .expect("create should succeed");

    assert!(registry.require("http").is_ok());
    assert!(matches!(
        registry.require("nope"),
        Err(CaptureError::InvalidName(_))
    ));
    assert!(matches!(
        registry.require("   "),
        Err(CaptureError::InvalidName(_))
    ));
    assert!(matches!(
        registry.create(json!([1]), StreamOptions::default()),
        Err(CaptureError::InvalidName(_))
    ));
}

#[test]
fn numeric_names_route_to_the_same_stream() {
    let mut registry = Registry::new();
    registry.log(7, json!({"n": 1}));
    registry.log("7", json!({"n": 2}));

    assert_eq!(registry.names(), vec!["7".to_string()]);
    let records = registry.query(7, &Filter::new()).expect("query should succeed");
    assert_eq!(records.len(), 2);
}

#[test]
fn forwarding_creates_streams_on_demand_with_levels() {
    let mut registry = Registry::new();
    registry.log("app", json!({"step": 1}));
    registry.info("app", json!({"step": 2}));
    registry.warn("app", json!({"step": 3}));
    registry.error("app", json!({"step": 4}));

    let levels: Vec<String> = registry
        .query("app", &Filter::new())
        .expect("query should succeed")
        .iter()
        .map(|r| r.header.level.clone())
        .collect();
    assert_eq!(levels, vec!["log", "info", "warn", "error"]);
    assert!(registry.contains("app"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn forwarding_to_invalid_name_is_a_no_op() {
    let mut registry = Registry::new();
    assert!(registry.info("", json!({"x": 1})).is_none());
    assert!(registry.info(Value::Bool(true), json!({"x": 1})).is_none());
    assert!(registry.is_empty());
}

#[test]
fn query_on_unknown_stream_is_empty() {
    let registry = Registry::new();
    let records = registry
        .query("ghost", &Filter::new().with_limit(3))
        .expect("query should succeed");
    assert!(records.is_empty());
}

#[test]
fn explicit_options_win_over_defaults_even_when_falsy() {
    let defaults = StreamOptions::default()
        .with_limit(3)
        .with_enabled(true)
        .with_console(ConsolePolicy::Warn);
    let mut registry = Registry::with_defaults(defaults);

    let handle = registry
        .create(
            "quiet",
            StreamOptions::default().with_limit(0).with_enabled(false),
        )
        .expect("create should succeed");
    let stream = handle.lock();
    assert_eq!(stream.limit(), 0);
    assert!(!stream.is_enabled());
    assert_eq!(stream.console(), ConsolePolicy::Warn);
}

#[test]
fn defaults_apply_to_streams_created_by_forwarding() {
    let mut registry = Registry::with_defaults(
        StreamOptions::default()
            .with_limit(2)
            .with_clock(fixed_clock()),
    );
    for seq in 0..5 {
        registry.log("ring", json!({ "seq": seq }));
    }

    let records = registry.query("ring", &Filter::new()).expect("query should succeed");
    let seqs: Vec<i64> = records
        .iter()
        .filter_map(|r| r.body.get("seq").and_then(Value::as_i64))
        .collect();
    assert_eq!(seqs, vec![3, 4]);
    assert!(records.iter().all(|r| r.header.at == 5_000));
}

#[test]
fn invalid_defaults_make_forwarding_return_none() {
    let mut defaults = StreamOptions::default();
    defaults.limit = Some(json!(-4));
    let mut registry = Registry::with_defaults(defaults);

    assert!(registry.log("broken", json!({"x": 1})).is_none());
    assert!(!registry.contains("broken"));
}

#[test]
fn create_replaces_existing_stream() {
    let mut registry = Registry::new();
    registry.log("s", json!({"old": true}));
    registry
        .create("s", StreamOptions::default())
        .expect("create should succeed");

    let records = registry.query("s", &Filter::new()).expect("query should succeed");
    assert!(records.is_empty());
}

#[test]
fn get_or_create_keeps_existing_stream() {
    let mut registry = Registry::new();
    let first = registry
        .get_or_create("s", StreamOptions::default().with_limit(4))
        .expect("first call creates");
    let second = registry
        .get_or_create("s", StreamOptions::default().with_limit(9))
        .expect("second call returns existing");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.lock().limit(), 4);
}

#[test]
fn configure_routes_patch_and_rejects_unknown_stream() {
    let mut registry = Registry::new();
    registry
        .create("s", StreamOptions::default())
        .expect("create should succeed");

    registry
        .configure("s", &StreamPatch::new().with_limit(5).with_enabled(false))
        .expect("configure should succeed");
    let handle = registry.require("s").expect("stream exists");
    assert_eq!(handle.lock().limit(), 5);
    assert!(!handle.lock().is_enabled());

    assert!(matches!(
        registry.configure("missing", &StreamPatch::new().with_enabled(true)),
        Err(CaptureError::InvalidName(_))
    ));
    assert!(matches!(
        registry.configure("s", &StreamPatch::new().with_limit("lots")),
        Err(CaptureError::InvalidConfig(_))
    ));
}

#[test]
fn remove_stats_and_clear_all() {
    let mut registry = Registry::new();
    registry.log("b", json!({"n": 1}));
    registry.log("a", json!({"n": 1}));
    registry.log("a", json!({"n": 2}));

    let stats = registry.stats();
    let summary: Vec<(String, usize)> = stats.iter().map(|s| (s.name.clone(), s.size)).collect();
    assert_eq!(summary, vec![("a".to_string(), 2), ("b".to_string(), 1)]);

    registry.clear_all();
    assert!(registry.stats().iter().all(|s| s.size == 0));

    assert!(registry.remove("a").is_some());
    assert!(registry.remove("a").is_none());
    assert_eq!(registry.names(), vec!["b".to_string()]);
}

#[test]
fn query_filters_pass_through() {
    let mut registry = Registry::new();
    registry.error("http", json!({"code": 503}));
    registry.info("http", json!({"code": 200}));
    registry.error("http", json!({"code": 500}));

    let errors = registry
        .query(
            "http",
            &Filter::new().with_equals("level", "error").with_limit(1),
        )
        .expect("query should succeed");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].body.get("code"), Some(&json!(500)));

    assert!(matches!(
        registry.query("http", &Filter::new().with_limit_value(json!("2"))),
        Err(CaptureError::InvalidConfig(_))
    ));
}

#[test]
fn emit_options_flow_through_registry() {
    let mut registry = Registry::new();
    let record = registry
        .emit(
            "jobs",
            json!({"id": 9}),
            &EmitOptions::level("warn").with_event("retry").with_trace("t-1"),
        )
        .expect("record stored");

    assert_eq!(record.header.level, "warn");
    assert_eq!(record.header.event.as_deref(), Some("retry"));
    assert_eq!(record.header.trace, Some(json!("t-1")));
    assert_eq!(record.header.source, "jobs");
}

struct CountingResolver {
    hits: Arc<AtomicUsize>,
}

impl HookResolver for CountingResolver {
    fn resolve_accept(&self, reference: &Value) -> Option<AcceptHook> {
        if reference != &json!("count") {
            return None;
        }
        let hits = Arc::clone(&self.hits);
        Some(Arc::new(move |_: &Record, _: &Stream, _: &Workspace| {
            hits.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

#[test]
fn resolver_is_shared_with_created_streams() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new().with_resolver(Arc::new(CountingResolver {
        hits: Arc::clone(&hits),
    }));

    let mut options = StreamOptions::default();
    options.on_accept = Some(HookRef::named("count"));
    registry.create("audit", options).expect("resolver resolves hook");
    registry.info("audit", json!({"who": "root"}));
    registry.info("audit", json!({"who": "ops"}));
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let mut unknown = StreamOptions::default();
    unknown.on_accept = Some(HookRef::named("missing"));
    assert!(matches!(
        registry.create("other", unknown),
        Err(CaptureError::InvalidConfig(_))
    ));
}
