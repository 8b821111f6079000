use followgraph::channels::Channel;
use followgraph::models::StageResult;
use followgraph::state::VersionedState;
use serde_json::{Value, json};

#[test]
fn test_default_state_initializes_fields() {
    let s = VersionedState::default();
    let snap = s.snapshot();
    assert!(snap.results.is_empty());
    assert_eq!(snap.results_version, 1);
    assert!(snap.outputs.is_empty());
    assert_eq!(snap.outputs_version, 1);
    assert!(snap.errors.is_empty());
    assert_eq!(snap.errors_version, 1);
}

#[test]
fn test_builder_initializes_fields() {
    let results = vec![StageResult::local("fetch", 1), StageResult::local("rfm", 2)];
    let state = VersionedState::builder()
        .with_result(results[0].clone())
        .with_result(results[1].clone())
        .build();
    let snapshot = state.snapshot();

    assert_eq!(snapshot.results.len(), 2);
    assert_eq!(snapshot.results[0], results[0]);
    assert_eq!(snapshot.results[1], results[1]);
    assert_eq!(snapshot.results_version, 1);
    assert!(snapshot.outputs.is_empty());
    assert_eq!(snapshot.outputs_version, 1);
    assert!(snapshot.errors.is_empty());
    assert_eq!(snapshot.errors_version, 1);
}

#[test]
fn test_snapshot_is_deep_copy() {
    let mut s = VersionedState::builder()
        .with_result(StageResult::local("rfm", 1))
        .build();
    let snap = s.snapshot();
    s.results.get_mut()[0].stage = "changed".into();
    s.outputs
        .get_mut()
        .insert("k".into(), Value::String("v".into()));
    assert_eq!(snap.results[0].stage, "rfm");
    assert!(!snap.outputs.contains_key("k"));
}

#[test]
fn test_outputs_flexible_types() {
    let mut s = VersionedState::default();
    s.outputs.get_mut().insert("number".into(), json!(123));
    s.outputs.get_mut().insert("text".into(), json!("abc"));
    s.outputs.get_mut().insert("array".into(), json!([1, 2, 3]));
    let snap = s.snapshot();
    assert_eq!(snap.outputs["number"], json!(123));
    assert_eq!(snap.outputs["text"], json!("abc"));
    assert_eq!(snap.outputs["array"], json!([1, 2, 3]));
}

#[test]
fn test_clone_is_deep() {
    let mut s = VersionedState::builder()
        .with_result(StageResult::local("fetch", 3))
        .build();
    s.outputs
        .get_mut()
        .insert("k1".into(), Value::String("v1".into()));
    let cloned = s.clone();
    s.results.get_mut()[0].stage = "changed".into();
    s.outputs
        .get_mut()
        .insert("k2".into(), Value::String("v2".into()));
    assert_ne!(cloned.results.snapshot(), s.results.snapshot());
    assert_ne!(cloned.outputs.snapshot(), s.outputs.snapshot());
    assert_eq!(cloned.results.snapshot()[0].stage, "fetch");
    assert_eq!(
        cloned.outputs.snapshot().get("k1"),
        Some(&Value::String("v1".into()))
    );
    assert!(!cloned.outputs.snapshot().contains_key("k2"));
}

#[test]
fn test_builder_pattern() {
    let state = VersionedState::builder()
        .with_output("customer", json!({"id": "C001", "segment": "Hotel"}))
        .with_output("orders", json!([]))
        .with_output("as_of", json!("2025-08-21"))
        .with_result(StageResult::local("fetch", 12))
        .build();

    let snapshot = state.snapshot();
    assert_eq!(snapshot.outputs.len(), 3);
    assert_eq!(snapshot.outputs["customer"]["id"], json!("C001"));
    assert_eq!(snapshot.outputs.get("orders"), Some(&json!([])));
    assert_eq!(snapshot.outputs.get("as_of"), Some(&json!("2025-08-21")));

    assert_eq!(snapshot.results.len(), 1);
    assert_eq!(snapshot.results[0].stage, "fetch");
    assert_eq!(snapshot.results[0].latency_ms, 12);
}

#[test]
fn test_convenience_methods() {
    let mut state = VersionedState::default();
    let _ = state
        .add_result(StageResult::local("rfm", 2))
        .add_output("rfm", json!(63))
        .add_output("churn_risk", json!(0.171));

    let snapshot = state.snapshot();
    assert_eq!(snapshot.results.len(), 1);
    assert_eq!(snapshot.results[0].stage, "rfm");

    assert_eq!(snapshot.outputs.len(), 2);
    assert_eq!(snapshot.outputs.get("rfm"), Some(&json!(63)));
    assert_eq!(snapshot.outputs.get("churn_risk"), Some(&json!(0.171)));
}

#[test]
fn test_snapshot_output_accessor() {
    let state = VersionedState::builder()
        .with_output("summary", json!("Steady account."))
        .build();
    let snap = state.snapshot();
    assert_eq!(snap.output("summary"), Some(&json!("Steady account.")));
    assert_eq!(snap.output("missing"), None);
}
