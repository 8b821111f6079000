mod common;

use common::*;
use followgraph::channels::Channel;
use followgraph::graphs::{EdgePredicate, GraphBuilder};
use followgraph::runtimes::{RunnerError, WorkflowRunner};
use followgraph::state::{StateSnapshot, VersionedState};
use followgraph::types::{ChannelType, StageKind};
use followgraph::workflow::Workflow;
use serde_json::json;

fn make_test_workflow() -> Workflow {
    GraphBuilder::new()
        .add_stage(StageKind::Custom("test".into()), TestStage { name: "test" })
        .add_edge(StageKind::Start, StageKind::Custom("test".into()))
        .add_edge(StageKind::Custom("test".into()), StageKind::End)
        .compile()
        .unwrap()
}

#[tokio::test]
async fn test_create_session() {
    let workflow = make_test_workflow();
    let mut runner = WorkflowRunner::new(workflow);
    let initial_state = VersionedState::builder()
        .with_output("customer", json!({"id": "C001"}))
        .build();

    runner
        .create_session("test_session".into(), initial_state)
        .unwrap();
    assert!(runner.get_session("test_session").is_some());
    assert_eq!(runner.list_sessions().len(), 1);

    let session = runner.get_session("test_session").unwrap();
    assert_eq!(session.step, 0);
    assert_eq!(session.frontier, vec![StageKind::Custom("test".into())]);
}

#[tokio::test]
async fn test_create_session_duplicate_id() {
    let workflow = make_test_workflow();
    let mut runner = WorkflowRunner::new(workflow);

    runner
        .create_session("dup".into(), VersionedState::default())
        .unwrap();
    let err = runner
        .create_session("dup".into(), VersionedState::default())
        .err()
        .unwrap();
    assert!(matches!(err, RunnerError::SessionExists { .. }));
}

#[tokio::test]
async fn test_create_session_empty_frontier() {
    // The only entry is a conditional edge whose predicate routes nowhere.
    let route_nowhere: EdgePredicate = std::sync::Arc::new(|_s| vec![]);
    let workflow = GraphBuilder::new()
        .add_stage(StageKind::Custom("idle".into()), NoopStage)
        .add_conditional_edge(StageKind::Start, route_nowhere)
        .compile()
        .unwrap();
    let mut runner = WorkflowRunner::new(workflow);

    let err = runner
        .create_session("empty".into(), VersionedState::default())
        .err()
        .unwrap();
    assert!(matches!(err, RunnerError::NoStartStages));
}

#[tokio::test]
async fn test_start_conditional_seeds_frontier() {
    let route: EdgePredicate = std::sync::Arc::new(|snap: StateSnapshot| {
        if snap.outputs.contains_key("go_yes") {
            vec!["Y".to_string()]
        } else {
            vec!["N".to_string()]
        }
    });
    let workflow = GraphBuilder::new()
        .add_stage(StageKind::Custom("Y".into()), TestStage { name: "Y" })
        .add_stage(StageKind::Custom("N".into()), TestStage { name: "N" })
        .add_conditional_edge(StageKind::Start, route)
        .compile()
        .unwrap();
    let mut runner = WorkflowRunner::new(workflow);

    let state = VersionedState::builder()
        .with_output("go_yes", json!(1))
        .build();
    runner.create_session("yes".into(), state).unwrap();
    assert_eq!(
        runner.get_session("yes").unwrap().frontier,
        vec![StageKind::Custom("Y".into())]
    );

    runner
        .create_session("no".into(), VersionedState::default())
        .unwrap();
    assert_eq!(
        runner.get_session("no").unwrap().frontier,
        vec![StageKind::Custom("N".into())]
    );
}

#[tokio::test]
async fn test_run_step_basic() {
    let workflow = make_test_workflow();
    let mut runner = WorkflowRunner::new(workflow);
    runner
        .create_session("test_session".into(), VersionedState::default())
        .unwrap();

    let report = runner.run_step("test_session").await.unwrap();
    assert_eq!(report.step, 1);
    assert_eq!(report.ran_stages, vec![StageKind::Custom("test".into())]);
    assert!(report
        .barrier_outcome
        .updated_channels
        .contains(&ChannelType::Results));
    assert!(report
        .barrier_outcome
        .updated_channels
        .contains(&ChannelType::Outputs));
    assert_eq!(report.next_frontier, vec![StageKind::End]);
    assert!(report.completed);
    assert_eq!(report.state_versions.results_version, 2);
    assert_eq!(report.state_versions.outputs_version, 2);
    assert_eq!(report.state_versions.errors_version, 1);
}

#[tokio::test]
async fn test_run_step_terminal_session_reports_completed() {
    let workflow = make_test_workflow();
    let mut runner = WorkflowRunner::new(workflow);
    runner
        .create_session("s".into(), VersionedState::default())
        .unwrap();

    let first = runner.run_step("s").await.unwrap();
    assert!(first.completed);

    // The frontier is now only End; further steps are no-ops.
    let second = runner.run_step("s").await.unwrap();
    assert!(second.completed);
    assert!(second.ran_stages.is_empty());
    assert_eq!(second.skipped_stages, vec![StageKind::End]);
}

#[tokio::test]
async fn test_run_step_unknown_session() {
    let workflow = make_test_workflow();
    let mut runner = WorkflowRunner::new(workflow);
    let err = runner.run_step("missing").await.err().unwrap();
    assert!(matches!(err, RunnerError::SessionNotFound { .. }));
}

#[tokio::test]
async fn test_conditional_edge_routing_after_stage() {
    let pred: EdgePredicate = std::sync::Arc::new(|snap: StateSnapshot| {
        if snap.outputs.contains_key("go_yes") {
            vec!["Y".to_string()]
        } else {
            vec!["N".to_string()]
        }
    });
    let workflow = GraphBuilder::new()
        .add_stage(StageKind::Custom("Root".into()), TestStage { name: "root" })
        .add_stage(StageKind::Custom("Y".into()), TestStage { name: "yes" })
        .add_stage(StageKind::Custom("N".into()), TestStage { name: "no" })
        .add_edge(StageKind::Start, StageKind::Custom("Root".into()))
        .add_edge(StageKind::Custom("Y".into()), StageKind::End)
        .add_edge(StageKind::Custom("N".into()), StageKind::End)
        .add_conditional_edge(StageKind::Custom("Root".into()), pred)
        .compile()
        .unwrap();
    let mut runner = WorkflowRunner::new(workflow);

    let state = VersionedState::builder()
        .with_output("go_yes", json!(1))
        .build();
    runner.create_session("sess1".into(), state).unwrap();
    let report = runner.run_step("sess1").await.unwrap();
    assert!(report.next_frontier.contains(&StageKind::Custom("Y".into())));
    assert!(!report.next_frontier.contains(&StageKind::Custom("N".into())));

    runner
        .create_session("sess2".into(), VersionedState::default())
        .unwrap();
    let report2 = runner.run_step("sess2").await.unwrap();
    assert!(report2.next_frontier.contains(&StageKind::Custom("N".into())));
    assert!(!report2.next_frontier.contains(&StageKind::Custom("Y".into())));
}

#[tokio::test]
async fn test_run_until_complete_collects_all_outputs() {
    let workflow = GraphBuilder::new()
        .add_stage(StageKind::Custom("A".into()), TestStage { name: "A" })
        .add_stage(StageKind::Custom("B".into()), TestStage { name: "B" })
        .add_edge(StageKind::Start, StageKind::Custom("A".into()))
        .add_edge(StageKind::Custom("A".into()), StageKind::Custom("B".into()))
        .add_edge(StageKind::Custom("B".into()), StageKind::End)
        .compile()
        .unwrap();
    let mut runner = WorkflowRunner::new(workflow);
    runner
        .create_session("run".into(), VersionedState::default())
        .unwrap();

    let final_state = runner.run_until_complete("run").await.unwrap();
    assert_output_has(&final_state, "A_ran");
    assert_output_has(&final_state, "B_ran");
    assert_result_recorded(&final_state, "A");
    assert_result_recorded(&final_state, "B");
    // Two supersteps, each bumping results and outputs once.
    assert_eq!(final_state.results.version(), 3);
    assert_eq!(final_state.outputs.version(), 3);
}

#[tokio::test]
async fn test_failing_stage_lands_on_errors_channel() {
    let workflow = GraphBuilder::new()
        .add_stage(StageKind::Custom("boom".into()), FailingStage::default())
        .add_edge(StageKind::Start, StageKind::Custom("boom".into()))
        .add_edge(StageKind::Custom("boom".into()), StageKind::End)
        .compile()
        .unwrap();
    let mut runner = WorkflowRunner::new(workflow);
    runner
        .create_session("failing".into(), VersionedState::default())
        .unwrap();

    let err = runner.run_until_complete("failing").await.err().unwrap();
    assert!(matches!(err, RunnerError::Scheduler(_)));

    // The failure is durably recorded before the error is rethrown.
    let session = runner.get_session("failing").unwrap();
    let errors = session.state.errors.snapshot();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].tags.contains(&"stage".to_string()));
    assert!(errors[0].error.message.contains("test_key"));
    assert_eq!(session.state.errors.version(), 2);
}
