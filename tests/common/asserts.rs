use followgraph::channels::Channel;
use followgraph::state::VersionedState;
use followgraph::types::StageKind;
use followgraph::workflow::Workflow;

#[allow(dead_code)]
pub fn assert_edge(workflow: &Workflow, from: StageKind, to: StageKind) {
    let edges = workflow.edges();
    let outs = edges.get(&from).expect("source stage has edges");
    assert!(outs.contains(&to), "expected edge {from:?} -> {to:?}");
}

#[allow(dead_code)]
pub fn assert_output_has(state: &VersionedState, key: &str) {
    let outputs = state.outputs.snapshot();
    assert!(
        outputs.contains_key(key),
        "expected outputs to have key '{key}', got keys: {:?}",
        outputs.keys().collect::<Vec<_>>()
    );
}

#[allow(dead_code)]
pub fn assert_result_recorded(state: &VersionedState, stage: &str) {
    let results = state.results.snapshot();
    let found = results.iter().any(|r| r.stage == stage);
    assert!(
        found,
        "expected a result record for stage '{stage}', got: {:?}",
        results.iter().map(|r| &r.stage).collect::<Vec<_>>()
    );
}
