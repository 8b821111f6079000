mod common;

use common::*;
use followgraph::event_bus::{ChannelSink, Event, EventBus, InvokerEvent, MemorySink};
use followgraph::graphs::GraphBuilder;
use followgraph::state::VersionedState;
use followgraph::types::StageKind;
use rustc_hash::FxHashMap;

#[tokio::test]
async fn stop_listener_flushes_pending_events() {
    let sink = MemorySink::new();
    let sink_snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);

    bus.listen_for_events();

    bus.get_sender()
        .send(Event::stage_message_with_meta(
            "test-stage",
            42,
            "scope",
            "payload",
        ))
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    bus.stop_listener().await;

    let entries = sink_snapshot.snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message(), "payload");
}

#[tokio::test]
async fn stopping_without_events_is_noop() {
    let bus = EventBus::with_sink(MemorySink::new());
    bus.listen_for_events();
    bus.stop_listener().await;
}

#[tokio::test]
async fn memory_sink_captures_events_with_scope_and_messages() {
    let sink = MemorySink::new();
    let sink_snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);

    bus.listen_for_events();

    let sender = bus.get_sender();

    // Same scope twice
    sender
        .send(Event::stage_message("Scope1", "one"))
        .expect("emit one");
    sender
        .send(Event::stage_message("Scope1", "two"))
        .expect("emit two");

    // Different scope
    sender
        .send(Event::diagnostic("Scope2", "three"))
        .expect("emit three");
    sender
        .send(Event::diagnostic("Scope2", "four"))
        .expect("emit four");

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    bus.stop_listener().await;

    let entries = sink_snapshot.snapshot();
    assert_eq!(entries.len(), 4);

    assert_eq!(entries[0].scope_label(), Some("Scope1"));
    assert_eq!(entries[0].message(), "one");

    assert_eq!(entries[1].scope_label(), Some("Scope1"));
    assert_eq!(entries[1].message(), "two");

    assert_eq!(entries[2].scope_label(), Some("Scope2"));
    assert_eq!(entries[2].message(), "three");

    assert_eq!(entries[3].scope_label(), Some("Scope2"));
    assert_eq!(entries[3].message(), "four");
}

#[tokio::test]
async fn multiple_listen_calls_are_idempotent() {
    let sink = MemorySink::new();
    let sink_snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);

    // Call listen multiple times; only one listener should be active.
    bus.listen_for_events();
    bus.listen_for_events();
    bus.listen_for_events();

    let sender = bus.get_sender();
    sender.send(Event::stage_message("S", "a")).unwrap();
    sender.send(Event::stage_message("S", "b")).unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    bus.stop_listener().await;

    assert_eq!(sink_snapshot.len(), 2);
}

#[tokio::test]
async fn channel_sink_streams_to_flume_receiver() {
    let (tx, rx) = flume::unbounded();
    let bus = EventBus::with_sink(MemorySink::new());
    bus.add_sink(ChannelSink::new(tx));
    bus.listen_for_events();

    bus.get_sender()
        .send(Event::diagnostic("stream", "first"))
        .unwrap();
    bus.get_sender()
        .send(Event::diagnostic("stream", "second"))
        .unwrap();

    let first = rx.recv_async().await.unwrap();
    let second = rx.recv_async().await.unwrap();
    assert_eq!(first.message(), "first");
    assert_eq!(second.message(), "second");

    bus.stop_listener().await;
}

#[tokio::test]
async fn memory_sink_filters_invoker_events() {
    let sink = MemorySink::new();
    let sink_snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);
    bus.listen_for_events();

    let sender = bus.get_sender();
    sender.send(Event::stage_message("scoring", "rfm 72")).unwrap();
    sender
        .send(Event::Invoker(InvokerEvent::attempt_event(
            "summary",
            1,
            "accepted",
            120,
            256,
            64,
            0.0004,
            FxHashMap::default(),
        )))
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    bus.stop_listener().await;

    assert_eq!(sink_snapshot.len(), 2);
    let invoker_only = sink_snapshot.invoker_events();
    assert_eq!(invoker_only.len(), 1);
    assert_eq!(invoker_only[0].scope_label(), Some("attempt"));
}

/// Emits one event through the context before producing its output.
struct ProbeStage;

#[async_trait::async_trait]
impl followgraph::stage::Stage for ProbeStage {
    async fn run(
        &self,
        _snapshot: followgraph::state::StateSnapshot,
        ctx: followgraph::stage::StageContext,
    ) -> Result<followgraph::stage::StagePartial, followgraph::stage::StageError> {
        ctx.emit("probe", "stage event")?;
        let mut outputs = FxHashMap::default();
        outputs.insert("probed".to_string(), serde_json::json!(true));
        Ok(followgraph::stage::StagePartial::new().with_outputs(outputs))
    }
}

#[tokio::test]
async fn invoke_with_channel_streams_stage_events() {
    let workflow = GraphBuilder::new()
        .add_stage(StageKind::Custom("probe".into()), ProbeStage)
        .add_stage(StageKind::Custom("after".into()), TestStage { name: "after" })
        .add_edge(StageKind::Start, StageKind::Custom("probe".into()))
        .add_edge(StageKind::Custom("probe".into()), StageKind::Custom("after".into()))
        .add_edge(StageKind::Custom("after".into()), StageKind::End)
        .compile()
        .unwrap();

    let (result, rx) = workflow
        .invoke_with_channel(VersionedState::default())
        .await;
    result.unwrap();

    let events: Vec<Event> = rx.drain().collect();
    assert!(
        events
            .iter()
            .any(|e| e.scope_label() == Some("probe") && e.message() == "stage event"),
        "expected the probe stage event, got: {:?}",
        events
    );
}

#[tokio::test]
async fn runner_emits_run_end_diagnostic() {
    let sink = MemorySink::new();
    let sink_snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);

    let workflow = GraphBuilder::new()
        .add_stage(StageKind::Custom("only".into()), TestStage { name: "only" })
        .add_edge(StageKind::Start, StageKind::Custom("only".into()))
        .add_edge(StageKind::Custom("only".into()), StageKind::End)
        .compile()
        .unwrap();
    let mut runner = followgraph::runtimes::WorkflowRunner::with_bus(workflow, bus, true);
    runner
        .create_session("boundary".into(), VersionedState::default())
        .unwrap();
    runner.run_until_complete("boundary").await.unwrap();

    // The runner still owns the bus, so the listener can drain the queue.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let events = sink_snapshot.snapshot();
    assert!(
        events
            .iter()
            .any(|e| e.scope_label() == Some("run_end") && e.message().contains("completed")),
        "expected a run_end diagnostic, got: {:?}",
        events
    );
}
