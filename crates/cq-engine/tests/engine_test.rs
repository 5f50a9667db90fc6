//! End-to-end tests for chain evaluation and dispatch

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FailingAction, Journal, RecordingAction, ScriptedCondition, SuspendingAction};
use cq_core::{Context, EventOccurrence, UserInputValue};
use cq_engine::{
    AlwaysTrue, Chain, ChainDispatcher, DispatchError, LinkError, LinkEvaluator, LinkGraph,
    UpdateVariable,
};
use cq_event_bus::EventBus;
use cq_variables::{ReadWriteVariable, Variable, VariableOptions, VariableValueChangedEvent};
use serde_json::json;
use tokio_test::assert_ok;

fn yes() -> Vec<UserInputValue> {
    vec![UserInputValue::new("input", true)]
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_depth_first_order_across_branches() {
    let journal = Journal::new();
    let mut builder = LinkGraph::builder();
    let root = builder.add_link("root").unwrap();
    let a = builder.add_link("a").unwrap();
    let a1 = builder.add_link("a1").unwrap();
    let b = builder.add_link("b").unwrap();

    builder.add_action(root, RecordingAction::arc("root", &journal), vec![]).unwrap();
    builder
        .add_conditional_link(root, ScriptedCondition::arc("to-a", true, &journal), vec![], a)
        .unwrap();
    builder
        .add_conditional_link(root, ScriptedCondition::arc("to-b", true, &journal), vec![], b)
        .unwrap();
    builder.add_action(a, RecordingAction::arc("a", &journal), vec![]).unwrap();
    builder
        .add_conditional_link(a, ScriptedCondition::arc("to-a1", true, &journal), vec![], a1)
        .unwrap();
    builder.add_action(a1, RecordingAction::arc("a1", &journal), vec![]).unwrap();
    builder.add_action(b, RecordingAction::arc("b", &journal), vec![]).unwrap();
    let graph = builder.build();

    assert_ok!(LinkEvaluator::default().evaluate(&graph, root).await);

    journal.assert_entries(&["root", "?to-a", "a", "?to-a1", "a1", "?to-b", "b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_suspending_steps_finish_before_the_next_starts() {
    let journal = Journal::new();
    let mut builder = LinkGraph::builder();
    let root = builder.add_link("root").unwrap();
    let first = builder.add_link("first").unwrap();
    let second = builder.add_link("second").unwrap();

    builder.add_action(root, SuspendingAction::arc("a1", &journal), vec![]).unwrap();
    builder.add_action(root, SuspendingAction::arc("a2", &journal), vec![]).unwrap();
    builder
        .add_conditional_link(root, ScriptedCondition::arc("to-first", true, &journal), vec![], first)
        .unwrap();
    builder
        .add_conditional_link(root, ScriptedCondition::arc("to-second", true, &journal), vec![], second)
        .unwrap();
    builder.add_action(first, SuspendingAction::arc("l1", &journal), vec![]).unwrap();
    builder.add_action(second, SuspendingAction::arc("l2", &journal), vec![]).unwrap();
    let graph = builder.build();

    assert_ok!(LinkEvaluator::default().evaluate(&graph, root).await);

    journal.assert_entries(&[
        "a1:start",
        "a1:end",
        "a2:start",
        "a2:end",
        "?to-first",
        "l1:start",
        "l1:end",
        "?to-second",
        "l2:start",
        "l2:end",
    ]);
}

#[tokio::test]
async fn test_false_conditions_are_still_evaluated_in_order() {
    let journal = Journal::new();
    let mut builder = LinkGraph::builder();
    let root = builder.add_link("root").unwrap();
    let skipped = builder.add_link("skipped").unwrap();
    let taken = builder.add_link("taken").unwrap();

    builder
        .add_conditional_link(root, ScriptedCondition::arc("no", false, &journal), vec![], skipped)
        .unwrap();
    builder
        .add_conditional_link(root, ScriptedCondition::arc("yes", true, &journal), vec![], taken)
        .unwrap();
    builder.add_action(skipped, RecordingAction::arc("skipped", &journal), vec![]).unwrap();
    builder.add_action(taken, RecordingAction::arc("taken", &journal), vec![]).unwrap();
    let graph = builder.build();

    let trace = LinkEvaluator::default().evaluate(&graph, root).await.unwrap();

    journal.assert_entries(&["?no", "?yes", "taken"]);
    assert_eq!(trace.branches_taken(), 1);
}

#[tokio::test]
async fn test_failure_in_branch_keeps_earlier_effects() {
    let journal = Journal::new();
    let mut builder = LinkGraph::builder();
    let root = builder.add_link("root").unwrap();
    let bad = builder.add_link("bad").unwrap();
    let later = builder.add_link("later").unwrap();

    builder.add_action(root, RecordingAction::arc("root", &journal), vec![]).unwrap();
    builder.add_conditional_link(root, Arc::new(AlwaysTrue), yes(), bad).unwrap();
    builder.add_conditional_link(root, Arc::new(AlwaysTrue), yes(), later).unwrap();
    builder.add_action(bad, FailingAction::arc("explode", &journal), vec![]).unwrap();
    builder.add_action(bad, RecordingAction::arc("after-explode", &journal), vec![]).unwrap();
    builder.add_action(later, RecordingAction::arc("later", &journal), vec![]).unwrap();
    let graph = builder.build();

    let err = LinkEvaluator::default().evaluate(&graph, root).await.unwrap_err();

    match err {
        LinkError::Action { link_id, action, .. } => {
            assert_eq!(link_id, "bad");
            assert_eq!(action, "explode");
        }
        other => panic!("expected action failure, got {other:?}"),
    }
    journal.assert_entries(&["root", "explode"]);
}

#[tokio::test]
async fn test_indirect_cycle_stops_with_path() {
    let journal = Journal::new();
    let mut builder = LinkGraph::builder();
    let a = builder.add_link("a").unwrap();
    let b = builder.add_link("b").unwrap();
    builder.add_action(a, RecordingAction::arc("a", &journal), vec![]).unwrap();
    builder.add_action(b, RecordingAction::arc("b", &journal), vec![]).unwrap();
    builder.add_conditional_link(a, Arc::new(AlwaysTrue), yes(), b).unwrap();
    builder.add_conditional_link(b, Arc::new(AlwaysTrue), yes(), a).unwrap();
    let graph = builder.build();

    let err = LinkEvaluator::default().evaluate(&graph, a).await.unwrap_err();

    match err {
        LinkError::CycleDetected { link_id, path } => {
            assert_eq!(link_id, "a");
            assert_eq!(path, vec!["a", "b", "a"]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
    journal.assert_entries(&["a", "b"]);
}

#[tokio::test]
async fn test_chains_sharing_an_event_all_run() {
    let journal = Journal::new();
    let dispatcher = ChainDispatcher::new(Arc::new(EventBus::new()));

    for tag in ["first", "second", "third"] {
        let mut builder = LinkGraph::builder();
        let start = builder.add_link(tag).unwrap();
        builder.add_action(start, RecordingAction::arc(tag, &journal), vec![]).unwrap();
        dispatcher.register_chain(Chain::new("doorbell", builder.build(), start).unwrap());
    }

    let occurrence = EventOccurrence::new("doorbell", json!(null), Context::new());
    let outcomes = dispatcher.dispatch_and_wait(&occurrence).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.is_ok()));

    let mut entries = journal.entries();
    entries.sort();
    assert_eq!(entries, vec!["first", "second", "third"]);

    let record = dispatcher.events().get(&"doorbell".into()).unwrap();
    assert_eq!(record.last_triggered, Some(occurrence.time_fired));
}

#[tokio::test]
async fn test_one_failing_chain_does_not_affect_others() {
    let journal = Journal::new();
    let dispatcher = ChainDispatcher::new(Arc::new(EventBus::new()));

    let mut failing = LinkGraph::builder();
    let start = failing.add_link("failing").unwrap();
    failing.add_action(start, FailingAction::arc("fail", &journal), vec![]).unwrap();
    dispatcher.register_chain(Chain::new("tick", failing.build(), start).unwrap());

    let mut healthy = LinkGraph::builder();
    let start = healthy.add_link("healthy").unwrap();
    healthy.add_action(start, RecordingAction::arc("ok", &journal), vec![]).unwrap();
    dispatcher.register_chain(Chain::new("tick", healthy.build(), start).unwrap());

    let mut outcomes = Vec::new();
    for handle in dispatcher.trigger("tick") {
        outcomes.push(handle.wait().await);
    }

    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|o| matches!(o.result, Err(DispatchError::Link(LinkError::Action { .. })))));
    assert!(journal.contains("ok"));
}

#[tokio::test]
async fn test_variable_change_starts_another_chain() {
    let journal = Journal::new();
    let bus = Arc::new(EventBus::new());
    let dispatcher = Arc::new(ChainDispatcher::new(bus.clone()));

    let mode = Arc::new(ReadWriteVariable::new(VariableOptions::new(
        "mode",
        "Mode",
        json!("off"),
    )));
    let changed = VariableValueChangedEvent::new("mode-changed", mode.as_ref());
    changed.attach(&mode, bus.clone());
    dispatcher.register_event(changed.record().clone());

    let mut first = LinkGraph::builder();
    let start = first.add_link("switch-on").unwrap();
    first
        .add_action(
            start,
            Arc::new(UpdateVariable::new(mode.clone())),
            vec![UserInputValue::new("value", "on")],
        )
        .unwrap();
    first.add_action(start, RecordingAction::arc("switched", &journal), vec![]).unwrap();
    dispatcher.register_chain(Chain::new("button", first.build(), start).unwrap());

    let mut second = LinkGraph::builder();
    let start = second.add_link("react").unwrap();
    second.add_action(start, RecordingAction::arc("reacted", &journal), vec![]).unwrap();
    dispatcher.register_chain(Chain::new("mode-changed", second.build(), start).unwrap());

    dispatcher.start();
    bus.fire(EventOccurrence::new("button", json!(null), Context::new()));

    wait_until(|| journal.contains("reacted")).await;

    assert!(journal.contains("switched"));
    assert_eq!(mode.retrieve_value().await, json!("on"));
    let record = dispatcher.events().get(&"mode-changed".into()).unwrap();
    assert_eq!(record.variable_id(), Some("mode"));
    assert!(record.last_triggered.is_some());

    dispatcher.stop();
}
