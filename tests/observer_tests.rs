//! End-to-end tests for the marker observer running against the in-memory
//! document: arrival paths, duplicate suppression, endpoint changes,
//! top-level mode and deferred activation.

use dashboard_relay::*;
use rstest::rstest;
use serde_json::{json, Value};
use tokio::sync::mpsc;

fn drain(rx: &mut mpsc::UnboundedReceiver<Value>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(v) = rx.try_recv() {
        out.push(v);
    }
    out
}

fn embedded_observer() -> (MessageBus, mpsc::UnboundedReceiver<Value>, MarkerObserver<ParentSink>) {
    let bus = MessageBus::new();
    let rx = bus.subscribe();
    let observer = MarkerObserver::new(ParentSink::embedded(bus.clone()));
    (bus, rx, observer)
}

// ---------------------------------------------------------------------------
// Arrival paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Arrival {
    SubtreeInsertion,
    TextNodeInsertion,
    TextMutation,
}

fn deliver(doc: &MemoryDocument, arrival: Arrival, text: &str) {
    match arrival {
        Arrival::SubtreeInsertion => {
            doc.append_message(text);
        }
        Arrival::TextNodeInsertion => {
            let p = doc.create_element("p");
            doc.append_child(&doc.body(), &p);
            doc.append_child(&p, &doc.create_text(text));
        }
        Arrival::TextMutation => {
            let node = doc.append_message("Building your dashboard...");
            doc.set_text(&node, text);
        }
    }
}

#[rstest]
#[case(Arrival::SubtreeInsertion)]
#[case(Arrival::TextNodeInsertion)]
#[case(Arrival::TextMutation)]
fn test_single_marker_notifies_once_for_every_arrival_path(#[case] arrival: Arrival) {
    let doc = MemoryDocument::new();
    let (_bus, mut rx, observer) = embedded_observer();
    let mut attached = observer.attach(&doc);

    deliver(&doc, arrival, "Dashboard ready <!--DASHBOARD:10.0.0.5:8050-->");
    doc.flush();
    attached.process_pending();

    assert_eq!(
        drain(&mut rx),
        vec![json!({"type": "DASHBOARD_PORT", "host": "10.0.0.5", "port": 8050})]
    );
}

#[rstest]
#[case(Arrival::SubtreeInsertion)]
#[case(Arrival::TextNodeInsertion)]
#[case(Arrival::TextMutation)]
fn test_arrival_split_across_batches_still_notifies_once(#[case] arrival: Arrival) {
    let doc = MemoryDocument::new();
    let (_bus, mut rx, observer) = embedded_observer();
    let mut attached = observer.attach(&doc);

    deliver(&doc, arrival, "<!--DASHBOARD_PORT:9000-->");
    doc.flush();
    attached.process_pending();
    doc.append_message("unrelated follow-up");
    doc.flush();
    attached.process_pending();

    assert_eq!(drain(&mut rx).len(), 1);
}

// ---------------------------------------------------------------------------
// Duplicate suppression and changes
// ---------------------------------------------------------------------------

#[test]
fn test_repeated_renders_of_same_endpoint_notify_once() {
    let doc = MemoryDocument::new();
    let (_bus, mut rx, observer) = embedded_observer();
    let mut attached = observer.attach(&doc);

    let node = doc.append_message("<!--DASHBOARD_PORT:9000-->");
    doc.append_message("some analysis text");
    doc.flush();
    attached.process_pending();

    doc.set_text(&node, "re-rendered <!--DASHBOARD_PORT:9000-->");
    doc.append_message("<!--DASHBOARD_PORT:9000-->");
    doc.append_message("more text");
    doc.flush();
    attached.process_pending();

    assert_eq!(drain(&mut rx), vec![json!({"type": "DASHBOARD_PORT", "port": 9000})]);
    assert_eq!(attached.observer().posted(), 1);
}

#[test]
fn test_changed_endpoint_notifies_in_order() {
    let doc = MemoryDocument::new();
    let (_bus, mut rx, observer) = embedded_observer();
    let mut attached = observer.attach(&doc);

    doc.append_message("<!--DASHBOARD_PORT:9000-->");
    doc.flush();
    attached.process_pending();
    doc.append_message("<!--DASHBOARD_PORT:9100-->");
    doc.flush();
    attached.process_pending();

    assert_eq!(
        drain(&mut rx),
        vec![
            json!({"type": "DASHBOARD_PORT", "port": 9000}),
            json!({"type": "DASHBOARD_PORT", "port": 9100}),
        ]
    );
}

#[test]
fn test_in_place_edit_to_new_endpoint_notifies() {
    let doc = MemoryDocument::new();
    let (_bus, mut rx, observer) = embedded_observer();
    let mut attached = observer.attach(&doc);

    let node = doc.append_message("<!--DASHBOARD:10.0.0.5:8050-->");
    doc.flush();
    attached.process_pending();
    doc.set_text(&node, "<!--DASHBOARD:10.0.0.6:8050-->");
    doc.flush();
    attached.process_pending();

    let hosts: Vec<Value> = drain(&mut rx).into_iter().map(|m| m["host"].clone()).collect();
    assert_eq!(hosts, vec![json!("10.0.0.5"), json!("10.0.0.6")]);
}

#[test]
fn test_malformed_markers_never_notify() {
    let doc = MemoryDocument::new();
    let (_bus, mut rx, observer) = embedded_observer();
    let mut attached = observer.attach(&doc);

    doc.append_message("<!--DASHBOARD_PORT:0-->");
    doc.append_message("<!--DASHBOARD_PORT:port-->");
    doc.append_message("<!--DASHBOARD::8050-->");
    doc.flush();
    attached.process_pending();

    assert!(drain(&mut rx).is_empty());
    assert!(attached.observer().last_key().is_none());
}

#[test]
fn test_comment_nodes_are_not_text_content() {
    let doc = MemoryDocument::new();
    let (_bus, mut rx, observer) = embedded_observer();
    let mut attached = observer.attach(&doc);

    let div = doc.create_element("div");
    doc.append_child(&div, &doc.create_comment("<!--DASHBOARD_PORT:9000-->"));
    doc.append_child(&doc.body(), &div);
    doc.flush();
    attached.process_pending();

    assert!(drain(&mut rx).is_empty());
}

// ---------------------------------------------------------------------------
// Initial scan and activation
// ---------------------------------------------------------------------------

#[test]
fn test_attach_scans_existing_content() {
    let doc = MemoryDocument::new();
    doc.append_message("<!--DASHBOARD_PORT:9000-->");
    let (_bus, mut rx, observer) = embedded_observer();

    let attached = observer.attach(&doc);

    assert_eq!(attached.observer().posted(), 1);
    assert_eq!(drain(&mut rx), vec![json!({"type": "DASHBOARD_PORT", "port": 9000})]);
}

#[tokio::test]
async fn test_observer_waits_for_initial_parse() {
    let doc = MemoryDocument::loading();
    doc.append_message("<!--DASHBOARD_PORT:9000-->");
    let (_bus, mut rx, observer) = embedded_observer();

    let task = tokio::spawn(observer.observe_when_ready(doc.clone()));
    tokio::task::yield_now().await;
    assert!(drain(&mut rx).is_empty(), "nothing may be scanned while loading");

    doc.finish_parsing();
    tokio::task::yield_now().await;
    doc.append_message("<!--DASHBOARD_PORT:9100-->");
    doc.close();

    let observer = task.await.unwrap();
    assert_eq!(observer.posted(), 2);
    assert_eq!(
        drain(&mut rx),
        vec![
            json!({"type": "DASHBOARD_PORT", "port": 9000}),
            json!({"type": "DASHBOARD_PORT", "port": 9100}),
        ]
    );
}

#[tokio::test]
async fn test_run_stops_when_document_closes() {
    let doc = MemoryDocument::new();
    let (_bus, _rx, observer) = embedded_observer();
    let attached = observer.attach(&doc);
    let task = tokio::spawn(attached.run());

    doc.append_message("<!--DASHBOARD_PORT:9000-->");
    doc.flush();
    doc.close();

    let observer = task.await.unwrap();
    assert_eq!(observer.last_key(), Some("localhost:9000"));
}

// ---------------------------------------------------------------------------
// Top-level mode
// ---------------------------------------------------------------------------

#[test]
fn test_top_level_observer_never_posts() {
    let doc = MemoryDocument::new();
    doc.append_message("<!--DASHBOARD_PORT:9000-->");
    let mut attached = MarkerObserver::new(ParentSink::top_level()).attach(&doc);

    doc.append_message("<!--DASHBOARD_PORT:9100-->");
    doc.flush();
    attached.process_pending();

    let observer = attached.observer();
    assert_eq!(observer.posted(), 0);
    assert_eq!(observer.last_seen().map(|e| e.port()), Some(9100));
    assert!(observer.last_key().is_none());
}

#[test]
fn test_reparented_observer_delivers_next_detection() {
    let doc = MemoryDocument::new();
    let mut attached = MarkerObserver::new(ParentSink::top_level()).attach(&doc);
    let node = doc.append_message("<!--DASHBOARD_PORT:9000-->");
    doc.flush();
    attached.process_pending();

    let bus = MessageBus::new();
    let mut rx = bus.subscribe();
    attached.observer_mut().sink_mut().reparent(bus);
    doc.set_text(&node, "<!--DASHBOARD_PORT:9000-->");
    doc.flush();
    attached.process_pending();

    assert_eq!(drain(&mut rx), vec![json!({"type": "DASHBOARD_PORT", "port": 9000})]);
}

// ---------------------------------------------------------------------------
// Full pipeline: chat document -> parent window -> dashboard pane
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_scenario_host_port_marker_mounts_frame() {
    let bus = MessageBus::new();
    let mut pane = MountController::new().mount(&bus);
    let doc = MemoryDocument::new();
    let mut attached = MarkerObserver::new(ParentSink::embedded(bus.clone())).attach(&doc);

    assert_eq!(pane.view(), DashboardView::Placeholder);
    doc.append_message("...<!--DASHBOARD:10.0.0.5:8050-->...");
    doc.flush();
    attached.process_pending();

    let state = pane.changed().await.unwrap();
    assert_eq!(state.endpoint().unwrap().url(), "http://10.0.0.5:8050");
    match pane.view() {
        DashboardView::Frame(spec) => {
            assert_eq!(spec.src, "http://10.0.0.5:8050");
            assert_eq!(spec.key, "10.0.0.5:8050");
            assert_eq!(spec.title, "Evidence Dashboard");
        }
        other => panic!("expected frame, got {other:?}"),
    }
    pane.unmount().await;
}

#[tokio::test]
async fn test_scenario_port_only_marker_targets_localhost() {
    let bus = MessageBus::new();
    let mut pane = MountController::new().mount(&bus);
    let doc = MemoryDocument::new();
    let mut attached = MarkerObserver::new(ParentSink::embedded(bus.clone())).attach(&doc);

    doc.append_message("<!--DASHBOARD_PORT:9000-->");
    doc.flush();
    attached.process_pending();

    let state = pane.changed().await.unwrap();
    assert_eq!(state.endpoint().unwrap().url(), "http://localhost:9000");
    pane.unmount().await;
}

#[tokio::test]
async fn test_scenario_endpoint_change_remounts_frame() {
    let bus = MessageBus::new();
    let mut pane = MountController::new().mount(&bus);
    let mut slot = FrameSlot::new();
    let doc = MemoryDocument::new();
    let mut attached = MarkerObserver::new(ParentSink::embedded(bus.clone())).attach(&doc);
    assert_eq!(slot.reconcile(&pane.view()), RenderAction::ShowPlaceholder);

    let node = doc.append_message("<!--DASHBOARD_PORT:9000-->");
    doc.flush();
    attached.process_pending();
    pane.changed().await.unwrap();
    assert!(matches!(slot.reconcile(&pane.view()), RenderAction::Mount(_)));

    doc.set_text(&node, "<!--DASHBOARD_PORT:9100-->");
    doc.flush();
    attached.process_pending();
    pane.changed().await.unwrap();
    match slot.reconcile(&pane.view()) {
        RenderAction::Mount(spec) => assert_eq!(spec.src, "http://localhost:9100"),
        other => panic!("expected a fresh frame, got {other:?}"),
    }

    assert_eq!(attached.observer().posted(), 2);
    assert_eq!(slot.instances(), 2);
    pane.unmount().await;
}
