//! Source arbitration over the request surface.
//!
//! Drives the arbiter through the router the way a transport layer would,
//! with scripted backends standing in for real services.

mod mocks;

use audiohub::bus::Event;
use audiohub::models::{Source, SourceState};
use audiohub::router::{CallError, Request, Router};
use audiohub::source::SourceArbiter;

use mocks::{expect_event, MockBackend};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn transition_emits_source_changed_with_the_new_type() {
    let router = Router::new();
    router.register(MockBackend::new("bluetooth", &[]));
    router.register(SourceArbiter::new(router.clone()));
    let mut tap = router.subscribe();

    router
        .request(
            "source",
            Request::SetSource {
                source_type: Some("bluetooth".into()),
            },
        )
        .await
        .unwrap();

    let event = expect_event(
        &mut tap,
        |e| matches!(e, Event::SourceChanged { .. }),
        500,
    )
    .await
    .expect("source_changed should be broadcast");

    // Payload contract: the record serializes its type under "type".
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "source_changed");
    assert_eq!(json["source"]["type"], "bluetooth");
    router.shutdown().await;
}

#[tokio::test]
async fn refused_stop_surfaces_to_the_caller_and_keeps_state() {
    let router = Router::new();
    let stuck = MockBackend::refusing_stop("bluetooth");
    let spotify = MockBackend::new("spotify", &[]);
    router.register(stuck.clone());
    router.register(spotify.clone());
    let arbiter = SourceArbiter::new(router.clone());
    router.register(arbiter.clone());

    router
        .request(
            "source",
            Request::SetSource {
                source_type: Some("bluetooth".into()),
            },
        )
        .await
        .unwrap();

    let err = router
        .request(
            "source",
            Request::SetSource {
                source_type: Some("spotify".into()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::StopServiceFailed(_)));

    let current = router
        .request("source", Request::GetSource)
        .await
        .unwrap()
        .into_source("get")
        .unwrap();
    assert_eq!(current.source_type.as_deref(), Some("bluetooth"));
    assert_eq!(spotify.starts.load(Ordering::SeqCst), 0);
    router.shutdown().await;
}

#[tokio::test]
async fn backend_update_flows_through_update_source() {
    let router = Router::new();
    router.register(MockBackend::new("snapcast", &[]));
    let arbiter = SourceArbiter::new(router.clone());
    router.register(arbiter.clone());
    let mut tap = router.subscribe();

    router
        .request(
            "source",
            Request::SetSource {
                source_type: Some("snapcast".into()),
            },
        )
        .await
        .unwrap();

    let mut live = Source::disconnected(Some("snapcast".into()));
    live.controls = vec!["play".into(), "pause".into()];
    live.state = SourceState {
        connected: true,
        name: Some("Living Room".into()),
        ..SourceState::default()
    };
    router
        .request("source", Request::UpdateSource { source: live })
        .await
        .unwrap();

    let event = expect_event(
        &mut tap,
        |e| matches!(e, Event::SourceUpdated { .. }),
        500,
    )
    .await
    .expect("source_updated should be broadcast");
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "source_updated");
    assert_eq!(json["source"]["state"]["connected"], true);
    assert_eq!(json["source"]["state"]["name"], "Living Room");

    assert!(arbiter.get().state.connected);
    router.shutdown().await;
}
