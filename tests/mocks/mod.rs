//! Shared test doubles for the integration tests.
//!
//! `ScriptedEngine` records every call the playback state machine makes and
//! lets a test feed engine events by hand; `MockBackend` is a minimal source
//! backend with a canned track table; `StubPlayback` stands in for the real
//! playback component where a test only cares about the sequencer side.

// Each integration test binary uses a different subset of these.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use audiohub::bus::Event;
use audiohub::models::{TlTrack, Track};
use audiohub::playback::engine::{EngineEvent, MediaEngine};
use audiohub::router::{CallError, Request, Response};
use audiohub::runtime::{Component, Startable, TrackSource};

/// Wait for the first event on the tap matching `predicate`.
pub async fn expect_event<F>(
    rx: &mut broadcast::Receiver<Event>,
    predicate: F,
    timeout_ms: u64,
) -> Option<Event>
where
    F: Fn(&Event) -> bool,
{
    timeout(Duration::from_millis(timeout_ms), async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    })
    .await
    .unwrap_or(None)
}

/// Poll `probe` until it returns true or the timeout elapses.
pub async fn wait_until<F>(probe: F, timeout_ms: u64) -> bool
where
    F: Fn() -> bool,
{
    let result = timeout(Duration::from_millis(timeout_ms), async {
        while !probe() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    result.is_ok()
}

#[derive(Default)]
pub struct EngineLog {
    pub setups: Vec<bool>,
    pub uris: Vec<String>,
    pub plays: usize,
    pub pauses: usize,
    pub stops: usize,
}

/// Media engine double: every control call is logged, events are injected by
/// the test through the returned sender.
pub struct ScriptedEngine {
    pub log: Mutex<EngineLog>,
    duration: Mutex<Option<u64>>,
    position: Mutex<Option<u64>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
}

impl ScriptedEngine {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                log: Mutex::new(EngineLog::default()),
                duration: Mutex::new(None),
                position: Mutex::new(None),
                events: Mutex::new(Some(rx)),
            }),
            tx,
        )
    }

    pub fn set_duration(&self, ms: Option<u64>) {
        *self.duration.lock().unwrap() = ms;
    }

    pub fn set_position(&self, ms: Option<u64>) {
        *self.position.lock().unwrap() = ms;
    }

    pub fn setups(&self) -> Vec<bool> {
        self.log.lock().unwrap().setups.clone()
    }

    pub fn uris(&self) -> Vec<String> {
        self.log.lock().unwrap().uris.clone()
    }
}

#[async_trait]
impl MediaEngine for ScriptedEngine {
    async fn setup(&self, resample: bool) -> Result<()> {
        self.log.lock().unwrap().setups.push(resample);
        Ok(())
    }

    async fn set_uri(&self, uri: &str) -> Result<()> {
        self.log.lock().unwrap().uris.push(uri.to_string());
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.log.lock().unwrap().plays += 1;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.log.lock().unwrap().pauses += 1;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.log.lock().unwrap().stops += 1;
        Ok(())
    }

    async fn seek(&self, _time_position: u64) -> bool {
        true
    }

    async fn position(&self) -> Option<u64> {
        *self.position.lock().unwrap()
    }

    async fn duration(&self) -> Option<u64> {
        *self.duration.lock().unwrap()
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<EngineEvent>> {
        self.events.lock().unwrap().take()
    }
}

/// Source backend with a canned track table and scriptable lifecycle hooks.
pub struct MockBackend {
    name: &'static str,
    tracks: HashMap<String, Track>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub refuse_stop: bool,
}

impl MockBackend {
    pub fn new(name: &'static str, track_ids: &[&str]) -> Arc<Self> {
        let tracks = track_ids
            .iter()
            .map(|id| {
                (
                    id.to_string(),
                    Track {
                        uri: Some(format!("{name}:{id}")),
                        name: Some(id.to_string()),
                        ..Track::default()
                    },
                )
            })
            .collect();
        Arc::new(Self {
            name,
            tracks,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            refuse_stop: false,
        })
    }

    pub fn refusing_stop(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            tracks: HashMap::new(),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            refuse_stop: true,
        })
    }
}

#[async_trait]
impl Component for MockBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn as_startable(&self) -> Option<&dyn Startable> {
        Some(self)
    }

    fn as_track_source(&self) -> Option<&dyn TrackSource> {
        Some(self)
    }
}

#[async_trait]
impl Startable for MockBackend {
    async fn start_service(&self) -> Result<bool> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn stop_service(&self) -> Result<bool> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(!self.refuse_stop)
    }
}

#[async_trait]
impl TrackSource for MockBackend {
    async fn lookup_track(&self, id: &str) -> Result<Option<Track>> {
        Ok(self.tracks.get(id).cloned())
    }

    async fn playback_uri(&self, id: &str) -> Result<Option<String>> {
        Ok(self
            .tracks
            .contains_key(id)
            .then(|| format!("mock://{}/{id}", self.name)))
    }
}

/// Playback stand-in for sequencer tests: answers `get_current_tl_track` from
/// a settable slot and counts auto-advance requests.
pub struct StubPlayback {
    current: Mutex<TlTrack>,
    pub next_calls: AtomicUsize,
}

impl StubPlayback {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(TlTrack::default()),
            next_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_current(&self, tl_track: TlTrack) {
        *self.current.lock().unwrap() = tl_track;
    }
}

#[async_trait]
impl Component for StubPlayback {
    fn name(&self) -> &'static str {
        "playback"
    }

    fn verbs(&self) -> &'static [&'static str] {
        &["get_current_tl_track", "next"]
    }

    async fn call(&self, request: Request) -> Result<Response, CallError> {
        match request {
            Request::GetCurrentTlTrack => {
                Ok(Response::TlTrack(Some(self.current.lock().unwrap().clone())))
            }
            Request::Next { .. } => {
                self.next_calls.fetch_add(1, Ordering::SeqCst);
                Ok(Response::Bool(true))
            }
            other => Err(CallError::VerbNotFound {
                component: self.name().to_string(),
                verb: other.verb(),
            }),
        }
    }
}
