//! Playback state machine.
//!
//! Owns the current track, the transport state and the failure policy around
//! the media engine. The engine reports decode problems asynchronously; a
//! first negotiation-class failure gets exactly one recovery attempt (rebuild
//! with software resampling, replay the same locator), anything after that is
//! terminal for the track and surfaced as events for the sequencer to act on.

pub mod engine;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::bus::Event;
use crate::models::{Artist, PlaybackState, TlTrack, TrackPatch};
use crate::router::{CallError, Request, Response, Router};
use crate::runtime::{ActorContext, Component};

use engine::{EngineErrorKind, EngineEvent, MediaEngine};

/// Sentinel artist shown on a track the engine could not play.
pub const PLAYBACK_ERROR_ARTIST: &str = "Playback Error";

const POSITION_POLL_INTERVAL: Duration = Duration::from_millis(500);

struct Inner {
    state: PlaybackState,
    playing: bool,
    buffering: bool,
    /// Software sample-rate conversion enabled on the current pipeline. Also
    /// the retry latch: a negotiation error with this already set is terminal.
    resample: bool,
    elapsed: u64,
    playback_uri: Option<String>,
    track: TlTrack,
    /// Last `track_meta_updated` payload, for change suppression.
    last_meta: Option<TlTrack>,
}

pub struct Playback {
    router: Arc<Router>,
    engine: Arc<dyn MediaEngine>,
    inner: Mutex<Inner>,
}

impl Playback {
    pub fn new(router: Arc<Router>, engine: Arc<dyn MediaEngine>) -> Arc<Self> {
        Arc::new(Self {
            router,
            engine,
            inner: Mutex::new(Inner {
                state: PlaybackState::Stopped,
                playing: false,
                buffering: false,
                resample: false,
                elapsed: 0,
                playback_uri: None,
                track: TlTrack::default(),
                last_meta: None,
            }),
        })
    }

    pub fn current_tl_track(&self) -> TlTrack {
        self.inner.lock().unwrap().track.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().unwrap().state
    }

    pub fn time_position(&self) -> u64 {
        self.inner.lock().unwrap().elapsed
    }

    /// Start playback. With a `uri` the track is resolved through its owning
    /// source and replaces the current one; without, resumes from paused or
    /// stopped using the already-loaded locator.
    pub async fn play(&self, uri: Option<String>, tlid: Option<u64>) -> Result<bool, CallError> {
        match uri {
            Some(uri) => {
                self.inner.lock().unwrap().resample = false;
                self.engine.stop().await?;
                self.engine.setup(false).await?;
                self.load_uri(&uri, tlid.unwrap_or(0)).await?;
                self.transport_stop().await;
                self.transport_play().await
            }
            None => {
                let state = self.inner.lock().unwrap().state;
                if matches!(state, PlaybackState::Paused | PlaybackState::Stopped) {
                    self.transport_play().await
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Only meaningful from `Playing`; otherwise a no-op.
    pub async fn pause(&self) -> Result<bool, CallError> {
        let (track, elapsed) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != PlaybackState::Playing {
                return Ok(true);
            }
            inner.state = PlaybackState::Paused;
            (inner.track.clone(), inner.elapsed)
        };
        self.engine.pause().await?;
        self.router.broadcast(Event::TrackPlaybackPaused {
            tl_track: track,
            time_position: elapsed,
        });
        self.router.broadcast(Event::PlaybackStateChanged {
            state: PlaybackState::Paused,
        });
        Ok(true)
    }

    pub async fn stop(&self) -> bool {
        self.transport_stop().await;
        true
    }

    /// Drop the loaded locator and reset metadata to an identity-less track.
    /// Used by backends when their service is being stopped.
    pub async fn clear(&self) {
        self.transport_stop().await;
        self.inner.lock().unwrap().playback_uri = None;
        self.set_metadata(None);
    }

    /// Seek, clamped to a minimum of 1 ms (zero is not a valid target for the
    /// pipeline). The position event is broadcast whether or not the engine
    /// accepted the seek.
    pub async fn seek(&self, time_position: u64) -> bool {
        let time_position = time_position.max(1);
        let accepted = self.engine.seek(time_position).await;
        self.inner.lock().unwrap().elapsed = time_position;
        self.router
            .broadcast(Event::TrackPositionUpdated { time_position });
        accepted
    }

    pub async fn next(&self, from_ui: bool) -> Result<bool, CallError> {
        self.advance(Request::NextTrack { from_ui }).await
    }

    pub async fn previous(&self, from_ui: bool) -> Result<bool, CallError> {
        self.advance(Request::PreviousTrack { from_ui }).await
    }

    async fn advance(&self, request: Request) -> Result<bool, CallError> {
        let verb = request.verb();
        let adjacent = self
            .router
            .request("tracklist", request)
            .await?
            .into_tl_track(verb)?;
        match adjacent {
            Some(tl_track) => {
                let uri = tl_track
                    .track
                    .uri
                    .clone()
                    .ok_or_else(|| CallError::InvalidUri("queued track has no uri".into()))?;
                self.load_uri(&uri, tl_track.tlid).await?;
                self.transport_stop().await;
                self.transport_play().await?;
            }
            None => self.transport_stop().await,
        }
        Ok(true)
    }

    pub fn set_metadata(&self, tl_track: Option<TlTrack>) {
        let track = {
            let mut inner = self.inner.lock().unwrap();
            let track = match tl_track {
                Some(track) => track,
                None => {
                    inner.playback_uri = None;
                    TlTrack::default()
                }
            };
            inner.track = track.clone();
            inner.last_meta = Some(track.clone());
            track
        };
        self.router
            .broadcast(Event::TrackMetaUpdated { tl_track: track });
    }

    /// Resolve `uri` (`"<source>:<id>"`) through its owning backend: activate
    /// the source, fetch the track descriptor and a playable locator, and
    /// replace the current track.
    async fn load_uri(&self, uri: &str, tlid: u64) -> Result<(), CallError> {
        let (source_type, track_id) = uri
            .split_once(':')
            .filter(|(ext, id)| !ext.is_empty() && !id.is_empty())
            .ok_or_else(|| CallError::InvalidUri(uri.to_string()))?;

        self.router
            .request(
                "source",
                Request::SetSource {
                    source_type: Some(source_type.to_string()),
                },
            )
            .await?;

        let backend = self.router.resolve(source_type)?;
        let tracks = backend
            .as_track_source()
            .ok_or_else(|| CallError::VerbNotFound {
                component: source_type.to_string(),
                verb: "lookup_track",
            })?;

        let track = tracks
            .lookup_track(track_id)
            .await?
            .ok_or_else(|| CallError::TrackNotFound(uri.to_string()))?;
        let locator = tracks
            .playback_uri(track_id)
            .await?
            .ok_or_else(|| CallError::PlaybackUriNotFound(uri.to_string()))?;

        self.inner.lock().unwrap().playback_uri = Some(locator);
        self.set_metadata(Some(TlTrack::new(tlid, track)));
        Ok(())
    }

    async fn transport_play(&self) -> Result<bool, CallError> {
        let (locator, previous_state) = {
            let inner = self.inner.lock().unwrap();
            (inner.playback_uri.clone(), inner.state)
        };
        let Some(locator) = locator else {
            warn!("play requested with no track loaded");
            return Ok(false);
        };

        self.engine.set_uri(&locator).await?;
        self.engine.play().await?;
        if let Some(duration) = self.engine.duration().await {
            self.fold_patch(TrackPatch {
                length: Some(duration),
                ..TrackPatch::default()
            });
        }

        let (track, elapsed) = {
            let mut inner = self.inner.lock().unwrap();
            inner.state = PlaybackState::Playing;
            inner.playing = true;
            if previous_state != PlaybackState::Paused {
                inner.elapsed = 0;
            }
            (inner.track.clone(), inner.elapsed)
        };

        if previous_state == PlaybackState::Paused {
            self.router.broadcast(Event::TrackPlaybackResumed {
                tl_track: track,
                time_position: elapsed,
            });
        } else {
            self.router.broadcast(Event::TrackPlaybackStarted {
                tl_track: track,
                time_position: elapsed,
            });
        }
        self.router.broadcast(Event::PlaybackStateChanged {
            state: PlaybackState::Playing,
        });
        Ok(true)
    }

    async fn transport_stop(&self) {
        if let Err(e) = self.engine.stop().await {
            warn!("engine stop failed: {e:#}");
        }
        {
            let mut inner = self.inner.lock().unwrap();
            inner.state = PlaybackState::Stopped;
            inner.playing = false;
            inner.elapsed = 0;
        }
        self.router.broadcast(Event::PlaybackStateChanged {
            state: PlaybackState::Stopped,
        });
    }

    /// Fold an engine discovery into the current track; re-broadcast only when
    /// the merged value differs from the last broadcast one.
    fn fold_patch(&self, patch: TrackPatch) {
        let changed = {
            let mut inner = self.inner.lock().unwrap();
            let merged = TlTrack::new(inner.track.tlid, patch.apply(&inner.track.track));
            if inner.last_meta.as_ref() == Some(&merged) {
                inner.track = merged;
                None
            } else {
                inner.track = merged.clone();
                inner.last_meta = Some(merged.clone());
                Some(merged)
            }
        };
        if let Some(tl_track) = changed {
            self.router.broadcast(Event::TrackMetaUpdated { tl_track });
        }
    }

    async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Tags(patch) => {
                self.inner.lock().unwrap().buffering = false;
                self.fold_patch(patch);
            }
            EngineEvent::Format {
                sample_rate,
                channels,
                bit_depth,
            } => {
                let resample = self.inner.lock().unwrap().resample;
                self.fold_patch(TrackPatch {
                    sample_rate,
                    channels,
                    bit_depth,
                    resample: Some(resample),
                    ..TrackPatch::default()
                });
            }
            EngineEvent::DurationChanged(duration) => {
                self.fold_patch(TrackPatch {
                    length: Some(duration),
                    ..TrackPatch::default()
                });
            }
            EngineEvent::Buffering => {
                let first = {
                    let mut inner = self.inner.lock().unwrap();
                    !std::mem::replace(&mut inner.buffering, true)
                };
                if first {
                    self.router.broadcast(Event::TrackPlaybackBuffering);
                }
            }
            EngineEvent::EndOfStream => {
                let track = self.current_tl_track();
                self.transport_stop().await;
                self.router
                    .broadcast(Event::TrackPlaybackEnded { tl_track: track });
            }
            EngineEvent::Error { kind, message } => {
                warn!("engine error ({kind:?}): {message}");
                self.handle_engine_error(kind).await;
            }
        }
    }

    async fn handle_engine_error(&self, kind: EngineErrorKind) {
        let retry = {
            let mut inner = self.inner.lock().unwrap();
            if kind == EngineErrorKind::Negotiation && !inner.resample {
                inner.resample = true;
                true
            } else {
                false
            }
        };

        if retry {
            info!("rebuilding pipeline with software resampling");
            if let Err(e) = self.engine.stop().await {
                warn!("engine stop failed during rebuild: {e:#}");
            }
            match self.engine.setup(true).await {
                Ok(()) => {
                    if let Err(e) = self.transport_play().await {
                        warn!("retry after negotiation failure did not start: {e}");
                    }
                    return;
                }
                Err(e) => warn!("pipeline rebuild failed: {e:#}"),
            }
        }

        // Terminal for this track: overwrite the displayed artist with the
        // error sentinel, stop, and let the sequencer decide what happens next.
        let track = {
            let mut inner = self.inner.lock().unwrap();
            let mut flagged = inner.track.track.clone();
            flagged.artists = vec![Artist::named(PLAYBACK_ERROR_ARTIST)];
            inner.track = TlTrack::new(inner.track.tlid, flagged);
            inner.last_meta = Some(inner.track.clone());
            inner.track.clone()
        };
        warn!("track unavailable: {:?}", track.track.uri);
        self.transport_stop().await;
        self.router.broadcast(Event::TrackMetaUpdated {
            tl_track: track.clone(),
        });
        self.router.broadcast(Event::TrackPlaybackError {
            tl_track: track.clone(),
        });
        self.router
            .broadcast(Event::TrackPlaybackEnded { tl_track: track });
    }
}

#[async_trait]
impl Component for Playback {
    fn name(&self) -> &'static str {
        "playback"
    }

    fn verbs(&self) -> &'static [&'static str] {
        &[
            "play",
            "pause",
            "stop_playback",
            "clear",
            "seek",
            "next",
            "previous",
            "get_current_tl_track",
            "get_state",
            "get_time_position",
            "set_time_position",
            "set_metadata",
        ]
    }

    async fn call(&self, request: Request) -> Result<Response, CallError> {
        match request {
            Request::Play { uri, tlid } => self.play(uri, tlid).await.map(Response::Bool),
            Request::Pause => self.pause().await.map(Response::Bool),
            Request::StopPlayback => Ok(Response::Bool(self.stop().await)),
            Request::ClearPlayback => {
                self.clear().await;
                Ok(Response::Ack)
            }
            Request::Seek { time_position } => {
                Ok(Response::Bool(self.seek(time_position).await))
            }
            Request::Next { from_ui } => self.next(from_ui).await.map(Response::Bool),
            Request::Previous { from_ui } => self.previous(from_ui).await.map(Response::Bool),
            Request::GetCurrentTlTrack => Ok(Response::TlTrack(Some(self.current_tl_track()))),
            Request::GetPlaybackState => Ok(Response::State(self.state())),
            Request::GetTimePosition => Ok(Response::Position(self.time_position())),
            Request::SetTimePosition { time_position } => {
                self.inner.lock().unwrap().elapsed = time_position;
                Ok(Response::Bool(true))
            }
            Request::SetMetadata { tl_track } => {
                self.set_metadata(tl_track);
                Ok(Response::Bool(true))
            }
            other => Err(CallError::VerbNotFound {
                component: self.name().to_string(),
                verb: other.verb(),
            }),
        }
    }

    /// Spawns the engine pump: delivers engine events into the state machine
    /// and polls the playback position while playing.
    async fn on_start(self: Arc<Self>, ctx: ActorContext) -> Result<()> {
        let Some(mut events) = self.engine.take_events() else {
            debug!("engine event stream already taken; pump not started");
            return Ok(());
        };
        let playback = self.clone();
        tokio::spawn(async move {
            let mut poll = tokio::time::interval(POSITION_POLL_INTERVAL);
            poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => playback.handle_engine_event(event).await,
                        None => break,
                    },
                    _ = poll.tick() => {
                        if playback.inner.lock().unwrap().state == PlaybackState::Playing {
                            if let Some(position) = playback.engine.position().await {
                                playback.inner.lock().unwrap().elapsed = position;
                            }
                        }
                    }
                }
            }
            debug!("engine pump stopped");
        });
        Ok(())
    }

    async fn on_event(&self, event: &Event) -> Result<()> {
        // A cleared queue strips the current track of its queue identity.
        if let Event::TracklistChanged { tl_tracks } = event {
            if tl_tracks.is_empty() {
                let mut inner = self.inner.lock().unwrap();
                inner.track.tlid = 0;
            }
        }
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        self.transport_stop().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Track;
    use engine::NullEngine;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::mpsc;

    /// Engine that records seek targets and lets tests feed events.
    struct ProbeEngine {
        last_seek: AtomicU64,
        accept_seek: bool,
        events: std::sync::Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
    }

    impl ProbeEngine {
        fn new(accept_seek: bool) -> (Arc<Self>, mpsc::UnboundedSender<EngineEvent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    last_seek: AtomicU64::new(u64::MAX),
                    accept_seek,
                    events: std::sync::Mutex::new(Some(rx)),
                }),
                tx,
            )
        }
    }

    #[async_trait]
    impl MediaEngine for ProbeEngine {
        async fn setup(&self, _resample: bool) -> Result<()> {
            Ok(())
        }
        async fn set_uri(&self, _uri: &str) -> Result<()> {
            Ok(())
        }
        async fn play(&self) -> Result<()> {
            Ok(())
        }
        async fn pause(&self) -> Result<()> {
            Ok(())
        }
        async fn stop(&self) -> Result<()> {
            Ok(())
        }
        async fn seek(&self, time_position: u64) -> bool {
            self.last_seek.store(time_position, Ordering::SeqCst);
            self.accept_seek
        }
        async fn position(&self) -> Option<u64> {
            None
        }
        async fn duration(&self) -> Option<u64> {
            None
        }
        fn take_events(&self) -> Option<mpsc::UnboundedReceiver<EngineEvent>> {
            self.events.lock().unwrap().take()
        }
    }

    #[tokio::test]
    async fn seek_zero_is_clamped_to_one() {
        let router = Router::new();
        let (engine, _tx) = ProbeEngine::new(true);
        let playback = Playback::new(router.clone(), engine.clone());
        let mut tap = router.subscribe();

        assert!(playback.seek(0).await);
        assert_eq!(engine.last_seek.load(Ordering::SeqCst), 1);
        assert_eq!(playback.time_position(), 1);
        assert_eq!(
            tap.recv().await.unwrap(),
            Event::TrackPositionUpdated { time_position: 1 }
        );
        router.shutdown().await;
    }

    #[tokio::test]
    async fn seek_broadcasts_even_when_engine_refuses() {
        let router = Router::new();
        let (engine, _tx) = ProbeEngine::new(false);
        let playback = Playback::new(router.clone(), engine.clone());
        let mut tap = router.subscribe();

        assert!(!playback.seek(3000).await);
        assert_eq!(
            tap.recv().await.unwrap(),
            Event::TrackPositionUpdated {
                time_position: 3000
            }
        );
        router.shutdown().await;
    }

    #[tokio::test]
    async fn play_with_nothing_loaded_is_a_no_op() {
        let router = Router::new();
        let playback = Playback::new(router.clone(), Arc::new(NullEngine::new()));

        assert!(!playback.play(None, None).await.unwrap());
        assert_eq!(playback.state(), PlaybackState::Stopped);
        router.shutdown().await;
    }

    #[tokio::test]
    async fn metadata_rebroadcast_only_on_change() {
        let router = Router::new();
        let playback = Playback::new(router.clone(), Arc::new(NullEngine::new()));
        let mut tap = router.subscribe();

        let patch = TrackPatch {
            genre: Some("Ambient".into()),
            ..TrackPatch::default()
        };
        playback.fold_patch(patch.clone());
        // Same discovery again: merged value unchanged, nothing broadcast.
        playback.fold_patch(patch);
        playback.fold_patch(TrackPatch {
            bitrate: Some(192_000),
            ..TrackPatch::default()
        });

        let first = tap.recv().await.unwrap();
        let second = tap.recv().await.unwrap();
        assert!(matches!(first, Event::TrackMetaUpdated { ref tl_track }
            if tl_track.track.genre.as_deref() == Some("Ambient")));
        assert!(matches!(second, Event::TrackMetaUpdated { ref tl_track }
            if tl_track.track.bitrate == Some(192_000)));
        assert!(tap.try_recv().is_err());
        router.shutdown().await;
    }

    #[tokio::test]
    async fn empty_tracklist_resets_queue_identity() {
        let router = Router::new();
        let playback = Playback::new(router.clone(), Arc::new(NullEngine::new()));
        playback.set_metadata(Some(TlTrack::new(7, Track::default())));

        playback
            .on_event(&Event::TracklistChanged {
                tl_tracks: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(playback.current_tl_track().tlid, 0);
        router.shutdown().await;
    }
}
