//! Tracklist sequencer.
//!
//! Owns the play queue, its optional shuffled permutation and the playback
//! options (`repeat`, `single`, `random`). Also runs the auto-advance circuit
//! breaker: consecutive track failures are counted, and a full pass of
//! failures over the queue stops the skip cascade instead of looping forever.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::bus::Event;
use crate::models::TlTrack;
use crate::router::{CallError, Request, Response, Router};
use crate::runtime::Component;

struct Inner {
    tracks: Vec<TlTrack>,
    /// Shuffled permutation, rebuilt only on `add` and `set_random`. Remove
    /// and move leave it stale on purpose.
    shuffled: Vec<TlTrack>,
    repeat: bool,
    single: bool,
    random: bool,
    /// Bookkeeping: the track the sequencer would hand out next.
    next_hint: Option<TlTrack>,
    /// Consecutive failures in the current skip cascade.
    playback_errors: usize,
}

pub struct Tracklist {
    router: Arc<Router>,
    /// tlid 0 is reserved for tracks loaded outside the queue; queue tlids
    /// start at 1 and are never reused within a session.
    tlid_seq: AtomicU64,
    inner: Mutex<Inner>,
}

impl Tracklist {
    pub fn new(router: Arc<Router>) -> Arc<Self> {
        Arc::new(Self {
            router,
            tlid_seq: AtomicU64::new(1),
            inner: Mutex::new(Inner {
                tracks: Vec::new(),
                shuffled: Vec::new(),
                repeat: false,
                single: false,
                random: false,
                next_hint: None,
                playback_errors: 0,
            }),
        })
    }

    /// Resolve each uri through its owning backend, append the results to the
    /// queue under fresh tlids, and broadcast the new queue. An unresolvable
    /// uri rejects the whole call with nothing appended.
    pub async fn add(&self, uris: Vec<String>) -> Result<Vec<TlTrack>, CallError> {
        if uris.is_empty() {
            return Err(CallError::InvalidUri("no uris provided".into()));
        }

        let mut added = Vec::with_capacity(uris.len());
        for uri in &uris {
            let (source_type, track_id) = uri
                .split_once(':')
                .filter(|(ext, id)| !ext.is_empty() && !id.is_empty())
                .ok_or_else(|| CallError::InvalidUri(uri.clone()))?;
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
                .ok_or_else(|| CallError::TrackNotFound(uri.clone()))?;
            added.push(TlTrack::new(
                self.tlid_seq.fetch_add(1, Ordering::SeqCst),
                track,
            ));
        }

        let snapshot = {
            let mut inner = self.inner.lock().unwrap();
            inner.tracks.extend(added.iter().cloned());
            rebuild_shuffle(&mut inner);
            inner.tracks.clone()
        };
        self.refresh_next().await;
        self.router
            .broadcast(Event::TracklistChanged { tl_tracks: snapshot });
        Ok(added)
    }

    /// Remove every queue entry with the given tlid. Removing a tlid that is
    /// not queued is a no-op apart from the broadcast.
    pub async fn remove(&self, tlid: u64) -> Vec<TlTrack> {
        let snapshot = {
            let mut inner = self.inner.lock().unwrap();
            inner.tracks.retain(|t| t.tlid != tlid);
            inner.tracks.clone()
        };
        self.refresh_next().await;
        self.router.broadcast(Event::TracklistChanged {
            tl_tracks: snapshot.clone(),
        });
        snapshot
    }

    /// Move the slice `[start, end)` so it lands at `to_position`. A
    /// single-index call (`start == end`) is widened to a one-element slice.
    /// Validation failures abort with no mutation.
    pub async fn move_slice(
        &self,
        start: usize,
        mut end: usize,
        to_position: usize,
    ) -> Result<bool, CallError> {
        if start == end {
            end = start + 1;
        }

        let snapshot = {
            let mut inner = self.inner.lock().unwrap();
            let len = inner.tracks.len();
            if start >= end {
                return Err(CallError::InvalidRange(
                    "start must be smaller than end".into(),
                ));
            }
            if end > len {
                return Err(CallError::InvalidRange(format!(
                    "end {end} is past the queue length {len}"
                )));
            }
            if to_position > len {
                return Err(CallError::InvalidRange(format!(
                    "to_position {to_position} is past the queue length {len}"
                )));
            }

            let mut reordered = Vec::with_capacity(len);
            reordered.extend_from_slice(&inner.tracks[..start]);
            reordered.extend_from_slice(&inner.tracks[end..]);
            // A destination past the shortened tail appends.
            let mut at = to_position.min(reordered.len());
            for tl_track in &inner.tracks[start..end] {
                reordered.insert(at, tl_track.clone());
                at += 1;
            }
            inner.tracks = reordered;
            inner.tracks.clone()
        };
        self.refresh_next().await;
        self.router
            .broadcast(Event::TracklistChanged { tl_tracks: snapshot });
        Ok(true)
    }

    pub fn tl_tracks(&self) -> Vec<TlTrack> {
        self.inner.lock().unwrap().tracks.clone()
    }

    /// Empty the queue and its permutation.
    pub async fn clear(&self) -> bool {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.tracks.clear();
            inner.shuffled.clear();
        }
        self.refresh_next().await;
        self.router.broadcast(Event::TracklistChanged {
            tl_tracks: Vec::new(),
        });
        true
    }

    pub fn repeat(&self) -> bool {
        self.inner.lock().unwrap().repeat
    }

    pub async fn set_repeat(&self, value: bool) -> bool {
        self.inner.lock().unwrap().repeat = value;
        self.refresh_next().await;
        self.router.broadcast(Event::OptionsChanged);
        true
    }

    pub fn single(&self) -> bool {
        self.inner.lock().unwrap().single
    }

    pub async fn set_single(&self, value: bool) -> bool {
        self.inner.lock().unwrap().single = value;
        self.refresh_next().await;
        self.router.broadcast(Event::OptionsChanged);
        true
    }

    pub fn random(&self) -> bool {
        self.inner.lock().unwrap().random
    }

    pub async fn set_random(&self, value: bool) -> bool {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.random = value;
            rebuild_shuffle(&mut inner);
        }
        self.refresh_next().await;
        self.router.broadcast(Event::OptionsChanged);
        true
    }

    /// The track after the currently playing one in the active ordering.
    ///
    /// `repeat` wraps the index; `single` with `repeat` replays the current
    /// track unless the caller is the user, in which case `single` is cleared
    /// and the real next track is returned. Off the end without `repeat` is
    /// `None` (playback stops).
    pub async fn next_track(&self, from_ui: bool) -> Option<TlTrack> {
        let current = self.current_from_playback().await;
        let (result, cleared_single) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.tracks.is_empty() {
                inner.next_hint = None;
                (None, false)
            } else {
                let ordering = active_ordering(&inner);
                let len = ordering.len();
                let mut next_index = ordering
                    .iter()
                    .position(|t| t.tlid == current.tlid)
                    .map_or(0, |i| i + 1);

                let mut cleared_single = false;
                if inner.repeat {
                    next_index %= len;
                    if inner.single {
                        if from_ui {
                            inner.single = false;
                            cleared_single = true;
                        } else {
                            return Some(current);
                        }
                    }
                } else if next_index >= len {
                    inner.next_hint = None;
                    return None;
                }

                let next = active_ordering(&inner)[next_index].clone();
                inner.next_hint = Some(next.clone());
                (Some(next), cleared_single)
            }
        };
        if cleared_single {
            self.router.broadcast(Event::OptionsChanged);
        }
        result
    }

    /// The track before the currently playing one in the active ordering.
    /// Never wraps; `single` is cleared on a user-initiated call.
    pub async fn previous_track(&self, from_ui: bool) -> Option<TlTrack> {
        let current = self.current_from_playback().await;
        let (result, cleared_single) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.tracks.is_empty() {
                return None;
            }
            let cleared_single = if inner.single && from_ui {
                inner.single = false;
                true
            } else {
                false
            };
            let ordering = active_ordering(&inner);
            let result = match ordering.iter().position(|t| t.tlid == current.tlid) {
                None | Some(0) => None,
                Some(position) => Some(ordering[position - 1].clone()),
            };
            (result, cleared_single)
        };
        if cleared_single {
            self.router.broadcast(Event::OptionsChanged);
        }
        result
    }

    async fn current_from_playback(&self) -> TlTrack {
        match self.router.request("playback", Request::GetCurrentTlTrack).await {
            Ok(response) => response
                .into_tl_track("get_current_tl_track")
                .ok()
                .flatten()
                .unwrap_or_default(),
            Err(e) => {
                debug!("no current track available: {e}");
                TlTrack::default()
            }
        }
    }

    /// Recompute the next-track bookkeeping after a queue or option change.
    async fn refresh_next(&self) {
        let _ = self.next_track(false).await;
    }
}

fn active_ordering(inner: &Inner) -> &[TlTrack] {
    if inner.random {
        &inner.shuffled
    } else {
        &inner.tracks
    }
}

fn rebuild_shuffle(inner: &mut Inner) {
    if inner.random {
        inner.shuffled = inner.tracks.clone();
        inner.shuffled.shuffle(&mut rand::thread_rng());
    } else {
        inner.shuffled.clear();
    }
}

#[async_trait]
impl Component for Tracklist {
    fn name(&self) -> &'static str {
        "tracklist"
    }

    fn verbs(&self) -> &'static [&'static str] {
        &[
            "add",
            "remove",
            "move",
            "get_tltracks",
            "clear",
            "next_track",
            "previous_track",
            "get_repeat",
            "set_repeat",
            "get_single",
            "set_single",
            "get_random",
            "set_random",
        ]
    }

    async fn call(&self, request: Request) -> Result<Response, CallError> {
        match request {
            Request::Add { uris } => self.add(uris).await.map(Response::TlTracks),
            Request::Remove { tlid } => Ok(Response::TlTracks(self.remove(tlid).await)),
            Request::Move {
                start,
                end,
                to_position,
            } => self
                .move_slice(start, end, to_position)
                .await
                .map(Response::Bool),
            Request::GetTlTracks => Ok(Response::TlTracks(self.tl_tracks())),
            Request::ClearTracklist => Ok(Response::Bool(self.clear().await)),
            Request::NextTrack { from_ui } => {
                Ok(Response::TlTrack(self.next_track(from_ui).await))
            }
            Request::PreviousTrack { from_ui } => {
                Ok(Response::TlTrack(self.previous_track(from_ui).await))
            }
            Request::GetRepeat => Ok(Response::Bool(self.repeat())),
            Request::SetRepeat { value } => Ok(Response::Bool(self.set_repeat(value).await)),
            Request::GetSingle => Ok(Response::Bool(self.single())),
            Request::SetSingle { value } => Ok(Response::Bool(self.set_single(value).await)),
            Request::GetRandom => Ok(Response::Bool(self.random())),
            Request::SetRandom { value } => Ok(Response::Bool(self.set_random(value).await)),
            other => Err(CallError::VerbNotFound {
                component: self.name().to_string(),
                verb: other.verb(),
            }),
        }
    }

    /// Circuit breaker: failures are counted here, and the decision whether a
    /// finished track auto-advances is made here, not in playback.
    async fn on_event(&self, event: &Event) -> Result<()> {
        match event {
            Event::TrackPlaybackError { .. } => {
                self.inner.lock().unwrap().playback_errors += 1;
            }
            Event::TrackPlaybackEnded { .. } => {
                if self.next_track(false).await.is_some() {
                    let tripped = {
                        let mut inner = self.inner.lock().unwrap();
                        if inner.playback_errors >= inner.tracks.len() {
                            inner.playback_errors = 0;
                            true
                        } else {
                            false
                        }
                    };
                    if tripped {
                        warn!("every queued track failed to play, not advancing");
                    } else if let Err(e) = self
                        .router
                        .request("playback", Request::Next { from_ui: false })
                        .await
                    {
                        warn!("auto-advance failed: {e}");
                    }
                } else {
                    self.inner.lock().unwrap().playback_errors = 0;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
