//! Typed request/response surface.
//!
//! Every operation the core answers is a [`Request`] variant with typed
//! parameters; [`Request::verb`] keeps the original verb vocabulary so
//! addressing and capability probes stay name-based without reflection.

use crate::models::{PlaybackState, Source, TlTrack};
use crate::router::CallError;

#[derive(Debug, Clone)]
pub enum Request {
    // source
    SetSource { source_type: Option<String> },
    UpdateSource { source: Source },
    GetSource,

    // playback
    Play { uri: Option<String>, tlid: Option<u64> },
    Pause,
    StopPlayback,
    ClearPlayback,
    Seek { time_position: u64 },
    Next { from_ui: bool },
    Previous { from_ui: bool },
    GetCurrentTlTrack,
    GetPlaybackState,
    GetTimePosition,
    SetTimePosition { time_position: u64 },
    SetMetadata { tl_track: Option<TlTrack> },

    // tracklist
    Add { uris: Vec<String> },
    Remove { tlid: u64 },
    Move { start: usize, end: usize, to_position: usize },
    GetTlTracks,
    ClearTracklist,
    NextTrack { from_ui: bool },
    PreviousTrack { from_ui: bool },
    GetRepeat,
    SetRepeat { value: bool },
    GetSingle,
    SetSingle { value: bool },
    GetRandom,
    SetRandom { value: bool },
}

impl Request {
    /// Verb name as used for addressing and `is_callable` probes.
    pub fn verb(&self) -> &'static str {
        match self {
            Request::SetSource { .. } => "set",
            Request::UpdateSource { .. } => "update_source",
            Request::GetSource => "get",
            Request::Play { .. } => "play",
            Request::Pause => "pause",
            Request::StopPlayback => "stop_playback",
            Request::ClearPlayback => "clear",
            Request::Seek { .. } => "seek",
            Request::Next { .. } => "next",
            Request::Previous { .. } => "previous",
            Request::GetCurrentTlTrack => "get_current_tl_track",
            Request::GetPlaybackState => "get_state",
            Request::GetTimePosition => "get_time_position",
            Request::SetTimePosition { .. } => "set_time_position",
            Request::SetMetadata { .. } => "set_metadata",
            Request::Add { .. } => "add",
            Request::Remove { .. } => "remove",
            Request::Move { .. } => "move",
            Request::GetTlTracks => "get_tltracks",
            Request::ClearTracklist => "clear",
            Request::NextTrack { .. } => "next_track",
            Request::PreviousTrack { .. } => "previous_track",
            Request::GetRepeat => "get_repeat",
            Request::SetRepeat { .. } => "set_repeat",
            Request::GetSingle => "get_single",
            Request::SetSingle { .. } => "set_single",
            Request::GetRandom => "get_random",
            Request::SetRandom { .. } => "set_random",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ack,
    Bool(bool),
    Source(Source),
    TlTrack(Option<TlTrack>),
    TlTracks(Vec<TlTrack>),
    State(PlaybackState),
    Position(u64),
}

impl Response {
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Ack => "ack",
            Response::Bool(_) => "bool",
            Response::Source(_) => "source",
            Response::TlTrack(_) => "tl_track",
            Response::TlTracks(_) => "tl_tracks",
            Response::State(_) => "state",
            Response::Position(_) => "position",
        }
    }

    pub fn into_bool(self, verb: &'static str) -> Result<bool, CallError> {
        match self {
            Response::Bool(value) => Ok(value),
            Response::Ack => Ok(true),
            other => Err(unexpected(verb, &other)),
        }
    }

    pub fn into_tl_track(self, verb: &'static str) -> Result<Option<TlTrack>, CallError> {
        match self {
            Response::TlTrack(value) => Ok(value),
            other => Err(unexpected(verb, &other)),
        }
    }

    pub fn into_tl_tracks(self, verb: &'static str) -> Result<Vec<TlTrack>, CallError> {
        match self {
            Response::TlTracks(value) => Ok(value),
            other => Err(unexpected(verb, &other)),
        }
    }

    pub fn into_source(self, verb: &'static str) -> Result<Source, CallError> {
        match self {
            Response::Source(value) => Ok(value),
            other => Err(unexpected(verb, &other)),
        }
    }

    pub fn into_state(self, verb: &'static str) -> Result<PlaybackState, CallError> {
        match self {
            Response::State(value) => Ok(value),
            other => Err(unexpected(verb, &other)),
        }
    }

    pub fn into_position(self, verb: &'static str) -> Result<u64, CallError> {
        match self {
            Response::Position(value) => Ok(value),
            other => Err(unexpected(verb, &other)),
        }
    }
}

fn unexpected(verb: &'static str, got: &Response) -> CallError {
    CallError::UnexpectedResponse {
        verb,
        got: got.kind(),
    }
}
