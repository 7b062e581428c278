//! Broadcast event contract.
//!
//! Every state change in the core is announced as an [`Event`]. The serialized
//! names and payload fields are the contract surface other components (web/API
//! layer, telemetry) consume, so they must not drift.

use serde::{Deserialize, Serialize};

use crate::models::{PlaybackState, Source, TlTrack};

/// Addressing for [`crate::router::Router::send`]: everyone, one component, or
/// a named set. Unmatched names are silently skipped.
#[derive(Debug, Clone)]
pub enum Target {
    All,
    One(String),
    Many(Vec<String>),
}

impl Target {
    pub fn matches(&self, registered: &str) -> bool {
        match self {
            Target::All => true,
            Target::One(name) => name_matches(name, registered),
            Target::Many(names) => names.iter().any(|n| name_matches(n, registered)),
        }
    }
}

/// Case-insensitive prefix match used for all component addressing.
pub(crate) fn name_matches(requested: &str, registered: &str) -> bool {
    registered.len() >= requested.len()
        && registered
            .chars()
            .zip(requested.chars())
            .all(|(a, b)| a.eq_ignore_ascii_case(&b))
}

/// Events broadcast by the core components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    SourceChanged { source: Source },
    SourceUpdated { source: Source },
    PlaybackStateChanged { state: PlaybackState },
    TrackMetaUpdated { tl_track: TlTrack },
    TrackPlaybackStarted { tl_track: TlTrack, time_position: u64 },
    TrackPlaybackResumed { tl_track: TlTrack, time_position: u64 },
    TrackPlaybackPaused { tl_track: TlTrack, time_position: u64 },
    TrackPlaybackEnded { tl_track: TlTrack },
    TrackPlaybackError { tl_track: TlTrack },
    TrackPlaybackBuffering,
    TrackPositionUpdated { time_position: u64 },
    TracklistChanged { tl_tracks: Vec<TlTrack> },
    OptionsChanged,
}

impl Event {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Event::SourceChanged { .. } => "source_changed",
            Event::SourceUpdated { .. } => "source_updated",
            Event::PlaybackStateChanged { .. } => "playback_state_changed",
            Event::TrackMetaUpdated { .. } => "track_meta_updated",
            Event::TrackPlaybackStarted { .. } => "track_playback_started",
            Event::TrackPlaybackResumed { .. } => "track_playback_resumed",
            Event::TrackPlaybackPaused { .. } => "track_playback_paused",
            Event::TrackPlaybackEnded { .. } => "track_playback_ended",
            Event::TrackPlaybackError { .. } => "track_playback_error",
            Event::TrackPlaybackBuffering => "track_playback_buffering",
            Event::TrackPositionUpdated { .. } => "track_position_updated",
            Event::TracklistChanged { .. } => "tracklist_changed",
            Event::OptionsChanged => "options_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Track;

    #[test]
    fn serialized_tag_matches_wire_name() {
        let events = [
            Event::SourceChanged {
                source: Source::default(),
            },
            Event::SourceUpdated {
                source: Source::default(),
            },
            Event::PlaybackStateChanged {
                state: PlaybackState::Stopped,
            },
            Event::TrackMetaUpdated {
                tl_track: TlTrack::default(),
            },
            Event::TrackPlaybackStarted {
                tl_track: TlTrack::default(),
                time_position: 0,
            },
            Event::TrackPlaybackResumed {
                tl_track: TlTrack::default(),
                time_position: 0,
            },
            Event::TrackPlaybackPaused {
                tl_track: TlTrack::default(),
                time_position: 0,
            },
            Event::TrackPlaybackEnded {
                tl_track: TlTrack::default(),
            },
            Event::TrackPlaybackError {
                tl_track: TlTrack::default(),
            },
            Event::TrackPlaybackBuffering,
            Event::TrackPositionUpdated { time_position: 0 },
            Event::TracklistChanged {
                tl_tracks: Vec::new(),
            },
            Event::OptionsChanged,
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.name(), "tag mismatch for {:?}", event);
        }
    }

    #[test]
    fn payload_field_names_are_stable() {
        let event = Event::TrackPlaybackPaused {
            tl_track: TlTrack::new(3, Track::default()),
            time_position: 1500,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["tl_track"]["tlid"], 3);
        assert_eq!(json["time_position"], 1500);
    }

    #[test]
    fn target_matching_is_prefix_and_case_insensitive() {
        assert!(Target::One("track".into()).matches("tracklist"));
        assert!(Target::One("TRACKLIST".into()).matches("tracklist"));
        assert!(!Target::One("tracklists".into()).matches("tracklist"));
        assert!(Target::All.matches("anything"));
        assert!(Target::Many(vec!["web".into(), "play".into()]).matches("playback"));
        assert!(!Target::Many(vec!["web".into()]).matches("playback"));
    }
}
