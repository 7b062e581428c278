//! Core value types shared across components.
//!
//! `Track` and friends are immutable value types: updates go through
//! [`TrackPatch::apply`], which produces a new `Track` rather than mutating
//! fields in place.

use serde::{Deserialize, Serialize};

/// Playback transport state. Created `Stopped`; mutated only by the playback
/// component and broadcast on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Artist {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            uri: None,
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Album {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
}

impl Album {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// A single playable track. All timing fields are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artists: Vec<Artist>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub albums: Vec<Album>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_no: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disc_no: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resample: Option<bool>,
}

/// Partial track update produced by the media engine as it discovers tags,
/// sample format or duration during playback. `Some` fields overwrite, `None`
/// fields leave the existing value alone, so known metadata is never clobbered
/// by an unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackPatch {
    pub name: Option<String>,
    pub artists: Option<Vec<Artist>>,
    pub albums: Option<Vec<Album>>,
    pub genre: Option<String>,
    pub length: Option<u64>,
    pub bitrate: Option<u32>,
    pub audio_codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub bit_depth: Option<String>,
    pub resample: Option<bool>,
}

impl TrackPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold this patch into `track`, returning the merged value.
    pub fn apply(&self, track: &Track) -> Track {
        let mut merged = track.clone();
        if let Some(name) = &self.name {
            merged.name = Some(name.clone());
        }
        if let Some(artists) = &self.artists {
            merged.artists = artists.clone();
        }
        if let Some(albums) = &self.albums {
            merged.albums = albums.clone();
        }
        if let Some(genre) = &self.genre {
            merged.genre = Some(genre.clone());
        }
        if let Some(length) = self.length {
            merged.length = Some(length);
        }
        if let Some(bitrate) = self.bitrate {
            merged.bitrate = Some(bitrate);
        }
        if let Some(codec) = &self.audio_codec {
            merged.audio_codec = Some(codec.clone());
        }
        if let Some(rate) = self.sample_rate {
            merged.sample_rate = Some(rate);
        }
        if let Some(channels) = self.channels {
            merged.channels = Some(channels);
        }
        if let Some(depth) = &self.bit_depth {
            merged.bit_depth = Some(depth.clone());
        }
        if let Some(resample) = self.resample {
            merged.resample = Some(resample);
        }
        merged
    }
}

/// A track bound to a queue-position identity. `tlid == 0` is reserved for a
/// transient track loaded outside of any queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlTrack {
    pub tlid: u64,
    pub track: Track,
}

impl TlTrack {
    pub fn new(tlid: u64, track: Track) -> Self {
        Self { tlid, track }
    }
}

/// Free-form connection attributes a backend reports for its source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceState {
    #[serde(default)]
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// The currently selected audio input path. Exactly one logical instance
/// exists; it is replaced wholesale by the source arbiter on transition and
/// patched by the active backend through the guarded update path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type")]
    pub source_type: Option<String>,
    #[serde(default)]
    pub controls: Vec<String>,
    #[serde(default)]
    pub state: SourceState,
}

impl Source {
    /// Fresh, disconnected source record of the given type with controls
    /// pending backend population.
    pub fn disconnected(source_type: Option<String>) -> Self {
        Self {
            source_type,
            controls: Vec::new(),
            state: SourceState::default(),
        }
    }
}
