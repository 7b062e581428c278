//! Source backends and shared backend vocabulary.

pub mod local;

/// Playback control capabilities a backend can advertise on its source record.
pub mod controls {
    pub const PLAY: &str = "play";
    pub const PAUSE: &str = "pause";
    pub const STOP: &str = "stop";
    pub const NEXT: &str = "next";
    pub const PREVIOUS: &str = "previous";
    pub const REPEAT: &str = "repeat";
    pub const SHUFFLE: &str = "shuffle";
    pub const SEEK: &str = "seek";
}
