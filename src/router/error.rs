use thiserror::Error;

/// Failures crossing the router boundary.
///
/// `UnknownComponent` is fatal to the caller; `VerbNotFound` is a
/// caller-visible miss that leaves the router itself healthy; the remaining
/// variants are typed caller/backend errors surfaced by component handlers.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("unknown component: {0}")]
    UnknownComponent(String),

    #[error("{component} does not implement {verb}")]
    VerbNotFound {
        component: String,
        verb: &'static str,
    },

    #[error("unknown source type: {0}")]
    UnknownSourceType(String),

    #[error("failed to stop service for source {0}")]
    StopServiceFailed(String),

    #[error("failed to start service for source {0}")]
    StartServiceFailed(String),

    #[error("invalid uri: {0}")]
    InvalidUri(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("track not found for {0}")]
    TrackNotFound(String),

    #[error("no playback uri for {0}")]
    PlaybackUriNotFound(String),

    #[error("unexpected response to {verb}: got {got}")]
    UnexpectedResponse {
        verb: &'static str,
        got: &'static str,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
