//! External decode/render capability consumed by playback.
//!
//! The concrete pipeline lives outside this crate; playback only needs the
//! control surface below plus the asynchronous event stream the engine emits
//! while a track plays.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::TrackPatch;

/// Classification of engine errors. `Negotiation` is the recoverable
/// output-format/sample-rate class that warrants one rebuild with software
/// resampling; everything else is terminal for the current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    Negotiation,
    Other,
}

/// Asynchronous discoveries and faults reported by the engine during playback.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Tag metadata discovered mid-stream.
    Tags(TrackPatch),
    /// Raw audio format negotiated on the decode pad.
    Format {
        sample_rate: Option<u32>,
        channels: Option<u32>,
        bit_depth: Option<String>,
    },
    DurationChanged(u64),
    Buffering,
    EndOfStream,
    Error {
        kind: EngineErrorKind,
        message: String,
    },
}

/// Control surface of the decode/render pipeline. All positions and durations
/// are milliseconds.
#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    /// Build or rebuild the pipeline. `resample` enables software sample-rate
    /// conversion, used for the one-shot negotiation-failure recovery.
    async fn setup(&self, resample: bool) -> Result<()>;

    async fn set_uri(&self, uri: &str) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Returns whether the engine accepted the seek.
    async fn seek(&self, time_position: u64) -> bool;

    async fn position(&self) -> Option<u64>;

    async fn duration(&self) -> Option<u64>;

    /// Hand over the engine's event stream. Called once by playback at
    /// startup; subsequent calls return `None`.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<EngineEvent>>;
}

/// Engine that renders nothing. Keeps the hub runnable on machines without an
/// audio pipeline and serves as the default wiring in `main`.
pub struct NullEngine {
    events: std::sync::Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
}

impl NullEngine {
    pub fn new() -> Self {
        let (_tx, rx) = mpsc::unbounded_channel();
        Self {
            events: std::sync::Mutex::new(Some(rx)),
        }
    }
}

impl Default for NullEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaEngine for NullEngine {
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

    async fn seek(&self, _time_position: u64) -> bool {
        true
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
