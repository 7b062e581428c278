//! Local file library backend.
//!
//! Scans the configured library directories for audio files into an in-memory
//! index and serves them to playback over `file://` locators. Track ids are
//! positions in the sorted scan result, stable for the life of the index.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::backends::controls;
use crate::models::{Source, Track};
use crate::router::{Request, Router};
use crate::runtime::{Component, Startable, TrackSource};

const AUDIO_EXTS: &[&str] = &[
    "mp3", "m4a", "mp4", "aac", "flac", "ogg", "opus", "wma", "wav", "dsf",
];

pub struct LocalBackend {
    router: Arc<Router>,
    roots: Vec<PathBuf>,
    index: Mutex<Vec<PathBuf>>,
}

impl LocalBackend {
    pub fn new(router: Arc<Router>, roots: Vec<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            router,
            roots,
            index: Mutex::new(Vec::new()),
        })
    }

    /// The source record this backend reports: everything the core can do
    /// with a local file is user-controllable.
    fn source_record(&self) -> Source {
        Source {
            source_type: Some(self.name().to_string()),
            controls: [
                controls::SEEK,
                controls::PLAY,
                controls::PAUSE,
                controls::NEXT,
                controls::PREVIOUS,
                controls::REPEAT,
                controls::SHUFFLE,
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            state: Default::default(),
        }
    }

    /// Rebuild the index from the library roots. Ids assigned by sorted path
    /// order; a missing root is skipped with a warning, not an error.
    async fn rescan(&self) -> Result<usize> {
        let roots = self.roots.clone();
        let files = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            for root in &roots {
                if !root.is_dir() {
                    warn!("library path {} is not a directory, skipping", root.display());
                    continue;
                }
                collect_audio_files(root, &mut files);
            }
            files.sort();
            files
        })
        .await
        .context("library scan task failed")?;

        let count = files.len();
        *self.index.lock().unwrap() = files;
        info!("local library indexed: {count} tracks");
        Ok(count)
    }

    fn path_for(&self, id: &str) -> Option<PathBuf> {
        let position: usize = id.parse().ok()?;
        self.index.lock().unwrap().get(position).cloned()
    }
}

fn collect_audio_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot read {}: {e}", dir.display());
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_audio_files(&path, files);
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| AUDIO_EXTS.contains(&ext.to_ascii_lowercase().as_str()))
        {
            files.push(path);
        }
    }
}

fn track_from_path(id: usize, path: &Path) -> Track {
    Track {
        uri: Some(format!("local:{id}")),
        name: path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned()),
        audio_codec: path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_uppercase()),
        ..Track::default()
    }
}

#[async_trait]
impl Component for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn as_startable(&self) -> Option<&dyn Startable> {
        Some(self)
    }

    fn as_track_source(&self) -> Option<&dyn TrackSource> {
        Some(self)
    }
}

#[async_trait]
impl Startable for LocalBackend {
    async fn start_service(&self) -> Result<bool> {
        debug!("starting local service");
        if self.index.lock().unwrap().is_empty() {
            self.rescan().await?;
        }
        Ok(true)
    }

    /// Leaving the local source drops whatever file is loaded in playback.
    async fn stop_service(&self) -> Result<bool> {
        self.router
            .request("playback", Request::ClearPlayback)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(true)
    }
}

#[async_trait]
impl TrackSource for LocalBackend {
    async fn lookup_track(&self, id: &str) -> Result<Option<Track>> {
        let Some(path) = self.path_for(id) else {
            return Ok(None);
        };
        let position: usize = id.parse().unwrap_or_default();
        Ok(Some(track_from_path(position, &path)))
    }

    async fn playback_uri(&self, id: &str) -> Result<Option<String>> {
        // Refresh the arbiter's record with this backend's control surface.
        self.router
            .fire_and_forget("source", Request::UpdateSource {
                source: self.source_record(),
            });
        Ok(self
            .path_for(id)
            .map(|path| format!("file://{}", path.display())))
    }
}
