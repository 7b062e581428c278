//! Source arbiter: at most one audio source is active at a time.
//!
//! Transitions run the outgoing backend's `stop_service` before the incoming
//! backend's `start_service`; a refused stop aborts the whole transition with
//! the current record untouched, so callers see "source switch refused" rather
//! than a partial state.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::bus::{Event, Target};
use crate::models::Source;
use crate::router::{CallError, Request, Response, Router};
use crate::runtime::Component;

/// Source types the arbiter will activate.
pub const KNOWN_SOURCES: &[&str] = &[
    "local",
    "storage",
    "radio",
    "bluetooth",
    "shairportsync",
    "spotify",
    "snapcast",
];

pub struct SourceArbiter {
    router: Arc<Router>,
    /// Serializes transitions; `current` is only inspected or replaced while
    /// holding this.
    transition: tokio::sync::Mutex<()>,
    current: Mutex<Source>,
}

impl SourceArbiter {
    pub fn new(router: Arc<Router>) -> Arc<Self> {
        Arc::new(Self {
            router,
            transition: tokio::sync::Mutex::new(()),
            current: Mutex::new(Source::disconnected(None)),
        })
    }

    pub fn get(&self) -> Source {
        self.current.lock().unwrap().clone()
    }

    /// Switch the active source. See the transition protocol in the module
    /// docs; `None` deactivates every source.
    pub async fn set(&self, new_type: Option<String>) -> Result<bool, CallError> {
        let _transition = self.transition.lock().await;

        let previous = self.current.lock().unwrap().source_type.clone();
        if new_type == previous {
            return Ok(true);
        }

        if let Some(requested) = new_type.as_deref() {
            if !KNOWN_SOURCES.contains(&requested) {
                error!("unknown source type: {requested}");
                return Err(CallError::UnknownSourceType(requested.to_string()));
            }
        }

        if let Some(previous) = previous.as_deref() {
            self.stop_backend(previous).await?;
        }

        if let Some(requested) = new_type.as_deref() {
            self.start_backend(requested).await?;
        }

        let source = Source::disconnected(new_type);
        *self.current.lock().unwrap() = source.clone();
        self.router.send(Target::All, Event::SourceChanged { source });
        Ok(true)
    }

    /// Accept a backend's state patch only while that backend is still the
    /// active source; a stale update from a backend that is mid-shutdown is
    /// dropped silently.
    pub fn update(&self, update: Source) {
        let mut current = self.current.lock().unwrap();
        if current.source_type != update.source_type {
            debug!(
                "dropping stale source update from {:?} (active: {:?})",
                update.source_type, current.source_type
            );
            return;
        }
        *current = update.clone();
        drop(current);
        self.router.send(Target::All, Event::SourceUpdated { source: update });
    }

    /// Stop the outgoing backend. A backend that is unregistered or has no
    /// lifecycle capability is stateless and skipped; a refused stop aborts.
    async fn stop_backend(&self, source_type: &str) -> Result<(), CallError> {
        let Ok(backend) = self.router.resolve(source_type) else {
            return Ok(());
        };
        let Some(startable) = backend.as_startable() else {
            return Ok(());
        };
        info!("stopping {source_type} service");
        match startable.stop_service().await {
            Ok(true) => Ok(()),
            Ok(false) => {
                error!("failed to stop service for source {source_type}");
                Err(CallError::StopServiceFailed(source_type.to_string()))
            }
            Err(e) => {
                error!("failed to stop service for source {source_type}: {e:#}");
                Err(CallError::StopServiceFailed(source_type.to_string()))
            }
        }
    }

    async fn start_backend(&self, source_type: &str) -> Result<(), CallError> {
        let startable_missing = || {
            error!("failed to start service for source {source_type}");
            CallError::StartServiceFailed(source_type.to_string())
        };
        let backend = self
            .router
            .resolve(source_type)
            .map_err(|_| startable_missing())?;
        let startable = backend.as_startable().ok_or_else(startable_missing)?;
        info!("starting {source_type} service");
        match startable.start_service().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(startable_missing()),
            Err(e) => {
                error!("failed to start service for source {source_type}: {e:#}");
                Err(CallError::StartServiceFailed(source_type.to_string()))
            }
        }
    }
}

#[async_trait]
impl Component for SourceArbiter {
    fn name(&self) -> &'static str {
        "source"
    }

    fn verbs(&self) -> &'static [&'static str] {
        &["set", "update_source", "get"]
    }

    async fn call(&self, request: Request) -> Result<Response, CallError> {
        match request {
            Request::SetSource { source_type } => self.set(source_type).await.map(Response::Bool),
            Request::UpdateSource { source } => {
                self.update(source);
                Ok(Response::Ack)
            }
            Request::GetSource => Ok(Response::Source(self.get())),
            other => Err(CallError::VerbNotFound {
                component: self.name().to_string(),
                verb: other.verb(),
            }),
        }
    }
}
