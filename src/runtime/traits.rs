//! Component and capability traits.
//!
//! Backends participate in the core through small capability traits instead of
//! convention-based method lookup: [`Startable`] for source arbitration and
//! [`TrackSource`] for playback. A component advertises a capability by
//! overriding the matching `as_*` accessor.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::bus::Event;
use crate::router::{CallError, Request, Response};

/// Handed to `on_start` so a component can tie auxiliary tasks to its own
/// lifetime.
#[derive(Clone)]
pub struct ActorContext {
    pub cancel: CancellationToken,
}

/// An independently scheduled component with a private mailbox.
///
/// `call` is invoked in the caller's task (request/response); `on_event` is
/// invoked from the component's own actor loop (broadcasts). Hook errors are
/// logged by the runtime and never terminate the loop.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Logical component name used for addressing (case-insensitive prefix
    /// match, so names must be unique among registered components).
    fn name(&self) -> &'static str;

    /// Verbs answered by `call`, consulted by `Router::is_callable`.
    fn verbs(&self) -> &'static [&'static str] {
        &[]
    }

    /// Handle a point-to-point request. The default answers nothing.
    async fn call(&self, request: Request) -> Result<Response, CallError> {
        Err(CallError::VerbNotFound {
            component: self.name().to_string(),
            verb: request.verb(),
        })
    }

    async fn on_start(self: Arc<Self>, ctx: ActorContext) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    async fn on_event(&self, event: &Event) -> Result<()> {
        let _ = event;
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        Ok(())
    }

    /// Lifecycle capability, probed by the source arbiter.
    fn as_startable(&self) -> Option<&dyn Startable> {
        None
    }

    /// Track resolution capability, probed by playback and the tracklist.
    fn as_track_source(&self) -> Option<&dyn TrackSource> {
        None
    }
}

/// Lifecycle hooks a backend must expose to participate in source arbitration.
/// A backend without this capability is treated as stateless and skipped.
#[async_trait]
pub trait Startable: Send + Sync {
    async fn start_service(&self) -> Result<bool>;
    async fn stop_service(&self) -> Result<bool>;
}

/// Track resolution hooks a backend must expose to participate in playback.
#[async_trait]
pub trait TrackSource: Send + Sync {
    async fn lookup_track(&self, id: &str) -> Result<Option<crate::models::Track>>;
    async fn playback_uri(&self, id: &str) -> Result<Option<String>>;
}
