//! Name-based request/response and event fan-out across components.
//!
//! The router is the registry of all actors. Point-to-point requests resolve a
//! case-insensitive name prefix (first registered match wins) and run the
//! handler in the caller's task, which is what lets request chains like
//! Playback → Tracklist → Playback complete without self-deadlock. Broadcasts
//! go through per-actor mailboxes (FIFO per actor, no cross-actor ordering)
//! and are mirrored to a broadcast tap for external observers.

mod error;
mod request;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use error::CallError;
pub use request::{Request, Response};

use crate::bus::{name_matches, Event, Target};
use crate::runtime::{spawn_actor, Component};

const EVENT_TAP_CAPACITY: usize = 256;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct Registration {
    name: &'static str,
    component: Arc<dyn Component>,
    mailbox: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Registry of named actors plus the dispatch surface between them.
pub struct Router {
    registry: RwLock<Vec<Registration>>,
    tap: broadcast::Sender<Event>,
    shutdown: CancellationToken,
    /// Captured so `fire_and_forget`/`send` stay callable from non-runtime
    /// threads (driver callbacks).
    spawner: tokio::runtime::Handle,
}

impl Router {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Arc<Self> {
        let (tap, _) = broadcast::channel(EVENT_TAP_CAPACITY);
        Arc::new(Self {
            registry: RwLock::new(Vec::new()),
            tap,
            shutdown: CancellationToken::new(),
            spawner: tokio::runtime::Handle::current(),
        })
    }

    /// Register a component and spawn its actor loop. Registration order is
    /// resolution order; names must not be prefixes of each other.
    pub fn register(&self, component: Arc<dyn Component>) {
        let name = component.name();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = self.shutdown.child_token();
        let task = {
            let _guard = self.spawner.enter();
            spawn_actor(component.clone(), rx, cancel.clone())
        };

        let mut registry = self.registry.write().unwrap();
        if registry.iter().any(|r| name_matches(r.name, name) || name_matches(name, r.name)) {
            warn!("component name {name} shadows an existing registration");
        }
        registry.push(Registration {
            name,
            component,
            mailbox: tx,
            cancel,
            task,
        });
        debug!("registered component: {name}");
    }

    /// Resolve a component by case-insensitive name prefix.
    pub fn resolve(&self, component: &str) -> Result<Arc<dyn Component>, CallError> {
        self.registry
            .read()
            .unwrap()
            .iter()
            .find(|r| name_matches(component, r.name))
            .map(|r| r.component.clone())
            .ok_or_else(|| CallError::UnknownComponent(component.to_string()))
    }

    /// Point-to-point request, awaited in the caller's task.
    pub async fn request(&self, component: &str, request: Request) -> Result<Response, CallError> {
        debug!("request {component}.{} {request:?}", request.verb());
        let target = self.resolve(component)?;
        target.call(request).await
    }

    /// Existence probe without invocation: does `component` answer `verb`?
    pub fn is_callable(&self, component: &str, verb: &str) -> bool {
        let Ok(target) = self.resolve(component) else {
            return false;
        };
        match verb {
            "start_service" | "stop_service" => target.as_startable().is_some(),
            "lookup_track" | "playback_uri" => target.as_track_source().is_some(),
            _ => target.verbs().contains(&verb),
        }
    }

    /// Schedule a request without waiting for its result. Never blocks and
    /// never fails the caller; a missing target or a handler error is logged.
    /// This is the only request path safe from non-runtime callback threads.
    pub fn fire_and_forget(&self, component: &str, request: Request) {
        let target = match self.resolve(component) {
            Ok(target) => target,
            Err(e) => {
                debug!("fire_and_forget dropped: {e}");
                return;
            }
        };
        let component = component.to_string();
        self.spawner.spawn(async move {
            let verb = request.verb();
            if let Err(e) = target.call(request).await {
                warn!("fire_and_forget {component}.{verb} failed: {e}");
            }
        });
    }

    /// Deliver an event to the mailboxes of all matching actors, preserving
    /// send order per actor. Non-blocking; unmatched targets and stopped
    /// actors are skipped silently. Also mirrored to the broadcast tap.
    pub fn send(&self, target: Target, event: Event) {
        {
            let registry = self.registry.read().unwrap();
            for registration in registry.iter().filter(|r| target.matches(r.name)) {
                let _ = registration.mailbox.send(event.clone());
            }
        }
        let _ = self.tap.send(event);
    }

    /// Broadcast to every registered actor.
    pub fn broadcast(&self, event: Event) {
        self.send(Target::All, event);
    }

    /// Observe the event stream without being an actor (transport layer,
    /// telemetry, tests).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tap.subscribe()
    }

    pub fn component_names(&self) -> Vec<&'static str> {
        self.registry.read().unwrap().iter().map(|r| r.name).collect()
    }

    /// Cooperative shutdown: signal every actor, wait for the loops to finish
    /// their in-flight hooks and run `on_stop`, then clear the registry.
    pub async fn shutdown(&self) {
        info!("router shutting down");
        let registrations = std::mem::take(&mut *self.registry.write().unwrap());
        for registration in &registrations {
            registration.cancel.cancel();
        }
        for registration in registrations {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, registration.task).await {
                Ok(Ok(())) => debug!("{}: actor joined", registration.name),
                Ok(Err(e)) => warn!("{}: actor task failed: {e}", registration.name),
                Err(_) => warn!("{}: actor did not stop within timeout", registration.name),
            }
        }
        info!("router shutdown complete");
    }
}
