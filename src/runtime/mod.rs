//! Actor runtime: one mailbox-draining loop per registered component.
//!
//! The loop runs `on_start` once, then races the cancellation token against
//! the mailbox so a stop signal is observed promptly even when the mailbox is
//! idle. Errors and panics inside any hook are logged and contained, so one
//! component's bug cannot wedge the process. Termination is cooperative: the
//! loop finishes the in-flight hook, then runs `on_stop`.

mod traits;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub use traits::{ActorContext, Component, Startable, TrackSource};

use crate::bus::Event;

/// Spawn the actor loop for `component`, draining `mailbox` until the token is
/// cancelled or the mailbox closes.
pub(crate) fn spawn_actor(
    component: Arc<dyn Component>,
    mailbox: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_actor(component, mailbox, cancel))
}

async fn run_actor(
    component: Arc<dyn Component>,
    mut mailbox: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
) {
    let name = component.name();
    let ctx = ActorContext {
        cancel: cancel.clone(),
    };

    guard(name, "on_start", component.clone().on_start(ctx)).await;
    debug!("{name}: actor started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            message = mailbox.recv() => match message {
                Some(event) => guard(name, "on_event", component.on_event(&event)).await,
                None => break,
            },
        }
    }

    guard(name, "on_stop", component.on_stop()).await;
    debug!("{name}: actor stopped");
}

/// Run one hook, containing both `Err` results and panics.
async fn guard<F>(name: &str, hook: &str, fut: F)
where
    F: Future<Output = anyhow::Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("{name}: error in {hook}: {e:#}"),
        Err(_) => error!("{name}: panic in {hook}"),
    }
}
