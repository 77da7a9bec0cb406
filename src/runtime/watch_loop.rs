//! # Watch Loop
//!
//! Runs the secret controller: a [`Controller`] on secrets in every namespace,
//! with secondary watches on secrets and namespaces whose events are mapped to
//! owner secrets (see [`crate::runtime::triggers`]).
//!
//! The loop runs until SIGINT/SIGTERM. On shutdown the server is marked as not
//! ready and the controller waits for in-flight reconciliations.

use crate::controller::error::RetryError;
use crate::controller::reconciler::{
    forget_owner, reconcile_owner_secret, ReconcileOutcome, Reconciler,
};
use crate::controller::registry::ObjectKey;
use crate::observability::metrics;
use crate::runtime::error_policy::{
    handle_reconciliation_error, handle_watch_stream_error, WatchErrorAction,
};
use crate::runtime::triggers::{is_owner_candidate, namespace_triggers, secret_key, secret_triggers};
use crate::server::ServerState;
use futures::{future, StreamExt};
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::Api;
use kube::Client;
use kube_runtime::controller::{self, Action};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

const RECONCILE_KIND: &str = "owner";

/// One item of the controller output stream
pub type ControllerResult =
    Result<(ObjectRef<Secret>, Action), controller::Error<RetryError, watcher::Error>>;

/// Reconcile a secret delivered by the controller
///
/// Secrets that are neither annotated nor registered are skipped without any
/// call to the API server.
pub async fn reconcile_secret(
    secret: Arc<Secret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, RetryError> {
    let Some(key) = secret_key(&secret) else {
        return Ok(Action::await_change());
    };
    if !is_owner_candidate(&ctx, &secret, &key) {
        return Ok(Action::await_change());
    }

    let span = tracing::info_span!(
        "controller.reconcile",
        owner.namespace = %key.namespace,
        owner.name = %key.name
    );
    metrics::increment_reconciliations(RECONCILE_KIND);
    let start = Instant::now();
    let outcome = reconcile_owner_secret(&ctx, &key).instrument(span).await;
    metrics::observe_reconciliation_duration(RECONCILE_KIND, start.elapsed().as_secs_f64());
    debug!(secret = %key, outcome = outcome.as_str(), "reconciliation finished");

    match outcome {
        ReconcileOutcome::RetryAfter(delay) => Err(RetryError { key, delay }),
        ReconcileOutcome::Done | ReconcileOutcome::DoneIgnored => Ok(Action::await_change()),
    }
}

/// Handle one item of the controller output stream
///
/// An owner that was triggered but is missing from the controller cache has
/// been deleted: its record is dropped. Watch errors decide whether the
/// controller keeps running or gets restarted.
pub fn handle_controller_result(ctx: &Reconciler, result: &ControllerResult) -> WatchErrorAction {
    match result {
        Ok((object, _)) => {
            debug!(object = %object, "watch.event.success");
            WatchErrorAction::Continue
        }
        Err(controller::Error::ObjectNotFound(object)) => {
            if let Some(namespace) = &object.namespace {
                forget_owner(ctx, &ObjectKey::new(namespace.clone(), object.name.clone()));
            }
            WatchErrorAction::Continue
        }
        Err(controller::Error::ReconcilerFailed(err, object)) => {
            debug!(object = %object, error = %err, "reconciliation requeued");
            WatchErrorAction::Continue
        }
        Err(controller::Error::QueueError(err)) => handle_watch_stream_error("secrets", err),
        Err(err) => {
            warn!(error = %err, "controller error");
            WatchErrorAction::Continue
        }
    }
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Run the controller watch loop
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let restart_delay = reconciler.config.watch_restart_delay();
    let concurrency =
        u16::try_from(reconciler.config.max_concurrent_reconciliations).unwrap_or(u16::MAX);

    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_server_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
        let _ = shutdown_tx.send(true);
    });

    let secrets: Api<Secret> = Api::all(client.clone());
    let namespaces: Api<Namespace> = Api::all(client);

    loop {
        if *shutdown_rx.borrow() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::info_span!("controller.watch", operation = "watch_loop");
        let secret_ctx = Arc::clone(&reconciler);
        let namespace_ctx = Arc::clone(&reconciler);
        let result_ctx = Arc::clone(&reconciler);

        info!("Starting controller watch loop...");
        let controller_future = Controller::new(secrets.clone(), watcher::Config::default())
            .watches(secrets.clone(), watcher::Config::default(), move |secret| {
                secret_triggers(&secret_ctx, &secret)
            })
            .watches(namespaces.clone(), watcher::Config::default(), move |namespace| {
                namespace_triggers(&namespace_ctx, &namespace)
            })
            .with_config(controller::Config::default().concurrency(concurrency))
            .shutdown_on_signal()
            .run(
                reconcile_secret,
                handle_reconciliation_error,
                Arc::clone(&reconciler),
            )
            .take_while(move |result| {
                let action = handle_controller_result(&result_ctx, result);
                future::ready(action == WatchErrorAction::Continue)
            })
            .for_each(|_| future::ready(()));

        server_state.set_ready(true);
        controller_future.instrument(watch_span).await;

        if *shutdown_rx.borrow() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::select! {
            _ = shutdown_rx.wait_for(|stop| *stop) => break,
            () = tokio::time::sleep(restart_delay) => {}
        }
    }

    info!("Controller stopped gracefully");
    Ok(())
}
