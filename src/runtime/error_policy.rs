//! # Error Policy
//!
//! Requeue of failed reconciliations and classification of watch stream
//! errors. Whether a synchronization error is retried at all is decided by
//! the reconcilers themselves (see [`crate::controller::reconciler`]); this
//! module only schedules the retry they asked for.

use crate::controller::error::RetryError;
use crate::controller::reconciler::Reconciler;
use crate::observability::metrics;
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Requeue a reconciliation that asked to be retried
pub fn handle_reconciliation_error(
    secret: Arc<Secret>,
    error: &RetryError,
    _ctx: Arc<Reconciler>,
) -> Action {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.reconciliation_error",
        resource.name = secret.metadata.name.as_deref().unwrap_or("unknown"),
        resource.namespace = secret.metadata.namespace.as_deref().unwrap_or("unknown"),
        error = %error
    );
    let _error_guard = error_span.enter();

    info!(retry_after_secs = error.delay.as_secs(), "Requeueing {}", error.key);
    metrics::increment_requeues();
    Action::requeue(error.delay)
}

/// Kind of failure reported by a watch stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// 401: RBAC revoked or token expired
    Unauthorized,
    /// 410: resource version too old, the watcher re-lists on its own
    Expired,
    /// 429: API server storage reinitializing or throttling
    Throttled,
    /// 404
    NotFound,
    Other,
}

/// What the watch loop does after an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorAction {
    /// Keep consuming the stream, its backoff handles the retry
    Continue,
    /// Drop the stream and start a new watch after the restart delay
    Restart,
}

/// Classify a watch error from its debug representation
pub fn classify_watch_error(error_string: &str) -> WatchErrorClass {
    // 404 first: a plain-text 404 body surfaces as a decode error mentioning WatchFailed
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_401 =
        (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found;
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");
    let is_429 = error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests");

    if is_401 {
        WatchErrorClass::Unauthorized
    } else if is_410 {
        WatchErrorClass::Expired
    } else if is_429 {
        WatchErrorClass::Throttled
    } else if is_not_found {
        WatchErrorClass::NotFound
    } else {
        WatchErrorClass::Other
    }
}

/// Log a watch stream error and decide whether the watch must be restarted
pub fn handle_watch_stream_error(
    watch: &str,
    error: &kube_runtime::watcher::Error,
) -> WatchErrorAction {
    let error_string = format!("{error:?}");
    let class = classify_watch_error(&error_string);
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        watch = watch,
        error = %error
    );
    let _error_guard = error_span.enter();

    match class {
        WatchErrorClass::Unauthorized => {
            error!(
                "Watch authentication failed (401 Unauthorized) - \
                 RBAC may have been revoked or token expired"
            );
            error!(
                "Verify the controller ClusterRole still grants \
                 get/list/watch on secrets and namespaces"
            );
            WatchErrorAction::Restart
        }
        WatchErrorClass::Expired => {
            warn!(error_type = "410", "watch.error.resource_version_expired");
            WatchErrorAction::Continue
        }
        WatchErrorClass::Throttled => {
            warn!(error_type = "429", "API server storage reinitializing, backing off");
            WatchErrorAction::Continue
        }
        WatchErrorClass::NotFound => {
            warn!("Watch returned not found (404): {}", error_string);
            WatchErrorAction::Continue
        }
        WatchErrorClass::Other => {
            error!("Watch stream error: {}", error_string);
            WatchErrorAction::Restart
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_watch_error() {
        assert_eq!(
            classify_watch_error("Api(ErrorResponse { code: 401, reason: \"Unauthorized\" })"),
            WatchErrorClass::Unauthorized
        );
        assert_eq!(
            classify_watch_error("too old resource version: 123 (456)"),
            WatchErrorClass::Expired
        );
        assert_eq!(
            classify_watch_error("storage is (re)initializing"),
            WatchErrorClass::Throttled
        );
        assert_eq!(
            classify_watch_error("WatchFailed(invalid type: integer `404`)"),
            WatchErrorClass::NotFound
        );
        assert_eq!(classify_watch_error("connection reset"), WatchErrorClass::Other);
    }
}
