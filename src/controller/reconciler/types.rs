//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::cluster::ClusterApi;
use crate::controller::error::SyncError;
use crate::controller::registry::{ObjectKey, Registry};
use crate::controller::sync::Synchronizer;
use crate::controller::template::ProtectedMetadata;
use crate::observability::metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Result of one reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The object is in sync
    Done,
    /// The object is not managed by the controller
    DoneIgnored,
    /// Reconcile again after the delay
    RetryAfter(Duration),
}

impl ReconcileOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Done => "done",
            ReconcileOutcome::DoneIgnored => "ignored",
            ReconcileOutcome::RetryAfter(_) => "retry",
        }
    }
}

/// Shared reconciliation context
///
/// Passes for the same owner are not serialized here: the controller runtime
/// keys every pass by its owner secret and never runs two at once for a key.
pub struct Reconciler {
    pub cluster: Arc<dyn ClusterApi>,
    pub registry: Registry,
    pub config: ControllerConfig,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(cluster: Arc<dyn ClusterApi>, config: ControllerConfig) -> Self {
        Self {
            cluster,
            registry: Registry::new(),
            config,
        }
    }

    pub(crate) fn synchronizer(&self) -> Synchronizer<'_> {
        Synchronizer {
            cluster: self.cluster.as_ref(),
            registry: &self.registry,
            protected: ProtectedMetadata {
                labels: &self.config.protected_labels,
                annotations: &self.config.protected_annotations,
            },
        }
    }

    /// Decide between done, ignored and retry for the result of a pass
    pub(crate) fn outcome(
        &self,
        key: &ObjectKey,
        result: Result<(), SyncError>,
    ) -> ReconcileOutcome {
        metrics::set_owners_registered(self.registry.len());
        let Err(err) = result else {
            return ReconcileOutcome::Done;
        };

        match &err {
            SyncError::NoAnnotation => {
                debug!(secret = %key, "{err}");
                return ReconcileOutcome::DoneIgnored;
            }
            SyncError::Annotation(_) | SyncError::Registry(_) => {
                error!(
                    secret = %key,
                    error = %err,
                    error.kind = err.kind(),
                    "synchronization failed"
                );
            }
            SyncError::Client(_) => {
                warn!(
                    secret = %key,
                    error = %err,
                    retry_after_secs = self.config.requeue_after_secs,
                    "synchronization failed, will retry"
                );
            }
        }
        metrics::increment_reconciliation_errors(err.kind());

        if err.is_retryable() {
            ReconcileOutcome::RetryAfter(self.config.requeue_after())
        } else {
            ReconcileOutcome::Done
        }
    }
}
