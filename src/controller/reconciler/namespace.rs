//! # Namespace Reconciliation
//!
//! A namespace was created, relabelled or deleted: every registered owner may
//! now target a different set of namespaces.

use crate::controller::reconciler::owner::reconcile_owner_secret;
use crate::controller::reconciler::types::{ReconcileOutcome, Reconciler};
use crate::controller::registry::OwnerRecord;
use std::time::Duration;
use tracing::debug;

/// Re-run owner reconciliation for every registered owner
pub async fn reconcile_namespace(ctx: &Reconciler, name: &str) -> ReconcileOutcome {
    if ctx.config.is_ignored_namespace(name) {
        return ReconcileOutcome::DoneIgnored;
    }

    let owners = namespace_owners(ctx, name);
    debug!(namespace = %name, owners = owners.len(), "reconciling owners after namespace change");

    let mut retry: Option<Duration> = None;
    for owner in owners {
        if let ReconcileOutcome::RetryAfter(delay) = reconcile_owner_secret(ctx, &owner.key).await {
            retry = Some(retry.map_or(delay, |current| current.min(delay)));
        }
    }

    retry.map_or(ReconcileOutcome::Done, ReconcileOutcome::RetryAfter)
}

/// Owners affected by a change of the namespace `name`; none when the
/// namespace is ignored
pub fn namespace_owners(ctx: &Reconciler, name: &str) -> Vec<OwnerRecord> {
    if ctx.config.is_ignored_namespace(name) {
        return Vec::new();
    }
    ctx.registry.secrets()
}
