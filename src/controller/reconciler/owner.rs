//! # Owner Reconciliation
//!
//! Reconciles a secret that may carry a replication annotation.
//!
//! - deleted secret: its owner record is dropped, replicas are removed by the
//!   garbage collector through their owner reference
//! - secret with any owner reference (a replica, or a secret managed by
//!   another controller): ignored
//! - anything else: annotations are resolved and replicas synchronized

use crate::controller::policy::list_namespaces_from_annotations;
use crate::controller::reconciler::types::{ReconcileOutcome, Reconciler};
use crate::controller::registry::ObjectKey;
use crate::controller::sync::SyncScope;
use k8s_openapi::api::core::v1::Secret;
use tracing::{debug, info};

/// Reconcile the secret at `key` as a potential owner
pub async fn reconcile_owner_secret(ctx: &Reconciler, key: &ObjectKey) -> ReconcileOutcome {
    if ctx.config.is_ignored_namespace(&key.namespace) {
        return ReconcileOutcome::DoneIgnored;
    }

    let secret = match ctx.cluster.get_secret(key).await {
        Ok(secret) => secret,
        Err(err) => return ctx.outcome(key, Err(err.into())),
    };

    let Some(secret) = secret else {
        return forget_owner(ctx, key);
    };

    if has_owner_references(&secret) {
        debug!(secret = %key, "secret already has an owner, skipping owner reconciliation");
        return ReconcileOutcome::DoneIgnored;
    }

    // Deleted and recreated under the same name
    let uid = secret.metadata.uid.as_deref();
    if let (Some(record), Some(uid)) = (ctx.registry.secret_with_name(key), uid) {
        if record.uid != uid && ctx.registry.unregister_secret(&record.uid).is_ok() {
            info!(secret = %key, stale_uid = %record.uid, uid = %uid, "dropped stale owner record");
        }
    }

    let resolved = list_namespaces_from_annotations(
        ctx.cluster.as_ref(),
        secret.metadata.annotations.as_ref(),
        &key.namespace,
        &ctx.config.ignored_namespaces,
    )
    .await;

    let result = ctx
        .synchronizer()
        .synchronize(&secret, resolved, &SyncScope::All)
        .await;
    ctx.outcome(key, result)
}

/// The secret at `key` no longer exists: drop the owner registered under
/// that name, if any
pub fn forget_owner(ctx: &Reconciler, key: &ObjectKey) -> ReconcileOutcome {
    if let Some(record) = ctx.registry.secret_with_name(key) {
        if ctx.registry.unregister_secret(&record.uid).is_ok() {
            info!(secret = %key, uid = %record.uid, "owner deleted, removed from registry");
        }
    }
    ctx.outcome(key, Ok(()))
}

fn has_owner_references(secret: &Secret) -> bool {
    secret
        .metadata
        .owner_references
        .as_ref()
        .is_some_and(|refs| !refs.is_empty())
}
