//! # Replica Reconciliation
//!
//! Reconciles a secret that may be a replica. The owner is found through the
//! registry; when the registry does not know it (after a restart, for
//! instance) the origin labels of the replica point at the owner to reconcile.

use crate::constants::{ORIGIN_NAMESPACE_LABEL, ORIGIN_NAME_LABEL};
use crate::controller::policy::list_namespaces_from_annotations;
use crate::controller::reconciler::owner::reconcile_owner_secret;
use crate::controller::reconciler::types::{ReconcileOutcome, Reconciler};
use crate::controller::registry::{ObjectKey, OwnerRecord};
use crate::controller::sync::SyncScope;
use crate::controller::template;
use k8s_openapi::api::core::v1::Secret;
use tracing::debug;

/// Reconcile the secret at `key` as a potential replica
pub async fn reconcile_replica_secret(ctx: &Reconciler, key: &ObjectKey) -> ReconcileOutcome {
    if ctx.config.is_ignored_namespace(&key.namespace) {
        return ReconcileOutcome::DoneIgnored;
    }

    match registered_owner(ctx, key) {
        Some(owner) => synchronize_namespace(ctx, &owner, &key.namespace).await,
        None => adopt(ctx, key).await,
    }
}

/// Owner of the secret at `key` according to the registry: the owner it is
/// recorded under, or else the owner registered under the same name in
/// another namespace
pub fn registered_owner(ctx: &Reconciler, key: &ObjectKey) -> Option<OwnerRecord> {
    ctx.registry.secret_with_owned_secret_name(key).or_else(|| {
        ctx.registry
            .secret_with_bare_name(&key.name)
            .filter(|owner| owner.key.namespace != key.namespace)
    })
}

/// Owner named by the origin labels of a replica. `None` unless the secret
/// has a `Secret` owner reference and both labels, pointing to another
/// namespace.
pub fn origin_owner(replica: &Secret) -> Option<ObjectKey> {
    template::secret_owner_reference(replica)?;

    let labels = replica.metadata.labels.as_ref()?;
    let name = labels.get(ORIGIN_NAME_LABEL)?;
    let namespace = labels.get(ORIGIN_NAMESPACE_LABEL)?;
    if replica.metadata.namespace.as_ref() == Some(namespace) {
        return None;
    }
    Some(ObjectKey::new(namespace.clone(), name.clone()))
}

/// Synchronize the replica of `owner` in a single namespace
async fn synchronize_namespace(
    ctx: &Reconciler,
    owner: &OwnerRecord,
    namespace: &str,
) -> ReconcileOutcome {
    let secret = match ctx.cluster.get_secret(&owner.key).await {
        Ok(Some(secret)) if secret.metadata.uid.as_deref() == Some(owner.uid.as_str()) => secret,
        Ok(_) => {
            debug!(owner = %owner.key, "owner gone or replaced, left to owner reconciliation");
            return ReconcileOutcome::Done;
        }
        Err(err) => return ctx.outcome(&owner.key, Err(err.into())),
    };

    let resolved = list_namespaces_from_annotations(
        ctx.cluster.as_ref(),
        secret.metadata.annotations.as_ref(),
        &owner.key.namespace,
        &ctx.config.ignored_namespaces,
    )
    .await;

    let scope = SyncScope::Namespace(namespace.to_string());
    let result = ctx
        .synchronizer()
        .synchronize(&secret, resolved, &scope)
        .await;
    ctx.outcome(&owner.key, result)
}

/// Find the owner of an unknown replica through its origin labels
async fn adopt(ctx: &Reconciler, key: &ObjectKey) -> ReconcileOutcome {
    let replica = match ctx.cluster.get_secret(key).await {
        Ok(Some(replica)) => replica,
        Ok(None) => return ReconcileOutcome::DoneIgnored,
        Err(err) => return ctx.outcome(key, Err(err.into())),
    };

    let Some(origin) = origin_owner(&replica) else {
        return ReconcileOutcome::DoneIgnored;
    };
    debug!(
        secret = %key,
        owner = %origin,
        "replica unknown to the registry, reconciling its origin"
    );
    reconcile_owner_secret(ctx, &origin).await
}
