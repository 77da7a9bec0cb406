//! # Triggers
//!
//! Every reconciliation runs for an owner secret, so the controller never
//! synchronizes the same owner twice at once. Events on other objects are
//! mapped to the owners they affect:
//!
//! - owner secret: reconciled by the controller's own watch; when the owner
//!   is registered it also triggers itself, so its deletion is seen
//! - replica: its owner, found through the registry or the origin labels
//! - namespace: every registered owner

use crate::constants::{ALL_NAMESPACES_ANNOTATION, NAMESPACE_SELECTOR_ANNOTATION};
use crate::controller::reconciler::{namespace_owners, origin_owner, registered_owner, Reconciler};
use crate::controller::registry::ObjectKey;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube_runtime::reflector::ObjectRef;

/// Namespaced name of a secret, `None` when the object lacks one
pub fn secret_key(secret: &Secret) -> Option<ObjectKey> {
    let namespace = secret.metadata.namespace.as_ref()?;
    let name = secret.metadata.name.as_ref()?;
    Some(ObjectKey::new(namespace.clone(), name.clone()))
}

fn owner_ref(key: &ObjectKey) -> ObjectRef<Secret> {
    ObjectRef::new(&key.name).within(&key.namespace)
}

/// Whether the secret at `key` needs owner reconciliation: it carries a
/// replication annotation, or an owner is registered under its name
pub fn is_owner_candidate(ctx: &Reconciler, secret: &Secret, key: &ObjectKey) -> bool {
    let annotated = secret.metadata.annotations.as_ref().is_some_and(|annotations| {
        annotations.contains_key(ALL_NAMESPACES_ANNOTATION)
            || annotations.contains_key(NAMESPACE_SELECTOR_ANNOTATION)
    });
    annotated || ctx.registry.secret_with_name(key).is_some()
}

/// Owners to reconcile after an event on `secret`, deletion included
pub fn secret_triggers(ctx: &Reconciler, secret: &Secret) -> Vec<ObjectRef<Secret>> {
    let Some(key) = secret_key(secret) else {
        return Vec::new();
    };

    if ctx.registry.secret_with_name(&key).is_some() {
        return vec![owner_ref(&key)];
    }
    if ctx.config.is_ignored_namespace(&key.namespace) {
        return Vec::new();
    }

    registered_owner(ctx, &key)
        .map(|owner| owner.key)
        .or_else(|| origin_owner(secret))
        .map(|owner| owner_ref(&owner))
        .into_iter()
        .collect()
}

/// Owners to reconcile after an event on `namespace`, deletion included
pub fn namespace_triggers(ctx: &Reconciler, namespace: &Namespace) -> Vec<ObjectRef<Secret>> {
    let Some(name) = namespace.metadata.name.as_deref() else {
        return Vec::new();
    };
    namespace_owners(ctx, name)
        .iter()
        .map(|owner| owner_ref(&owner.key))
        .collect()
}
