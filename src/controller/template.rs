//! # Replica Template
//!
//! Builds the desired state of a replica from its owner secret and compares it
//! with what is found in the cluster.

use crate::constants::{
    ALL_NAMESPACES_ANNOTATION, NAMESPACE_SELECTOR_ANNOTATION, ORIGIN_NAMESPACE_LABEL,
    ORIGIN_NAME_LABEL,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

const DEFAULT_SECRET_TYPE: &str = "Opaque";

/// Labels and annotations that are never copied to replicas
#[derive(Debug, Clone, Copy)]
pub struct ProtectedMetadata<'a> {
    pub labels: &'a [String],
    pub annotations: &'a [String],
}

/// Owner reference pointing at the given owner secret
pub fn owner_reference(owner: &Secret) -> OwnerReference {
    OwnerReference {
        api_version: "v1".to_string(),
        kind: "Secret".to_string(),
        name: owner.metadata.name.clone().unwrap_or_default(),
        uid: owner.metadata.uid.clone().unwrap_or_default(),
        ..OwnerReference::default()
    }
}

/// Replica template for `owner`; the namespace is left unset
pub fn replica_template(owner: &Secret, protected: ProtectedMetadata<'_>) -> Secret {
    let mut labels = owner.metadata.labels.clone().unwrap_or_default();
    for label in protected.labels {
        labels.remove(label);
    }
    if let Some(name) = &owner.metadata.name {
        labels.insert(ORIGIN_NAME_LABEL.to_string(), name.clone());
    }
    if let Some(namespace) = &owner.metadata.namespace {
        labels.insert(ORIGIN_NAMESPACE_LABEL.to_string(), namespace.clone());
    }

    let mut annotations = owner.metadata.annotations.clone().unwrap_or_default();
    annotations.remove(ALL_NAMESPACES_ANNOTATION);
    annotations.remove(NAMESPACE_SELECTOR_ANNOTATION);
    for annotation in protected.annotations {
        annotations.remove(annotation);
    }

    Secret {
        metadata: ObjectMeta {
            name: owner.metadata.name.clone(),
            labels: Some(labels),
            annotations: (!annotations.is_empty()).then_some(annotations),
            owner_references: Some(vec![owner_reference(owner)]),
            ..ObjectMeta::default()
        },
        data: owner.data.clone(),
        type_: owner.type_.clone(),
        immutable: owner.immutable,
        ..Secret::default()
    }
}

/// Copy of `template` placed in `namespace`
pub fn for_namespace(template: &Secret, namespace: &str) -> Secret {
    let mut secret = template.clone();
    secret.metadata.namespace = Some(namespace.to_string());
    secret
}

/// Whether `secret` has an owner reference to the secret with this uid
pub fn is_owned_by(secret: &Secret, uid: &str) -> bool {
    secret
        .metadata
        .owner_references
        .iter()
        .flatten()
        .any(|reference| reference.uid == uid)
}

/// First owner reference of `secret` pointing at another secret
pub fn secret_owner_reference(secret: &Secret) -> Option<&OwnerReference> {
    secret
        .metadata
        .owner_references
        .iter()
        .flatten()
        .find(|reference| reference.kind == "Secret")
}

fn map_or_empty(map: Option<&BTreeMap<String, String>>) -> BTreeMap<String, String> {
    map.cloned().unwrap_or_default()
}

/// Whether the replica found in the cluster differs from the desired one
pub fn has_drifted(existing: &Secret, desired: &Secret) -> bool {
    let existing_type = existing.type_.as_deref().unwrap_or(DEFAULT_SECRET_TYPE);
    let desired_type = desired.type_.as_deref().unwrap_or(DEFAULT_SECRET_TYPE);

    existing.data.clone().unwrap_or_default() != desired.data.clone().unwrap_or_default()
        || existing_type != desired_type
        || map_or_empty(existing.metadata.labels.as_ref())
            != map_or_empty(desired.metadata.labels.as_ref())
        || map_or_empty(existing.metadata.annotations.as_ref())
            != map_or_empty(desired.metadata.annotations.as_ref())
        || existing.metadata.owner_references != desired.metadata.owner_references
}
