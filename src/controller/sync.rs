//! # Synchronization Engine
//!
//! Brings the replicas of one owner secret in line with the namespaces it
//! targets.
//!
//! A pass runs in three stages:
//! 1. replicas recorded for namespaces that are no longer targeted are
//!    forgotten and deleted
//! 2. the owner is registered (or confirmed)
//! 3. every targeted namespace gets a replica, created when missing and
//!    updated when it drifted from the owner
//!
//! A replica is only ever updated or deleted when it carries an owner
//! reference to the owner's uid. Secrets with the same name that belong to
//! something else are left untouched.

use crate::controller::cluster::ClusterApi;
use crate::controller::error::SyncError;
use crate::controller::registry::{ObjectKey, Registry};
use crate::controller::template::{self, ProtectedMetadata};
use crate::observability::metrics;
use anyhow::anyhow;
use k8s_openapi::api::core::v1::Secret;
use tracing::{debug, info, warn};

/// Namespaces a synchronization pass may touch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    All,
    Namespace(String),
}

impl SyncScope {
    fn contains(&self, namespace: &str) -> bool {
        match self {
            SyncScope::All => true,
            SyncScope::Namespace(ns) => ns == namespace,
        }
    }
}

/// Borrowed view of everything a synchronization pass needs
pub struct Synchronizer<'a> {
    pub cluster: &'a dyn ClusterApi,
    pub registry: &'a Registry,
    pub protected: ProtectedMetadata<'a>,
}

impl std::fmt::Debug for Synchronizer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("registry", &self.registry)
            .field("protected", &self.protected)
            .finish_non_exhaustive()
    }
}

/// Keeps the first error seen while carrying on with the remaining work
#[derive(Default)]
struct FirstError(Option<SyncError>);

impl FirstError {
    fn record(&mut self, err: impl Into<SyncError>) {
        if self.0.is_none() {
            self.0 = Some(err.into());
        }
    }

    fn into_result(self) -> Result<(), SyncError> {
        self.0.map_or(Ok(()), Err)
    }
}

fn owner_identity(owner: &Secret) -> Result<(ObjectKey, String), SyncError> {
    let namespace = owner.metadata.namespace.as_deref();
    let name = owner.metadata.name.as_deref();
    let uid = owner.metadata.uid.as_deref();
    match (namespace, name, uid) {
        (Some(namespace), Some(name), Some(uid)) => {
            Ok((ObjectKey::new(namespace, name), uid.to_string()))
        }
        _ => Err(anyhow!("secret is missing its namespace, name or uid").into()),
    }
}

impl Synchronizer<'_> {
    /// Synchronize the replicas of `owner` with the resolved target namespaces
    pub async fn synchronize(
        &self,
        owner: &Secret,
        resolved: Result<Vec<String>, SyncError>,
        scope: &SyncScope,
    ) -> Result<(), SyncError> {
        let (owner_key, uid) = owner_identity(owner)?;
        // Without a namespace list nothing can be told apart from an orphan
        if matches!(resolved, Err(SyncError::Client(_))) {
            return resolved.map(|_| ());
        }
        let targets: &[String] = resolved.as_deref().unwrap_or(&[]);

        let orphans: Vec<ObjectKey> = self
            .registry
            .owned_secrets_with_uid(&uid)
            .into_iter()
            .filter(|owned| scope.contains(&owned.namespace))
            .filter(|owned| !targets.contains(&owned.namespace))
            .collect();
        let had_replicas = !self.registry.owned_secrets_with_uid(&uid).is_empty();

        let mut cleanup = FirstError::default();
        for orphan in &orphans {
            if let Err(err) = self.remove_orphan(&uid, orphan).await {
                warn!(
                    owner.namespace = %owner_key.namespace,
                    owner.name = %owner_key.name,
                    namespace = %orphan.namespace,
                    error = %err,
                    "failed to remove replica"
                );
                cleanup.record(err);
            }
        }

        let targets = match resolved {
            Ok(targets) => targets,
            Err(err) => {
                // A failed deletion keeps its record, so the owner stays
                // registered and the retry finds it again.
                cleanup.into_result()?;
                self.forget_owner_without_replicas(&uid);
                return match err {
                    SyncError::NoAnnotation if !had_replicas => Ok(()),
                    err => Err(err),
                };
            }
        };

        self.registry.register_secret(&owner_key, &uid)?;

        let replica_template = template::replica_template(owner, self.protected);
        let mut result = cleanup;
        for namespace in targets.iter().filter(|ns| scope.contains(ns)) {
            if let Err(err) = self
                .apply_replica(&owner_key, &uid, &replica_template, namespace)
                .await
            {
                warn!(
                    owner.namespace = %owner_key.namespace,
                    owner.name = %owner_key.name,
                    namespace = %namespace,
                    error = %err,
                    "failed to synchronize replica"
                );
                result.record(err);
            }
        }
        result.into_result()
    }

    fn forget_owner_without_replicas(&self, uid: &str) {
        if self.registry.owned_secrets_with_uid(uid).is_empty()
            && self.registry.unregister_secret(uid).is_ok()
        {
            debug!(uid = %uid, "owner removed from registry");
        }
    }

    /// Forget and delete a replica for a namespace that is no longer targeted
    async fn remove_orphan(&self, uid: &str, orphan: &ObjectKey) -> Result<(), SyncError> {
        self.registry.unregister_owned_secret(orphan)?;

        let outcome = match self.cluster.get_secret(orphan).await {
            Ok(Some(existing)) if template::is_owned_by(&existing, uid) => {
                self.cluster.delete_secret(orphan).await
            }
            Ok(Some(_)) => {
                info!(secret = %orphan, "replica no longer owned, leaving it in place");
                metrics::increment_replica_operations("skip");
                return Ok(());
            }
            Ok(None) => Ok(()),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                info!(secret = %orphan, "replica deleted");
                metrics::increment_replica_operations("delete");
                Ok(())
            }
            Err(err) => {
                self.registry.register_owned_secret(uid, orphan)?;
                Err(err.into())
            }
        }
    }

    /// Create or update the replica in `namespace`
    async fn apply_replica(
        &self,
        owner_key: &ObjectKey,
        uid: &str,
        replica_template: &Secret,
        namespace: &str,
    ) -> Result<(), SyncError> {
        let key = ObjectKey::new(namespace, owner_key.name.clone());
        let desired = template::for_namespace(replica_template, namespace);

        match self.cluster.get_secret(&key).await? {
            None => {
                self.cluster.create_secret(&desired).await?;
                info!(secret = %key, owner = %owner_key, "replica created");
                metrics::increment_replica_operations("create");
            }
            Some(existing) if !template::is_owned_by(&existing, uid) => {
                warn!(
                    secret = %key,
                    owner = %owner_key,
                    "secret already exists and is not owned by this owner, skipping"
                );
                metrics::increment_replica_operations("skip");
                let recorded = self
                    .registry
                    .secret_with_owned_secret_name(&key)
                    .is_some_and(|recorded_owner| recorded_owner.uid == uid);
                if recorded {
                    self.registry.unregister_owned_secret(&key)?;
                }
                return Ok(());
            }
            Some(existing) => {
                if template::has_drifted(&existing, &desired) {
                    let mut updated = desired;
                    updated.metadata.resource_version = existing.metadata.resource_version;
                    self.cluster.replace_secret(&updated).await?;
                    info!(secret = %key, owner = %owner_key, "replica updated");
                    metrics::increment_replica_operations("update");
                } else {
                    debug!(secret = %key, "replica up to date");
                }
            }
        }

        self.registry.register_owned_secret(uid, &key)?;
        Ok(())
    }
}
