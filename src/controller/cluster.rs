//! # Cluster API
//!
//! The subset of the Kubernetes API used by the synchronization engine.
//!
//! [`ClusterApi`] is the seam between the engine and the cluster: the
//! controller runs against [`KubeClusterApi`], tests run against an in-memory
//! implementation. Not-found is part of the normal flow and is reported as
//! `Ok(None)` (get) or `Ok(())` (delete); every other failure is an error.

use crate::controller::registry::ObjectKey;
use crate::controller::selector::LabelSelector;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use tracing::debug;

#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetch a secret, `None` when it does not exist
    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>>;

    /// Create a secret in the namespace set on its metadata
    async fn create_secret(&self, secret: &Secret) -> Result<()>;

    /// Replace an existing secret with the given content
    async fn replace_secret(&self, secret: &Secret) -> Result<()>;

    /// Delete a secret; deleting a missing secret succeeds
    async fn delete_secret(&self, key: &ObjectKey) -> Result<()>;

    /// List namespaces, optionally filtered by a label selector
    async fn list_namespaces(&self, selector: Option<&LabelSelector>) -> Result<Vec<Namespace>>;
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(api_err) if api_err.code == 404)
}

fn object_key(secret: &Secret) -> Result<ObjectKey> {
    let namespace = secret
        .metadata
        .namespace
        .clone()
        .context("secret has no namespace")?;
    let name = secret.metadata.name.clone().context("secret has no name")?;
    Ok(ObjectKey { namespace, name })
}

/// [`ClusterApi`] backed by a kube-rs client
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl std::fmt::Debug for KubeClusterApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterApi").finish_non_exhaustive()
    }
}

impl KubeClusterApi {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>> {
        self.secrets(&key.namespace)
            .get_opt(&key.name)
            .await
            .with_context(|| format!("failed to fetch secret {key}"))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<()> {
        let key = object_key(secret)?;
        self.secrets(&key.namespace)
            .create(&PostParams::default(), secret)
            .await
            .with_context(|| format!("failed to create secret {key}"))?;
        Ok(())
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<()> {
        let key = object_key(secret)?;
        self.secrets(&key.namespace)
            .replace(&key.name, &PostParams::default(), secret)
            .await
            .with_context(|| format!("failed to update secret {key}"))?;
        Ok(())
    }

    async fn delete_secret(&self, key: &ObjectKey) -> Result<()> {
        match self
            .secrets(&key.namespace)
            .delete(&key.name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!(secret = %key, "secret already deleted");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("failed to delete secret {key}")),
        }
    }

    async fn list_namespaces(&self, selector: Option<&LabelSelector>) -> Result<Vec<Namespace>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let mut params = ListParams::default();
        if let Some(selector) = selector.filter(|s| !s.is_empty()) {
            params = params.labels(&selector.to_string());
        }
        let list = namespaces
            .list(&params)
            .await
            .context("failed to list namespaces")?;
        Ok(list.items)
    }
}
