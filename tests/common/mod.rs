//! Common test utilities for the reconciliation tests
//!
//! Provides an in-memory [`ClusterApi`] with failure injection, and fixtures
//! for owners, namespaces and controller configuration.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, NamespaceStatus, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use secret_sync_controller::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    secrets: BTreeMap<ObjectKey, Secret>,
    namespaces: BTreeMap<String, Namespace>,
    resource_version: u64,
    failing_namespaces: HashSet<String>,
    fail_namespace_list: bool,
    creates: usize,
    updates: usize,
    deletes: usize,
}

impl State {
    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn check(&self, namespace: &str) -> Result<()> {
        if self.failing_namespaces.contains(namespace) {
            bail!("injected failure in namespace {namespace}");
        }
        Ok(())
    }
}

/// In-memory cluster
#[derive(Debug, Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Cluster holding the given namespaces, without labels
    pub fn with_namespaces(names: &[&str]) -> Arc<Self> {
        let cluster = Self::new();
        for name in names {
            cluster.add_namespace(name, &[]);
        }
        cluster
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_namespace(&self, name: &str, labels: &[(&str, &str)]) {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(pairs(labels)),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };
        self.state().namespaces.insert(name.to_string(), namespace);
    }

    pub fn set_namespace_labels(&self, name: &str, labels: &[(&str, &str)]) {
        let mut state = self.state();
        let namespace = state.namespaces.get_mut(name).unwrap();
        namespace.metadata.labels = Some(pairs(labels));
    }

    pub fn terminate_namespace(&self, name: &str) {
        let mut state = self.state();
        let namespace = state.namespaces.get_mut(name).unwrap();
        namespace.status = Some(NamespaceStatus {
            phase: Some("Terminating".to_string()),
            ..NamespaceStatus::default()
        });
    }

    /// Remove a namespace together with its secrets
    pub fn remove_namespace(&self, name: &str) {
        let mut state = self.state();
        state.namespaces.remove(name);
        state.secrets.retain(|key, _| key.namespace != name);
    }

    /// Store a secret as-is, assigning a resource version
    pub fn put_secret(&self, mut secret: Secret) {
        let mut state = self.state();
        let key = ObjectKey::new(
            secret.metadata.namespace.clone().unwrap(),
            secret.metadata.name.clone().unwrap(),
        );
        secret.metadata.resource_version = Some(state.next_resource_version());
        state.secrets.insert(key, secret);
    }

    pub fn remove_secret(&self, key: &ObjectKey) {
        self.state().secrets.remove(key);
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state()
            .secrets
            .get(&ObjectKey::new(namespace, name))
            .cloned()
    }

    /// Namespaces holding a secret called `name`
    pub fn namespaces_with_secret(&self, name: &str) -> Vec<String> {
        self.state()
            .secrets
            .keys()
            .filter(|key| key.name == name)
            .map(|key| key.namespace.clone())
            .collect()
    }

    pub fn fail_namespace(&self, namespace: &str) {
        self.state().failing_namespaces.insert(namespace.to_string());
    }

    pub fn heal_namespace(&self, namespace: &str) {
        self.state().failing_namespaces.remove(namespace);
    }

    pub fn fail_namespace_list(&self, fail: bool) {
        self.state().fail_namespace_list = fail;
    }

    pub fn creates(&self) -> usize {
        self.state().creates
    }

    pub fn updates(&self) -> usize {
        self.state().updates
    }

    pub fn deletes(&self) -> usize {
        self.state().deletes
    }
}

fn key_of(secret: &Secret) -> Result<ObjectKey> {
    let namespace = secret.metadata.namespace.clone().ok_or_else(|| anyhow!("no namespace"))?;
    let name = secret.metadata.name.clone().ok_or_else(|| anyhow!("no name"))?;
    Ok(ObjectKey::new(namespace, name))
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>> {
        let state = self.state();
        state.check(&key.namespace)?;
        Ok(state.secrets.get(key).cloned())
    }

    async fn create_secret(&self, secret: &Secret) -> Result<()> {
        let key = key_of(secret)?;
        let mut state = self.state();
        state.check(&key.namespace)?;
        if !state.namespaces.contains_key(&key.namespace) {
            bail!("namespace {} not found", key.namespace);
        }
        if state.secrets.contains_key(&key) {
            bail!("secret {key} already exists");
        }
        let mut stored = secret.clone();
        stored.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        stored.metadata.resource_version = Some(state.next_resource_version());
        state.secrets.insert(key, stored);
        state.creates += 1;
        Ok(())
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<()> {
        let key = key_of(secret)?;
        let mut state = self.state();
        state.check(&key.namespace)?;
        let Some(existing) = state.secrets.get(&key) else {
            bail!("secret {key} not found");
        };
        if secret.metadata.resource_version.is_some()
            && secret.metadata.resource_version != existing.metadata.resource_version
        {
            bail!("conflict updating secret {key}");
        }
        let mut stored = secret.clone();
        stored.metadata.uid = existing.metadata.uid.clone();
        stored.metadata.resource_version = Some(state.next_resource_version());
        state.secrets.insert(key, stored);
        state.updates += 1;
        Ok(())
    }

    async fn delete_secret(&self, key: &ObjectKey) -> Result<()> {
        let mut state = self.state();
        state.check(&key.namespace)?;
        if state.secrets.remove(key).is_some() {
            state.deletes += 1;
        }
        Ok(())
    }

    async fn list_namespaces(&self, selector: Option<&LabelSelector>) -> Result<Vec<Namespace>> {
        let state = self.state();
        if state.fail_namespace_list {
            bail!("injected failure listing namespaces");
        }
        Ok(state
            .namespaces
            .values()
            .filter(|ns| {
                let labels = ns.metadata.labels.clone().unwrap_or_default();
                selector.is_none_or(|selector| selector.matches(&labels))
            })
            .cloned()
            .collect())
    }
}

pub fn pairs(values: &[(&str, &str)]) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Owner secret with some data and the given annotations
pub fn owner_secret(
    namespace: &str,
    name: &str,
    uid: &str,
    annotations: &[(&str, &str)],
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(uid.to_string()),
            labels: Some(pairs(&[("app", "api")])),
            annotations: Some(pairs(annotations)),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([(
            "password".to_string(),
            ByteString(b"hunter2".to_vec()),
        )])),
        type_: Some("Opaque".to_string()),
        ..Secret::default()
    }
}

pub fn secret_data(secret: &Secret) -> Vec<u8> {
    secret.data.as_ref().unwrap()["password"].0.clone()
}

/// Configuration with no ignored namespace
pub fn config() -> ControllerConfig {
    ControllerConfig {
        ignored_namespaces: Vec::new(),
        ..ControllerConfig::default()
    }
}

pub fn reconciler(cluster: &Arc<FakeCluster>, config: ControllerConfig) -> Reconciler {
    Reconciler::new(Arc::clone(cluster) as Arc<dyn ClusterApi>, config)
}
