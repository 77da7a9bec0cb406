//! # Registry
//!
//! In-memory index of the secrets managed by the controller.
//!
//! - An *owner* secret carries a replication annotation and is copied into
//!   other namespaces.
//! - An *owned* secret is one of those copies (a replica).
//!
//! The registry maps owners by uid and by name, and maps every replica back to
//! the uid of its owner. All maps sit behind a single [`RwLock`] so readers
//! never observe an owner without its replicas or the other way around. The
//! lock only ever guards map mutation; it is never held across an `.await`.
//!
//! The registry is a cache of what the controller observed in the cluster. It
//! is rebuilt lazily after a restart as owners get reconciled again.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Namespaced name of a secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A registered owner secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRecord {
    pub key: ObjectKey,
    pub uid: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("secret name '{0}' already exists; this can create conflicts during synchronization")]
    NameConflict(String),
    #[error("secret with the given {field} '{value}' not found")]
    NotFound { field: &'static str, value: String },
    #[error("owned secret '{0}' cannot live in the namespace of its owner")]
    OwnerNamespace(ObjectKey),
}

#[derive(Debug, Default)]
struct Maps {
    /// Owners by uid
    owners: HashMap<String, OwnerRecord>,
    /// Owner uid by bare secret name; names are unique across owners
    uid_by_name: HashMap<String, String>,
    /// Owner uid by replica key
    owner_by_owned: HashMap<ObjectKey, String>,
    /// Replica keys by owner uid
    owned_by_uid: HashMap<String, HashSet<ObjectKey>>,
}

/// Concurrency-safe owner/replica index
#[derive(Debug, Default)]
pub struct Registry {
    maps: RwLock<Maps>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the maps half-updated: every
    // mutation below completes before any call that could panic.
    fn read(&self) -> RwLockReadGuard<'_, Maps> {
        self.maps.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Maps> {
        self.maps.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// All registered owners
    pub fn secrets(&self) -> Vec<OwnerRecord> {
        self.read().owners.values().cloned().collect()
    }

    /// Number of registered owners
    pub fn len(&self) -> usize {
        self.read().owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().owners.is_empty()
    }

    pub fn secret_with_uid(&self, uid: &str) -> Option<OwnerRecord> {
        self.read().owners.get(uid).cloned()
    }

    /// Owner registered under exactly this namespace and name
    pub fn secret_with_name(&self, key: &ObjectKey) -> Option<OwnerRecord> {
        self.secret_with_bare_name(&key.name)
            .filter(|owner| owner.key.namespace == key.namespace)
    }

    /// Owner registered under this name, whatever its namespace
    pub fn secret_with_bare_name(&self, name: &str) -> Option<OwnerRecord> {
        let maps = self.read();
        maps.uid_by_name
            .get(name)
            .and_then(|uid| maps.owners.get(uid))
            .cloned()
    }

    /// Owner of the given replica
    pub fn secret_with_owned_secret_name(&self, owned: &ObjectKey) -> Option<OwnerRecord> {
        let maps = self.read();
        maps.owner_by_owned
            .get(owned)
            .and_then(|uid| maps.owners.get(uid))
            .cloned()
    }

    /// Replicas of the given owner, sorted by namespace
    pub fn owned_secrets_with_uid(&self, uid: &str) -> Vec<ObjectKey> {
        let mut owned: Vec<ObjectKey> = self
            .read()
            .owned_by_uid
            .get(uid)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        owned.sort();
        owned
    }

    /// Add an owner. Registering a known uid again is a no-op.
    pub fn register_secret(&self, key: &ObjectKey, uid: &str) -> Result<(), RegistryError> {
        let mut maps = self.write();
        if maps.owners.contains_key(uid) {
            return Ok(());
        }
        if maps.uid_by_name.contains_key(&key.name) {
            return Err(RegistryError::NameConflict(key.name.clone()));
        }

        maps.uid_by_name.insert(key.name.clone(), uid.to_string());
        maps.owned_by_uid.insert(uid.to_string(), HashSet::new());
        maps.owners.insert(
            uid.to_string(),
            OwnerRecord {
                key: key.clone(),
                uid: uid.to_string(),
            },
        );
        Ok(())
    }

    /// Remove an owner together with every replica record pointing to it
    pub fn unregister_secret(&self, uid: &str) -> Result<OwnerRecord, RegistryError> {
        let mut maps = self.write();
        let owner = maps.owners.remove(uid).ok_or_else(|| RegistryError::NotFound {
            field: "UID",
            value: uid.to_string(),
        })?;

        maps.uid_by_name.remove(&owner.key.name);
        for owned in maps.owned_by_uid.remove(uid).unwrap_or_default() {
            maps.owner_by_owned.remove(&owned);
        }
        Ok(owner)
    }

    /// Record a replica of the given owner. Recording a known replica is a no-op.
    pub fn register_owned_secret(
        &self,
        owner_uid: &str,
        owned: &ObjectKey,
    ) -> Result<(), RegistryError> {
        let mut maps = self.write();
        let Some(owner) = maps.owners.get(owner_uid) else {
            return Err(RegistryError::NotFound {
                field: "UID",
                value: owner_uid.to_string(),
            });
        };
        if owner.key.namespace == owned.namespace {
            return Err(RegistryError::OwnerNamespace(owned.clone()));
        }
        if maps.owner_by_owned.contains_key(owned) {
            return Ok(());
        }

        maps.owned_by_uid
            .entry(owner_uid.to_string())
            .or_default()
            .insert(owned.clone());
        maps.owner_by_owned.insert(owned.clone(), owner_uid.to_string());
        Ok(())
    }

    /// Forget a replica
    pub fn unregister_owned_secret(&self, owned: &ObjectKey) -> Result<(), RegistryError> {
        let mut maps = self.write();
        let uid = maps
            .owner_by_owned
            .remove(owned)
            .ok_or_else(|| RegistryError::NotFound {
                field: "owned secret name",
                value: owned.to_string(),
            })?;

        if let Some(set) = maps.owned_by_uid.get_mut(&uid) {
            set.remove(owned);
        }
        Ok(())
    }

    /// Check the cross-map invariants. Used by tests.
    #[doc(hidden)]
    pub fn is_consistent(&self) -> bool {
        let maps = self.read();
        let names_ok = maps.uid_by_name.len() == maps.owners.len()
            && maps.owners.values().all(|owner| {
                maps.uid_by_name.get(&owner.key.name) == Some(&owner.uid)
            });
        let sets_ok = maps.owned_by_uid.len() == maps.owners.len()
            && maps.owned_by_uid.iter().all(|(uid, set)| {
                maps.owners.contains_key(uid)
                    && set
                        .iter()
                        .all(|owned| maps.owner_by_owned.get(owned) == Some(uid))
            });
        let back_refs_ok = maps.owner_by_owned.iter().all(|(owned, uid)| {
            maps.owned_by_uid
                .get(uid)
                .is_some_and(|set| set.contains(owned))
        });
        names_ok && sets_ok && back_refs_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const UID: &str = "ee29a220-3db7-4e08-9f7f-8a1045b2d110";

    fn owner_key() -> ObjectKey {
        ObjectKey::new("default", "test")
    }

    fn populated() -> Registry {
        let registry = Registry::new();
        registry.register_secret(&owner_key(), UID).unwrap();
        for namespace in ["kube-system", "kube-public", "custom"] {
            registry
                .register_owned_secret(UID, &ObjectKey::new(namespace, "test"))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_secret_with_uid() {
        let registry = populated();
        assert_eq!(registry.secret_with_uid(UID).unwrap().key, owner_key());
        assert!(registry
            .secret_with_uid("00000000-0000-0000-0000-000000000000")
            .is_none());
    }

    #[test]
    fn test_secret_with_name() {
        let registry = populated();
        assert_eq!(registry.secret_with_name(&owner_key()).unwrap().uid, UID);
        assert!(registry
            .secret_with_name(&ObjectKey::new("kube-public", "test"))
            .is_none());
        assert_eq!(registry.secret_with_bare_name("test").unwrap().uid, UID);
    }

    #[test]
    fn test_secret_with_owned_secret_name() {
        let registry = populated();
        assert_eq!(
            registry
                .secret_with_owned_secret_name(&ObjectKey::new("kube-system", "test"))
                .unwrap()
                .uid,
            UID
        );
        assert!(registry
            .secret_with_owned_secret_name(&ObjectKey::new("default", "test"))
            .is_none());
    }

    #[test]
    fn test_register_secret() {
        let registry = Registry::new();
        assert!(registry.register_secret(&owner_key(), UID).is_ok());
        // registering a registered secret is silently ignored
        assert!(registry.register_secret(&owner_key(), UID).is_ok());

        let err = registry
            .register_secret(
                &ObjectKey::new("kube-system", "test"),
                "294db320-e51e-480f-bc11-95cad45e3841",
            )
            .unwrap_err();
        assert_eq!(err, RegistryError::NameConflict("test".to_string()));
        assert_eq!(
            err.to_string(),
            "secret name 'test' already exists; this can create conflicts during synchronization"
        );

        assert_eq!(registry.len(), 1);
        assert!(registry.owned_secrets_with_uid(UID).is_empty());
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_unregister_secret_cascades_owned_secrets() {
        let registry = populated();

        let err = registry
            .unregister_secret("00000000-0000-0000-0000-000000000000")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "secret with the given UID '00000000-0000-0000-0000-000000000000' not found"
        );

        let removed = registry.unregister_secret(UID).unwrap();
        assert_eq!(removed.key, owner_key());
        assert!(registry.unregister_secret(UID).is_err());

        assert!(registry.is_empty());
        assert!(registry
            .secret_with_owned_secret_name(&ObjectKey::new("custom", "test"))
            .is_none());
        assert!(registry.owned_secrets_with_uid(UID).is_empty());
        assert!(registry.is_consistent());

        // name is free again
        assert!(registry.register_secret(&ObjectKey::new("other", "test"), "u2").is_ok());
    }

    #[test]
    fn test_register_owned_secret() {
        let registry = Registry::new();
        let owned = ObjectKey::new("kube-system", "test");

        assert_eq!(
            registry.register_owned_secret(UID, &owned).unwrap_err(),
            RegistryError::NotFound {
                field: "UID",
                value: UID.to_string()
            }
        );

        registry.register_secret(&owner_key(), UID).unwrap();
        assert!(registry.register_owned_secret(UID, &owned).is_ok());
        assert!(registry.register_owned_secret(UID, &owned).is_ok());
        assert_eq!(registry.owned_secrets_with_uid(UID), vec![owned]);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_register_owned_secret_in_owner_namespace() {
        let registry = Registry::new();
        registry.register_secret(&owner_key(), UID).unwrap();

        let err = registry
            .register_owned_secret(UID, &ObjectKey::new("default", "test"))
            .unwrap_err();
        assert_eq!(err, RegistryError::OwnerNamespace(ObjectKey::new("default", "test")));
        assert_eq!(
            err.to_string(),
            "owned secret 'default/test' cannot live in the namespace of its owner"
        );
        assert!(registry
            .secret_with_owned_secret_name(&ObjectKey::new("default", "test"))
            .is_none());
        assert!(registry.owned_secrets_with_uid(UID).is_empty());
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_unregister_owned_secret() {
        let registry = populated();
        let owned = ObjectKey::new("kube-public", "test");

        assert!(registry.unregister_owned_secret(&owned).is_ok());
        assert_eq!(
            registry.unregister_owned_secret(&owned).unwrap_err().to_string(),
            "secret with the given owned secret name 'kube-public/test' not found"
        );
        assert_eq!(
            registry.owned_secrets_with_uid(UID),
            vec![
                ObjectKey::new("custom", "test"),
                ObjectKey::new("kube-system", "test"),
            ]
        );
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_concurrent_registration_keeps_invariants() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..16)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let uid = format!("uid-{worker}-{i}");
                        let key = ObjectKey::new("default", format!("secret-{worker}-{i}"));
                        registry.register_secret(&key, &uid).unwrap();
                        for namespace in ["a", "b", "c"] {
                            let owned = ObjectKey::new(namespace, key.name.clone());
                            registry.register_owned_secret(&uid, &owned).unwrap();
                        }
                        if i % 3 == 0 {
                            registry.unregister_secret(&uid).unwrap();
                        } else if i % 3 == 1 {
                            registry
                                .unregister_owned_secret(&ObjectKey::new("b", key.name.clone()))
                                .unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.is_consistent());
        // 16 workers * (200 - 67 unregistered)
        assert_eq!(registry.len(), 16 * 133);
    }
}
