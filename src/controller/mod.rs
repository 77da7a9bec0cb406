//! # Controller
//!
//! Core controller modules for the Secret Sync Controller.
//!
//! - `cluster`: the cluster operations used by the controller, behind a trait
//! - `error`: annotation and synchronization errors
//! - `policy`: resolution of replication annotations into target namespaces
//! - `reconciler`: the owner, replica and namespace reconciliation entry points
//! - `registry`: in-memory index of owners and their replicas
//! - `selector`: Kubernetes label selector parsing and matching
//! - `sync`: the synchronization engine
//! - `template`: replica construction and drift detection

pub mod cluster;
pub mod error;
pub mod policy;
pub mod reconciler;
pub mod registry;
pub mod selector;
pub mod sync;
pub mod template;
