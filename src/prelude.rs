//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use secret_sync_controller::prelude::*;
//! ```

// Cluster access
pub use crate::controller::cluster::{ClusterApi, KubeClusterApi};

// Registry
pub use crate::controller::registry::{ObjectKey, OwnerRecord, Registry, RegistryError};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile_namespace, reconcile_owner_secret, reconcile_replica_secret, ReconcileOutcome,
    Reconciler,
};

// Config types
pub use crate::config::{ControllerConfig, LogFormat};

// Common error types
pub use crate::controller::error::{AnnotationError, RetryError, SyncError};
pub use crate::controller::selector::{LabelSelector, SelectorError};
