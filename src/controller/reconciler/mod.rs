//! # Reconciler
//!
//! The three reconciliation entry points of the controller:
//!
//! - [`reconcile_owner_secret`]: a secret that may carry a replication annotation
//! - [`reconcile_replica_secret`]: a secret that may be a replica
//! - [`reconcile_namespace`]: a namespace that appeared, changed or disappeared
//!
//! Each one returns a [`ReconcileOutcome`]; they are the only place deciding
//! whether an error is retried.
//!
//! The owner lookups of the replica and namespace paths are exported as well:
//! the controller runtime uses them to route replica and namespace events to
//! the owner secrets they affect.

mod namespace;
mod owner;
mod replica;
mod types;

pub use namespace::{namespace_owners, reconcile_namespace};
pub use owner::{forget_owner, reconcile_owner_secret};
pub use replica::{origin_owner, reconcile_replica_secret, registered_owner};
pub use types::{ReconcileOutcome, Reconciler};
