//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Annotation and label keys are part of the public contract with users of the
//! controller and must not change. The numeric values are defaults and can be
//! overridden from the command line or environment.

/// Annotation requesting replication into every (non-ignored) namespace.
/// Value must be `"true"` (case-insensitive).
pub const ALL_NAMESPACES_ANNOTATION: &str = "secret.sync.klst.pw/all-namespaces";

/// Annotation holding a label selector; matching namespaces receive a replica
pub const NAMESPACE_SELECTOR_ANNOTATION: &str = "secret.sync.klst.pw/namespace-selector";

/// Label written on replicas with the name of the secret they were copied from
pub const ORIGIN_NAME_LABEL: &str = "secret.sync.klst.pw/origin.name";

/// Label written on replicas with the namespace of the secret they were copied from
pub const ORIGIN_NAMESPACE_LABEL: &str = "secret.sync.klst.pw/origin.namespace";

/// Namespaces ignored when none are configured
pub const DEFAULT_IGNORED_NAMESPACES: &[&str] = &["kube-system"];

/// Default HTTP server port for metrics and health checks
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default delay before retrying a reconciliation that hit a cluster API error (seconds)
pub const DEFAULT_REQUEUE_AFTER_SECS: u64 = 5;

/// Default number of reconciliations allowed to run at the same time
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: usize = 10;

/// Default delay before restarting a watch stream after it ended or failed (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default global log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log format (`text` or `json`)
pub const DEFAULT_LOG_FORMAT: &str = "text";
