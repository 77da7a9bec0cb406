//! # Controller Configuration
//!
//! Controller-level settings. Built from command-line flags (see
//! [`crate::cli`]); every flag can also be set through an environment variable.

use crate::constants::{
    DEFAULT_IGNORED_NAMESPACES, DEFAULT_LOG_LEVEL, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
    DEFAULT_METRICS_PORT, DEFAULT_REQUEUE_AFTER_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use clap::ValueEnum;
use std::time::Duration;

/// Output format of the log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Controller-level configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespaces that never hold owners or replicas
    pub ignored_namespaces: Vec<String>,
    /// Labels of the owner that are not copied to replicas
    pub protected_labels: Vec<String>,
    /// Annotations of the owner that are not copied to replicas
    pub protected_annotations: Vec<String>,
    /// Port of the metrics and health check server
    pub metrics_port: u16,
    /// Delay before a reconciliation that hit a cluster API error is retried (seconds)
    pub requeue_after_secs: u64,
    /// Maximum concurrent reconciliations
    pub max_concurrent_reconciliations: usize,
    /// Watch stream restart delay after the stream ended or failed (seconds)
    pub watch_restart_delay_secs: u64,
    /// Global log level, overridden by `RUST_LOG`
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ignored_namespaces: DEFAULT_IGNORED_NAMESPACES
                .iter()
                .map(ToString::to_string)
                .collect(),
            protected_labels: Vec::new(),
            protected_annotations: Vec::new(),
            metrics_port: DEFAULT_METRICS_PORT,
            requeue_after_secs: DEFAULT_REQUEUE_AFTER_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl ControllerConfig {
    pub fn is_ignored_namespace(&self, namespace: &str) -> bool {
        self.ignored_namespaces.iter().any(|ns| ns == namespace)
    }

    #[must_use]
    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.requeue_after_secs)
    }

    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}
