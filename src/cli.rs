//! # CLI
//!
//! Command-line flags of the controller binary.
//!
//! ```bash
//! secret-sync-controller \
//!     --ignore-namespaces kube-system,kube-public \
//!     --protected-annotations kubectl.kubernetes.io/last-applied-configuration \
//!     --log-format json
//! ```

use crate::config::{ControllerConfig, LogFormat};
use crate::constants::{
    DEFAULT_LOG_LEVEL, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_METRICS_PORT,
    DEFAULT_REQUEUE_AFTER_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use clap::Parser;

/// Replicates annotated secrets into other namespaces
#[derive(Debug, Parser)]
#[command(name = "secret-sync-controller", version, long_about = None)]
pub struct Cli {
    /// Namespaces that never hold owners or replicas
    #[arg(
        long,
        env = "IGNORE_NAMESPACES",
        value_delimiter = ',',
        default_value = "kube-system"
    )]
    pub ignore_namespaces: Vec<String>,

    /// Labels not copied from an owner to its replicas
    #[arg(long, env = "PROTECTED_LABELS", value_delimiter = ',')]
    pub protected_labels: Vec<String>,

    /// Annotations not copied from an owner to its replicas
    #[arg(long, env = "PROTECTED_ANNOTATIONS", value_delimiter = ',')]
    pub protected_annotations: Vec<String>,

    /// Port of the metrics and health check server
    #[arg(long, env = "METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Seconds to wait before retrying after a cluster API error
    #[arg(long, env = "REQUEUE_AFTER_SECS", default_value_t = DEFAULT_REQUEUE_AFTER_SECS)]
    pub requeue_after_secs: u64,

    /// Maximum number of reconciliations running at the same time
    #[arg(
        long,
        env = "MAX_CONCURRENT_RECONCILIATIONS",
        default_value_t = DEFAULT_MAX_CONCURRENT_RECONCILIATIONS
    )]
    pub max_concurrent_reconciliations: usize,

    /// Seconds to wait before restarting a failed watch
    #[arg(
        long,
        env = "WATCH_RESTART_DELAY_SECS",
        default_value_t = DEFAULT_WATCH_RESTART_DELAY_SECS
    )]
    pub watch_restart_delay_secs: u64,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, env = "LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Turn parsed flags into the controller configuration
    #[must_use]
    pub fn into_config(self) -> ControllerConfig {
        let non_empty = |values: Vec<String>| -> Vec<String> {
            values
                .into_iter()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .collect()
        };

        ControllerConfig {
            ignored_namespaces: non_empty(self.ignore_namespaces),
            protected_labels: non_empty(self.protected_labels),
            protected_annotations: non_empty(self.protected_annotations),
            metrics_port: self.metrics_port,
            requeue_after_secs: self.requeue_after_secs,
            max_concurrent_reconciliations: self.max_concurrent_reconciliations.max(1),
            watch_restart_delay_secs: self.watch_restart_delay_secs,
            log_level: self.log_level,
            log_format: self.log_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_controller_config() {
        let config = Cli::parse_from(["secret-sync-controller"]).into_config();
        let defaults = ControllerConfig::default();
        assert_eq!(config.ignored_namespaces, defaults.ignored_namespaces);
        assert!(config.protected_labels.is_empty());
        assert_eq!(config.metrics_port, defaults.metrics_port);
        assert_eq!(config.requeue_after_secs, defaults.requeue_after_secs);
        assert_eq!(
            config.max_concurrent_reconciliations,
            defaults.max_concurrent_reconciliations
        );
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_comma_separated_lists() {
        let config = Cli::parse_from([
            "secret-sync-controller",
            "--ignore-namespaces",
            "kube-system, kube-public",
            "--protected-labels",
            "internal",
            "--protected-annotations",
            "a.example.com/x,b.example.com/y",
            "--log-format",
            "json",
        ])
        .into_config();
        assert_eq!(config.ignored_namespaces, vec!["kube-system", "kube-public"]);
        assert_eq!(config.protected_labels, vec!["internal"]);
        assert_eq!(config.protected_annotations.len(), 2);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_empty_ignore_list() {
        let config =
            Cli::parse_from(["secret-sync-controller", "--ignore-namespaces", ""]).into_config();
        assert!(config.ignored_namespaces.is_empty());
    }
}
