//! # Logging
//!
//! `tracing` subscriber setup. `RUST_LOG` takes precedence over the configured
//! log level.

use crate::config::LogFormat;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
fn default_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("secret_sync_controller={log_level},kube=warn"))
        .unwrap_or_else(|_| EnvFilter::new("secret_sync_controller=info,kube=warn"))
}

/// Install the global tracing subscriber
pub fn init_logging(log_level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Text => builder.with_target(false).try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
