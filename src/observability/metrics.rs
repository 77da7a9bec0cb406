//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `secret_sync_reconciliations_total{kind}` - Total number of reconciliations
//! - `secret_sync_reconciliation_errors_total{kind}` - Total number of reconciliation errors
//! - `secret_sync_reconciliation_duration_seconds{kind}` - Duration of reconciliations
//! - `secret_sync_replica_operations_total{operation}` - Replica operations by kind
//! - `secret_sync_owners_registered` - Current number of owner secrets in the registry
//! - `secret_sync_requeues_total` - Total number of reconciliations requeued for a retry

use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "secret_sync_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "secret_sync_reconciliation_errors_total",
            "Total number of reconciliation errors",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "secret_sync_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REPLICA_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "secret_sync_replica_operations_total",
            "Total number of replica operations",
        ),
        &["operation"],
    )
    .expect("Failed to create REPLICA_OPERATIONS_TOTAL metric - this should never happen")
});

static OWNERS_REGISTERED: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "secret_sync_owners_registered",
        "Current number of owner secrets in the registry",
    )
    .expect("Failed to create OWNERS_REGISTERED metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_sync_requeues_total",
        "Total number of reconciliations requeued for a retry",
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

/// Register every metric with the crate registry. Call once at startup.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REPLICA_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OWNERS_REGISTERED.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

/// `operation` is one of `create`, `update`, `delete`, `skip`
pub fn increment_replica_operations(operation: &str) {
    REPLICA_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn set_owners_registered(count: usize) {
    OWNERS_REGISTERED.set(i64::try_from(count).unwrap_or(i64::MAX));
}

pub fn increment_requeues() {
    REQUEUES_TOTAL.inc();
}
