//! # Errors
//!
//! Error kinds returned by the policy resolver and the synchronization engine.
//! The reconciliation entry points are the only place deciding whether an
//! error is retried, ignored or reported.

use crate::constants::{ALL_NAMESPACES_ANNOTATION, NAMESPACE_SELECTOR_ANNOTATION};
use crate::controller::registry::{ObjectKey, RegistryError};
use crate::controller::selector::SelectorError;
use std::time::Duration;
use thiserror::Error;

/// Misconfigured replication annotations on an owner secret
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error(
        "annotation '{all}' and '{selector}' cannot be used together",
        all = ALL_NAMESPACES_ANNOTATION,
        selector = NAMESPACE_SELECTOR_ANNOTATION
    )]
    MutuallyExclusive,
    #[error("'{annotation}' is not 'true' (found '{0}')", annotation = ALL_NAMESPACES_ANNOTATION)]
    NotTrue(String),
    #[error("failed to parse '{annotation}': {0}", annotation = NAMESPACE_SELECTOR_ANNOTATION)]
    InvalidSelector(#[source] SelectorError),
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// The secret carries no replication annotation. Not a failure: the
    /// secret is simply not managed by the controller.
    #[error("no annotation found, ignore synchronization")]
    NoAnnotation,
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("{0:#}")]
    Client(#[from] anyhow::Error),
}

/// A reconciliation that asked to be retried. Returned to the controller
/// runtime, which schedules the next attempt after `delay`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("reconciliation of '{key}' failed, retrying in {delay:?}")]
pub struct RetryError {
    pub key: ObjectKey,
    pub delay: Duration,
}

impl SyncError {
    /// Whether retrying later can succeed without the secret being edited
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Client(_))
    }

    /// Short label used in metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::NoAnnotation => "no-annotation",
            SyncError::Annotation(_) => "annotation",
            SyncError::Registry(_) => "registry",
            SyncError::Client(_) => "client",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_error_messages() {
        assert_eq!(
            AnnotationError::MutuallyExclusive.to_string(),
            format!(
                "annotation '{ALL_NAMESPACES_ANNOTATION}' and \
                 '{NAMESPACE_SELECTOR_ANNOTATION}' cannot be used together"
            )
        );
        assert_eq!(
            AnnotationError::NotTrue("yes".to_string()).to_string(),
            format!("'{ALL_NAMESPACES_ANNOTATION}' is not 'true' (found 'yes')")
        );
        assert_eq!(
            AnnotationError::InvalidSelector(SelectorError::InvalidKey("-bad".to_string()))
                .to_string(),
            format!("failed to parse '{NAMESPACE_SELECTOR_ANNOTATION}': invalid label key '-bad'")
        );
    }

    #[test]
    fn test_retry_error_message() {
        let err = RetryError {
            key: ObjectKey::new("default", "shared"),
            delay: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "reconciliation of 'default/shared' failed, retrying in 5s");
    }

    #[test]
    fn test_only_client_errors_are_retryable() {
        assert!(SyncError::Client(anyhow::anyhow!("connection refused")).is_retryable());
        assert!(!SyncError::NoAnnotation.is_retryable());
        assert!(!SyncError::from(AnnotationError::MutuallyExclusive).is_retryable());
        assert_eq!(SyncError::from(AnnotationError::MutuallyExclusive).kind(), "annotation");
    }
}
