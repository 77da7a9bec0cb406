//! # Annotation Policy
//!
//! Turns the replication annotations of an owner secret into the list of
//! namespaces that must hold a replica.
//!
//! Precedence:
//! 1. both annotations present: error, they are mutually exclusive
//! 2. `all-namespaces` only: value must be `true` (case-insensitive)
//! 3. `namespace-selector` only: value must be a valid label selector
//! 4. neither: the secret is not managed ([`SyncError::NoAnnotation`])
//!
//! The owner's own namespace, ignored namespaces and namespaces being deleted
//! are never targeted.

use crate::constants::{ALL_NAMESPACES_ANNOTATION, NAMESPACE_SELECTOR_ANNOTATION};
use crate::controller::cluster::ClusterApi;
use crate::controller::error::{AnnotationError, SyncError};
use crate::controller::selector::LabelSelector;
use k8s_openapi::api::core::v1::Namespace;
use std::collections::{BTreeMap, BTreeSet};

/// Which namespaces an owner targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetQuery {
    AllNamespaces,
    Selector(LabelSelector),
}

/// Parse the replication annotations of a secret
pub fn target_query(
    annotations: Option<&BTreeMap<String, String>>,
) -> Result<TargetQuery, SyncError> {
    let all_namespaces = annotations.and_then(|a| a.get(ALL_NAMESPACES_ANNOTATION));
    let namespace_selector = annotations.and_then(|a| a.get(NAMESPACE_SELECTOR_ANNOTATION));

    match (all_namespaces, namespace_selector) {
        (Some(_), Some(_)) => Err(AnnotationError::MutuallyExclusive.into()),
        (Some(value), None) => {
            if value.eq_ignore_ascii_case("true") {
                Ok(TargetQuery::AllNamespaces)
            } else {
                Err(AnnotationError::NotTrue(value.clone()).into())
            }
        }
        (None, Some(expression)) => expression
            .parse::<LabelSelector>()
            .map(TargetQuery::Selector)
            .map_err(|e| AnnotationError::InvalidSelector(e).into()),
        (None, None) => Err(SyncError::NoAnnotation),
    }
}

fn is_terminating(namespace: &Namespace) -> bool {
    namespace
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        == Some("Terminating")
}

/// Namespaces (sorted) that must hold a replica of a secret living in
/// `own_namespace` with the given annotations
pub async fn list_namespaces_from_annotations(
    cluster: &dyn ClusterApi,
    annotations: Option<&BTreeMap<String, String>>,
    own_namespace: &str,
    ignored_namespaces: &[String],
) -> Result<Vec<String>, SyncError> {
    let query = target_query(annotations)?;
    let selector = match &query {
        TargetQuery::AllNamespaces => None,
        TargetQuery::Selector(selector) => Some(selector),
    };

    let namespaces = cluster.list_namespaces(selector).await?;

    let targets: BTreeSet<String> = namespaces
        .iter()
        .filter(|ns| !is_terminating(ns))
        .filter_map(|ns| ns.metadata.name.clone())
        .filter(|name| name != own_namespace && !ignored_namespaces.contains(name))
        .collect();
    Ok(targets.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_all_namespaces_is_case_insensitive() {
        for value in ["true", "TRUE", "True"] {
            let a = annotations(&[(ALL_NAMESPACES_ANNOTATION, value)]);
            assert_eq!(target_query(Some(&a)).unwrap(), TargetQuery::AllNamespaces);
        }
    }

    #[test]
    fn test_all_namespaces_must_be_true() {
        let a = annotations(&[(ALL_NAMESPACES_ANNOTATION, "yes")]);
        assert!(matches!(
            target_query(Some(&a)),
            Err(SyncError::Annotation(AnnotationError::NotTrue(v))) if v == "yes"
        ));
    }

    #[test]
    fn test_annotations_are_mutually_exclusive() {
        let a = annotations(&[
            (ALL_NAMESPACES_ANNOTATION, "true"),
            (NAMESPACE_SELECTOR_ANNOTATION, "env=prod"),
        ]);
        let err = target_query(Some(&a)).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Annotation(AnnotationError::MutuallyExclusive)
        ));
        assert_eq!(
            err.to_string(),
            "annotation 'secret.sync.klst.pw/all-namespaces' and \
             'secret.sync.klst.pw/namespace-selector' cannot be used together"
        );
    }

    #[test]
    fn test_namespace_selector() {
        let a = annotations(&[(NAMESPACE_SELECTOR_ANNOTATION, "env in (prod,staging)")]);
        match target_query(Some(&a)).unwrap() {
            TargetQuery::Selector(selector) => {
                assert_eq!(selector.to_string(), "env in (prod,staging)");
            }
            other => panic!("unexpected query {other:?}"),
        }

        let invalid = annotations(&[(NAMESPACE_SELECTOR_ANNOTATION, "env in prod")]);
        assert!(matches!(
            target_query(Some(&invalid)),
            Err(SyncError::Annotation(AnnotationError::InvalidSelector(_)))
        ));
    }

    #[test]
    fn test_no_annotation() {
        assert!(matches!(target_query(None), Err(SyncError::NoAnnotation)));
        let unrelated = annotations(&[("app.kubernetes.io/name", "api")]);
        assert!(matches!(
            target_query(Some(&unrelated)),
            Err(SyncError::NoAnnotation)
        ));
    }
}
