use k8s_openapi::api::core::v1::Namespace;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::Settings,
    labels::{self, LabelSet, SelectorParseError},
    namespaces::{CacheLookup, ClusterClient, LiveLookup, NamespaceCache},
};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("namespace {0} does not exist")]
    NotFound(String),

    #[error("Internal error occurred: {0}")]
    Internal(String),

    #[error(transparent)]
    Parse(#[from] SelectorParseError),

    #[error("{0} annotations' node label selectors conflict")]
    Conflict(String),
}

/// Computes the node selector that has to be enforced on the Pods of a namespace
pub struct NodeSelectorResolver {
    cache: Arc<dyn NamespaceCache>,
    client: Arc<dyn ClusterClient>,
    settings: Arc<Settings>,
    live_lookup_timeout: Duration,
}

impl NodeSelectorResolver {
    pub fn new(
        cache: Arc<dyn NamespaceCache>,
        client: Arc<dyn ClusterClient>,
        settings: Arc<Settings>,
        live_lookup_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            client,
            settings,
            live_lookup_timeout,
        }
    }

    /// Resolve the node selector of the given namespace.
    ///
    /// The namespace is looked up inside of the local cache first. On a cache miss
    /// the Kubernetes API server is queried, the query is interrupted once
    /// `live_lookup_timeout` is elapsed.
    pub async fn resolve(&self, namespace_name: &str) -> Result<LabelSet, ResolveError> {
        let namespace = match self.cache.get(namespace_name) {
            CacheLookup::Hit(namespace) => namespace,
            CacheLookup::Miss => {
                debug!(
                    namespace = namespace_name,
                    "namespace not cached, querying the API server"
                );
                self.get_live_namespace(namespace_name).await?
            }
        };

        self.annotation_selector(&namespace)
    }

    async fn get_live_namespace(&self, namespace_name: &str) -> Result<Namespace, ResolveError> {
        let lookup = tokio::time::timeout(
            self.live_lookup_timeout,
            self.client.get_namespace(namespace_name),
        )
        .await
        .map_err(|_| {
            warn!(
                namespace = namespace_name,
                timeout = ?self.live_lookup_timeout,
                "namespace lookup timed out"
            );
            ResolveError::Internal(format!(
                "lookup of namespace {namespace_name} timed out after {:?}",
                self.live_lookup_timeout
            ))
        })?
        .map_err(|e| ResolveError::Internal(format!("{e:#}")))?;

        match lookup {
            LiveLookup::Found(namespace) => Ok(namespace),
            LiveLookup::NotFound => Err(ResolveError::NotFound(namespace_name.to_owned())),
        }
    }

    /// Compute the node selector defined by the annotations of the namespace.
    ///
    /// The cluster default node selector is used when the namespace has none of the
    /// node selector annotations.
    pub fn annotation_selector(&self, namespace: &Namespace) -> Result<LabelSet, ResolveError> {
        let mut selector = LabelSet::new();
        let mut found = false;

        if let Some(annotations) = namespace.metadata.annotations.as_ref() {
            for key in &self.settings.node_selector_annotations {
                let Some(value) = annotations.get(key) else {
                    continue;
                };

                let labels_map = labels::parse_selector(value)?;
                if labels::conflicts(&selector, &labels_map) {
                    return Err(ResolveError::Conflict(
                        namespace.metadata.name.clone().unwrap_or_default(),
                    ));
                }
                selector = labels::merge(&selector, &labels_map);
                found = true;
            }
        }

        if !found {
            selector = labels::parse_selector(&self.settings.cluster_default_node_selector)?;
        }

        Ok(selector)
    }
}
