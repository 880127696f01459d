use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::runtime::reflector::{ObjectRef, Store};

#[cfg(test)]
use mockall::automock;

pub(crate) mod reflector;
mod resolver;

pub use resolver::{NodeSelectorResolver, ResolveError};

/// Outcome of a lookup against the local namespace cache.
///
/// The cache is fed asynchronously, hence a `Miss` doesn't mean the namespace
/// does not exist.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(Namespace),
    Miss,
}

/// Outcome of a successful lookup against the Kubernetes API server
#[derive(Debug, Clone, PartialEq)]
pub enum LiveLookup {
    Found(Namespace),
    NotFound,
}

/// Read-only access to an eventually consistent copy of the cluster namespaces
#[cfg_attr(test, automock)]
pub trait NamespaceCache: Send + Sync {
    fn get(&self, name: &str) -> CacheLookup;
}

/// Live access to the namespaces defined inside of the cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<LiveLookup>;
}

impl NamespaceCache for Store<Namespace> {
    fn get(&self, name: &str) -> CacheLookup {
        match Store::get(self, &ObjectRef::new(name)) {
            Some(namespace) => CacheLookup::Hit(Namespace::clone(&namespace)),
            None => CacheLookup::Miss,
        }
    }
}

#[async_trait]
impl ClusterClient for kube::Api<Namespace> {
    async fn get_namespace(&self, name: &str) -> Result<LiveLookup> {
        let lookup = match self.get_opt(name).await? {
            Some(namespace) => LiveLookup::Found(namespace),
            None => LiveLookup::NotFound,
        };
        Ok(lookup)
    }
}
