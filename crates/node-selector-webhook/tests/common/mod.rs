use async_trait::async_trait;
use axum::Router;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use node_selector_webhook::{
    config::{Config, Settings},
    namespaces::{CacheLookup, ClusterClient, LiveLookup, NamespaceCache},
    NodeSelectorWebhook,
};
use std::{
    collections::BTreeMap,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

pub(crate) const NODE_SELECTOR_ANNOTATION: &str = "scheduler.alpha.kubernetes.io/node-selector";

/// Namespaces known by the fake cluster
#[derive(Clone, Default)]
pub(crate) struct FakeNamespaces(BTreeMap<String, Namespace>);

impl FakeNamespaces {
    pub(crate) fn with(mut self, name: &str, node_selector: Option<&str>) -> Self {
        let annotations = node_selector.map(|selector| {
            BTreeMap::from([(NODE_SELECTOR_ANNOTATION.to_owned(), selector.to_owned())])
        });
        self.0.insert(
            name.to_owned(),
            Namespace {
                metadata: ObjectMeta {
                    name: Some(name.to_owned()),
                    annotations,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        self
    }
}

impl NamespaceCache for FakeNamespaces {
    fn get(&self, name: &str) -> CacheLookup {
        match self.0.get(name) {
            Some(namespace) => CacheLookup::Hit(namespace.clone()),
            None => CacheLookup::Miss,
        }
    }
}

#[async_trait]
impl ClusterClient for FakeNamespaces {
    async fn get_namespace(&self, name: &str) -> anyhow::Result<LiveLookup> {
        Ok(match self.0.get(name) {
            Some(namespace) => LiveLookup::Found(namespace.clone()),
            None => LiveLookup::NotFound,
        })
    }
}

pub(crate) fn default_test_config() -> Config {
    Config {
        addr: SocketAddr::from(([127, 0, 0, 1], 4443)),
        tls_config: None,
        settings: Settings::default(),
        kubernetes_timeout: Duration::from_secs(1),
        shutdown_timeout: Duration::from_secs(1),
        log_level: "info".to_owned(),
        log_fmt: "json".to_owned(),
        log_no_color: true,
    }
}

/// `team-a` is cached, `team-b` has just been created and is known only by the
/// API server, `team-c` has no node selector annotation.
pub(crate) async fn app(config: Config) -> Router {
    let cached = FakeNamespaces::default()
        .with("team-a", Some("zone=a"))
        .with("team-c", None)
        .with("kube-system", Some("zone=a"));
    let live = cached.clone().with("team-b", Some("zone=b,disk=ssd"));

    let webhook = NodeSelectorWebhook::new(config, Arc::new(cached), Arc::new(live))
        .await
        .unwrap();

    webhook.router()
}
