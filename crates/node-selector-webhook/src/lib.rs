pub mod admission_review;
mod api;
mod certs;
pub mod cli;
pub mod config;
pub mod labels;
pub mod namespaces;
pub mod patch;
pub mod policy_gate;
pub mod scheme;
pub mod tracing;
pub mod webhook;

use ::tracing::{error, info};
use anyhow::{anyhow, Result};
use axum::{
    routing::{get, post},
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use k8s_openapi::api::core::v1::Namespace;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::trace::{self, TraceLayer};

use crate::{
    api::{
        handlers::{health_handler, review_handler},
        state::ApiServerState,
    },
    config::Config,
    namespaces::{ClusterClient, NamespaceCache, NodeSelectorResolver},
    scheme::Scheme,
    webhook::AdmissionController,
};

pub struct NodeSelectorWebhook {
    router: Router,
    addr: SocketAddr,
    tls_config: Option<RustlsConfig>,
    shutdown_timeout: Duration,
}

impl NodeSelectorWebhook {
    /// Connect to the Kubernetes cluster and start caching its namespaces
    pub async fn new_from_config(config: Config) -> Result<Self> {
        let kube_client = kube::Client::try_default()
            .await
            .map_err(|e| anyhow!("Cannot connect to Kubernetes cluster: {e}"))?;

        let cache = namespaces::reflector::start_namespace_reflector(kube_client.clone());
        let client = kube::Api::<Namespace>::all(kube_client);

        Self::new(config, Arc::new(cache), Arc::new(client)).await
    }

    pub async fn new(
        config: Config,
        cache: Arc<dyn NamespaceCache>,
        client: Arc<dyn ClusterClient>,
    ) -> Result<Self> {
        let tls_config = match &config.tls_config {
            Some(tls_config) => Some(certs::create_tls_config(tls_config).await?),
            None => None,
        };

        let settings = Arc::new(config.settings);
        let scheme = Arc::new(Scheme::default());
        let resolver =
            NodeSelectorResolver::new(cache, client, settings.clone(), config.kubernetes_timeout);
        let state = Arc::new(ApiServerState {
            scheme: scheme.clone(),
            controller: AdmissionController::new(scheme, settings, resolver),
        });

        let router = Router::new()
            .route("/mutate", post(review_handler))
            .route("/validate", post(review_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace::DefaultMakeSpan::new().level(::tracing::Level::INFO))
                    .on_response(trace::DefaultOnResponse::new().level(::tracing::Level::INFO)),
            );

        Ok(Self {
            router,
            addr: config.addr,
            tls_config,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    pub async fn run(self) -> Result<()> {
        let handle = Handle::new();
        tokio::spawn(shutdown_on_signal(handle.clone(), self.shutdown_timeout));

        info!(address = %self.addr, tls = self.tls_config.is_some(), "started server");
        match self.tls_config {
            Some(tls_config) => {
                axum_server::bind_rustls(self.addr, tls_config)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
            None => {
                axum_server::bind(self.addr)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
        };
        info!("server stopped");

        Ok(())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

// Stop accepting new connections on SIGINT or SIGTERM, the pending ones are
// closed once `grace_period` is elapsed
async fn shutdown_on_signal(handle: Handle, grace_period: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(grace_period = ?grace_period, "shutting down");
    handle.graceful_shutdown(Some(grace_period));
}
