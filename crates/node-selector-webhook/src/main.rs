use anyhow::{anyhow, Result};
use tracing::{debug, info};

use node_selector_webhook::{
    cli,
    config::{Config, SERVICE_NAME},
    tracing::setup_tracing,
    NodeSelectorWebhook,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();
    let config = Config::from_args(&matches)?;

    setup_tracing(&config.log_level, &config.log_fmt, config.log_no_color)?;
    debug!("tracing system ready");

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Cannot install the rustls crypto provider"))?;

    info!(
        service = SERVICE_NAME,
        version = env!("CARGO_PKG_VERSION"),
        ignored_namespaces = ?config.settings.ignored_namespaces,
        node_selector_annotations = ?config.settings.node_selector_annotations,
        cluster_default_node_selector = config.settings.cluster_default_node_selector.as_str(),
        "settings loaded"
    );

    let webhook = NodeSelectorWebhook::new_from_config(config).await?;
    webhook.run().await
}
