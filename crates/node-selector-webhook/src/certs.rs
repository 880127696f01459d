use anyhow::{anyhow, Result};
use axum_server::tls_rustls::RustlsConfig;
use tracing::info;

use crate::config::TlsConfig;

/// Load the certificate and the private key used by the HTTPS server
pub(crate) async fn create_tls_config(tls_config: &TlsConfig) -> Result<RustlsConfig> {
    let config = RustlsConfig::from_pem_file(&tls_config.cert_file, &tls_config.key_file)
        .await
        .map_err(|e| {
            anyhow!(
                "cannot load TLS certificate {} and key {}: {}",
                tls_config.cert_file,
                tls_config.key_file,
                e
            )
        })?;
    info!(cert_file = tls_config.cert_file.as_str(), "TLS certificate loaded");

    Ok(config)
}
