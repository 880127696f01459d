use anyhow::{anyhow, Result};
use clap::ArgMatches;
use lazy_static::lazy_static;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::labels;

pub static SERVICE_NAME: &str = "node-selector-webhook";

pub const DEFAULT_NODE_SELECTOR_ANNOTATION: &str = "scheduler.alpha.kubernetes.io/node-selector";

lazy_static! {
    pub(crate) static ref HOSTNAME: String =
        std::env::var("HOSTNAME").unwrap_or_else(|_| String::from("unknown"));
}

pub struct Config {
    pub addr: SocketAddr,
    pub tls_config: Option<TlsConfig>,
    pub settings: Settings,
    pub kubernetes_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub log_level: String,
    pub log_fmt: String,
    pub log_no_color: bool,
}

pub struct TlsConfig {
    pub cert_file: String,
    pub key_file: String,
}

/// Admission settings shared by all the requests
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Settings {
    /// Objects created inside of these namespaces are never mutated nor validated
    pub ignored_namespaces: BTreeSet<String>,
    /// Namespace annotations holding a node selector, in evaluation order
    pub node_selector_annotations: Vec<String>,
    /// Node selector of the namespaces that do not have any of the annotations
    pub cluster_default_node_selector: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            ignored_namespaces: BTreeSet::from([
                "kube-system".to_owned(),
                "kube-public".to_owned(),
            ]),
            node_selector_annotations: vec![DEFAULT_NODE_SELECTOR_ANNOTATION.to_owned()],
            cluster_default_node_selector: String::new(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.node_selector_annotations.is_empty() {
            return Err(anyhow!("nodeSelectorAnnotations cannot be empty"));
        }
        labels::parse_selector(&self.cluster_default_node_selector)
            .map_err(|e| anyhow!("invalid clusterDefaultNodeSelector: {}", e))?;
        Ok(())
    }
}

impl Config {
    pub fn from_args(matches: &ArgMatches) -> Result<Self> {
        let addr = api_bind_address(matches)?;

        let (cert_file, key_file) = tls_files(matches)?;
        let tls_config = if cert_file.is_empty() {
            None
        } else {
            Some(TlsConfig {
                cert_file,
                key_file,
            })
        };

        let settings = match matches.get_one::<String>("settings") {
            Some(path) => {
                let settings_file = Path::new(path);
                read_settings_file(settings_file).map_err(|e| {
                    anyhow!(
                        "error while loading settings from {:?}: {}",
                        settings_file,
                        e
                    )
                })?
            }
            None => Settings::default(),
        };

        let kubernetes_timeout = seconds(matches, "kubernetes-timeout")?;
        let shutdown_timeout = seconds(matches, "shutdown-timeout")?;

        let log_level = matches
            .get_one::<String>("log-level")
            .ok_or_else(|| anyhow!("log-level not set"))?
            .to_owned();
        let log_fmt = matches
            .get_one::<String>("log-fmt")
            .ok_or_else(|| anyhow!("log-fmt not set"))?
            .to_owned();
        let log_no_color = matches.get_flag("log-no-color");

        Ok(Self {
            addr,
            tls_config,
            settings,
            kubernetes_timeout,
            shutdown_timeout,
            log_level,
            log_fmt,
            log_no_color,
        })
    }
}

fn api_bind_address(matches: &ArgMatches) -> Result<SocketAddr> {
    let address = matches
        .get_one::<String>("address")
        .ok_or_else(|| anyhow!("address not set"))?;
    let port = matches
        .get_one::<String>("port")
        .ok_or_else(|| anyhow!("port not set"))?;

    format!("{address}:{port}")
        .parse()
        .map_err(|e| anyhow!("error parsing arguments: {}", e))
}

fn tls_files(matches: &ArgMatches) -> Result<(String, String)> {
    let cert_file = matches
        .get_one::<String>("cert-file")
        .cloned()
        .unwrap_or_default();
    let key_file = matches
        .get_one::<String>("key-file")
        .cloned()
        .unwrap_or_default();
    if cert_file.is_empty() != key_file.is_empty() {
        Err(anyhow!("error parsing arguments: either both --cert-file and --key-file must be provided, or neither"))
    } else {
        Ok((cert_file, key_file))
    }
}

fn seconds(matches: &ArgMatches, id: &str) -> Result<Duration> {
    let value = matches
        .get_one::<String>(id)
        .ok_or_else(|| anyhow!("{} not set", id))?;
    let secs = value
        .parse::<u64>()
        .map_err(|e| anyhow!("error parsing --{}={:?}: {}", id, value, e))?;
    if secs == 0 {
        return Err(anyhow!("--{} must be greater than zero", id));
    }

    Ok(Duration::from_secs(secs))
}

/// Read and validate the YAML settings file
pub fn read_settings_file(path: &Path) -> Result<Settings> {
    let contents = fs::read_to_string(path)?;
    // an empty document is a valid file holding only defaults
    let settings = if contents.trim().is_empty() {
        Settings::default()
    } else {
        serde_yaml::from_str::<Settings>(&contents)?
    };
    settings.validate()?;

    Ok(settings)
}
