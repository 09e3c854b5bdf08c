//! TOML configuration for the Ringway daemon.
//!
//! Every section is optional. Command-line flags override file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ringway_net::ClientConfig;
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Router listener and backend nodes.
    pub router: RouterSection,
    /// Storage node listener and backend.
    pub node: NodeSection,
    /// Shared cluster settings.
    pub cluster: ClusterSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[router]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RouterSection {
    /// Address the router accepts client connections on.
    pub listen_addr: String,
    /// Backend node addresses, in ring insertion order.
    pub nodes: Vec<String>,
    /// Connect timeout towards nodes, in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Per-request timeout towards nodes, in milliseconds.
    pub request_timeout_ms: Option<u64>,
    /// Idle connections kept per node.
    pub max_idle_per_node: Option<usize>,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:50050".to_string(),
            nodes: Vec::new(),
            connect_timeout_ms: None,
            request_timeout_ms: None,
            max_idle_per_node: None,
        }
    }
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Address the storage node accepts router connections on.
    pub listen_addr: String,
    /// Directory for the on-disk store.
    pub data_dir: PathBuf,
    /// Backend type: `"file"` (default) or `"memory"`.
    pub backend: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".ringway"))
            .unwrap_or_else(|| PathBuf::from(".ringway"));
        Self {
            listen_addr: "0.0.0.0:50051".to_string(),
            data_dir,
            backend: "file".to_string(),
        }
    }
}

/// `[cluster]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    /// Shared secret checked when connections open. Empty disables the check.
    pub secret: String,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// The cluster secret, if one is configured.
    pub fn cluster_secret(&self) -> Option<String> {
        if self.cluster.secret.is_empty() {
            None
        } else {
            Some(self.cluster.secret.clone())
        }
    }

    /// Outbound client settings for router → node and CLI → router calls.
    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            connect_timeout: self
                .router
                .connect_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
            request_timeout: self
                .router
                .request_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            max_idle: self.router.max_idle_per_node.unwrap_or(defaults.max_idle),
            cluster_secret: self.cluster_secret(),
        }
    }
}
