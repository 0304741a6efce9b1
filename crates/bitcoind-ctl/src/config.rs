//! Configuration for the controller.
//!
//! Fixed protocol parameters live in constant structs. Deployment settings are
//! read once at startup from a YAML file into [`ControllerConfig`] and never
//! change afterwards.

use crate::error::{DaemonError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// JSON-RPC parameters for talking to bitcoind.
pub struct RpcConfig;

impl RpcConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const JSONRPC_VERSION: &'static str = "1.0";
    pub const REQUEST_ID: &'static str = "bitcoind-ctl";
    pub const BLOCKCHAIN_INFO_METHOD: &'static str = "getblockchaininfo";
    /// `RPC_IN_WARMUP`: bitcoind is still loading the block index.
    pub const WARMUP_ERROR_CODE: i64 = -28;
    pub const PROGRESS_DIGITS: i32 = 5;
}

/// Naming of the bitcoind StatefulSet in the cluster.
pub struct K8sConfig;

impl K8sConfig {
    pub const WORKLOAD_PREFIX: &'static str = "bitcoind";
    pub const MAINNET_INFIX: &'static str = "-mainnet";
    /// Bytes of the second digest kept in the resource name.
    pub const RESOURCE_NAME_BYTES: usize = 16;
    pub const DEFAULT_NAMESPACE: &'static str = "default";
}

/// Bitcoin network the daemon runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet)
    }
}

impl FromStr for Network {
    type Err = DaemonError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(DaemonError::config(format!("unknown bitcoind network: {other}"))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Environment the daemon is deployed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Runtime {
    #[default]
    K8s,
    Local,
}

impl FromStr for Runtime {
    type Err = DaemonError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "k8s" => Ok(Runtime::K8s),
            "local" => Ok(Runtime::Local),
            other => Err(DaemonError::config(format!(
                "unknown runtime: {other} (expected k8s or local)"
            ))),
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Runtime::K8s => write!(f, "k8s"),
            Runtime::Local => write!(f, "local"),
        }
    }
}

/// Cluster settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct K8sSettings {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Use the local kubeconfig instead of the in-cluster service account.
    #[serde(default)]
    pub use_local_context: bool,
    /// Explicit kubeconfig path; `KUBECONFIG` / `~/.kube/config` otherwise.
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

impl Default for K8sSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            use_local_context: false,
            kubeconfig: None,
        }
    }
}

fn default_namespace() -> String {
    K8sConfig::DEFAULT_NAMESPACE.to_string()
}

/// Local process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSettings {
    #[serde(default = "default_bitcoind_path")]
    pub bitcoind_path: PathBuf,
    #[serde(default)]
    pub bitcoind_conf_path: Option<PathBuf>,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            bitcoind_path: default_bitcoind_path(),
            bitcoind_conf_path: None,
        }
    }
}

fn default_bitcoind_path() -> PathBuf {
    PathBuf::from("bitcoind")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Static controller configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Identity of the owner of the bitcoind instance.
    pub owner_did: String,
    pub bitcoind_network: Network,
    /// JSON-RPC endpoint, optionally with `user:password@` credentials.
    pub bitcoind_endpoint: String,
    #[serde(default)]
    pub k8s: K8sSettings,
    #[serde(default)]
    pub local: LocalSettings,
}

impl ControllerConfig {
    /// Load and validate the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let contents =
            std::fs::read_to_string(path).map_err(|e| DaemonError::io_with_path(e, path))?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: ControllerConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot check.
    pub fn validate(&self) -> Result<()> {
        if self.owner_did.trim().is_empty() {
            return Err(DaemonError::config("owner_did must not be empty"));
        }
        let endpoint = url::Url::parse(&self.bitcoind_endpoint).map_err(|e| {
            DaemonError::config(format!(
                "invalid bitcoind_endpoint {:?}: {e}",
                self.bitcoind_endpoint
            ))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(DaemonError::config(format!(
                "bitcoind_endpoint must be http or https, got {}",
                endpoint.scheme()
            )));
        }
        if self.k8s.namespace.trim().is_empty() {
            return Err(DaemonError::config("k8s.namespace must not be empty"));
        }
        Ok(())
    }
}
