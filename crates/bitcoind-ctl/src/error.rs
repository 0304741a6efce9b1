//! Error types for bitcoind lifecycle control.
//!
//! The first group of variants is the status taxonomy callers branch on
//! (stopped, starting, warming up, unreadable). The remaining variants carry
//! failures from the transports underneath: the JSON-RPC endpoint, the
//! cluster API and the operating system.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the controller.
#[derive(Debug, Error)]
pub enum DaemonError {
    // Status taxonomy
    #[error("bitcoind is stopped")]
    NotRunning,

    #[error("bitcoind process is not ready")]
    NotReady,

    #[error("bitcoind RPC is not ready")]
    RpcNotReady,

    #[error("fail to read bitcoind status")]
    StatusReadFailure {
        /// Description of the underlying control-plane failure.
        cause: String,
    },

    #[error("unknown error from bitcoind RPC")]
    UnknownRpcError,

    /// Error reported by the daemon, surfaced verbatim.
    #[error("{message}")]
    Rpc { code: i64, message: String },

    // Local process lifecycle
    #[error("bitcoind process is not yet closed")]
    StillRunning,

    #[error("bitcoind process not found")]
    NoProcess,

    #[error("failed waiting for bitcoind to exit: {message}")]
    WaitFailed { message: String },

    #[error("failed to launch bitcoind from {path}: {message}")]
    LaunchFailed { path: PathBuf, message: String },

    #[error("failed to signal bitcoind process {pid}: {message}")]
    SignalFailed { pid: u32, message: String },

    // Transport errors
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Cluster API error: {message}")]
    Cluster { message: String },

    // Context errors
    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, DaemonError>;

impl From<std::io::Error> for DaemonError {
    fn from(err: std::io::Error) -> Self {
        DaemonError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for DaemonError {
    fn from(err: serde_json::Error) -> Self {
        DaemonError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_yaml::Error> for DaemonError {
    fn from(err: serde_yaml::Error) -> Self {
        DaemonError::Config {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for DaemonError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DaemonError::Timeout(crate::config::RpcConfig::REQUEST_TIMEOUT)
        } else if err.is_decode() {
            DaemonError::Json {
                message: err.to_string(),
                source: None,
            }
        } else {
            DaemonError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<kube::Error> for DaemonError {
    fn from(err: kube::Error) -> Self {
        DaemonError::Cluster {
            message: err.to_string(),
        }
    }
}

impl DaemonError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        DaemonError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        DaemonError::Config {
            message: message.into(),
        }
    }

    /// Stable, machine-readable tag for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            DaemonError::NotRunning => "not_running",
            DaemonError::NotReady => "not_ready",
            DaemonError::RpcNotReady => "rpc_not_ready",
            DaemonError::StatusReadFailure { .. } => "status_read_failure",
            DaemonError::UnknownRpcError => "unknown_rpc_error",
            DaemonError::Rpc { .. } => "rpc_error",
            DaemonError::StillRunning => "still_running",
            DaemonError::NoProcess => "no_process",
            DaemonError::WaitFailed { .. } => "wait_failed",
            DaemonError::LaunchFailed { .. } => "launch_failed",
            DaemonError::SignalFailed { .. } => "signal_failed",
            DaemonError::Network { .. } => "network",
            DaemonError::Json { .. } => "json",
            DaemonError::Cluster { .. } => "cluster",
            DaemonError::Cancelled => "cancelled",
            DaemonError::Timeout(_) => "timeout",
            DaemonError::Config { .. } => "config",
            DaemonError::Io { .. } => "io",
        }
    }

    /// Whether the same call could succeed later without any caller action.
    ///
    /// The controller never retries on its own; this only informs the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DaemonError::NotReady
                | DaemonError::RpcNotReady
                | DaemonError::StillRunning
                | DaemonError::Network { .. }
                | DaemonError::Timeout(_)
        )
    }

    /// Whether this error means the daemon is confirmed absent.
    ///
    /// A stop request that fails this way leaves the daemon stopped, so
    /// callers can treat it as success.
    pub fn is_stopped(&self) -> bool {
        matches!(self, DaemonError::NotRunning | DaemonError::NoProcess)
    }
}
