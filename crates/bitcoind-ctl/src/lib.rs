//! bitcoind-ctl - lifecycle control for a single bitcoind instance.
//!
//! One owner's bitcoind can run either as a StatefulSet in a Kubernetes
//! cluster or as a child process on the local machine. Both are driven
//! through the same [`BitcoindController`] trait, which starts, stops and
//! reports the status of the daemon. This crate has no HTTP server; the
//! `bitcoind-ctl-server` crate exposes it over HTTP.
//!
//! # Example
//!
//! ```rust,no_run
//! use bitcoind_ctl::{build_controller, CallContext, ControllerConfig, Runtime};
//!
//! #[tokio::main]
//! async fn main() -> bitcoind_ctl::Result<()> {
//!     let config = ControllerConfig::load("config.yaml")?;
//!     let controller = build_controller(Runtime::Local, &config).await?;
//!
//!     let ctx = CallContext::background();
//!     controller.start(&ctx).await?;
//!     match controller.status(&ctx).await {
//!         Ok(status) => println!("block {} ({})", status.best_block, status.sync_progress),
//!         Err(e) => println!("not available yet: {e}"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod rpc;
pub mod status;

pub use cancel::{CallContext, CancellationToken};
pub use config::{ControllerConfig, K8sSettings, LocalSettings, Network, Runtime};
pub use controller::{build_controller, BitcoindController, K8sController, LocalController};
pub use error::{DaemonError, Result};
pub use identity::{resource_name, ControllerIdentity};
pub use rpc::{BlockchainInfo, RpcClient};
pub use status::DaemonStatus;
