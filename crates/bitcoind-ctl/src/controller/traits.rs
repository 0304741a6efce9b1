//! Lifecycle controller trait.

use crate::cancel::CallContext;
use crate::error::Result;
use crate::identity::ControllerIdentity;
use crate::status::DaemonStatus;
use async_trait::async_trait;

/// Controls and reports the lifecycle of one bitcoind instance.
///
/// Implementations are shared between concurrent requests, so every method
/// takes `&self` and must be safe to call concurrently on one instance.
#[async_trait]
pub trait BitcoindController: Send + Sync {
    /// Name of the backend, for logs.
    fn runtime_name(&self) -> &'static str;

    /// Owner and network this controller is scoped to.
    fn identity(&self) -> &ControllerIdentity;

    /// Probe the daemon and return its current status.
    ///
    /// Fails with `NotRunning` when the daemon is confirmed absent,
    /// `NotReady` while the workload is starting, `RpcNotReady` while bitcoind
    /// warms up, and `StatusReadFailure` when the state cannot be determined.
    async fn status(&self, ctx: &CallContext) -> Result<DaemonStatus>;

    /// Request the daemon to run.
    ///
    /// Idempotent. Returns once the request is issued; does not wait for
    /// bitcoind to become ready.
    async fn start(&self, ctx: &CallContext) -> Result<()>;

    /// Request the daemon to stop.
    ///
    /// `force` asks for immediate termination instead of a graceful
    /// shutdown. Calling this on a stopped daemon either succeeds or fails
    /// with an error for which [`crate::DaemonError::is_stopped`] is true.
    async fn stop(&self, ctx: &CallContext, force: bool) -> Result<()>;
}
