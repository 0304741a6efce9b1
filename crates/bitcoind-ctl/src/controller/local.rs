//! bitcoind running as a child process of this controller.
//!
//! The only state is the handle of the spawned child, kept in memory and lost
//! when the controller exits. Start and stop hold the write lock for their
//! whole read-modify-write. A status probe holds it only for a non-blocking
//! exit poll and makes the RPC call without any lock, so probes run
//! concurrently with each other but never alongside a start or stop.

use super::traits::BitcoindController;
use crate::cancel::CallContext;
use crate::config::{LocalSettings, Network};
use crate::error::{DaemonError, Result};
use crate::identity::ControllerIdentity;
use crate::rpc::RpcClient;
use crate::status::DaemonStatus;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

/// Command line arguments for bitcoind.
pub fn launch_args(network: Network, conf_path: Option<&Path>) -> Vec<String> {
    let mut args = Vec::new();
    if !network.is_mainnet() {
        args.push("-testnet".to_string());
    }
    if let Some(path) = conf_path {
        args.push(format!("-conf={}", path.display()));
    }
    args
}

/// Controller for a locally spawned bitcoind.
pub struct LocalController {
    identity: ControllerIdentity,
    rpc: RpcClient,
    program: PathBuf,
    args: Vec<String>,
    process: RwLock<Option<Child>>,
}

impl LocalController {
    pub fn new(identity: ControllerIdentity, settings: &LocalSettings, rpc: RpcClient) -> Self {
        let args = launch_args(identity.network(), settings.bitcoind_conf_path.as_deref());
        Self::with_command(identity, rpc, settings.bitcoind_path.clone(), args)
    }

    /// Create a controller that launches `program` with exactly `args`.
    pub fn with_command(
        identity: ControllerIdentity,
        rpc: RpcClient,
        program: impl Into<PathBuf>,
        args: Vec<String>,
    ) -> Self {
        Self {
            identity,
            rpc,
            program: program.into(),
            args,
            process: RwLock::new(None),
        }
    }

    /// PID of the tracked process, if any.
    pub async fn pid(&self) -> Option<u32> {
        self.process.read().await.as_ref().and_then(Child::id)
    }

    async fn lock_process(&self, ctx: &CallContext) -> Result<RwLockWriteGuard<'_, Option<Child>>> {
        ctx.run(async { Ok(self.process.write().await) }).await
    }

    /// Clear the handle if the child has exited on its own.
    ///
    /// Returns true when no live child is tracked afterwards.
    async fn reap_exited(&self, ctx: &CallContext) -> Result<bool> {
        let mut process = self.lock_process(ctx).await?;
        let Some(child) = process.as_mut() else {
            return Ok(true);
        };
        if poll_exited(child)? {
            *process = None;
            return Ok(true);
        }
        Ok(false)
    }

    fn spawn(&self) -> Result<Child> {
        info!(
            "Launching {} {}",
            self.program.display(),
            self.args.join(" ")
        );
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn {}: {}", self.program.display(), e);
                DaemonError::LaunchFailed {
                    path: self.program.clone(),
                    message: e.to_string(),
                }
            })
    }
}

/// Non-blocking check whether `child` is gone.
fn poll_exited(child: &mut Child) -> Result<bool> {
    match child.try_wait() {
        Ok(Some(status)) => {
            warn!("bitcoind exited on its own: {}", status);
            Ok(true)
        }
        Ok(None) => Ok(false),
        Err(e) if already_reaped(&e) => {
            warn!("bitcoind was reaped outside this controller");
            Ok(true)
        }
        Err(e) => Err(DaemonError::WaitFailed {
            message: e.to_string(),
        }),
    }
}

/// ECHILD: the exit status was collected by someone else.
#[cfg(unix)]
fn already_reaped(err: &io::Error) -> bool {
    err.raw_os_error() == Some(nix::errno::Errno::ECHILD as i32)
}

#[cfg(not(unix))]
fn already_reaped(_err: &io::Error) -> bool {
    false
}

/// Ask the child to shut down gracefully.
#[cfg(unix)]
fn interrupt(child: &mut Child) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // No pid means the child has already been reaped.
    let Some(pid) = child.id() else {
        return Ok(());
    };
    debug!("Sending SIGINT to process {}", pid);
    kill(Pid::from_raw(pid as i32), Signal::SIGINT).map_err(|e| DaemonError::SignalFailed {
        pid,
        message: e.to_string(),
    })
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) -> Result<()> {
    warn!("Graceful interrupt is not supported on this platform, killing instead");
    kill(child)
}

fn kill(child: &mut Child) -> Result<()> {
    let pid = child.id().unwrap_or_default();
    debug!("Killing process {}", pid);
    child.start_kill().map_err(|e| DaemonError::SignalFailed {
        pid,
        message: e.to_string(),
    })
}

#[async_trait]
impl BitcoindController for LocalController {
    fn runtime_name(&self) -> &'static str {
        "local"
    }

    fn identity(&self) -> &ControllerIdentity {
        &self.identity
    }

    async fn status(&self, ctx: &CallContext) -> Result<DaemonStatus> {
        if self.reap_exited(ctx).await? {
            return Err(DaemonError::NotRunning);
        }

        let info = ctx.run(self.rpc.blockchain_info()).await?;
        Ok(DaemonStatus::from(info))
    }

    async fn start(&self, ctx: &CallContext) -> Result<()> {
        let mut process = self.lock_process(ctx).await?;

        if let Some(child) = process.as_mut() {
            if !poll_exited(child)? {
                debug!("bitcoind already running (pid {:?})", child.id());
                return Ok(());
            }
            info!("Previous bitcoind is gone, launching a new one");
            *process = None;
        }

        let child = self.spawn()?;
        info!("bitcoind started with pid {:?}", child.id());
        *process = Some(child);
        Ok(())
    }

    async fn stop(&self, ctx: &CallContext, force: bool) -> Result<()> {
        let mut process = self.lock_process(ctx).await?;
        let Some(child) = process.as_mut() else {
            return Err(DaemonError::NoProcess);
        };
        if poll_exited(child)? {
            *process = None;
            return Ok(());
        }

        if force {
            kill(child)?;
        } else {
            interrupt(child)?;
        }

        match ctx.run(async { Ok(child.wait().await) }).await {
            Ok(Ok(status)) => {
                info!("bitcoind stopped: {}", status);
                *process = None;
                Ok(())
            }
            Ok(Err(e)) if already_reaped(&e) => {
                warn!("bitcoind was reaped outside this controller");
                *process = None;
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Failed waiting for bitcoind: {}", e);
                Err(DaemonError::WaitFailed {
                    message: e.to_string(),
                })
            }
            Err(DaemonError::Cancelled | DaemonError::Timeout(_)) => {
                warn!("bitcoind did not exit before the request ended");
                Err(DaemonError::StillRunning)
            }
            Err(e) => Err(e),
        }
    }
}
