//! bitcoind running as a single-replica StatefulSet in a Kubernetes cluster.
//!
//! All state lives in the cluster. Starting and stopping patch the desired
//! replica count; the status is read from the StatefulSet's observed and
//! ready replica counts before bitcoind itself is asked over RPC.

use super::traits::BitcoindController;
use crate::cancel::CallContext;
use crate::config::K8sSettings;
use crate::error::{DaemonError, Result};
use crate::identity::ControllerIdentity;
use crate::rpc::RpcClient;
use crate::status::DaemonStatus;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::api::{Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Replica counts of a workload as observed by the cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkloadState {
    pub replicas: i32,
    pub ready_replicas: i32,
}

/// Access to the replica-controlled workload resources of one namespace.
#[async_trait]
pub trait WorkloadApi: Send + Sync {
    /// Read a workload; `None` if it does not exist.
    async fn get(&self, name: &str) -> Result<Option<WorkloadState>>;

    /// Set the desired replica count of a workload.
    async fn patch_replicas(&self, name: &str, replicas: i32) -> Result<()>;
}

/// [`WorkloadApi`] over StatefulSets, backed by the Kubernetes API server.
pub struct KubeWorkloadApi {
    api: Api<StatefulSet>,
}

impl KubeWorkloadApi {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }

    /// Connect using the in-cluster service account, or the local kubeconfig
    /// when `use_local_context` is set.
    pub async fn connect(settings: &K8sSettings) -> Result<Self> {
        let config = if settings.use_local_context {
            let options = KubeConfigOptions::default();
            match &settings.kubeconfig {
                Some(path) => {
                    debug!("Loading kubeconfig from {}", path.display());
                    let kubeconfig = Kubeconfig::read_from(path).map_err(cluster_config_err)?;
                    Config::from_custom_kubeconfig(kubeconfig, &options)
                        .await
                        .map_err(cluster_config_err)?
                }
                None => Config::from_kubeconfig(&options)
                    .await
                    .map_err(cluster_config_err)?,
            }
        } else {
            Config::incluster().map_err(cluster_config_err)?
        };

        let client = Client::try_from(config)?;
        info!("Connected to cluster, namespace {}", settings.namespace);
        Ok(Self::new(client, &settings.namespace))
    }
}

fn cluster_config_err(err: impl std::fmt::Display) -> DaemonError {
    DaemonError::Cluster {
        message: format!("failed to load cluster configuration: {err}"),
    }
}

#[async_trait]
impl WorkloadApi for KubeWorkloadApi {
    async fn get(&self, name: &str) -> Result<Option<WorkloadState>> {
        let Some(statefulset) = self.api.get_opt(name).await? else {
            return Ok(None);
        };

        let state = statefulset
            .status
            .map(|s| WorkloadState {
                replicas: s.replicas,
                ready_replicas: s.ready_replicas.unwrap_or(0),
            })
            .unwrap_or_default();
        Ok(Some(state))
    }

    async fn patch_replicas(&self, name: &str, replicas: i32) -> Result<()> {
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        self.api
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Controller for bitcoind deployed as a StatefulSet.
pub struct K8sController {
    identity: ControllerIdentity,
    workloads: Arc<dyn WorkloadApi>,
    rpc: RpcClient,
}

impl K8sController {
    pub fn new(identity: ControllerIdentity, workloads: Arc<dyn WorkloadApi>, rpc: RpcClient) -> Self {
        info!(
            "Cluster controller for {} ({}) manages {}",
            identity.owner(),
            identity.network(),
            identity.workload_name()
        );
        Self {
            identity,
            workloads,
            rpc,
        }
    }

    async fn set_replicas(&self, ctx: &CallContext, replicas: i32) -> Result<()> {
        let name = self.identity.workload_name();
        info!("Setting replicas of {} to {}", name, replicas);
        ctx.run(self.workloads.patch_replicas(&name, replicas))
            .await
            .inspect_err(|e| error!("Failed to patch replicas of {}: {}", name, e))
    }
}

#[async_trait]
impl BitcoindController for K8sController {
    fn runtime_name(&self) -> &'static str {
        "k8s"
    }

    fn identity(&self) -> &ControllerIdentity {
        &self.identity
    }

    async fn status(&self, ctx: &CallContext) -> Result<DaemonStatus> {
        let name = self.identity.workload_name();

        let workload = match ctx.run(self.workloads.get(&name)).await {
            Ok(Some(workload)) => workload,
            Ok(None) => {
                debug!("StatefulSet {} not found", name);
                return Err(DaemonError::NotRunning);
            }
            Err(e @ (DaemonError::Cancelled | DaemonError::Timeout(_))) => return Err(e),
            Err(e) => {
                error!("Failed to check StatefulSet {}: {}", name, e);
                return Err(DaemonError::StatusReadFailure {
                    cause: e.to_string(),
                });
            }
        };

        if workload.replicas == 0 {
            return Err(DaemonError::NotRunning);
        }

        // Zero ready replicas is a pod still starting; more than one is not
        // expected for a single-instance workload. Both report NotReady.
        if workload.ready_replicas != 1 {
            debug!(
                "StatefulSet {} has {}/{} ready replicas",
                name, workload.ready_replicas, workload.replicas
            );
            return Err(DaemonError::NotReady);
        }

        let info = ctx.run(self.rpc.blockchain_info()).await?;
        Ok(DaemonStatus::from(info))
    }

    async fn start(&self, ctx: &CallContext) -> Result<()> {
        self.set_replicas(ctx, 1).await
    }

    /// Scale to zero. Graceful draining is left to the pod's termination
    /// handling, so `force` has no effect here.
    async fn stop(&self, ctx: &CallContext, _force: bool) -> Result<()> {
        self.set_replicas(ctx, 0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::config::Network;
    use crate::rpc::stub;
    use axum::http::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory workload store.
    #[derive(Default)]
    struct FakeWorkloads {
        workloads: Mutex<HashMap<String, WorkloadState>>,
        patches: Mutex<Vec<(String, i32)>>,
        fail_reads: bool,
    }

    impl FakeWorkloads {
        fn with(name: &str, replicas: i32, ready_replicas: i32) -> Self {
            let fake = Self::default();
            fake.workloads.lock().unwrap().insert(
                name.to_string(),
                WorkloadState {
                    replicas,
                    ready_replicas,
                },
            );
            fake
        }
    }

    #[async_trait]
    impl WorkloadApi for FakeWorkloads {
        async fn get(&self, name: &str) -> Result<Option<WorkloadState>> {
            if self.fail_reads {
                return Err(DaemonError::Cluster {
                    message: "connection refused".into(),
                });
            }
            Ok(self.workloads.lock().unwrap().get(name).copied())
        }

        async fn patch_replicas(&self, name: &str, replicas: i32) -> Result<()> {
            let mut workloads = self.workloads.lock().unwrap();
            let Some(workload) = workloads.get_mut(name) else {
                return Err(DaemonError::Cluster {
                    message: format!("statefulsets.apps \"{name}\" not found"),
                });
            };
            workload.replicas = replicas;
            self.patches.lock().unwrap().push((name.to_string(), replicas));
            Ok(())
        }
    }

    fn identity() -> ControllerIdentity {
        ControllerIdentity::new("did:example:alice", Network::Mainnet)
    }

    fn controller(workloads: Arc<FakeWorkloads>, rpc_url: &str) -> K8sController {
        K8sController::new(identity(), workloads, RpcClient::new(rpc_url).unwrap())
    }

    const UNUSED_RPC: &str = "http://127.0.0.1:9/";

    #[tokio::test]
    async fn test_status_absent_workload() {
        let ctl = controller(Arc::new(FakeWorkloads::default()), UNUSED_RPC);
        let result = ctl.status(&CallContext::background()).await;
        assert!(matches!(result, Err(DaemonError::NotRunning)));
    }

    #[tokio::test]
    async fn test_status_zero_replicas() {
        let fake = FakeWorkloads::with(&identity().workload_name(), 0, 0);
        let ctl = controller(Arc::new(fake), UNUSED_RPC);
        let result = ctl.status(&CallContext::background()).await;
        assert!(matches!(result, Err(DaemonError::NotRunning)));
    }

    #[tokio::test]
    async fn test_status_not_ready() {
        let fake = FakeWorkloads::with(&identity().workload_name(), 1, 0);
        let ctl = controller(Arc::new(fake), UNUSED_RPC);
        let result = ctl.status(&CallContext::background()).await;
        assert!(matches!(result, Err(DaemonError::NotReady)));
    }

    #[tokio::test]
    async fn test_status_too_many_ready() {
        let fake = FakeWorkloads::with(&identity().workload_name(), 2, 2);
        let ctl = controller(Arc::new(fake), UNUSED_RPC);
        let result = ctl.status(&CallContext::background()).await;
        assert!(matches!(result, Err(DaemonError::NotReady)));
    }

    #[tokio::test]
    async fn test_status_read_failure() {
        let fake = FakeWorkloads {
            fail_reads: true,
            ..Default::default()
        };
        let ctl = controller(Arc::new(fake), UNUSED_RPC);
        let result = ctl.status(&CallContext::background()).await;
        assert!(matches!(result, Err(DaemonError::StatusReadFailure { .. })));
    }

    #[tokio::test]
    async fn test_status_ready_queries_rpc() {
        let url = stub::serve_blockchain_info(700_000, 0.999999).await;
        let fake = FakeWorkloads::with(&identity().workload_name(), 1, 1);
        let ctl = controller(Arc::new(fake), &url);

        let status = ctl.status(&CallContext::background()).await.unwrap();
        assert_eq!(status.best_block, 700_000);
        assert_eq!(status.sync_progress, 1.0);
    }

    #[tokio::test]
    async fn test_status_rpc_warmup() {
        let url = stub::serve_fixed(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"id":"bitcoind-ctl","result":null,"error":{"code":-28,"message":"Loading block index..."}}"#,
        )
        .await;
        let fake = FakeWorkloads::with(&identity().workload_name(), 1, 1);
        let ctl = controller(Arc::new(fake), &url);

        let result = ctl.status(&CallContext::background()).await;
        assert!(matches!(result, Err(DaemonError::RpcNotReady)));
    }

    #[tokio::test]
    async fn test_status_uses_testnet_name() {
        let testnet = ControllerIdentity::new("did:example:alice", Network::Testnet);
        let fake = FakeWorkloads::with(&identity().workload_name(), 1, 0);
        let ctl = K8sController::new(testnet, Arc::new(fake), RpcClient::new(UNUSED_RPC).unwrap());

        // Only the mainnet workload exists.
        let result = ctl.status(&CallContext::background()).await;
        assert!(matches!(result, Err(DaemonError::NotRunning)));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let name = identity().workload_name();
        let fake = Arc::new(FakeWorkloads::with(&name, 0, 0));
        let ctl = controller(fake.clone(), UNUSED_RPC);
        let ctx = CallContext::background();

        ctl.start(&ctx).await.unwrap();
        let once = *fake.workloads.lock().unwrap().get(&name).unwrap();
        ctl.start(&ctx).await.unwrap();
        let twice = *fake.workloads.lock().unwrap().get(&name).unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.replicas, 1);
        assert_eq!(
            *fake.patches.lock().unwrap(),
            vec![(name.clone(), 1), (name, 1)]
        );
    }

    #[tokio::test]
    async fn test_stop_scales_to_zero_regardless_of_force() {
        let name = identity().workload_name();
        let fake = Arc::new(FakeWorkloads::with(&name, 1, 1));
        let ctl = controller(fake.clone(), UNUSED_RPC);
        let ctx = CallContext::background();

        ctl.stop(&ctx, false).await.unwrap();
        ctl.stop(&ctx, true).await.unwrap();

        assert_eq!(
            *fake.patches.lock().unwrap(),
            vec![(name.clone(), 0), (name, 0)]
        );
    }

    #[tokio::test]
    async fn test_patch_missing_workload_propagates() {
        let ctl = controller(Arc::new(FakeWorkloads::default()), UNUSED_RPC);
        let result = ctl.start(&CallContext::background()).await;
        assert!(matches!(result, Err(DaemonError::Cluster { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let token = CancellationToken::new();
        token.cancel();
        let fake = FakeWorkloads::with(&identity().workload_name(), 1, 1);
        let ctl = controller(Arc::new(fake), UNUSED_RPC);

        let result = ctl.status(&CallContext::with_token(token)).await;
        assert!(matches!(result, Err(DaemonError::Cancelled)));
    }
}
