//! Builds the controller selected at startup.

use super::k8s::{K8sController, KubeWorkloadApi};
use super::local::LocalController;
use super::traits::BitcoindController;
use crate::config::{ControllerConfig, Runtime};
use crate::error::Result;
use crate::identity::ControllerIdentity;
use crate::rpc::RpcClient;
use std::sync::Arc;
use tracing::info;

/// Build the controller for `runtime` from static configuration.
///
/// The cluster variant connects to the Kubernetes API here, so a missing
/// service account or kubeconfig fails at startup rather than per request.
pub async fn build_controller(
    runtime: Runtime,
    config: &ControllerConfig,
) -> Result<Arc<dyn BitcoindController>> {
    config.validate()?;

    let identity = ControllerIdentity::new(&config.owner_did, config.bitcoind_network);
    let rpc = RpcClient::new(&config.bitcoind_endpoint)?;

    info!(
        "Building {} controller for {} on {}",
        runtime,
        identity.owner(),
        identity.network()
    );

    let controller: Arc<dyn BitcoindController> = match runtime {
        Runtime::K8s => {
            let workloads = KubeWorkloadApi::connect(&config.k8s).await?;
            Arc::new(K8sController::new(identity, Arc::new(workloads), rpc))
        }
        Runtime::Local => Arc::new(LocalController::new(identity, &config.local, rpc)),
    };

    Ok(controller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CallContext;
    use crate::DaemonError;

    fn config() -> ControllerConfig {
        ControllerConfig::from_yaml(
            "owner_did: did:example:alice\nbitcoind_network: testnet\nbitcoind_endpoint: http://127.0.0.1:9/\n",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_local_controller() {
        let ctl = build_controller(Runtime::Local, &config()).await.unwrap();

        assert_eq!(ctl.runtime_name(), "local");
        assert_eq!(ctl.identity().owner(), "did:example:alice");
        assert!(matches!(
            ctl.status(&CallContext::background()).await,
            Err(DaemonError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let mut config = config();
        config.bitcoind_endpoint = "nonsense".into();

        let result = build_controller(Runtime::Local, &config).await;
        assert!(matches!(result, Err(DaemonError::Config { .. })));
    }
}
