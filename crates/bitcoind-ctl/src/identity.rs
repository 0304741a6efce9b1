//! Owner identity and the resource names derived from it.

use crate::config::{K8sConfig, Network};
use sha2::{Digest, Sha256};

/// Derive the stable resource name for an owner identity.
///
/// The identity is hashed twice with SHA-256 and the first
/// [`K8sConfig::RESOURCE_NAME_BYTES`] bytes of the second digest are
/// hex-encoded, giving a 32 character lowercase token.
pub fn resource_name(identity: &str) -> String {
    let first = Sha256::digest(identity.as_bytes());
    let second = Sha256::digest(first);
    hex::encode(&second[..K8sConfig::RESOURCE_NAME_BYTES])
}

/// The owner and network a controller is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerIdentity {
    owner: String,
    network: Network,
    resource_name: String,
}

impl ControllerIdentity {
    pub fn new(owner: impl Into<String>, network: Network) -> Self {
        let owner = owner.into();
        let resource_name = resource_name(&owner);
        Self {
            owner,
            network,
            resource_name,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Name of the StatefulSet running this owner's bitcoind.
    ///
    /// `bitcoind-mainnet-<hash>` on mainnet, `bitcoind-<hash>` otherwise.
    pub fn workload_name(&self) -> String {
        let infix = if self.network.is_mainnet() {
            K8sConfig::MAINNET_INFIX
        } else {
            ""
        };
        format!(
            "{}{}-{}",
            K8sConfig::WORKLOAD_PREFIX,
            infix,
            self.resource_name
        )
    }
}
