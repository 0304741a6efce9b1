//! bitcoind lifecycle controllers.
//!
//! Callers depend only on [`BitcoindController`]. Two implementations exist,
//! one chosen once at startup by [`build_controller`]:
//!
//! - [`K8sController`] - scales a StatefulSet between zero and one replica
//! - [`LocalController`] - spawns and signals a child process

mod factory;
mod k8s;
mod local;
mod traits;

pub use factory::build_controller;
pub use k8s::{K8sController, KubeWorkloadApi, WorkloadApi, WorkloadState};
pub use local::{launch_args, LocalController};
pub use traits::BitcoindController;
