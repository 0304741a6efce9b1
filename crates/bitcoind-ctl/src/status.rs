//! Daemon status as reported to callers.

use crate::config::RpcConfig;
use crate::rpc::BlockchainInfo;
use serde::{Deserialize, Serialize};

/// Status of a running bitcoind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub best_block: u64,
    /// Verification progress in `[0, 1]`, five fractional digits.
    pub sync_progress: f64,
}

impl DaemonStatus {
    /// Build a status from the raw values reported by bitcoind.
    pub fn normalize(blocks: u64, raw_progress: f64) -> Self {
        Self {
            best_block: blocks,
            sync_progress: round_digits(raw_progress, RpcConfig::PROGRESS_DIGITS),
        }
    }
}

impl From<BlockchainInfo> for DaemonStatus {
    fn from(info: BlockchainInfo) -> Self {
        Self::normalize(info.blocks, info.verification_progress)
    }
}

/// Round `number` to `digits` fractional digits, halves away from zero.
pub fn round_digits(number: f64, digits: i32) -> f64 {
    let rate = 10f64.powi(digits);
    (number * rate).round() / rate
}
