use std::time;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Per-chain settings shared by the Supervisor, EventIngestor and HistoricalBackfiller
/// for a single chain (L1 or L2).
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ChainSettings {
    /// HTTPS JSON-RPC endpoint. The streaming WebSocket URL is derived from this
    /// by rewriting `https -> wss` and `/v3 -> /ws/v3`.
    pub rpc_url: String,
    pub bridge_contract: String,
    #[serde(default = "default_health_check_interval")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub health_check_interval: time::Duration,
    #[serde(default = "default_backfill_interval")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub backfill_interval: time::Duration,
    #[serde(default = "default_backfill_window_blocks")]
    pub backfill_window_blocks: u64,
    #[serde(default = "default_reconnect_base_delay")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub reconnect_base_delay: time::Duration,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_tx_gas_limit")]
    pub tx_gas_limit: u64,
}

fn default_health_check_interval() -> time::Duration {
    time::Duration::from_secs(30)
}

fn default_backfill_interval() -> time::Duration {
    time::Duration::from_secs(300)
}

fn default_backfill_window_blocks() -> u64 {
    1000
}

fn default_reconnect_base_delay() -> time::Duration {
    time::Duration::from_secs(2)
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_tx_gas_limit() -> u64 {
    500_000
}

impl ChainSettings {
    pub fn new(rpc_url: impl Into<String>, bridge_contract: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            bridge_contract: bridge_contract.into(),
            health_check_interval: default_health_check_interval(),
            backfill_interval: default_backfill_interval(),
            backfill_window_blocks: default_backfill_window_blocks(),
            reconnect_base_delay: default_reconnect_base_delay(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            tx_gas_limit: default_tx_gas_limit(),
        }
    }
}

/// Top-level relayer settings, nested under `RelayerSettings::SERVICE_NAME` by the
/// server crate's `ConfigSettings` impl.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RelayerSettings {
    #[serde(default = "default_l1")]
    pub l1: ChainSettings,
    #[serde(default = "default_l2")]
    pub l2: ChainSettings,
    /// Hex-encoded operator private key used to sign EIP-712 payloads and submit
    /// relays. Required; there is no safe default.
    pub owner_private_key: String,
}

fn default_l1() -> ChainSettings {
    ChainSettings::new(
        "https://mainnet.infura.io/v3/__PROJECT_ID__",
        "0x0000000000000000000000000000000000000000",
    )
}

fn default_l2() -> ChainSettings {
    ChainSettings::new(
        "https://l2.example.org/v3/__PROJECT_ID__",
        "0x0000000000000000000000000000000000000000",
    )
}
