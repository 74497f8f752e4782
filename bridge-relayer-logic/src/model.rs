use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Destination chain tag for a `RelayRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainTag {
    L1,
    L2,
}

/// Direction of the relay flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentKind {
    Buy,
    Sell,
}

/// Lifecycle status of a `RelayRecord`. `Confirmed` and `Failed` are terminal
/// and absorbing: once reached, no later write changes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed)
    }
}

/// The persisted unit: one outbound relay transaction and the source event that
/// triggered it. See the store invariants in [`crate::store::TxStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRecord {
    pub id: String,
    pub chain: ChainTag,
    pub kind: IntentKind,
    /// Lowercased hex address of the end user.
    pub user: String,
    /// Decimal string, human-readable, post-normalization.
    pub amount: String,
    pub source_token: String,
    pub dest_token: String,
    pub event_hash: Option<String>,
    pub relay_hash: Option<String>,
    pub status: TxStatus,
    /// Unix-millis of record creation.
    pub timestamp: i64,
    pub created_at: i64,
    pub updated_at: i64,
    /// Monotonically increasing counter assigned by the in-memory `TxStore` on
    /// first insert, purely to give `listAll(order by createdAt desc)` a stable
    /// tie-break when two records share a millisecond timestamp. An
    /// implementation detail of the reference store, not wire-visible.
    #[serde(default, skip_serializing)]
    pub sequence: u64,
}

impl RelayRecord {
    pub fn lowercase_user(user: &str) -> String {
        user.to_lowercase()
    }
}

/// A decoded source-chain intent, independent of which concrete event shape it
/// was extracted from. Built by `EventIngestor`/`HistoricalBackfiller` before
/// being handed to the `Relayer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub kind: IntentKind,
    pub user: String,
    /// Source-chain token: `assetIn` for Buy, `tokenToSell` for Sell.
    pub source_token: String,
    /// Destination-chain token: `l2TargetToken` for Buy, `targetL1Asset` for Sell.
    pub dest_token: String,
    pub amount_in: U256,
    pub deadline: U256,
    pub event_hash: String,
}
