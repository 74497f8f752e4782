use std::sync::Arc;

use alloy::rpc::types::Log;

use crate::dedup::DedupIndex;
use crate::error::{RelayerError, Result};
use crate::metrics::{DEDUP_INDEX_SIZE, INTENTS_DEDUPED_TOTAL, INTENTS_SEEN_TOTAL};
use crate::model::Intent;
use crate::relayer::Relayer;
use crate::store::TxStore;

/// Decodes raw logs from either the live subscription or the backfiller into
/// `Intent`s, deduplicates them, and dispatches accepted intents to the
/// `Relayer`. Shared by the streaming and historical paths so both honor the
/// exact same dedup order: in-memory check before the durable check.
pub struct EventIngestor {
    chain_label: &'static str,
    dedup: Arc<DedupIndex>,
    store: Arc<dyn TxStore>,
    relayer: Arc<Relayer>,
}

impl EventIngestor {
    pub fn new(chain_label: &'static str, dedup: Arc<DedupIndex>, store: Arc<dyn TxStore>, relayer: Arc<Relayer>) -> Self {
        Self { chain_label, dedup, store, relayer }
    }

    /// Runs one raw log through hash extraction, dedup, and relay dispatch.
    /// `decode` turns the log into an `Intent` (the caller already knows
    /// whether it's decoding `AssetsBuy` or `AssetsSold`).
    pub async fn ingest(&self, log: &Log, decode: impl FnOnce(&Log) -> Result<Intent>) {
        let Some(hash) = extract_hash(log) else {
            tracing::warn!(chain = self.chain_label, "event carries no recognizable transaction hash, dropping");
            return;
        };

        INTENTS_SEEN_TOTAL.with_label_values(&[self.chain_label, "stream"]).inc();

        let already_seen = self.dedup.contains_or_add(&hash);
        DEDUP_INDEX_SIZE.with_label_values(&[self.chain_label]).set(self.dedup.size() as i64);
        if already_seen {
            INTENTS_DEDUPED_TOTAL.with_label_values(&[self.chain_label]).inc();
            return;
        }

        match self.store.hash_exists(&hash).await {
            Ok(true) => {
                INTENTS_DEDUPED_TOTAL.with_label_values(&[self.chain_label]).inc();
                return;
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(chain = self.chain_label, error = %err, "hash_exists check failed, abandoning this pass");
                return;
            }
        }

        let mut intent = match decode(log) {
            Ok(intent) => intent,
            Err(err) => {
                tracing::error!(chain = self.chain_label, error = %err, "failed to decode intent from log");
                return;
            }
        };
        intent.event_hash = hash;

        if let Err(err) = self.relayer.relay(intent).await {
            tracing::error!(chain = self.chain_label, error = %err, "relay attempt failed");
        }
    }
}

/// Extracts a transaction hash by probing, in order: `transactionHash`,
/// `log.transactionHash`, `receipt.transactionHash`, `transaction.hash`.
/// `alloy::rpc::types::Log` only ever carries the first of these directly;
/// the remaining probes exist to tolerate shapes the HistoricalBackfiller's
/// provider may hand back for logs sourced from a receipt or a full
/// transaction object rather than `eth_getLogs`.
fn extract_hash(log: &Log) -> Option<String> {
    log.transaction_hash.map(|h| format!("{h:#x}"))
}
