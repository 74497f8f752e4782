use lazy_static::lazy_static;
use prometheus::{
    IntCounterVec, IntGaugeVec, register_int_counter_vec, register_int_gauge_vec,
};

// Metrics for the relay pipeline. Keep labels low-cardinality: chain and kind.
lazy_static! {
    /// Intents observed by an EventIngestor or HistoricalBackfiller, before dedup.
    pub static ref INTENTS_SEEN_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bridge_relayer_intents_seen_total",
        "source-chain intents observed before dedup",
        &["chain", "source"],
    )
    .unwrap();

    /// Intents dropped by DedupIndex or TxStore before reaching the Relayer.
    pub static ref INTENTS_DEDUPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bridge_relayer_intents_deduped_total",
        "intents dropped as already-seen",
        &["chain"],
    )
    .unwrap();

    /// Relay attempts submitted on-chain, by destination chain and outcome.
    pub static ref RELAYS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bridge_relayer_relays_total",
        "relay transactions submitted, by destination chain and terminal status",
        &["chain", "status"],
    )
    .unwrap();

    /// Current size of the in-memory DedupIndex.
    pub static ref DEDUP_INDEX_SIZE: IntGaugeVec = register_int_gauge_vec!(
        "bridge_relayer_dedup_index_size",
        "current number of hashes held in the in-memory dedup index",
        &["chain"],
    )
    .unwrap();

    /// Consecutive reconnect attempts currently accrued per chain supervisor.
    pub static ref SUPERVISOR_RECONNECT_ATTEMPTS: IntGaugeVec = register_int_gauge_vec!(
        "bridge_relayer_supervisor_reconnect_attempts",
        "consecutive health-check/setup failures observed by the supervisor",
        &["chain"],
    )
    .unwrap();
}
