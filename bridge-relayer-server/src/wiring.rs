use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::rpc::types::{Filter, Log};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolEvent;
use bridge_relayer_logic::abi::{AssetsBuy, AssetsSold};
use bridge_relayer_logic::chain::{AlloyChainClient, ChainClient};
use bridge_relayer_logic::dedup::DedupIndex;
use bridge_relayer_logic::error::{RelayerError, Result};
use bridge_relayer_logic::ingestor::EventIngestor;
use bridge_relayer_logic::model::{Intent, IntentKind};
use bridge_relayer_logic::relayer::{ChainEndpoint, Relayer};
use bridge_relayer_logic::settings::ChainSettings;
use bridge_relayer_logic::signer::Signer;
use bridge_relayer_logic::store::{InMemoryTxStore, TxStore};
use bridge_relayer_logic::supervisor::Supervisor;
use tokio_util::sync::CancellationToken;

use crate::Settings;

const SERVICE_NAME: &str = "bridge_relayer";

/// Builds every relayer component, wires up both chains' subscriptions and
/// backfillers, and runs until a shutdown signal is received. Mirrors the
/// daemon-wiring shape of `interchain-indexer-server::spawn_configured_indexers`,
/// minus the gRPC/HTTP router and the database-backed chain registry, which
/// are out of scope per the crate-level design note.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    blockscout_service_launcher::tracing::init_logs(SERVICE_NAME, &settings.tracing, &settings.jaeger)?;

    let wallet: PrivateKeySigner = settings
        .relayer
        .owner_private_key
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid OWNER_PRIVATE_KEY: {e}"))?;
    let signer = Signer::new(wallet.clone());

    let store: Arc<dyn TxStore> = Arc::new(InMemoryTxStore::new());
    let dedup = Arc::new(DedupIndex::new());
    seed_dedup_from_store(&dedup, store.as_ref()).await?;

    // The operator key authorizes both the EIP-712 payload (`Signer`) and the
    // outbound transaction itself, so each chain's provider is built with the
    // same wallet attached.
    let l1_client: Arc<dyn ChainClient> =
        Arc::new(AlloyChainClient::new(&settings.relayer.l1.rpc_url, wallet.clone())?);
    let l2_client: Arc<dyn ChainClient> =
        Arc::new(AlloyChainClient::new(&settings.relayer.l2.rpc_url, wallet)?);

    let l1_bridge = parse_bridge_address(&settings.relayer.l1)?;
    let l2_bridge = parse_bridge_address(&settings.relayer.l2)?;

    let relayer = Arc::new(Relayer::new(
        ChainEndpoint::new(l1_client.clone(), l1_bridge, settings.relayer.l1.tx_gas_limit),
        ChainEndpoint::new(l2_client.clone(), l2_bridge, settings.relayer.l2.tx_gas_limit),
        signer,
        store.clone(),
        dedup.clone(),
    ));

    let l1_ingestor = Arc::new(EventIngestor::new("L1", dedup.clone(), store.clone(), relayer.clone()));
    let l2_ingestor = Arc::new(EventIngestor::new("L2", dedup.clone(), store.clone(), relayer.clone()));

    let backfill_cancel = CancellationToken::new();

    let l1_supervisor = Arc::new(Supervisor::new("L1", l1_client.clone(), settings.relayer.l1.clone()));
    let l2_supervisor = Arc::new(Supervisor::new("L2", l2_client.clone(), settings.relayer.l2.clone()));

    spawn_stream_forwarder(
        l1_supervisor.clone().start(Filter::new().address(l1_bridge).event_signature(AssetsBuy::SIGNATURE_HASH)).await,
        l1_ingestor.clone(),
        decode_buy,
    );
    spawn_stream_forwarder(
        l2_supervisor
            .clone()
            .start(Filter::new().address(l2_bridge).event_signature(AssetsSold::SIGNATURE_HASH))
            .await,
        l2_ingestor.clone(),
        decode_sell,
    );

    spawn_backfiller(
        "L1",
        l1_client,
        Filter::new().address(l1_bridge).event_signature(AssetsBuy::SIGNATURE_HASH),
        settings.relayer.l1.clone(),
        l1_ingestor,
        backfill_cancel.clone(),
        decode_buy,
    );
    spawn_backfiller(
        "L2",
        l2_client,
        Filter::new().address(l2_bridge).event_signature(AssetsSold::SIGNATURE_HASH),
        settings.relayer.l2.clone(),
        l2_ingestor,
        backfill_cancel.clone(),
        decode_sell,
    );

    tracing::info!("bridge relayer daemon started");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    l1_supervisor.shutdown();
    l2_supervisor.shutdown();
    backfill_cancel.cancel();

    Ok(())
}

fn spawn_stream_forwarder(
    mut logs: tokio::sync::mpsc::Receiver<Log>,
    ingestor: Arc<EventIngestor>,
    decode: impl Fn(&Log) -> Result<Intent> + Copy + Send + 'static,
) {
    tokio::spawn(async move {
        while let Some(log) = logs.recv().await {
            ingestor.ingest(&log, decode).await;
        }
    });
}

fn spawn_backfiller(
    chain_label: &'static str,
    client: Arc<dyn ChainClient>,
    filter_template: Filter,
    settings: ChainSettings,
    ingestor: Arc<EventIngestor>,
    cancel: CancellationToken,
    decode: impl Fn(&Log) -> Result<Intent> + Copy + Send + 'static,
) {
    let backfiller = Arc::new(bridge_relayer_logic::backfill::HistoricalBackfiller::new(
        chain_label,
        client,
        filter_template,
        settings.backfill_window_blocks,
        ingestor,
    ));
    tokio::spawn(backfiller.run_forever(settings.backfill_interval, cancel, decode));
}

async fn seed_dedup_from_store(dedup: &DedupIndex, store: &dyn TxStore) -> anyhow::Result<()> {
    let records = store.list_all(1000).await?;
    dedup.seed(records.iter().flat_map(|r| [r.event_hash.clone(), r.relay_hash.clone()]).flatten());
    Ok(())
}

fn parse_bridge_address(settings: &ChainSettings) -> anyhow::Result<Address> {
    Address::from_str(&settings.bridge_contract).map_err(|e| anyhow::anyhow!("invalid bridge_contract address: {e}"))
}

fn decode_buy(log: &Log) -> Result<Intent> {
    let event = log.log_decode::<AssetsBuy>().map_err(|e| RelayerError::Chain(e.into()))?.inner.data;
    Ok(Intent {
        kind: IntentKind::Buy,
        user: format!("{:#x}", event.user),
        source_token: format!("{:#x}", event.assetIn),
        dest_token: format!("{:#x}", event.l2TargetToken),
        amount_in: event.amountIn,
        deadline: event.deadline,
        event_hash: String::new(),
    })
}

fn decode_sell(log: &Log) -> Result<Intent> {
    let event = log.log_decode::<AssetsSold>().map_err(|e| RelayerError::Chain(e.into()))?.inner.data;
    Ok(Intent {
        kind: IntentKind::Sell,
        user: format!("{:#x}", event.user),
        source_token: format!("{:#x}", event.tokenToSell),
        dest_token: format!("{:#x}", event.targetL1Asset),
        amount_in: event.amountIn,
        deadline: event.deadline,
        event_hash: String::new(),
    })
}
