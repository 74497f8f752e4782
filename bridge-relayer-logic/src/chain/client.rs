use alloy::{
    network::{Ethereum, EthereumWallet, TransactionBuilder},
    primitives::{Address, B256, Bytes, TxHash},
    providers::{DynProvider, Provider, ProviderBuilder, WsConnect},
    rpc::types::{Filter, Log, TransactionRequest},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use tokio::sync::RwLock;

use crate::chain::transport::derive_ws_url;
use crate::error::{RelayerError, Result};

/// Outcome of waiting for a submitted relay transaction's receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed,
    Reverted,
}

type OutcomeFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Result<TxOutcome>> + Send>>;

/// A submitted, not-yet-confirmed transaction, with a future that resolves
/// once its receipt is known.
pub struct SentTx {
    pub hash: TxHash,
    outcome_fut: Option<OutcomeFuture>,
}

impl SentTx {
    /// Build a `SentTx` from a hash and a future that resolves once the
    /// transaction's receipt is known. Used by `ChainClient` implementations.
    pub fn new(hash: TxHash, outcome_fut: OutcomeFuture) -> Self {
        Self {
            hash,
            outcome_fut: Some(outcome_fut),
        }
    }

    pub async fn wait(mut self) -> Result<TxOutcome> {
        let fut = self
            .outcome_fut
            .take()
            .expect("SentTx::wait called more than once");
        fut.await
    }
}

/// Options accepted by `ChainClient::send_tx`. The gas limit is fixed per the
/// configured `ChainSettings::tx_gas_limit` (500,000 by default).
#[derive(Debug, Clone, Copy)]
pub struct SendTxOpts {
    pub gas_limit: u64,
}

/// Abstraction over a single chain endpoint, exposing exactly the operations the
/// relayer core needs: a liveness probe, a log stream and a historical log
/// query, a read call, and a write call with its receipt future.
///
/// Every operation fails with one of `RelayerError::Connection` (transport dead,
/// retried by the Supervisor), `RelayerError::Chain` (RPC error response), or
/// `RelayerError::Tx` (submission rejected; callers check
/// `RelayerError::is_already_known`).
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64>;

    /// Current chain id reported by the endpoint. Polled by the Supervisor
    /// alongside `block_number` to detect a `network-changed` transport event
    /// (the endpoint silently switching networks underneath an existing
    /// connection), as distinct from a transport going dead outright.
    async fn chain_id(&self) -> Result<u64>;

    async fn query_logs(&self, filter: Filter) -> Result<Vec<Log>>;

    /// Establishes (or re-establishes) the push subscription for `filter`.
    /// Called by the Supervisor on initial setup and on every reconnect.
    async fn subscribe_logs(&self, filter: Filter) -> Result<BoxStream<'static, Log>>;

    async fn call_read(&self, to: Address, data: Bytes) -> Result<Bytes>;

    async fn send_tx(&self, to: Address, data: Bytes, opts: SendTxOpts) -> Result<SentTx>;
}

/// `ChainClient` backed by `alloy`'s JSON-RPC provider. Holds both a stable HTTP
/// provider (used for reads/writes, which don't need a live push subscription)
/// and a WebSocket provider that the Supervisor (re)creates via `reconnect`.
pub struct AlloyChainClient {
    http_provider: DynProvider<Ethereum>,
    ws_url: String,
    ws_provider: RwLock<Option<DynProvider<Ethereum>>>,
    ethereum_wallet: EthereumWallet,
    signer_address: Address,
}

impl AlloyChainClient {
    /// `wallet` is the operator key (`OWNER_PRIVATE_KEY`) attached to both the
    /// HTTP and WebSocket providers so `send_tx` submits a locally-signed
    /// transaction rather than relying on the RPC node managing the account.
    pub fn new(http_url: &str, wallet: PrivateKeySigner) -> Result<Self> {
        let signer_address = wallet.address();
        let ethereum_wallet = EthereumWallet::from(wallet);
        let http_provider = ProviderBuilder::new()
            .wallet(ethereum_wallet.clone())
            .connect_http(
                http_url
                    .parse()
                    .map_err(|e| RelayerError::Config(format!("invalid RPC URL: {e}")))?,
            )
            .erased();

        Ok(Self {
            http_provider,
            ws_url: derive_ws_url(http_url),
            ws_provider: RwLock::new(None),
            ethereum_wallet,
            signer_address,
        })
    }

    /// (Re)establishes the WebSocket transport used for push subscriptions.
    /// Called by the Supervisor on setup and on every reconnect attempt.
    pub async fn reconnect(&self) -> Result<()> {
        let provider = ProviderBuilder::new()
            .wallet(self.ethereum_wallet.clone())
            .connect_ws(WsConnect::new(&self.ws_url))
            .await
            .map_err(|e| RelayerError::Connection(e.into()))?
            .erased();

        *self.ws_provider.write().await = Some(provider);
        Ok(())
    }

    fn streaming_provider(&self) -> Option<DynProvider<Ethereum>> {
        self.ws_provider.try_read().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn block_number(&self) -> Result<u64> {
        let provider = self.ws_provider.read().await.clone();
        let provider = provider.as_ref().unwrap_or(&self.http_provider);
        provider
            .get_block_number()
            .await
            .map_err(|e| RelayerError::Connection(e.into()))
    }

    async fn chain_id(&self) -> Result<u64> {
        let provider = self.ws_provider.read().await.clone();
        let provider = provider.as_ref().unwrap_or(&self.http_provider);
        provider
            .get_chain_id()
            .await
            .map_err(|e| RelayerError::Connection(e.into()))
    }

    async fn query_logs(&self, filter: Filter) -> Result<Vec<Log>> {
        self.http_provider
            .get_logs(&filter)
            .await
            .map_err(|e| RelayerError::Chain(e.into()))
    }

    async fn subscribe_logs(&self, filter: Filter) -> Result<BoxStream<'static, Log>> {
        self.reconnect().await?;
        let provider = self
            .streaming_provider()
            .ok_or_else(|| RelayerError::Connection(anyhow::anyhow!("no ws provider after reconnect")))?;

        let subscription = provider
            .subscribe_logs(&filter)
            .await
            .map_err(|e| RelayerError::Connection(e.into()))?;

        Ok(subscription.into_stream().boxed())
    }

    async fn call_read(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.http_provider
            .call(tx)
            .await
            .map_err(|e| RelayerError::Chain(e.into()))
    }

    async fn send_tx(&self, to: Address, data: Bytes, opts: SendTxOpts) -> Result<SentTx> {
        let tx = TransactionRequest::default()
            .with_to(to)
            .with_input(data)
            .with_gas_limit(opts.gas_limit)
            .with_from(self.signer_address);

        let pending = self
            .http_provider
            .send_transaction(tx)
            .await
            .map_err(|e| RelayerError::Tx(e.to_string()))?;

        let hash: B256 = *pending.tx_hash();
        let outcome_fut: OutcomeFuture = Box::pin(async move {
            let receipt = pending
                .get_receipt()
                .await
                .map_err(|e| RelayerError::Chain(e.into()))?;
            Ok(if receipt.status() {
                TxOutcome::Confirmed
            } else {
                TxOutcome::Reverted
            })
        });

        Ok(SentTx::new(hash, outcome_fut))
    }
}

