use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolCall;

use crate::abi::{AssetsBuyTypedData, AssetsSoldTypedData, IBridgeReads, IErc20, IL1Bridge, IL2Bridge};
use crate::amount;
use crate::chain::{ChainClient, SendTxOpts, TxOutcome};
use crate::dedup::DedupIndex;
use crate::error::{RelayerError, Result};
use crate::metrics::RELAYS_TOTAL;
use crate::model::{ChainTag, Intent, IntentKind, RelayRecord, TxStatus};
use crate::signer::Signer;
use crate::store::TxStore;

/// A destination chain's client handle plus the bridge contract address and
/// gas limit the Relayer submits against.
pub struct ChainEndpoint {
    pub client: Arc<dyn ChainClient>,
    pub bridge: Address,
    pub gas_limit: u64,
}

impl ChainEndpoint {
    pub fn new(client: Arc<dyn ChainClient>, bridge: Address, gas_limit: u64) -> Self {
        Self { client, bridge, gas_limit }
    }
}

/// Executes the Buy (L1→L2) and Sell (L2→L1) relay flows: nonce acquisition,
/// amount normalization, EIP-712 signing, submission, and
/// pending→confirmed/failed lifecycle tracking.
pub struct Relayer {
    l1: ChainEndpoint,
    l2: ChainEndpoint,
    signer: Signer,
    store: Arc<dyn TxStore>,
    dedup: Arc<DedupIndex>,
}

impl Relayer {
    pub fn new(l1: ChainEndpoint, l2: ChainEndpoint, signer: Signer, store: Arc<dyn TxStore>, dedup: Arc<DedupIndex>) -> Self {
        Self { l1, l2, signer, store, dedup }
    }

    pub async fn relay(&self, intent: Intent) -> Result<()> {
        match intent.kind {
            IntentKind::Buy => self.relay_buy(intent).await,
            IntentKind::Sell => self.relay_sell(intent).await,
        }
    }

    async fn relay_buy(&self, intent: Intent) -> Result<()> {
        let user = parse_address(&intent.user)?;
        let source_token = parse_address(&intent.source_token)?;
        let dest_token = parse_address(&intent.dest_token)?;

        let nonce = self.next_nonce(&self.l2, user).await?;
        let decimals = self.decimals(&self.l1, source_token).await?;
        let (normalized_amount, human_amount) = amount::normalize(intent.amount_in, decimals);
        let domain_separator = self.domain_separator(&self.l2).await?;

        let typed_data = AssetsBuyTypedData {
            user,
            l2Token: dest_token,
            // Preserved quirk: the destination contract currently expects a
            // zero `assetIn` field in the signed payload. Do not substitute
            // the real source token here.
            assetIn: Address::ZERO,
            amount: normalized_amount,
            nonce,
            deadline: intent.deadline,
        };
        let sig = self.signer.sign_buy(domain_separator, &typed_data).await?;

        let calldata = IL2Bridge::executeBuyCall {
            user,
            l2Token: dest_token,
            amount: normalized_amount,
            minOut: U256::ZERO,
            nonce,
            deadline: intent.deadline,
            sig,
        }
        .abi_encode();

        let sent = match self
            .l2
            .client
            .send_tx(self.l2.bridge, calldata.into(), SendTxOpts { gas_limit: self.l2.gas_limit })
            .await
        {
            Ok(sent) => sent,
            Err(err) if err.is_already_known() => {
                tracing::warn!(hash = %intent.event_hash, "executeBuy already known, leaving existing relay in place");
                return Ok(());
            }
            Err(err) => {
                tracing::error!(hash = %intent.event_hash, error = %err, "executeBuy submission rejected");
                return Err(err);
            }
        };

        let relay_hash = format!("{:#x}", sent.hash);
        let now = now_millis();
        let record = RelayRecord {
            id: format!("buy:{relay_hash}"),
            chain: ChainTag::L2,
            kind: IntentKind::Buy,
            user: RelayRecord::lowercase_user(&intent.user),
            amount: human_amount,
            source_token: intent.source_token.clone(),
            dest_token: intent.dest_token.clone(),
            event_hash: Some(intent.event_hash.clone()),
            relay_hash: Some(relay_hash.clone()),
            status: TxStatus::Pending,
            timestamp: now,
            created_at: now,
            updated_at: now,
            sequence: 0,
        };
        self.store
            .upsert_by_id(record)
            .await
            .map_err(RelayerError::Chain)?;
        self.dedup.contains_or_add(&relay_hash);
        RELAYS_TOTAL.with_label_values(&["L2", "submitted"]).inc();

        self.await_and_finalize(&relay_hash, sent.wait().await, "L2").await
    }

    async fn relay_sell(&self, intent: Intent) -> Result<()> {
        let user = parse_address(&intent.user)?;
        let dest_token = parse_address(&intent.dest_token)?;

        let nonce = self.next_nonce(&self.l1, user).await?;
        let lp_share = self.lp_share(user, dest_token).await?;
        let domain_separator = self.domain_separator(&self.l1).await?;

        let typed_data = AssetsSoldTypedData {
            user,
            assetToWithdraw: dest_token,
            nonce,
            deadline: intent.deadline,
        };
        let sig = self.signer.sign_sell(domain_separator, &typed_data).await?;

        let calldata = IL1Bridge::withdrawCall {
            user,
            asset: dest_token,
            lpShare: lp_share,
            nonce,
            deadline: intent.deadline,
            sig,
        }
        .abi_encode();

        let sent = match self
            .l1
            .client
            .send_tx(self.l1.bridge, calldata.into(), SendTxOpts { gas_limit: self.l1.gas_limit })
            .await
        {
            Ok(sent) => sent,
            Err(err) if err.is_already_known() => {
                tracing::warn!(hash = %intent.event_hash, "withdraw already known, leaving existing relay in place");
                return Ok(());
            }
            Err(err) => {
                tracing::error!(hash = %intent.event_hash, error = %err, "withdraw submission rejected");
                return Err(err);
            }
        };

        let relay_hash = format!("{:#x}", sent.hash);
        let now = now_millis();
        let (_, human_amount) = amount::normalize(lp_share, 18);
        let record = RelayRecord {
            id: format!("sell:{relay_hash}"),
            chain: ChainTag::L1,
            kind: IntentKind::Sell,
            user: RelayRecord::lowercase_user(&intent.user),
            amount: human_amount,
            source_token: intent.source_token.clone(),
            dest_token: intent.dest_token.clone(),
            event_hash: Some(intent.event_hash.clone()),
            relay_hash: Some(relay_hash.clone()),
            status: TxStatus::Pending,
            timestamp: now,
            created_at: now,
            updated_at: now,
            sequence: 0,
        };
        self.store
            .upsert_by_id(record)
            .await
            .map_err(RelayerError::Chain)?;
        self.dedup.contains_or_add(&relay_hash);
        RELAYS_TOTAL.with_label_values(&["L1", "submitted"]).inc();

        self.await_and_finalize(&relay_hash, sent.wait().await, "L1").await
    }

    async fn await_and_finalize(&self, relay_hash: &str, outcome: Result<TxOutcome>, chain_label: &str) -> Result<()> {
        let status = match outcome {
            Ok(TxOutcome::Confirmed) => TxStatus::Confirmed,
            Ok(TxOutcome::Reverted) => TxStatus::Failed,
            Err(err) => {
                tracing::error!(relay_hash, error = %err, "error waiting for relay receipt");
                return Err(err);
            }
        };
        RELAYS_TOTAL
            .with_label_values(&[chain_label, if status == TxStatus::Confirmed { "confirmed" } else { "failed" }])
            .inc();
        self.store
            .update_status_by_hash(relay_hash, status)
            .await
            .map_err(RelayerError::Chain)?;
        Ok(())
    }

    async fn next_nonce(&self, endpoint: &ChainEndpoint, user: Address) -> Result<U256> {
        let call = IBridgeReads::usedNoncesCall { user };
        let data = endpoint
            .client
            .call_read(endpoint.bridge, call.abi_encode().into())
            .await?;
        let used = IBridgeReads::usedNoncesCall::abi_decode_returns(&data).map_err(|e| RelayerError::Chain(e.into()))?;
        Ok(used + U256::from(1))
    }

    async fn domain_separator(&self, endpoint: &ChainEndpoint) -> Result<B256> {
        let call = IBridgeReads::DOMAIN_SEPARATORCall {};
        let data = endpoint
            .client
            .call_read(endpoint.bridge, call.abi_encode().into())
            .await?;
        IBridgeReads::DOMAIN_SEPARATORCall::abi_decode_returns(&data).map_err(|e| RelayerError::Chain(e.into()))
    }

    async fn decimals(&self, endpoint: &ChainEndpoint, token: Address) -> Result<u8> {
        let call = IErc20::decimalsCall {};
        let data = endpoint.client.call_read(token, call.abi_encode().into()).await?;
        IErc20::decimalsCall::abi_decode_returns(&data).map_err(|e| RelayerError::Chain(e.into()))
    }

    async fn lp_share(&self, user: Address, asset: Address) -> Result<U256> {
        let call = IBridgeReads::getUserLpShareCall { user, asset };
        let data = self
            .l1
            .client
            .call_read(self.l1.bridge, call.abi_encode().into())
            .await?;
        IBridgeReads::getUserLpShareCall::abi_decode_returns(&data).map_err(|e| RelayerError::Chain(e.into()))
    }
}

fn parse_address(s: &str) -> Result<Address> {
    Address::from_str(s).map_err(|e| RelayerError::Chain(anyhow::anyhow!("invalid address {s}: {e}")))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::TxOutcome;
    use crate::store::InMemoryTxStore;
    use crate::test_utils::MockChainClient;
    use alloy::primitives::{address, keccak256};
    use alloy::signers::local::PrivateKeySigner;

    fn test_signer() -> Signer {
        let wallet: PrivateKeySigner = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
            .parse()
            .unwrap();
        Signer::new(wallet)
    }

    fn encoded_u256(value: U256) -> alloy::primitives::Bytes {
        alloy::primitives::Bytes::from(value.to_be_bytes_vec())
    }

    fn encoded_u8(value: u8) -> alloy::primitives::Bytes {
        alloy::primitives::Bytes::from(U256::from(value).to_be_bytes_vec())
    }

    fn encoded_b256(value: B256) -> alloy::primitives::Bytes {
        alloy::primitives::Bytes::from(value.to_vec())
    }

    #[tokio::test]
    async fn end_to_end_buy_normalizes_amount_and_marks_confirmed() {
        let l1_mock = Arc::new(MockChainClient::new());
        // decimals(assetIn) == 6
        l1_mock.push_read_response(Ok(encoded_u8(6)));

        let l2_mock = Arc::new(MockChainClient::new());
        // usedNonces(user) == 4
        l2_mock.push_read_response(Ok(encoded_u256(U256::from(4))));
        // DOMAIN_SEPARATOR()
        let domain_separator = keccak256(b"test-domain");
        l2_mock.push_read_response(Ok(encoded_b256(domain_separator)));
        let tx_hash = B256::from_slice(&[0x11; 32]);
        l2_mock.push_send_outcome(Ok((tx_hash, TxOutcome::Confirmed)));

        let l1 = ChainEndpoint::new(l1_mock.clone(), address!("0x1000000000000000000000000000000000000a"), 500_000);
        let l2 = ChainEndpoint::new(l2_mock.clone(), address!("0x2000000000000000000000000000000000000b"), 500_000);

        let store: Arc<dyn TxStore> = Arc::new(InMemoryTxStore::new());
        let dedup = Arc::new(DedupIndex::new());
        let relayer = Relayer::new(l1, l2, test_signer(), store.clone(), dedup.clone());

        let intent = Intent {
            kind: IntentKind::Buy,
            user: "0x3000000000000000000000000000000000000c".to_string(),
            source_token: "0x4000000000000000000000000000000000000d".to_string(),
            dest_token: "0x5000000000000000000000000000000000000e".to_string(),
            amount_in: U256::from(1_000_000u64),
            deadline: U256::from(9_999_999_999u64),
            event_hash: "0xaaaa".to_string(),
        };

        relayer.relay(intent).await.unwrap();

        let all = store.list_all(10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].amount, "1");
        assert_eq!(all[0].status, TxStatus::Confirmed);
        assert_eq!(all[0].chain, ChainTag::L2);

        let sent_calls = l2_mock.sent_calls.lock().unwrap();
        assert_eq!(sent_calls.len(), 1);
        let decoded = IL2Bridge::executeBuyCall::abi_decode(&sent_calls[0].1).unwrap();
        assert_eq!(decoded.amount, U256::from(1_000_000_000_000_000_000u128));
        assert_eq!(decoded.nonce, U256::from(5));
    }

    #[tokio::test]
    async fn already_known_submission_error_is_not_treated_as_failure() {
        let l1_mock = Arc::new(MockChainClient::new());
        l1_mock.push_read_response(Ok(encoded_u8(18)));

        let l2_mock = Arc::new(MockChainClient::new());
        l2_mock.push_read_response(Ok(encoded_u256(U256::ZERO)));
        l2_mock.push_read_response(Ok(encoded_b256(keccak256(b"d"))));
        l2_mock.push_send_outcome(Err(RelayerError::Tx("already known".to_string())));

        let l1 = ChainEndpoint::new(l1_mock, address!("0x1000000000000000000000000000000000000a"), 500_000);
        let l2 = ChainEndpoint::new(l2_mock, address!("0x2000000000000000000000000000000000000b"), 500_000);
        let store: Arc<dyn TxStore> = Arc::new(InMemoryTxStore::new());
        let dedup = Arc::new(DedupIndex::new());
        let relayer = Relayer::new(l1, l2, test_signer(), store.clone(), dedup);

        let intent = Intent {
            kind: IntentKind::Buy,
            user: "0x3000000000000000000000000000000000000c".to_string(),
            source_token: "0x4000000000000000000000000000000000000d".to_string(),
            dest_token: "0x5000000000000000000000000000000000000e".to_string(),
            amount_in: U256::from(1u64),
            deadline: U256::from(1u64),
            event_hash: "0xbbbb".to_string(),
        };

        relayer.relay(intent).await.unwrap();
        assert!(store.list_all(10).await.unwrap().is_empty());
    }
}
