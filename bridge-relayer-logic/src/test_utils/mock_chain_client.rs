use std::collections::VecDeque;
use std::sync::Mutex;

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::{Filter, Log};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::chain::{ChainClient, SendTxOpts, SentTx, TxOutcome};
use crate::error::{RelayerError, Result};

/// Programmable `ChainClient` double. Each queue is drained front-to-back by
/// the corresponding method; an empty queue yields a `RelayerError::Chain`
/// so a test that over-calls a method fails loudly instead of hanging.
#[derive(Default)]
pub struct MockChainClient {
    block_numbers: Mutex<VecDeque<Result<u64>>>,
    chain_ids: Mutex<VecDeque<Result<u64>>>,
    log_batches: Mutex<VecDeque<Vec<Log>>>,
    subscribe_outcomes: Mutex<VecDeque<Result<Vec<Log>>>>,
    read_responses: Mutex<VecDeque<Result<Bytes>>>,
    send_outcomes: Mutex<VecDeque<Result<(TxHash, TxOutcome)>>>,
    pub sent_calls: Mutex<Vec<(Address, Bytes)>>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_block_number(&self, result: Result<u64>) {
        self.block_numbers.lock().unwrap().push_back(result);
    }

    /// Queues one `chain_id` outcome, returned in order on successive calls.
    /// Lets a test simulate a `network-changed` transport event by queuing a
    /// sequence of differing chain ids.
    pub fn push_chain_id(&self, result: Result<u64>) {
        self.chain_ids.lock().unwrap().push_back(result);
    }

    /// Queues one backfill/query_logs batch, returned in order on successive calls.
    pub fn push_log_batch(&self, logs: Vec<Log>) {
        self.log_batches.lock().unwrap().push_back(logs);
    }

    /// Queues one `subscribe_logs` outcome, returned in order on successive
    /// calls. Lets a test drive repeated reconnect failures (`Err`) followed
    /// by a recovering subscription (`Ok`), independent of `query_logs`'s
    /// `log_batches` queue.
    pub fn push_subscribe_outcome(&self, result: Result<Vec<Log>>) {
        self.subscribe_outcomes.lock().unwrap().push_back(result);
    }

    pub fn push_read_response(&self, result: Result<Bytes>) {
        self.read_responses.lock().unwrap().push_back(result);
    }

    pub fn push_send_outcome(&self, result: Result<(TxHash, TxOutcome)>) {
        self.send_outcomes.lock().unwrap().push_back(result);
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn block_number(&self) -> Result<u64> {
        self.block_numbers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RelayerError::Connection(anyhow::anyhow!("no block number queued"))))
    }

    async fn chain_id(&self) -> Result<u64> {
        self.chain_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RelayerError::Connection(anyhow::anyhow!("no chain id queued"))))
    }

    async fn query_logs(&self, _filter: Filter) -> Result<Vec<Log>> {
        Ok(self.log_batches.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn subscribe_logs(&self, _filter: Filter) -> Result<BoxStream<'static, Log>> {
        let queued = self.subscribe_outcomes.lock().unwrap().pop_front();
        let batch = match queued {
            Some(outcome) => outcome?,
            None => self.log_batches.lock().unwrap().pop_front().unwrap_or_default(),
        };
        Ok(stream::iter(batch).boxed())
    }

    async fn call_read(&self, _to: Address, _data: Bytes) -> Result<Bytes> {
        self.read_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RelayerError::Chain(anyhow::anyhow!("no read response queued"))))
    }

    async fn send_tx(&self, to: Address, data: Bytes, _opts: SendTxOpts) -> Result<SentTx> {
        self.sent_calls.lock().unwrap().push((to, data));
        let outcome = self
            .send_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RelayerError::Tx("no send outcome queued".to_string())))?;
        let (hash, outcome) = outcome;
        Ok(SentTx::new(hash, Box::pin(async move { Ok(outcome) })))
    }
}
