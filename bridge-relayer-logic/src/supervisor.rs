use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use alloy::rpc::types::{Filter, Log};
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chain::ChainClient;
use crate::metrics::SUPERVISOR_RECONNECT_ATTEMPTS;
use crate::settings::ChainSettings;

/// Owns one `ChainClient`'s lifecycle for one chain: setup, health ticking,
/// exponential-backoff reconnection with a hard attempt cap, and shutdown.
///
/// Modeled on the health-task/cooldown bookkeeping of a provider pool: a
/// single background task alternates between "healthy, ticking" and
/// "unhealthy, backing off" states, generalized here from node cooldown to a
/// hard cap that stops the component once exhausted.
pub struct Supervisor {
    chain_label: &'static str,
    client: Arc<dyn ChainClient>,
    settings: ChainSettings,
    cancel: CancellationToken,
    attempts: AtomicU32,
    /// Chain id last observed on a health tick, used to detect a
    /// `network-changed` transport event (the endpoint switching networks
    /// underneath an existing connection). `None` until the first successful
    /// probe, so the first observation never counts as a change.
    last_chain_id: Mutex<Option<u64>>,
}

/// A log observed through the live subscription, forwarded to whatever
/// ingests it (the `EventIngestor`).
pub type LogReceiver = mpsc::Receiver<Log>;

impl Supervisor {
    pub fn new(chain_label: &'static str, client: Arc<dyn ChainClient>, settings: ChainSettings) -> Self {
        Self {
            chain_label,
            client,
            settings,
            cancel: CancellationToken::new(),
            attempts: AtomicU32::new(0),
            last_chain_id: Mutex::new(None),
        }
    }

    /// Establishes the streaming subscription for `filter` and spawns the
    /// health-tick/reconnect task. Returns a channel of logs observed on the
    /// live stream; the `HistoricalBackfiller` is the separate recovery path
    /// for anything this stream drops.
    pub async fn start(self: Arc<Self>, filter: Filter) -> LogReceiver {
        let (tx, rx) = mpsc::channel(1024);

        if let Ok(stream) = self.client.subscribe_logs(filter.clone()).await {
            self.forward_stream(stream, tx.clone());
        } else {
            tracing::warn!(chain = self.chain_label, "initial subscription failed; health tick will reconnect");
        }

        let supervisor = self.clone();
        tokio::spawn(async move { supervisor.run_health_loop(filter, tx).await });

        rx
    }

    fn forward_stream(self: &Arc<Self>, mut stream: BoxStream<'static, Log>, tx: mpsc::Sender<Log>) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    log = futures::StreamExt::next(&mut stream) => {
                        match log {
                            Some(log) => {
                                if tx.send(log).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        });
    }

    async fn run_health_loop(self: Arc<Self>, filter: Filter, tx: mpsc::Sender<Log>) {
        let mut ticker = tokio::time::interval(self.settings.health_check_interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!(chain = self.chain_label, "supervisor shutdown requested");
                    return;
                }
                _ = ticker.tick() => {
                    match self.client.block_number().await {
                        Ok(_) => {
                            if self.attempts.swap(0, Ordering::SeqCst) != 0 {
                                SUPERVISOR_RECONNECT_ATTEMPTS
                                    .with_label_values(&[self.chain_label])
                                    .set(0);
                                tracing::info!(chain = self.chain_label, "health tick recovered, retry counter reset");
                            }
                            self.check_network_change().await;
                        }
                        Err(err) => {
                            tracing::warn!(chain = self.chain_label, error = %err, "health tick failed, reconnecting");
                            if !self.reconnect_with_backoff(&filter, &tx).await {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Probes the endpoint's chain id and compares it against the last
    /// observed value. A change — the endpoint now reporting a different
    /// network than it did on a prior healthy tick — is a `network-changed`
    /// transport event: it is logged and the retry counter is reset, but it
    /// does *not* go through `reconnect_with_backoff`, since the transport
    /// itself is still responding, just to a different chain. A failed
    /// probe is not itself treated as a connection failure here; the health
    /// tick's own `block_number` call is the liveness signal.
    async fn check_network_change(&self) {
        match self.client.chain_id().await {
            Ok(observed) => {
                self.note_chain_id(observed);
            }
            Err(err) => {
                tracing::debug!(chain = self.chain_label, error = %err, "chain-id probe failed, skipping network-change check this tick");
            }
        }
    }

    /// Records an observed chain id, returning `true` if it differs from the
    /// previously observed one (and resetting the retry counter as a side
    /// effect). Split out from `check_network_change` so the compare/reset
    /// logic is testable without driving it through an async `ChainClient`.
    fn note_chain_id(&self, observed: u64) -> bool {
        let mut last = self.last_chain_id.lock().unwrap();
        let changed = matches!(*last, Some(previous) if previous != observed);
        if changed {
            tracing::warn!(
                chain = self.chain_label,
                previous = last.unwrap(),
                current = observed,
                "network-changed: chain id changed on an existing connection, resetting retry counter"
            );
            self.attempts.store(0, Ordering::SeqCst);
            SUPERVISOR_RECONNECT_ATTEMPTS.with_label_values(&[self.chain_label]).set(0);
        }
        *last = Some(observed);
        changed
    }

    /// Runs the exponential-backoff reconnect sequence: base 2s, exponent =
    /// attempt count, capped at `max_reconnect_attempts`. Returns `false` once
    /// the cap is reached (caller stops the supervisor for this chain).
    async fn reconnect_with_backoff(self: &Arc<Self>, filter: &Filter, tx: &mpsc::Sender<Log>) -> bool {
        loop {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            SUPERVISOR_RECONNECT_ATTEMPTS
                .with_label_values(&[self.chain_label])
                .set(attempt as i64);

            if attempt > self.settings.max_reconnect_attempts {
                tracing::error!(
                    chain = self.chain_label,
                    attempts = attempt - 1,
                    "reconnect attempt cap reached, halting supervisor for this chain"
                );
                self.cancel.cancel();
                return false;
            }

            let delay = self.settings.reconnect_base_delay * 2u32.pow(attempt - 1);
            tracing::warn!(chain = self.chain_label, attempt, delay_secs = delay.as_secs(), "scheduling reconnect");
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.client.subscribe_logs(filter.clone()).await {
                Ok(stream) => {
                    self.forward_stream(stream, tx.clone());
                    tracing::info!(chain = self.chain_label, attempt, "reconnect succeeded");
                    return true;
                }
                Err(err) => {
                    tracing::warn!(chain = self.chain_label, attempt, error = %err, "reconnect attempt failed");
                }
            }
        }
    }

    /// Idempotent shutdown: cancels the health loop and any in-flight stream
    /// forwarders. Safe to call more than once.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayerError;
    use crate::test_utils::MockChainClient;

    #[test]
    fn backoff_schedule_matches_base_two_exponent_attempt_count() {
        let base = Duration::from_secs(2);
        let expected = [2u64, 4, 8, 16, 32, 64, 128, 256, 512, 1024];
        for (i, exp) in expected.iter().enumerate() {
            let attempt = (i + 1) as u32;
            let delay = base * 2u32.pow(attempt - 1);
            assert_eq!(delay, Duration::from_secs(*exp));
        }
    }

    fn test_settings() -> ChainSettings {
        ChainSettings::new("https://example.org", "0x0000000000000000000000000000000000000000")
    }

    /// 10 consecutive reconnect failures scheduled at
    /// 2s, 4s, 8s, ..., 1024s; the 11th attempt is never scheduled and the
    /// supervisor halts. Runs under a paused clock so the real (multi-hour)
    /// backoff schedule resolves instantly instead of sleeping wall-clock time.
    #[tokio::test(start_paused = true)]
    async fn reconnect_cap_halts_after_ten_attempts() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let client = Arc::new(MockChainClient::new());
        for _ in 0..10 {
            client.push_subscribe_outcome(Err(RelayerError::Connection(anyhow::anyhow!("transport dead"))));
        }
        let client: Arc<dyn ChainClient> = client;

        let supervisor = Arc::new(Supervisor::new("L1", client, test_settings()));
        let (tx, _rx) = mpsc::channel(16);
        let filter = Filter::new();

        let reconnected = supervisor.reconnect_with_backoff(&filter, &tx).await;

        assert!(!reconnected, "11th attempt must never be scheduled");
        assert_eq!(supervisor.reconnect_attempts(), 10);
        assert!(supervisor.cancel.is_cancelled(), "cap reached: this chain's supervisor halts");
    }

    /// A second chain's Supervisor is an independent task with its own
    /// `CancellationToken`; hitting the cap on one leaves the other running.
    #[tokio::test(start_paused = true)]
    async fn reconnect_cap_on_one_chain_does_not_affect_another() {
        let failing_client = Arc::new(MockChainClient::new());
        for _ in 0..10 {
            failing_client.push_subscribe_outcome(Err(RelayerError::Connection(anyhow::anyhow!("transport dead"))));
        }
        let failing_client: Arc<dyn ChainClient> = failing_client;
        let l1 = Arc::new(Supervisor::new("L1", failing_client, test_settings()));
        let (tx, _rx) = mpsc::channel(16);
        l1.reconnect_with_backoff(&Filter::new(), &tx).await;
        assert!(l1.cancel.is_cancelled());

        let healthy_client: Arc<dyn ChainClient> = Arc::new(MockChainClient::new());
        let l2 = Supervisor::new("L2", healthy_client, test_settings());
        assert!(!l2.cancel.is_cancelled());
        assert_eq!(l2.reconnect_attempts(), 0);
    }

    /// First observation establishes the baseline and must not itself count
    /// as a network change (there was nothing to compare against).
    #[test]
    fn first_chain_id_observation_is_not_a_network_change() {
        let client: Arc<dyn ChainClient> = Arc::new(MockChainClient::new());
        let supervisor = Supervisor::new("L1", client, test_settings());
        assert!(!supervisor.note_chain_id(1));
        assert_eq!(supervisor.reconnect_attempts(), 0);
    }

    /// A `network-changed` transport event (chain id transition after an
    /// existing network was known) logs and resets the retry counter,
    /// distinct from the `error`/health-tick-failure reconnect path — it
    /// never calls `reconnect_with_backoff`.
    #[test]
    fn chain_id_change_after_a_known_network_resets_retry_counter_without_reconnecting() {
        let client: Arc<dyn ChainClient> = Arc::new(MockChainClient::new());
        let supervisor = Supervisor::new("L1", client, test_settings());
        supervisor.attempts.store(4, Ordering::SeqCst);

        assert!(!supervisor.note_chain_id(1), "baseline observation");
        assert_eq!(supervisor.reconnect_attempts(), 4, "baseline must not reset an unrelated counter");

        assert!(supervisor.note_chain_id(2), "chain id changed from the known baseline");
        assert_eq!(supervisor.reconnect_attempts(), 0);
        assert!(!supervisor.cancel.is_cancelled(), "network-changed never halts the supervisor");
    }

    /// Repeating the same chain id is a no-op: no reset, no log-worthy change.
    #[test]
    fn repeated_chain_id_is_not_a_network_change() {
        let client: Arc<dyn ChainClient> = Arc::new(MockChainClient::new());
        let supervisor = Supervisor::new("L1", client, test_settings());
        supervisor.attempts.store(3, Ordering::SeqCst);

        supervisor.note_chain_id(7);
        assert!(!supervisor.note_chain_id(7));
        assert_eq!(supervisor.reconnect_attempts(), 3);
    }

    /// End-to-end through `check_network_change`, driven by the same
    /// `ChainClient::chain_id` probe the health tick uses.
    #[tokio::test]
    async fn check_network_change_resets_counter_on_observed_chain_id_change() {
        let client = Arc::new(MockChainClient::new());
        client.push_chain_id(Ok(1));
        client.push_chain_id(Ok(1337));
        let client: Arc<dyn ChainClient> = client;

        let supervisor = Supervisor::new("L1", client, test_settings());
        supervisor.attempts.store(6, Ordering::SeqCst);

        supervisor.check_network_change().await;
        assert_eq!(supervisor.reconnect_attempts(), 6, "first probe just sets the baseline");

        supervisor.check_network_change().await;
        assert_eq!(supervisor.reconnect_attempts(), 0, "second probe observed a changed chain id");
    }
}
