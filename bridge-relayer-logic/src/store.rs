use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::{ChainTag, RelayRecord, TxStatus};

/// Durable mapping from relay-record id to `RelayRecord`, with lookup by either
/// source (`eventHash`) or relay (`relayHash`) hash.
///
/// This crate treats the backing persistence engine as an external collaborator
/// (see the module-level design note): it defines the contract such a store must
/// satisfy and ships [`InMemoryTxStore`] as the reference implementation used by
/// the daemon when no external store is configured and by the test suite.
#[async_trait]
pub trait TxStore: Send + Sync {
    /// Insert-or-update by `id`. Returns the stored record.
    async fn upsert_by_id(&self, record: RelayRecord) -> anyhow::Result<RelayRecord>;

    /// `true` iff any record has `event_hash == h` or `relay_hash == h`.
    async fn hash_exists(&self, hash: &str) -> anyhow::Result<bool>;

    /// First match across `event_hash` or `relay_hash`.
    async fn find_by_hash(&self, hash: &str) -> anyhow::Result<Option<RelayRecord>>;

    /// Sets `status` on the record matching either hash. Returns whether any row
    /// changed. Must not downgrade a terminal status.
    async fn update_status_by_hash(&self, hash: &str, status: TxStatus) -> anyhow::Result<bool>;

    async fn list_all(&self, limit: usize) -> anyhow::Result<Vec<RelayRecord>>;

    async fn list_pending_by_user(&self, user: &str) -> anyhow::Result<Vec<RelayRecord>>;

    async fn list_pending_by_chain(&self, chain: ChainTag) -> anyhow::Result<Vec<RelayRecord>>;

    async fn clear_all(&self) -> anyhow::Result<()>;
}

/// In-memory reference `TxStore`, backed by a single `RwLock<Vec<RelayRecord>>`.
///
/// Not durable across process restarts; suitable for local development and for
/// exercising the dedup/relay pipeline in tests. A production deployment is
/// expected to supply its own `TxStore` implementation backed by a real
/// document store.
#[derive(Default)]
pub struct InMemoryTxStore {
    records: RwLock<Vec<RelayRecord>>,
    next_sequence: AtomicU64,
}

impl InMemoryTxStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TxStore for InMemoryTxStore {
    async fn upsert_by_id(&self, mut record: RelayRecord) -> anyhow::Result<RelayRecord> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            record.sequence = existing.sequence;
            *existing = record.clone();
        } else {
            record.sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
            records.push(record.clone());
        }
        Ok(record)
    }

    async fn hash_exists(&self, hash: &str) -> anyhow::Result<bool> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .any(|r| r.event_hash.as_deref() == Some(hash) || r.relay_hash.as_deref() == Some(hash)))
    }

    async fn find_by_hash(&self, hash: &str) -> anyhow::Result<Option<RelayRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.event_hash.as_deref() == Some(hash) || r.relay_hash.as_deref() == Some(hash))
            .cloned())
    }

    async fn update_status_by_hash(&self, hash: &str, status: TxStatus) -> anyhow::Result<bool> {
        let mut records = self.records.write().await;
        let Some(record) = records
            .iter_mut()
            .find(|r| r.event_hash.as_deref() == Some(hash) || r.relay_hash.as_deref() == Some(hash))
        else {
            return Ok(false);
        };

        if record.status.is_terminal() {
            tracing::warn!(
                hash,
                current = ?record.status,
                attempted = ?status,
                "refusing to downgrade a terminal RelayRecord status"
            );
            return Ok(false);
        }

        record.status = status;
        record.updated_at = record.updated_at.max(record.timestamp);
        Ok(true)
    }

    async fn list_all(&self, limit: usize) -> anyhow::Result<Vec<RelayRecord>> {
        let records = self.records.read().await;
        let mut out: Vec<RelayRecord> = records.clone();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.sequence.cmp(&a.sequence)));
        out.truncate(limit);
        Ok(out)
    }

    async fn list_pending_by_user(&self, user: &str) -> anyhow::Result<Vec<RelayRecord>> {
        let user = RelayRecord::lowercase_user(user);
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.status == TxStatus::Pending && r.user == user)
            .cloned()
            .collect())
    }

    async fn list_pending_by_chain(&self, chain: ChainTag) -> anyhow::Result<Vec<RelayRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.status == TxStatus::Pending && r.chain == chain)
            .cloned()
            .collect())
    }

    async fn clear_all(&self) -> anyhow::Result<()> {
        self.records.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(id: &str, event_hash: Option<&str>, status: TxStatus) -> RelayRecord {
        RelayRecord {
            id: id.to_string(),
            chain: ChainTag::L2,
            kind: crate::model::IntentKind::Buy,
            user: "0xuser".to_string(),
            amount: "1".to_string(),
            source_token: "0xsrc".to_string(),
            dest_token: "0xdst".to_string(),
            event_hash: event_hash.map(|h| h.to_string()),
            relay_hash: Some(format!("relay-{id}")),
            status,
            timestamp: 0,
            created_at: 0,
            updated_at: 0,
            sequence: 0,
        }
    }

    #[tokio::test]
    async fn upsert_by_id_updates_in_place() {
        let store = InMemoryTxStore::new();
        store
            .upsert_by_id(record("1", Some("0xaa"), TxStatus::Pending))
            .await
            .unwrap();
        store
            .upsert_by_id(record("1", Some("0xaa"), TxStatus::Confirmed))
            .await
            .unwrap();
        let all = store.list_all(10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, TxStatus::Confirmed);
    }

    #[tokio::test]
    async fn update_status_by_hash_does_not_downgrade_terminal_state() {
        let store = InMemoryTxStore::new();
        store
            .upsert_by_id(record("x", None, TxStatus::Pending))
            .await
            .unwrap();
        let relay_hash = "relay-x";
        assert!(
            store
                .update_status_by_hash(relay_hash, TxStatus::Confirmed)
                .await
                .unwrap()
        );
        assert!(
            !store
                .update_status_by_hash(relay_hash, TxStatus::Failed)
                .await
                .unwrap()
        );
        let found = store.find_by_hash(relay_hash).await.unwrap().unwrap();
        assert_eq!(found.status, TxStatus::Confirmed);
    }

    #[tokio::test]
    async fn list_all_breaks_created_at_ties_by_insertion_sequence() {
        let store = InMemoryTxStore::new();
        store
            .upsert_by_id(record("1", Some("0xaa"), TxStatus::Pending))
            .await
            .unwrap();
        store
            .upsert_by_id(record("2", Some("0xbb"), TxStatus::Pending))
            .await
            .unwrap();

        let all = store.list_all(10).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn hash_exists_matches_either_event_or_relay_hash() {
        let store = InMemoryTxStore::new();
        store
            .upsert_by_id(record("1", Some("0xevent"), TxStatus::Pending))
            .await
            .unwrap();
        assert!(store.hash_exists("0xevent").await.unwrap());
        assert!(store.hash_exists("relay-1").await.unwrap());
        assert!(!store.hash_exists("0xnope").await.unwrap());
    }
}
