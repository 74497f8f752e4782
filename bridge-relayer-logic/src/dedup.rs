use dashmap::DashSet;

/// In-memory set of source/relay hashes already accepted for relay, seeded from
/// `TxStore` on startup. The durable truth remains the store; this is a fast path
/// that must tolerate being lost across restarts.
#[derive(Debug, Default)]
pub struct DedupIndex {
    hashes: DashSet<String>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the index from an iterator of known hashes, typically `TxStore::list_all`'s
    /// `event_hash`/`relay_hash` columns at startup.
    pub fn seed(&self, hashes: impl IntoIterator<Item = String>) {
        for hash in hashes {
            self.hashes.insert(hash);
        }
    }

    /// Atomic test-and-set: returns `true` if `hash` was already present, `false`
    /// if this call just added it. This is the linearization point for a given
    /// hash under concurrent ingestion.
    pub fn contains_or_add(&self, hash: &str) -> bool {
        !self.hashes.insert(hash.to_string())
    }

    pub fn size(&self) -> usize {
        self.hashes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_insert_reports_absent_second_reports_present() {
        let index = DedupIndex::new();
        assert!(!index.contains_or_add("0xaa"));
        assert!(index.contains_or_add("0xaa"));
        assert_eq!(index.size(), 1);
    }

    #[test]
    fn seed_makes_existing_hashes_present() {
        let index = DedupIndex::new();
        index.seed(["0xbb".to_string(), "0xcc".to_string()]);
        assert!(index.contains_or_add("0xbb"));
        assert!(index.contains_or_add("0xcc"));
        assert_eq!(index.size(), 2);
    }

    #[tokio::test]
    async fn concurrent_contains_or_add_admits_exactly_one_winner() {
        let index = Arc::new(DedupIndex::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let index = index.clone();
            handles.push(tokio::spawn(async move { index.contains_or_add("0xdd") }));
        }
        let mut winners = 0;
        for handle in handles {
            if !handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
