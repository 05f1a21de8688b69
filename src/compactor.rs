use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::store::{StoreError, WalStore};

/// Compact once `threshold` appends have piled up. Returns whether it ran.
pub async fn compact_if_needed(store: &WalStore, threshold: u64) -> Result<bool, StoreError> {
    let appends = store.appends_since_compact().await;
    if appends < threshold {
        return Ok(false);
    }
    let records = store.compact().await?;
    info!(appends, records, "journal compacted");
    Ok(true)
}

/// Background task that checks the journal every `every`.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_needed(&store, threshold).await {
            warn!("journal compaction failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::store::ReservationStore;
    use std::path::PathBuf;

    fn test_journal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("tablebook_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    async fn add_clients(store: &WalStore, n: i64) {
        for id in 0..n {
            store
                .add_client(Client {
                    id,
                    first_name: "Guest".into(),
                    last_name: id.to_string(),
                    id_card: String::new(),
                    phone: String::new(),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn below_threshold_does_nothing() {
        let path = test_journal_path("below_threshold.journal");
        let store = WalStore::open(&path).unwrap();
        add_clients(&store, 3).await;
        assert!(!compact_if_needed(&store, 10).await.unwrap());
        assert_eq!(store.appends_since_compact().await, 3);
    }

    #[tokio::test]
    async fn at_threshold_compacts_and_resets_counter() {
        let path = test_journal_path("at_threshold.journal");
        let store = WalStore::open(&path).unwrap();
        add_clients(&store, 5).await;
        assert!(compact_if_needed(&store, 5).await.unwrap());
        assert_eq!(store.appends_since_compact().await, 0);

        let reopened = WalStore::open(&path).unwrap();
        assert!(reopened.fetch_client(4).await.unwrap().is_some());
    }
}
