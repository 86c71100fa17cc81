use super::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-process append-only table with the same read semantics as the remote store.
///
/// Backs the development server and the tests. Rows are stored as raw JSON so
/// malformed rows can be injected and decoded the same way remote rows are.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<Value>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row exactly as given, bypassing [`RowWrite`]
    pub async fn append_raw(&self, row: Value) {
        self.rows.write().await.push(row);
    }

    /// Snapshot of the raw table
    pub async fn raw_rows(&self) -> Vec<Value> {
        self.rows.read().await.clone()
    }

    /// Number of `fetch_rows` calls issued so far, including failed ones
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `append` calls issued so far, including failed ones
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn append(&self, row: &RowWrite) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let value = serde_json::to_value(row).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.rows.write().await.push(value);
        Ok(())
    }

    async fn fetch_rows(&self, _game_code: Option<&str>) -> StoreResult<Vec<PlayerScoreRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let rows = self.rows.read().await.clone();
        Ok(decode_rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoleTag;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_then_fetch() {
        let store = MemoryStore::new();
        store
            .append(&RowWrite::registration("1234", "Sara", &RoleTag::Player))
            .await
            .unwrap();
        store.append_raw(json!({"gaming": 1234, "player_name": "Omar", "score": "00:40"})).await;

        let rows = store.fetch_rows(None).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].player_name, "Sara");
        assert_eq!(rows[1].elapsed, ElapsedTime::Finished(40_000));
        assert_eq!(store.read_count(), 1);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_and_counts() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(store.fetch_rows(None).await.is_err());
        assert!(store
            .append(&RowWrite::game_start("1234"))
            .await
            .is_err());
        assert_eq!(store.read_count(), 1);
        assert_eq!(store.write_count(), 1);
        assert!(store.raw_rows().await.is_empty());
    }
}
