use super::{CacheResult, PaymentStatusOverride, StatusOverrideStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local override store.
///
/// Uses `Arc<RwLock<HashMap<String, PaymentStatusOverride>>>` so request
/// handlers and the webhook receiver can share one instance. Contents are
/// lost on restart and never evicted; suitable for a single instance.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStatusStore {
    entries: Arc<RwLock<HashMap<String, PaymentStatusOverride>>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusOverrideStore for InMemoryStatusStore {
    async fn set(&self, payment_id: &str, status: &str) -> CacheResult<PaymentStatusOverride> {
        let entry = PaymentStatusOverride::new(payment_id, status);
        let mut entries = self.entries.write().await;
        entries.insert(payment_id.to_string(), entry.clone());
        debug!("Status override stored: payment_id={}, status={}", payment_id, status);
        Ok(entry)
    }

    async fn get(&self, payment_id: &str) -> CacheResult<Option<PaymentStatusOverride>> {
        let entries = self.entries.read().await;
        Ok(entries.get(payment_id).cloned())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_unknown_id_is_absent() {
        let store = InMemoryStatusStore::new();
        assert_eq!(store.get("123").await.unwrap(), None);
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = InMemoryStatusStore::new();
        let written = store.set("123", "approved").await.unwrap();

        let read = store.get("123").await.unwrap().unwrap();
        assert_eq!(read, written);
        assert_eq!(read.status, "approved");
        assert_eq!(read.payment_id, "123");
    }

    #[tokio::test]
    async fn test_second_write_replaces_first() {
        let store = InMemoryStatusStore::new();
        let first = store.set("123", "pending").await.unwrap();
        let second = store.set("123", "rejected").await.unwrap();

        let read = store.get("123").await.unwrap().unwrap();
        assert_eq!(read.status, "rejected");
        assert_eq!(read.updated_at, second.updated_at);
        assert!(read.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_accepts_any_status_string() {
        let store = InMemoryStatusStore::new();
        store.set("abc", "charged_back").await.unwrap();
        store.set("def", "").await.unwrap();

        assert_eq!(store.get("abc").await.unwrap().unwrap().status, "charged_back");
        assert_eq!(store.get("def").await.unwrap().unwrap().status, "");
    }

    #[tokio::test]
    async fn test_concurrent_writers_keep_one_entry_per_id() {
        let store = InMemoryStatusStore::new();
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("pay_{}", i % 5);
                store.set(&id, "approved").await.unwrap();
                store.get(&id).await.unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
        for i in 0..5 {
            let id = format!("pay_{}", i);
            assert_eq!(store.get(&id).await.unwrap().unwrap().payment_id, id);
        }
        assert_eq!(store.get("pay_5").await.unwrap(), None);
    }
}
