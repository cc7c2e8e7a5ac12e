use async_trait::async_trait;
use dashmap::DashMap;

use super::QuotaStore;
use crate::error::StoreError;
use crate::models::{QuotaMap, QuotaRecord};

// Process-lifetime store, nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, QuotaRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> Result<QuotaMap, StoreError> {
        Ok(self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    async fn save(&self, quotas: &QuotaMap) -> Result<(), StoreError> {
        self.entries.retain(|key, _| quotas.contains_key(key));
        for (key, record) in quotas {
            self.entries.insert(key.clone(), record.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn save_replaces_the_whole_mapping() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut first = QuotaMap::new();
        first.insert("a".into(), QuotaRecord::fresh(now, chrono::Duration::hours(1)));
        first.insert("b".into(), QuotaRecord::fresh(now, chrono::Duration::hours(1)));
        store.save(&first).await.unwrap();

        let mut second = QuotaMap::new();
        second.insert("b".into(), QuotaRecord { count: 5, window_reset_at: now });
        store.save(&second).await.unwrap();

        assert_eq!(store.load().await.unwrap(), second);
    }

    #[tokio::test]
    async fn new_store_is_empty() {
        assert!(MemoryStore::new().load().await.unwrap().is_empty());
    }
}
