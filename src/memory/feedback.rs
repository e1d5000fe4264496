use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::inheritance::ReaderFeedbackConfig;
use crate::ports::FeedbackConfigStore;
use crate::types::ItemId;

#[derive(Default)]
pub struct InMemoryFeedbackConfigStore {
    configs: RwLock<HashMap<ItemId, ReaderFeedbackConfig>>,
}

impl InMemoryFeedbackConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedbackConfigStore for InMemoryFeedbackConfigStore {
    async fn get_for_items(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, ReaderFeedbackConfig>> {
        let configs = self.configs.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| configs.get(id).map(|c| (id.clone(), *c)))
            .collect())
    }

    /// Fields left unset in `config` keep their stored value.
    async fn upsert(&self, id: &ItemId, config: ReaderFeedbackConfig) -> Result<ReaderFeedbackConfig> {
        let mut configs = self.configs.write().await;
        let stored = configs.entry(id.clone()).or_default();
        if config.reader_comments_enabled.is_some() {
            stored.reader_comments_enabled = config.reader_comments_enabled;
        }
        if config.reader_rating_enabled.is_some() {
            stored.reader_rating_enabled = config.reader_rating_enabled;
        }
        if config.read_confirmation_enabled.is_some() {
            stored.read_confirmation_enabled = config.read_confirmation_enabled;
        }
        Ok(*stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_merges_set_fields() {
        let store = InMemoryFeedbackConfigStore::new();
        let id = ItemId::from("col");
        store
            .upsert(
                &id,
                ReaderFeedbackConfig {
                    reader_comments_enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let merged = store
            .upsert(
                &id,
                ReaderFeedbackConfig {
                    reader_rating_enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(merged.reader_comments_enabled, Some(false));
        assert_eq!(merged.reader_rating_enabled, Some(true));
        assert_eq!(store.get_for_item(&id).await.unwrap(), Some(merged));
    }
}
