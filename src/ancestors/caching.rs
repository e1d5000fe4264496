use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{AncestorBuilder, AncestorItem, AncestorTree};
use crate::config::HierarchyConfig;
use crate::error::Result;
use crate::ports::Cache;
use crate::types::ItemId;

/// Keeps each item's direct parents in the shared cache. Entries live until
/// [`AncestorBuilder::flush_cache`] removes them, whichever instance issues
/// the flush. Nothing is memoised locally; request-scoped memoising belongs
/// to [`super::PrefetchingAncestorBuilder`].
///
/// Cache failures degrade to misses: the wrapped builder is always the
/// source of truth.
pub struct CachingAncestorBuilder {
    inner: Arc<dyn AncestorBuilder>,
    cache: Arc<dyn Cache>,
    config: HierarchyConfig,
}

impl CachingAncestorBuilder {
    pub fn new(inner: Arc<dyn AncestorBuilder>, cache: Arc<dyn Cache>, config: &HierarchyConfig) -> Self {
        Self {
            inner,
            cache,
            config: config.clone(),
        }
    }

    fn key(&self, item_id: &ItemId) -> String {
        self.config.ancestor_cache_key(item_id.as_str())
    }

    async fn read_cache(&self, item_ids: &[ItemId]) -> HashMap<ItemId, Vec<AncestorItem>> {
        let keys: Vec<String> = item_ids.iter().map(|id| self.key(id)).collect();
        let values = match self.cache.get_many(&keys).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(
                    target: "item_hierarchy.ancestors",
                    error = %e,
                    keys = keys.len(),
                    "ancestor cache read failed; treating as miss"
                );
                return HashMap::new();
            }
        };

        let mut found = HashMap::new();
        for ((item_id, key), value) in item_ids.iter().zip(&keys).zip(values) {
            let Some(raw) = value else { continue };
            match serde_json::from_str::<Vec<AncestorItem>>(&raw) {
                Ok(parents) => {
                    found.insert(item_id.clone(), parents);
                }
                Err(e) => {
                    tracing::warn!(
                        target: "item_hierarchy.ancestors",
                        key = %key,
                        error = %e,
                        "discarding unreadable ancestor cache entry"
                    );
                }
            }
        }
        found
    }

    async fn write_cache(&self, fetched: &AncestorTree) -> Result<()> {
        let mut entries = Vec::with_capacity(fetched.len());
        for item_id in fetched.item_ids() {
            let value = serde_json::to_string(fetched.parents_of(item_id))?;
            entries.push((self.key(item_id), value));
        }
        if let Err(e) = self.cache.set_many(entries).await {
            tracing::warn!(
                target: "item_hierarchy.ancestors",
                error = %e,
                "ancestor cache write failed"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl AncestorBuilder for CachingAncestorBuilder {
    async fn get_parents(&self, item_ids: &[ItemId]) -> Result<AncestorTree> {
        let mut unique: Vec<ItemId> = item_ids.to_vec();
        unique.sort();
        unique.dedup();

        let mut from_cache = self.read_cache(&unique).await;
        let mut tree = AncestorTree::new();
        let mut uncached = Vec::new();
        for item_id in unique {
            match from_cache.remove(&item_id) {
                Some(parents) => tree.insert(item_id, parents),
                None => uncached.push(item_id),
            }
        }

        tracing::debug!(
            target: "item_hierarchy.ancestors",
            hits = tree.len(),
            misses = uncached.len(),
            "ancestor cache lookup"
        );
        if uncached.is_empty() {
            return Ok(tree);
        }

        let fetched = self.inner.get_parents(&uncached).await?;
        self.write_cache(&fetched).await?;
        tree.merge(fetched);
        Ok(tree)
    }

    async fn flush_cache(&self, item_id: &ItemId) -> Result<()> {
        let key = self.key(item_id);
        self.cache.del(&key).await?;
        tracing::debug!(target: "item_hierarchy.ancestors", key = %key, "ancestor cache entry flushed");
        self.inner.flush_cache(item_id).await
    }
}
