use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AncestorBuilder, AncestorItem, AncestorTree};
use crate::error::Result;
use crate::types::ItemId;

/// Request-scoped builder: resolve the whole working set once with
/// [`prefetch`](Self::prefetch), then answer the per-item lookups that
/// follow from memory.
pub struct PrefetchingAncestorBuilder {
    inner: Arc<dyn AncestorBuilder>,
    memo: RwLock<HashMap<ItemId, Vec<AncestorItem>>>,
}

impl PrefetchingAncestorBuilder {
    pub fn new(inner: Arc<dyn AncestorBuilder>) -> Self {
        Self {
            inner,
            memo: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve and memoise the full ancestor closure of `item_ids`.
    pub async fn prefetch(&self, item_ids: &[ItemId]) -> Result<()> {
        let tree = self.get_ancestors(item_ids).await?;
        tracing::debug!(
            target: "item_hierarchy.ancestors",
            requested = item_ids.len(),
            prefetched = tree.len(),
            "ancestors prefetched"
        );
        Ok(())
    }

    pub async fn memoised(&self) -> usize {
        self.memo.read().await.len()
    }
}

#[async_trait]
impl AncestorBuilder for PrefetchingAncestorBuilder {
    async fn get_parents(&self, item_ids: &[ItemId]) -> Result<AncestorTree> {
        let mut tree = AncestorTree::new();
        let mut to_fetch = Vec::new();
        {
            let memo = self.memo.read().await;
            for item_id in item_ids {
                match memo.get(item_id) {
                    Some(parents) => tree.insert(item_id.clone(), parents.clone()),
                    None => to_fetch.push(item_id.clone()),
                }
            }
        }
        if to_fetch.is_empty() {
            return Ok(tree);
        }

        let fetched = self.inner.get_parents(&to_fetch).await?;
        let mut memo = self.memo.write().await;
        for item_id in fetched.item_ids() {
            memo.insert(item_id.clone(), fetched.parents_of(item_id).to_vec());
        }
        tree.merge(fetched);
        Ok(tree)
    }

    async fn flush_cache(&self, item_id: &ItemId) -> Result<()> {
        self.memo.write().await.remove(item_id);
        self.inner.flush_cache(item_id).await
    }
}
