use std::sync::Arc;

use async_trait::async_trait;

use super::{AncestorBuilder, AncestorItem, AncestorTree};
use crate::config::ANCESTOR_LOOKUP_PAGE_SIZE;
use crate::error::Result;
use crate::ports::ItemStore;
use crate::types::ItemId;

/// Asks the item store which collections reference each id.
pub struct StoreAncestorBuilder {
    store: Arc<dyn ItemStore>,
    page_size: usize,
}

impl StoreAncestorBuilder {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            store,
            page_size: ANCESTOR_LOOKUP_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl AncestorBuilder for StoreAncestorBuilder {
    async fn get_parents(&self, item_ids: &[ItemId]) -> Result<AncestorTree> {
        let mut tree = AncestorTree::new();
        for page in item_ids.chunks(self.page_size) {
            let collections = self.store.find_parent_collections(page).await?;
            for item_id in page {
                if tree.contains(item_id) {
                    continue;
                }
                let parents = collections
                    .iter()
                    .filter(|c| c.contains(item_id))
                    .map(AncestorItem::from)
                    .collect();
                tree.insert(item_id.clone(), parents);
            }
        }
        Ok(tree)
    }
}
