//! Human-readable titles for recursive-operation errors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::MAXIMUM_NUMBER_OF_ITEMS;
use crate::error::Result;
use crate::ports::ItemStore;
use crate::recursive::RecursiveOperationError;
use crate::types::ItemId;

pub struct TitleResolver {
    store: Arc<dyn ItemStore>,
    page_size: usize,
}

impl TitleResolver {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            store,
            page_size: MAXIMUM_NUMBER_OF_ITEMS,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fill `item_title` on every error that lacks one, fetching the
    /// offending items in pages rather than one by one.
    pub async fn fill_titles(
        &self,
        errors: Vec<RecursiveOperationError>,
    ) -> Result<Vec<RecursiveOperationError>> {
        let mut seen = HashSet::new();
        let missing: Vec<ItemId> = errors
            .iter()
            .filter(|e| e.item_title.is_none())
            .filter(|e| seen.insert(e.item_id.clone()))
            .map(|e| e.item_id.clone())
            .collect();
        if missing.is_empty() {
            return Ok(errors);
        }

        let mut titles: HashMap<ItemId, String> = HashMap::new();
        for page in missing.chunks(self.page_size) {
            for item in self.store.find_items(page).await? {
                if let Some(title) = item.title() {
                    titles.insert(item.id().clone(), title.to_owned());
                }
            }
        }

        Ok(errors
            .into_iter()
            .map(|error| match error.item_title {
                Some(_) => error,
                None => {
                    let title = titles.get(&error.item_id).cloned();
                    error.with_title(title)
                }
            })
            .collect())
    }
}
