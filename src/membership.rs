//! Adding and removing collection elements without breaking the graph.
//!
//! Every structural change flushes the ancestor cache entry of the moved
//! item before returning.

use std::sync::Arc;

use crate::ancestors::AncestorBuilder;
use crate::error::{HierarchyError, Result};
use crate::ports::ItemStore;
use crate::types::{Collection, CollectionElement, ItemId, ItemKind};

pub struct MembershipService {
    store: Arc<dyn ItemStore>,
    ancestors: Arc<dyn AncestorBuilder>,
}

impl MembershipService {
    pub fn new(store: Arc<dyn ItemStore>, ancestors: Arc<dyn AncestorBuilder>) -> Self {
        Self { store, ancestors }
    }

    /// Append `key` to the elements of `collection_id`. Refuses edges that
    /// would close a cycle; re-adding an existing element changes nothing.
    pub async fn add_element_to_collection(
        &self,
        collection_id: &ItemId,
        kind: ItemKind,
        key: &ItemId,
        account_id: &str,
    ) -> Result<Collection> {
        let items = self
            .store
            .find_items(&[collection_id.clone(), key.clone()])
            .await?;
        let target = items
            .iter()
            .find(|i| i.id() == collection_id)
            .ok_or_else(|| HierarchyError::NotFound(format!("collection {collection_id}")))?;
        let Some(collection) = target.as_collection() else {
            return Err(HierarchyError::InvalidInput(format!(
                "{collection_id} is a document and cannot hold elements"
            )));
        };
        if collection.account_id != account_id {
            return Err(HierarchyError::InvalidInput(format!(
                "collection {collection_id} does not belong to account {account_id}"
            )));
        }
        let element = items
            .iter()
            .find(|i| i.id() == key)
            .ok_or_else(|| HierarchyError::NotFound(format!("item {key}")))?;
        if element.kind() != kind {
            return Err(HierarchyError::InvalidInput(format!(
                "item {key} is not a {kind:?}"
            )));
        }
        if element.account_id() != account_id {
            return Err(HierarchyError::InvalidInput(format!(
                "item {key} does not belong to account {account_id}"
            )));
        }
        if collection.contains(key) {
            return Ok(collection.clone());
        }
        if kind == ItemKind::Collection {
            self.ensure_no_cycle(collection_id, key).await?;
        }

        let new_element = CollectionElement {
            key: key.clone(),
            kind,
        };
        let updated = self
            .store
            .patch_collection(
                collection_id,
                Box::new(move |c: &mut Collection| {
                    if !c.contains(&new_element.key) {
                        c.elements.push(new_element);
                    }
                    Ok(())
                }),
            )
            .await?;
        self.ancestors.flush_cache(key).await?;
        tracing::info!(
            target: "item_hierarchy.membership",
            collection_id = %collection_id,
            key = %key,
            "element added"
        );
        Ok(updated)
    }

    pub async fn remove_element_from_collection(
        &self,
        collection_id: &ItemId,
        key: &ItemId,
        account_id: &str,
    ) -> Result<Collection> {
        let collection = self.store.get_collection(collection_id).await?;
        if collection.account_id != account_id {
            return Err(HierarchyError::InvalidInput(format!(
                "collection {collection_id} does not belong to account {account_id}"
            )));
        }
        let removed = key.clone();
        let updated = self
            .store
            .patch_collection(
                collection_id,
                Box::new(move |c: &mut Collection| {
                    c.elements.retain(|e| e.key != removed);
                    Ok(())
                }),
            )
            .await?;
        self.ancestors.flush_cache(key).await?;
        tracing::info!(
            target: "item_hierarchy.membership",
            collection_id = %collection_id,
            key = %key,
            "element removed"
        );
        Ok(updated)
    }

    /// Adding `key` under `collection_id` closes a cycle when `key` is the
    /// collection itself or one of its ancestors.
    async fn ensure_no_cycle(&self, collection_id: &ItemId, key: &ItemId) -> Result<()> {
        if key == collection_id {
            return Err(HierarchyError::Conflict(format!(
                "collection {collection_id} cannot contain itself"
            )));
        }
        let tree = self
            .ancestors
            .get_ancestors(std::slice::from_ref(collection_id))
            .await?;
        if tree.contains(key) {
            return Err(HierarchyError::Conflict(format!(
                "adding {key} to {collection_id} would create a cycle"
            )));
        }
        Ok(())
    }
}
