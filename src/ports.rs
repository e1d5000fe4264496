//! Port traits for every collaborator of the hierarchy services.
//! Storage engines, caches and notification transports live outside this
//! crate; services depend only on these traits.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::inheritance::feedback::ReaderFeedbackConfig;
use crate::recursive::{ItemOperationError, PublicationSummary};
use crate::types::*;

/// Outcome of a single-item content operation.
pub type ItemResult<T> = std::result::Result<T, ItemOperationError>;

/// In-place edit of a stored collection, applied atomically by the store.
pub type CollectionMutator = Box<dyn FnOnce(&mut Collection) -> Result<()> + Send>;

/// Documents and collections, plus the parent→child edges held in each
/// collection's `elements`.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Load one collection. `NotFound` if it does not exist.
    async fn get_collection(&self, id: &ItemId) -> Result<Collection>;

    /// Load every item among `ids` that exists, soft-deleted ones included.
    /// Unknown ids are skipped.
    async fn find_items(&self, ids: &[ItemId]) -> Result<Vec<Item>>;

    /// Collections whose `elements` reference any of `ids`.
    async fn find_parent_collections(&self, ids: &[ItemId]) -> Result<Vec<Collection>>;

    /// Number of collections referencing each key. Keys referenced by no
    /// collection may be absent from the map.
    async fn count_element_references(&self, keys: &[ItemId]) -> Result<HashMap<ItemId, usize>>;

    async fn patch_collection(&self, id: &ItemId, mutator: CollectionMutator)
        -> Result<Collection>;

    async fn update_ownership(&self, id: &ItemId, ownership: Ownership) -> Result<()>;

    /// Items of `account_id` whose overridden ownership lists `owner_id`.
    async fn find_items_with_owner(&self, account_id: &str, owner_id: &str) -> Result<Vec<Item>>;
}

#[async_trait]
pub trait PublicationStore: Send + Sync {
    /// The subset of `document_ids` that still have at least one active
    /// publication.
    async fn find_documents_with_active_publications(
        &self,
        document_ids: &[ItemId],
    ) -> Result<Vec<ItemId>>;
}

/// Flat string key/value cache.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn del(&self, key: &str) -> Result<()>;

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    async fn set_many(&self, entries: Vec<(String, String)>) -> Result<()> {
        for (key, value) in entries {
            self.set(&key, value).await?;
        }
        Ok(())
    }
}

/// Broadcasts advisory "being modified" notices. Gives no exclusion
/// guarantee.
#[async_trait]
pub trait LockCoordinator: Send + Sync {
    async fn lock(&self, account_id: &str, item_id: &ItemId, holder: &LockHolder) -> Result<()>;

    async fn release(&self, account_id: &str, item_id: &ItemId, holder: &LockHolder)
        -> Result<()>;
}

#[async_trait]
pub trait AuthorizationService: Send + Sync {
    /// Permissions `user_id` holds on each of `item_ids`. Items with no
    /// permissions may be absent from the map.
    async fn find_multiple_resources_permissions(
        &self,
        user_id: &str,
        item_ids: &[ItemId],
    ) -> Result<HashMap<ItemId, Vec<Permission>>>;
}

#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Resolve owner ids to users or groups. Unknown ids are skipped.
    async fn multi_get_users_and_groups(&self, ids: &[String]) -> Result<Vec<Owner>>;

    async fn multi_get_group_member_ids(
        &self,
        group_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>>;
}

#[async_trait]
pub trait FeedbackConfigStore: Send + Sync {
    /// Stored configs for the items that have one.
    async fn get_for_items(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, ReaderFeedbackConfig>>;

    async fn get_for_item(&self, id: &ItemId) -> Result<Option<ReaderFeedbackConfig>> {
        let mut found = self.get_for_items(std::slice::from_ref(id)).await?;
        Ok(found.remove(id))
    }

    async fn upsert(&self, id: &ItemId, config: ReaderFeedbackConfig) -> Result<ReaderFeedbackConfig>;
}

/// Single-item content mutations driven by the recursive executor.
#[async_trait]
pub trait ContentOperations: Send + Sync {
    async fn delete_document(
        &self,
        account_id: &str,
        document_id: &ItemId,
        user_id: &str,
    ) -> ItemResult<()>;

    async fn delete_collection(
        &self,
        account_id: &str,
        collection_id: &ItemId,
        user_id: &str,
    ) -> ItemResult<()>;

    async fn publish(
        &self,
        document_id: &ItemId,
        language_code: &str,
        user_id: &str,
    ) -> ItemResult<PublicationSummary>;

    /// Deactivate the publications of `language_codes`. Returns the
    /// publications of the document that are still active afterwards.
    async fn unpublish(
        &self,
        document_id: &ItemId,
        language_codes: &[String],
        user_id: &str,
    ) -> ItemResult<Vec<PublicationSummary>>;

    async fn translate_document(
        &self,
        account_id: &str,
        document_id: &ItemId,
        target_language: &str,
        user_id: &str,
    ) -> ItemResult<()>;

    async fn translate_collection(
        &self,
        collection_id: &ItemId,
        target_language: &str,
    ) -> ItemResult<()>;
}
