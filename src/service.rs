//! `HierarchyService`: one handle over every hierarchy operation.
//!
//! Wires the ancestor builder stack (store lookup behind the shared cache),
//! the descendants resolver, the validator, the recursive executor and the
//! inheritance resolvers over a single set of ports.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::ancestors::{
    AncestorBuilder, AncestorItem, AncestorTree, CachingAncestorBuilder, PrefetchingAncestorBuilder,
    StoreAncestorBuilder,
};
use crate::config::HierarchyConfig;
use crate::descendants::{DescendantsMap, DescendantsResolver};
use crate::error::Result;
use crate::executor::RecursiveOperationExecutor;
use crate::inheritance::{
    DetailedItemOwnership, FeedbackConfigResolver, OwnershipResolver, ReaderFeedbackConfig,
    ReaderFeedbackConfigs, ResolvedReaderFeedbackConfig,
};
use crate::membership::MembershipService;
use crate::ports::{
    AuthorizationService, Cache, ContentOperations, FeedbackConfigStore, ItemStore, LockCoordinator,
    PublicationStore, UserService,
};
use crate::recursive::{
    DeletedDocument, PublicationSummary, RecursiveAction, RecursiveOperationResult, TranslatedItem,
    UnpublishedLanguage, ValidationResult,
};
use crate::titles::TitleResolver;
use crate::types::{Collection, ItemId, ItemKind, Ownership};
use crate::validator::RecursiveActionValidator;

/// The collaborators the hierarchy services run against.
#[derive(Clone)]
pub struct HierarchyPorts {
    pub items: Arc<dyn ItemStore>,
    pub publications: Arc<dyn PublicationStore>,
    pub cache: Arc<dyn Cache>,
    pub locks: Arc<dyn LockCoordinator>,
    pub authorization: Arc<dyn AuthorizationService>,
    pub users: Arc<dyn UserService>,
    pub feedback_configs: Arc<dyn FeedbackConfigStore>,
    pub content: Arc<dyn ContentOperations>,
}

pub struct HierarchyService {
    config: HierarchyConfig,
    ancestors: Arc<dyn AncestorBuilder>,
    descendants: Arc<DescendantsResolver>,
    validator: Arc<RecursiveActionValidator>,
    executor: RecursiveOperationExecutor,
    ownership: OwnershipResolver,
    feedback: FeedbackConfigResolver,
    membership: MembershipService,
}

impl HierarchyService {
    pub fn new(ports: HierarchyPorts, config: HierarchyConfig) -> Self {
        let store_builder = StoreAncestorBuilder::new(ports.items.clone())
            .with_page_size(config.ancestor_lookup_page_size);
        let ancestors: Arc<dyn AncestorBuilder> = Arc::new(CachingAncestorBuilder::new(
            Arc::new(store_builder),
            ports.cache.clone(),
            &config,
        ));
        let descendants = Arc::new(DescendantsResolver::new(ports.items.clone()));
        let titles = Arc::new(
            TitleResolver::new(ports.items.clone()).with_page_size(config.title_lookup_page_size),
        );
        let validator = Arc::new(RecursiveActionValidator::new(
            ports.items.clone(),
            ports.publications.clone(),
            descendants.clone(),
            titles.clone(),
            config.max_items_in_recursive_action,
        ));
        let executor = RecursiveOperationExecutor::new(
            ports.items.clone(),
            ports.content.clone(),
            ports.locks.clone(),
            ports.users.clone(),
            ancestors.clone(),
            validator.clone(),
            descendants.clone(),
            titles,
            config.translate_batch_size,
        );
        let ownership = OwnershipResolver::new(
            ports.items.clone(),
            ancestors.clone(),
            ports.users.clone(),
            ports.authorization.clone(),
        );
        let feedback = FeedbackConfigResolver::new(
            ports.items.clone(),
            ancestors.clone(),
            ports.feedback_configs.clone(),
            ports.authorization.clone(),
        );
        let membership = MembershipService::new(ports.items.clone(), ancestors.clone());

        tracing::debug!(
            target: "item_hierarchy.service",
            max_items = config.max_items_in_recursive_action,
            translate_batch_size = config.translate_batch_size,
            "hierarchy service ready"
        );
        Self {
            config,
            ancestors,
            descendants,
            validator,
            executor,
            ownership,
            feedback,
            membership,
        }
    }

    /// Build from defaults overridden by `ITEM_HIERARCHY_*` variables.
    pub fn from_env(ports: HierarchyPorts) -> Self {
        Self::new(ports, HierarchyConfig::from_env())
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    // ── Ancestors ──────────────────────────────────────────────

    pub async fn get_ancestors(&self, item_ids: &[ItemId]) -> Result<AncestorTree> {
        self.ancestors.get_ancestors(item_ids).await
    }

    /// `item → every ancestor id`, nearest first.
    pub async fn get_items_ancestors(
        &self,
        item_ids: &[ItemId],
    ) -> Result<BTreeMap<ItemId, Vec<ItemId>>> {
        Ok(self.ancestors.get_ancestors(item_ids).await?.to_document_ancestors())
    }

    /// True when every path from the item to a root crosses a hidden or
    /// deleted collection.
    pub async fn check_if_hidden_in_ancestors(&self, item_id: &ItemId) -> Result<bool> {
        let tree = self
            .ancestors
            .get_ancestors(std::slice::from_ref(item_id))
            .await?;
        Ok(!tree.has_visible_parent_path(item_id))
    }

    pub async fn get_filtered_items(&self, item_ids: &[ItemId]) -> Result<Vec<AncestorItem>> {
        Ok(self.ancestors.get_ancestors(item_ids).await?.get_filtered_items())
    }

    /// A request-scoped builder that resolves `item_ids` in one lookup up
    /// front and serves later calls from that result.
    pub async fn prefetched_ancestors(&self, item_ids: &[ItemId]) -> Result<PrefetchingAncestorBuilder> {
        let builder = PrefetchingAncestorBuilder::new(self.ancestors.clone());
        builder.prefetch(item_ids).await?;
        Ok(builder)
    }

    pub async fn flush_ancestor_cache(&self, item_id: &ItemId) -> Result<()> {
        self.ancestors.flush_cache(item_id).await
    }

    // ── Descendants ────────────────────────────────────────────

    pub async fn build_descendants_map(
        &self,
        collection_id: &ItemId,
        omit_root: bool,
    ) -> Result<DescendantsMap> {
        self.descendants
            .build_descendants_map(collection_id, omit_root)
            .await
    }

    pub async fn get_ids_of_multi_elements(&self, item_ids: &[ItemId]) -> Result<Vec<ItemId>> {
        self.descendants.get_ids_of_multi_elements(item_ids).await
    }

    // ── Recursive actions ──────────────────────────────────────

    pub async fn validate_recursive_action(
        &self,
        collection_id: &ItemId,
        action: RecursiveAction,
    ) -> Result<ValidationResult> {
        self.validator.validate(collection_id, action).await
    }

    pub async fn recursive_delete(
        &self,
        collection_id: &ItemId,
        account_id: &str,
        user_id: Option<&str>,
    ) -> Result<RecursiveOperationResult<DeletedDocument>> {
        self.executor
            .recursive_delete(collection_id, account_id, user_id)
            .await
    }

    pub async fn recursive_publish(
        &self,
        collection_id: &ItemId,
        language_codes: &[String],
        account_id: &str,
        user_id: Option<&str>,
        user_is_backend: bool,
    ) -> Result<RecursiveOperationResult<PublicationSummary>> {
        self.executor
            .recursive_publish(collection_id, language_codes, account_id, user_id, user_is_backend)
            .await
    }

    pub async fn recursive_unpublish(
        &self,
        collection_id: &ItemId,
        language_codes: &[String],
        account_id: &str,
        user_id: Option<&str>,
        user_is_backend: bool,
    ) -> Result<RecursiveOperationResult<UnpublishedLanguage>> {
        self.executor
            .recursive_unpublish(collection_id, language_codes, account_id, user_id, user_is_backend)
            .await
    }

    pub async fn recursive_translate(
        &self,
        collection_id: &ItemId,
        target_language: &str,
        account_id: &str,
        user_id: Option<&str>,
    ) -> Result<RecursiveOperationResult<TranslatedItem>> {
        self.executor
            .recursive_translate(collection_id, target_language, account_id, user_id)
            .await
    }

    // ── Ownership ──────────────────────────────────────────────

    pub async fn get_ownership_for_items(
        &self,
        item_ids: &[ItemId],
        account_id: &str,
        expand_groups: bool,
        user_id: Option<&str>,
    ) -> Result<Vec<DetailedItemOwnership>> {
        self.ownership
            .get_ownership_for_items(item_ids, account_id, expand_groups, user_id)
            .await
    }

    pub async fn get_ownership_for_item(
        &self,
        item_id: &ItemId,
        account_id: &str,
        expand_groups: bool,
        user_id: Option<&str>,
    ) -> Result<DetailedItemOwnership> {
        self.ownership
            .get_ownership_for_item(item_id, account_id, expand_groups, user_id)
            .await
    }

    pub async fn set_ownership_for_item(
        &self,
        item_id: &ItemId,
        ownership: Ownership,
        account_id: &str,
    ) -> Result<()> {
        self.ownership
            .set_ownership_for_item(item_id, ownership, account_id)
            .await
    }

    pub async fn remove_owner_id_from_item_ownership_for_account(
        &self,
        owner_id: &str,
        account_id: &str,
    ) -> Result<usize> {
        self.ownership
            .remove_owner_id_from_item_ownership_for_account(owner_id, account_id)
            .await
    }

    // ── Reader feedback ────────────────────────────────────────

    pub async fn get_reader_feedback_config_for_items(
        &self,
        item_ids: &[ItemId],
    ) -> Result<HashMap<ItemId, ReaderFeedbackConfig>> {
        self.feedback.get_reader_feedback_config_for_items(item_ids).await
    }

    pub async fn update_reader_feedback_config(
        &self,
        item_id: &ItemId,
        config: ReaderFeedbackConfig,
    ) -> Result<ReaderFeedbackConfig> {
        self.feedback.update_reader_feedback_config(item_id, config).await
    }

    pub async fn resolve_reader_feedback_config(
        &self,
        item_id: &ItemId,
    ) -> Result<ResolvedReaderFeedbackConfig> {
        self.feedback.resolve_reader_feedback_config(item_id).await
    }

    pub async fn get_item_and_ancestors_reader_feedback_configs(
        &self,
        item_id: &ItemId,
        user_id: Option<&str>,
    ) -> Result<ReaderFeedbackConfigs> {
        self.feedback
            .get_item_and_ancestors_reader_feedback_configs(item_id, user_id)
            .await
    }

    // ── Graph mutation ─────────────────────────────────────────

    pub async fn add_element_to_collection(
        &self,
        collection_id: &ItemId,
        kind: ItemKind,
        key: &ItemId,
        account_id: &str,
    ) -> Result<Collection> {
        self.membership
            .add_element_to_collection(collection_id, kind, key, account_id)
            .await
    }

    pub async fn remove_element_from_collection(
        &self,
        collection_id: &ItemId,
        key: &ItemId,
        account_id: &str,
    ) -> Result<Collection> {
        self.membership
            .remove_element_from_collection(collection_id, key, account_id)
            .await
    }
}
