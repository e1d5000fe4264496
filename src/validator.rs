//! Safety checks run before any recursive action touches a subtree.
//!
//! Validation is terminal: an invalid result is returned to the caller as
//! is, nothing has been mutated, and there is nothing to retry until the
//! subtree changes.

use std::collections::HashSet;
use std::sync::Arc;

use crate::descendants::{DescendantsMap, DescendantsResolver};
use crate::error::Result;
use crate::ports::{ItemStore, PublicationStore};
use crate::recursive::{
    RecursiveAction, RecursiveErrorKind, RecursiveOperationError, ValidationResult,
};
use crate::titles::TitleResolver;
use crate::types::{ItemId, ItemKind};

pub struct RecursiveActionValidator {
    store: Arc<dyn ItemStore>,
    publications: Arc<dyn PublicationStore>,
    descendants: Arc<DescendantsResolver>,
    titles: Arc<TitleResolver>,
    max_items: usize,
}

impl RecursiveActionValidator {
    pub fn new(
        store: Arc<dyn ItemStore>,
        publications: Arc<dyn PublicationStore>,
        descendants: Arc<DescendantsResolver>,
        titles: Arc<TitleResolver>,
        max_items: usize,
    ) -> Self {
        Self {
            store,
            publications,
            descendants,
            titles,
            max_items,
        }
    }

    pub async fn validate(
        &self,
        collection_id: &ItemId,
        action: RecursiveAction,
    ) -> Result<ValidationResult> {
        let result = match action {
            RecursiveAction::Delete => self.validate_recursive_delete(collection_id).await?,
            RecursiveAction::Publish => self.validate_recursive_publish(collection_id).await?,
            RecursiveAction::Unpublish => self.validate_recursive_unpublish(collection_id).await?,
            RecursiveAction::Translate => self.validate_recursive_translate(collection_id).await?,
        };
        tracing::info!(
            target: "item_hierarchy.validator",
            collection_id = %collection_id,
            action = %action,
            valid = result.valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "recursive action validated"
        );
        Ok(result)
    }

    /// Delete refuses subtrees holding published documents or instances.
    pub async fn validate_recursive_delete(&self, collection_id: &ItemId) -> Result<ValidationResult> {
        let descendants = self.subtree(collection_id).await?;
        let mut errors = self.common_errors(collection_id, &descendants).await?;

        let documents = descendants.ids_of_kind(ItemKind::Document);
        let published = if documents.is_empty() {
            vec![]
        } else {
            self.publications
                .find_documents_with_active_publications(&documents)
                .await?
        };
        errors.extend(published.into_iter().map(|id| {
            RecursiveOperationError::document(RecursiveErrorKind::ActivePublicationsExists, id)
        }));
        errors.extend(self.instance_errors(&descendants).await?);

        if !errors.is_empty() {
            return Ok(ValidationResult::invalid(self.titles.fill_titles(errors).await?));
        }
        Ok(ValidationResult::valid(descendants.all_ids().len(), vec![]))
    }

    pub async fn validate_recursive_publish(&self, collection_id: &ItemId) -> Result<ValidationResult> {
        self.common_validation(collection_id, true, false).await
    }

    pub async fn validate_recursive_unpublish(
        &self,
        collection_id: &ItemId,
    ) -> Result<ValidationResult> {
        self.common_validation(collection_id, true, false).await
    }

    /// Translate also renames collections, so they count as affected.
    pub async fn validate_recursive_translate(
        &self,
        collection_id: &ItemId,
    ) -> Result<ValidationResult> {
        self.common_validation(collection_id, false, true).await
    }

    async fn common_validation(
        &self,
        collection_id: &ItemId,
        instances_as_warnings: bool,
        count_collections: bool,
    ) -> Result<ValidationResult> {
        let descendants = self.subtree(collection_id).await?;
        let errors = self.common_errors(collection_id, &descendants).await?;
        let instances = self.instance_errors(&descendants).await?;

        let mut affected = descendants.count_of_kind(ItemKind::Document);
        if count_collections {
            affected += descendants.count_of_kind(ItemKind::Collection);
        }

        if instances.is_empty() {
            return Ok(if errors.is_empty() {
                ValidationResult::valid(affected, vec![])
            } else {
                ValidationResult::invalid(self.titles.fill_titles(errors).await?)
            });
        }

        if instances_as_warnings {
            let warnings = self.titles.fill_titles(instances).await?;
            if errors.is_empty() {
                return Ok(ValidationResult::valid(affected, warnings));
            }
            return Ok(ValidationResult {
                warnings,
                ..ValidationResult::invalid(self.titles.fill_titles(errors).await?)
            });
        }

        let mut all = errors;
        all.extend(instances);
        Ok(ValidationResult::invalid(self.titles.fill_titles(all).await?))
    }

    async fn subtree(&self, collection_id: &ItemId) -> Result<DescendantsMap> {
        self.descendants
            .build_descendants_map(collection_id, true)
            .await
    }

    /// Item ceiling and root protection, shared by every action.
    async fn common_errors(
        &self,
        collection_id: &ItemId,
        descendants: &DescendantsMap,
    ) -> Result<Vec<RecursiveOperationError>> {
        let mut errors = Vec::new();
        let documents = descendants.count_of_kind(ItemKind::Document);
        if documents > self.max_items {
            tracing::debug!(
                target: "item_hierarchy.validator",
                collection_id = %collection_id,
                documents,
                max_items = self.max_items,
                "subtree exceeds recursive action ceiling"
            );
            errors.push(RecursiveOperationError::collection(
                RecursiveErrorKind::ExceededMaxNumber,
                collection_id.clone(),
            ));
        }
        if self.store.get_collection(collection_id).await?.is_root_collection {
            errors.push(RecursiveOperationError::collection(
                RecursiveErrorKind::GivenIdIsRootCollection,
                collection_id.clone(),
            ));
        }
        Ok(errors)
    }

    async fn instance_errors(&self, descendants: &DescendantsMap) -> Result<Vec<RecursiveOperationError>> {
        let ids = descendants.all_ids();
        let instances: HashSet<ItemId> = self
            .descendants
            .get_ids_of_multi_elements(&ids)
            .await?
            .into_iter()
            .collect();
        Ok(descendants
            .flatten()
            .into_iter()
            .filter(|e| instances.contains(&e.key))
            .map(|e| {
                RecursiveOperationError::new(
                    RecursiveErrorKind::InstancesExist,
                    e.key.clone(),
                    e.kind == ItemKind::Document,
                )
            })
            .collect())
    }
}
