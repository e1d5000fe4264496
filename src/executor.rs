//! Drives recursive delete, publish, unpublish and translate over a
//! validated subtree.
//!
//! Every action follows the same protocol: identify the caller, validate,
//! take the advisory lock, process the subtree item by item collecting
//! per-item failures, back-fill titles, release the lock. Only failures of
//! the coordination itself (loading the subtree, say) abort the call, and
//! the lock is released before they are returned. A caller that drops the
//! future, or a port that panics, still gets the lock released.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::ancestors::AncestorBuilder;
use crate::batch::settle_in_batches;
use crate::descendants::{DescendantsMap, DescendantsResolver};
use crate::error::{HierarchyError, Result};
use crate::ports::{ContentOperations, ItemStore, LockCoordinator, UserService};
use crate::recursive::{
    DeletedDocument, ItemOperationError, PublicationSummary, RecursiveAction, RecursiveErrorKind,
    RecursiveOperationError, RecursiveOperationResult, TranslatedItem, UnpublishedLanguage,
};
use crate::titles::TitleResolver;
use crate::types::{Collection, ItemId, ItemKind, LockHolder, UNDEFINED_LANGUAGE};
use crate::validator::RecursiveActionValidator;

pub struct RecursiveOperationExecutor {
    store: Arc<dyn ItemStore>,
    content: Arc<dyn ContentOperations>,
    locks: Arc<dyn LockCoordinator>,
    users: Arc<dyn UserService>,
    ancestors: Arc<dyn AncestorBuilder>,
    validator: Arc<RecursiveActionValidator>,
    descendants: Arc<DescendantsResolver>,
    titles: Arc<TitleResolver>,
    translate_batch_size: usize,
}

impl RecursiveOperationExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ItemStore>,
        content: Arc<dyn ContentOperations>,
        locks: Arc<dyn LockCoordinator>,
        users: Arc<dyn UserService>,
        ancestors: Arc<dyn AncestorBuilder>,
        validator: Arc<RecursiveActionValidator>,
        descendants: Arc<DescendantsResolver>,
        titles: Arc<TitleResolver>,
        translate_batch_size: usize,
    ) -> Self {
        Self {
            store,
            content,
            locks,
            users,
            ancestors,
            validator,
            descendants,
            titles,
            translate_batch_size,
        }
    }

    // ── Entry points ───────────────────────────────────────────

    /// Delete every document of the subtree, then its collections deepest
    /// first, then the collection itself.
    pub async fn recursive_delete(
        &self,
        collection_id: &ItemId,
        account_id: &str,
        user_id: Option<&str>,
    ) -> Result<RecursiveOperationResult<DeletedDocument>> {
        let (user_id, holder) = self.identify(user_id, false).await?;
        let validation = self.validator.validate_recursive_delete(collection_id).await?;
        if !validation.valid {
            return Ok(RecursiveOperationResult::rejected(validation.errors));
        }

        let lock = LockGuard::acquire(self.locks.clone(), account_id, collection_id, holder).await;
        let outcome = contain_panic(
            RecursiveAction::Delete,
            collection_id,
            self.run_delete(collection_id, account_id, &user_id),
        )
        .await;
        lock.release().await;
        finish(RecursiveAction::Delete, collection_id, outcome)
    }

    /// Publish every document of the subtree in each of `language_codes`.
    pub async fn recursive_publish(
        &self,
        collection_id: &ItemId,
        language_codes: &[String],
        account_id: &str,
        user_id: Option<&str>,
        user_is_backend: bool,
    ) -> Result<RecursiveOperationResult<PublicationSummary>> {
        let (user_id, holder) = self.identify(user_id, user_is_backend).await?;
        let validation = self.validator.validate_recursive_publish(collection_id).await?;
        if !validation.valid {
            return Ok(RecursiveOperationResult::rejected(validation.errors));
        }

        let lock = LockGuard::acquire(self.locks.clone(), account_id, collection_id, holder).await;
        let outcome = contain_panic(
            RecursiveAction::Publish,
            collection_id,
            self.run_publish(collection_id, language_codes, &user_id),
        )
        .await;
        lock.release().await;
        finish(RecursiveAction::Publish, collection_id, outcome)
    }

    /// Withdraw the publications of `language_codes` for every document of
    /// the subtree.
    pub async fn recursive_unpublish(
        &self,
        collection_id: &ItemId,
        language_codes: &[String],
        account_id: &str,
        user_id: Option<&str>,
        user_is_backend: bool,
    ) -> Result<RecursiveOperationResult<UnpublishedLanguage>> {
        let (user_id, holder) = self.identify(user_id, user_is_backend).await?;
        let validation = self.validator.validate_recursive_unpublish(collection_id).await?;
        if !validation.valid {
            return Ok(RecursiveOperationResult::rejected(validation.errors));
        }

        let lock = LockGuard::acquire(self.locks.clone(), account_id, collection_id, holder).await;
        let outcome = contain_panic(
            RecursiveAction::Unpublish,
            collection_id,
            self.run_unpublish(collection_id, language_codes, &user_id),
        )
        .await;
        lock.release().await;
        finish(RecursiveAction::Unpublish, collection_id, outcome)
    }

    /// Translate the collection, its sub-collections and then its documents
    /// into `target_language`.
    pub async fn recursive_translate(
        &self,
        collection_id: &ItemId,
        target_language: &str,
        account_id: &str,
        user_id: Option<&str>,
    ) -> Result<RecursiveOperationResult<TranslatedItem>> {
        let (user_id, holder) = self.identify(user_id, false).await?;
        let validation = self.validator.validate_recursive_translate(collection_id).await?;
        if !validation.valid {
            return Ok(RecursiveOperationResult::rejected(validation.errors));
        }

        let lock = LockGuard::acquire(self.locks.clone(), account_id, collection_id, holder).await;
        let outcome = contain_panic(
            RecursiveAction::Translate,
            collection_id,
            self.run_translate(collection_id, target_language, account_id, &user_id),
        )
        .await;
        lock.release().await;
        finish(RecursiveAction::Translate, collection_id, outcome)
    }

    // ── Per-action bodies (lock held) ──────────────────────────

    async fn run_delete(
        &self,
        collection_id: &ItemId,
        account_id: &str,
        user_id: &str,
    ) -> Result<RecursiveOperationResult<DeletedDocument>> {
        let descendants = self.subtree(collection_id).await?;
        let documents = descendants.ids_of_kind(ItemKind::Document);
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for document_id in &documents {
            match self.content.delete_document(account_id, document_id, user_id).await {
                Ok(()) => {
                    self.flush(document_id).await;
                    results.push(DeletedDocument {
                        document_id: document_id.clone(),
                    });
                }
                Err(e) => errors.push(item_error(document_id, true, e, None)),
            }
        }

        let mut collections = descendants.collection_ids_deepest_first();
        collections.push(collection_id.clone());
        for id in &collections {
            match self.content.delete_collection(account_id, id, user_id).await {
                Ok(()) => self.flush(id).await,
                Err(e) => {
                    let kind = match e.kind() {
                        RecursiveErrorKind::CollectionNotEmpty => RecursiveErrorKind::CollectionNotEmpty,
                        _ => RecursiveErrorKind::UnknownError,
                    };
                    log_item_failure(id, kind, &e);
                    errors.push(RecursiveOperationError::collection(kind, id.clone()));
                }
            }
        }

        Ok(self.assemble(results, errors, documents.len()).await)
    }

    async fn run_publish(
        &self,
        collection_id: &ItemId,
        language_codes: &[String],
        user_id: &str,
    ) -> Result<RecursiveOperationResult<PublicationSummary>> {
        let descendants = self.subtree(collection_id).await?;
        let documents = descendants.ids_of_kind(ItemKind::Document);
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for document_id in &documents {
            for language_code in language_codes {
                match self.content.publish(document_id, language_code, user_id).await {
                    Ok(summary) => results.push(summary),
                    Err(ItemOperationError::MissingLanguage { language_code })
                        if language_code == UNDEFINED_LANGUAGE =>
                    {
                        tracing::debug!(
                            target: "item_hierarchy.recursive",
                            document_id = %document_id,
                            "skipping publish of undefined language"
                        );
                    }
                    Err(e) => {
                        errors.push(item_error(document_id, true, e, Some(language_code.as_str())))
                    }
                }
            }
        }

        Ok(self.assemble(results, errors, documents.len()).await)
    }

    async fn run_unpublish(
        &self,
        collection_id: &ItemId,
        language_codes: &[String],
        user_id: &str,
    ) -> Result<RecursiveOperationResult<UnpublishedLanguage>> {
        let descendants = self.subtree(collection_id).await?;
        let documents = descendants.ids_of_kind(ItemKind::Document);
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for document_id in &documents {
            match self.content.unpublish(document_id, language_codes, user_id).await {
                Ok(remaining) => {
                    let still_published = remaining
                        .iter()
                        .any(|p| language_codes.contains(&p.language_code));
                    if !still_published {
                        results.extend(language_codes.iter().map(|language_code| {
                            UnpublishedLanguage {
                                document_id: document_id.clone(),
                                language_code: language_code.clone(),
                            }
                        }));
                    }
                }
                Err(e) => errors.push(item_error(document_id, true, e, None)),
            }
        }

        Ok(self.assemble(results, errors, documents.len()).await)
    }

    async fn run_translate(
        &self,
        collection_id: &ItemId,
        target_language: &str,
        account_id: &str,
        user_id: &str,
    ) -> Result<RecursiveOperationResult<TranslatedItem>> {
        let descendants = self.subtree(collection_id).await?;
        let documents = descendants.ids_of_kind(ItemKind::Document);
        let mut collection_ids = vec![collection_id.clone()];
        collection_ids.extend(descendants.ids_of_kind(ItemKind::Collection));
        let total = documents.len() + collection_ids.len();

        let mut results = Vec::new();
        let mut errors = Vec::new();

        let found = self.store.find_items(&collection_ids).await?;
        let collections: HashMap<&ItemId, &Collection> = found
            .iter()
            .filter_map(|item| item.as_collection())
            .map(|collection| (&collection.id, collection))
            .collect();
        for id in &collection_ids {
            let Some(collection) = collections.get(id) else {
                let missing = anyhow::anyhow!("collection {id} not found");
                errors.push(item_error(id, false, missing.into(), Some(target_language)));
                continue;
            };
            if !collection.has_master_language() {
                log_item_failure(
                    &collection.id,
                    RecursiveErrorKind::MasterLanguageNotSet,
                    &ItemOperationError::MasterLanguageNotSet,
                );
                errors.push(
                    RecursiveOperationError::collection(
                        RecursiveErrorKind::MasterLanguageNotSet,
                        collection.id.clone(),
                    )
                    .with_title(collection.title().map(str::to_owned)),
                );
                continue;
            }
            match self.content.translate_collection(&collection.id, target_language).await {
                Ok(()) => results.push(TranslatedItem {
                    item_id: collection.id.clone(),
                    kind: ItemKind::Collection,
                    language_code: target_language.to_owned(),
                }),
                Err(e) => errors.push(item_error(&collection.id, false, e, Some(target_language))),
            }
        }

        let content = &self.content;
        let settled = settle_in_batches(documents, self.translate_batch_size, |document_id| async move {
            content
                .translate_document(account_id, &document_id, target_language, user_id)
                .await
        })
        .await;
        for (document_id, outcome) in settled {
            match outcome {
                Ok(()) => results.push(TranslatedItem {
                    item_id: document_id,
                    kind: ItemKind::Document,
                    language_code: target_language.to_owned(),
                }),
                Err(e) => errors.push(item_error(&document_id, true, e, Some(target_language))),
            }
        }

        Ok(self.assemble(results, errors, total).await)
    }

    // ── Shared steps ───────────────────────────────────────────

    async fn identify(&self, user_id: Option<&str>, user_is_backend: bool) -> Result<(String, LockHolder)> {
        let user_id = user_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| HierarchyError::Unauthorized("missing user id".into()))?;
        let holder = if user_is_backend {
            LockHolder::backend()
        } else {
            match self.users.get_user(user_id).await? {
                Some(user) => LockHolder::from(&user),
                None => LockHolder::anonymous(user_id),
            }
        };
        Ok((user_id.to_owned(), holder))
    }

    async fn subtree(&self, collection_id: &ItemId) -> Result<DescendantsMap> {
        self.descendants
            .build_descendants_map(collection_id, true)
            .await
    }

    async fn flush(&self, item_id: &ItemId) {
        if let Err(e) = self.ancestors.flush_cache(item_id).await {
            tracing::warn!(
                target: "item_hierarchy.recursive",
                item_id = %item_id,
                error = %e,
                "could not flush ancestor cache for deleted item"
            );
        }
    }

    /// Attach titles to the collected errors. Falls back to the untitled
    /// errors when the lookup fails.
    async fn assemble<T>(
        &self,
        results: Vec<T>,
        errors: Vec<RecursiveOperationError>,
        total_items_in_subtree: usize,
    ) -> RecursiveOperationResult<T> {
        let errors = if errors.is_empty() {
            errors
        } else {
            let fallback = errors.clone();
            match self.titles.fill_titles(errors).await {
                Ok(titled) => titled,
                Err(e) => {
                    tracing::error!(
                        target: "item_hierarchy.recursive",
                        error = %e,
                        "could not resolve titles for recursive errors"
                    );
                    fallback
                }
            }
        };
        RecursiveOperationResult {
            results,
            errors,
            total_items_in_subtree,
        }
    }
}

// ── Advisory lock ──────────────────────────────────────────────

/// Advisory lock held over one recursive operation. [`LockGuard::release`]
/// broadcasts the release in line; a guard dropped without it (the caller
/// stopped polling, say) broadcasts it from a spawned task instead.
struct LockGuard {
    locks: Arc<dyn LockCoordinator>,
    account_id: String,
    item_id: ItemId,
    holder: LockHolder,
    released: bool,
}

impl LockGuard {
    async fn acquire(
        locks: Arc<dyn LockCoordinator>,
        account_id: &str,
        item_id: &ItemId,
        holder: LockHolder,
    ) -> Self {
        let guard = Self {
            locks,
            account_id: account_id.to_owned(),
            item_id: item_id.clone(),
            holder,
            released: false,
        };
        if let Err(e) = guard
            .locks
            .lock(&guard.account_id, &guard.item_id, &guard.holder)
            .await
        {
            tracing::warn!(
                target: "item_hierarchy.recursive",
                collection_id = %guard.item_id,
                error = %e,
                "advisory lock broadcast failed"
            );
        }
        guard
    }

    async fn release(mut self) {
        broadcast_release(self.locks.as_ref(), &self.account_id, &self.item_id, &self.holder).await;
        self.released = true;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let locks = self.locks.clone();
        let account_id = std::mem::take(&mut self.account_id);
        let item_id = self.item_id.clone();
        let holder = self.holder.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::warn!(
                    target: "item_hierarchy.recursive",
                    collection_id = %item_id,
                    "recursive operation abandoned; releasing advisory lock in background"
                );
                runtime.spawn(async move {
                    broadcast_release(locks.as_ref(), &account_id, &item_id, &holder).await;
                });
            }
            Err(_) => tracing::error!(
                target: "item_hierarchy.recursive",
                collection_id = %item_id,
                "advisory lock dropped outside a runtime; release not broadcast"
            ),
        }
    }
}

async fn broadcast_release(
    locks: &dyn LockCoordinator,
    account_id: &str,
    item_id: &ItemId,
    holder: &LockHolder,
) {
    if let Err(e) = locks.release(account_id, item_id, holder).await {
        tracing::warn!(
            target: "item_hierarchy.recursive",
            collection_id = %item_id,
            error = %e,
            "advisory lock release broadcast failed"
        );
    }
}

/// Turn a panic inside an action body into an internal error so the lock
/// is still released in line.
async fn contain_panic<T, F>(
    action: RecursiveAction,
    collection_id: &ItemId,
    body: F,
) -> Result<RecursiveOperationResult<T>>
where
    F: Future<Output = Result<RecursiveOperationResult<T>>>,
{
    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_owned());
            Err(HierarchyError::Internal(anyhow::anyhow!(
                "{action} of {collection_id} panicked: {message}"
            )))
        }
    }
}

fn item_error(
    item_id: &ItemId,
    is_binder: bool,
    error: ItemOperationError,
    language_code: Option<&str>,
) -> RecursiveOperationError {
    let kind = error.kind();
    log_item_failure(item_id, kind, &error);
    let language_code = error.language_code().or(language_code).map(str::to_owned);
    RecursiveOperationError::new(kind, item_id.clone(), is_binder).with_language(language_code)
}

fn log_item_failure(item_id: &ItemId, kind: RecursiveErrorKind, error: &ItemOperationError) {
    tracing::error!(
        target: "item_hierarchy.recursive",
        item_id = %item_id,
        kind = %kind,
        error = %error,
        "item failed during recursive operation"
    );
}

fn finish<T>(
    action: RecursiveAction,
    collection_id: &ItemId,
    outcome: Result<RecursiveOperationResult<T>>,
) -> Result<RecursiveOperationResult<T>> {
    match &outcome {
        Ok(result) => tracing::info!(
            target: "item_hierarchy.recursive",
            action = %action,
            collection_id = %collection_id,
            succeeded = result.results.len(),
            failed = result.errors.len(),
            total = result.total_items_in_subtree,
            "recursive operation finished"
        ),
        Err(e) => tracing::error!(
            target: "item_hierarchy.recursive",
            action = %action,
            collection_id = %collection_id,
            error = %e,
            "recursive operation aborted"
        ),
    }
    outcome
}
