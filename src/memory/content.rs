use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{InMemoryItemStore, InMemoryPublicationStore};
use crate::ports::{ContentOperations, ItemResult};
use crate::recursive::{ItemOperationError, PublicationSummary};
use crate::types::{CollectionTitle, DocumentLanguage, ItemId, UNDEFINED_LANGUAGE};

/// Single-item operation, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentOp {
    DeleteDocument,
    DeleteCollection,
    Publish,
    Unpublish,
    TranslateDocument,
    TranslateCollection,
}

type FailureFactory = Arc<dyn Fn() -> ItemOperationError + Send + Sync>;

/// Content operations over the in-memory stores. Translation copies the
/// master title instead of calling a translation engine.
pub struct InMemoryContentOperations {
    items: Arc<InMemoryItemStore>,
    publications: Arc<InMemoryPublicationStore>,
    failures: Mutex<HashMap<(ContentOp, ItemId), FailureFactory>>,
    translations_in_flight: AtomicUsize,
    peak_translations: AtomicUsize,
}

impl InMemoryContentOperations {
    pub fn new(items: Arc<InMemoryItemStore>, publications: Arc<InMemoryPublicationStore>) -> Self {
        Self {
            items,
            publications,
            failures: Mutex::new(HashMap::new()),
            translations_in_flight: AtomicUsize::new(0),
            peak_translations: AtomicUsize::new(0),
        }
    }

    /// Make `op` on `id` fail with the error built by `failure`.
    pub fn fail_on<F>(&self, op: ContentOp, id: impl Into<ItemId>, failure: F)
    where
        F: Fn() -> ItemOperationError + Send + Sync + 'static,
    {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert((op, id.into()), Arc::new(failure));
        }
    }

    /// Highest number of document translations observed running at once.
    pub fn peak_concurrent_translations(&self) -> usize {
        self.peak_translations.load(Ordering::SeqCst)
    }

    fn injected(&self, op: ContentOp, id: &ItemId) -> ItemResult<()> {
        let factory = self
            .failures
            .lock()
            .ok()
            .and_then(|f| f.get(&(op, id.clone())).cloned());
        match factory {
            Some(factory) => Err(factory()),
            None => Ok(()),
        }
    }

    async fn translate_document_inner(
        &self,
        account_id: &str,
        document_id: &ItemId,
        target_language: &str,
    ) -> ItemResult<()> {
        tokio::task::yield_now().await;
        self.injected(ContentOp::TranslateDocument, document_id)?;
        if !is_supported_language(target_language) {
            return Err(ItemOperationError::UnsupportedLanguage {
                language_code: target_language.to_owned(),
            });
        }
        let document = self
            .items
            .document(document_id)
            .await
            .filter(|d| !d.deleted && d.account_id == account_id)
            .ok_or_else(|| anyhow::anyhow!("document {document_id} not found"))?;
        let master = document
            .languages
            .iter()
            .find(|l| l.is_master)
            .filter(|l| l.code != UNDEFINED_LANGUAGE)
            .ok_or(ItemOperationError::MasterLanguageNotSet)?;
        if document.has_language(target_language) {
            return Ok(());
        }
        let language = DocumentLanguage {
            code: target_language.to_owned(),
            title: master.title.clone(),
            is_master: false,
        };
        self.items
            .update_document(document_id, move |d| d.languages.push(language))
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    }
}

/// Two lowercase ASCII letters, optionally followed by a region
/// (`en`, `pt-br`). The undefined language is never a translation target.
fn is_supported_language(code: &str) -> bool {
    let mut parts = code.splitn(2, '-');
    let base = parts.next().unwrap_or_default();
    let region_ok = parts
        .next()
        .map_or(true, |r| r.len() == 2 && r.chars().all(|c| c.is_ascii_lowercase()));
    code != UNDEFINED_LANGUAGE
        && base.len() == 2
        && base.chars().all(|c| c.is_ascii_lowercase())
        && region_ok
}

#[async_trait]
impl ContentOperations for InMemoryContentOperations {
    async fn delete_document(
        &self,
        account_id: &str,
        document_id: &ItemId,
        _user_id: &str,
    ) -> ItemResult<()> {
        self.injected(ContentOp::DeleteDocument, document_id)?;
        let document = self
            .items
            .document(document_id)
            .await
            .filter(|d| d.account_id == account_id)
            .ok_or_else(|| anyhow::anyhow!("document {document_id} not found"))?;
        if document.deleted {
            return Ok(());
        }
        if !self.publications.active_for(document_id).await.is_empty() {
            return Err(ItemOperationError::BinderHasPublications);
        }
        self.items
            .soft_delete(document_id)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    }

    async fn delete_collection(
        &self,
        account_id: &str,
        collection_id: &ItemId,
        _user_id: &str,
    ) -> ItemResult<()> {
        self.injected(ContentOp::DeleteCollection, collection_id)?;
        let collection = self
            .items
            .collection(collection_id)
            .await
            .filter(|c| c.account_id == account_id)
            .ok_or_else(|| anyhow::anyhow!("collection {collection_id} not found"))?;
        if collection.deleted {
            return Ok(());
        }
        if !collection.elements.is_empty() {
            return Err(ItemOperationError::CollectionNotEmpty);
        }
        self.items
            .soft_delete(collection_id)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    }

    async fn publish(
        &self,
        document_id: &ItemId,
        language_code: &str,
        _user_id: &str,
    ) -> ItemResult<PublicationSummary> {
        self.injected(ContentOp::Publish, document_id)?;
        let document = self
            .items
            .document(document_id)
            .await
            .filter(|d| !d.deleted)
            .ok_or_else(|| anyhow::anyhow!("document {document_id} not found"))?;
        let language = document
            .languages
            .iter()
            .find(|l| l.code == language_code)
            .ok_or_else(|| ItemOperationError::MissingLanguage {
                language_code: language_code.to_owned(),
            })?;
        if language.title.trim().is_empty() {
            return Err(ItemOperationError::MissingTitle {
                language_code: language_code.to_owned(),
            });
        }
        let publication = self.publications.activate(document_id, language_code).await;
        Ok(PublicationSummary {
            document_id: publication.document_id,
            language_code: publication.language_code,
            publication_id: publication.id,
        })
    }

    async fn unpublish(
        &self,
        document_id: &ItemId,
        language_codes: &[String],
        _user_id: &str,
    ) -> ItemResult<Vec<PublicationSummary>> {
        self.injected(ContentOp::Unpublish, document_id)?;
        if self.publications.deactivate(document_id, language_codes).await == 0 {
            return Err(ItemOperationError::NothingToUnpublish);
        }
        Ok(self
            .publications
            .active_for(document_id)
            .await
            .into_iter()
            .map(|p| PublicationSummary {
                document_id: p.document_id,
                language_code: p.language_code,
                publication_id: p.id,
            })
            .collect())
    }

    async fn translate_document(
        &self,
        account_id: &str,
        document_id: &ItemId,
        target_language: &str,
        _user_id: &str,
    ) -> ItemResult<()> {
        let running = self.translations_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_translations.fetch_max(running, Ordering::SeqCst);
        let outcome = self
            .translate_document_inner(account_id, document_id, target_language)
            .await;
        self.translations_in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn translate_collection(
        &self,
        collection_id: &ItemId,
        target_language: &str,
    ) -> ItemResult<()> {
        self.injected(ContentOp::TranslateCollection, collection_id)?;
        if !is_supported_language(target_language) {
            return Err(ItemOperationError::UnsupportedLanguage {
                language_code: target_language.to_owned(),
            });
        }
        let collection = self
            .items
            .collection(collection_id)
            .await
            .filter(|c| !c.deleted)
            .ok_or_else(|| anyhow::anyhow!("collection {collection_id} not found"))?;
        if collection
            .titles
            .iter()
            .any(|t| t.language_code == target_language)
        {
            return Ok(());
        }
        let title = CollectionTitle {
            language_code: target_language.to_owned(),
            title: collection.title().unwrap_or_default().to_owned(),
        };
        let mut translated = collection;
        translated.titles.push(title);
        self.items.put_collection(translated).await;
        Ok(())
    }
}
