use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::ports::PublicationStore;
use crate::types::{ItemId, Publication};

#[derive(Default)]
pub struct InMemoryPublicationStore {
    publications: RwLock<Vec<Publication>>,
}

impl InMemoryPublicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active publication, retiring any previous one for the
    /// same document and language.
    pub async fn activate(&self, document_id: &ItemId, language_code: &str) -> Publication {
        let mut publications = self.publications.write().await;
        for p in publications
            .iter_mut()
            .filter(|p| &p.document_id == document_id && p.language_code == language_code)
        {
            p.is_active = false;
        }
        let publication = Publication {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.clone(),
            language_code: language_code.to_owned(),
            is_active: true,
        };
        publications.push(publication.clone());
        publication
    }

    /// Deactivate the active publications of `language_codes`; returns how
    /// many were deactivated.
    pub async fn deactivate(&self, document_id: &ItemId, language_codes: &[String]) -> usize {
        let mut publications = self.publications.write().await;
        let mut deactivated = 0;
        for p in publications.iter_mut().filter(|p| {
            p.is_active && &p.document_id == document_id && language_codes.contains(&p.language_code)
        }) {
            p.is_active = false;
            deactivated += 1;
        }
        deactivated
    }

    pub async fn active_for(&self, document_id: &ItemId) -> Vec<Publication> {
        self.publications
            .read()
            .await
            .iter()
            .filter(|p| p.is_active && &p.document_id == document_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PublicationStore for InMemoryPublicationStore {
    async fn find_documents_with_active_publications(
        &self,
        document_ids: &[ItemId],
    ) -> Result<Vec<ItemId>> {
        let publications = self.publications.read().await;
        let published: BTreeSet<&ItemId> = publications
            .iter()
            .filter(|p| p.is_active)
            .map(|p| &p.document_id)
            .collect();
        Ok(document_ids
            .iter()
            .filter(|id| published.contains(id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_active_publications_count() {
        let store = InMemoryPublicationStore::new();
        store.activate(&"d1".into(), "en").await;
        store.activate(&"d2".into(), "en").await;
        assert_eq!(store.deactivate(&"d2".into(), &["en".into()]).await, 1);

        let found = store
            .find_documents_with_active_publications(&["d1".into(), "d2".into(), "d3".into()])
            .await
            .unwrap();
        assert_eq!(found, vec![ItemId::from("d1")]);
    }

    #[tokio::test]
    async fn republishing_retires_the_previous_publication() {
        let store = InMemoryPublicationStore::new();
        let first = store.activate(&"d1".into(), "en").await;
        let second = store.activate(&"d1".into(), "en").await;
        let active = store.active_for(&"d1".into()).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
        assert_ne!(first.id, second.id);
    }
}
