use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{HierarchyError, Result};
use crate::ports::{CollectionMutator, ItemStore};
use crate::types::*;

/// Item records plus two edge indexes: each collection's ordered
/// `elements` (parent → children) and a reverse index (child → parents)
/// kept in step with it.
#[derive(Default)]
struct ItemTables {
    documents: HashMap<ItemId, Document>,
    collections: HashMap<ItemId, Collection>,
    parents: HashMap<ItemId, BTreeSet<ItemId>>,
}

impl ItemTables {
    fn unindex(&mut self, collection: &Collection) {
        for element in &collection.elements {
            if let Some(parents) = self.parents.get_mut(&element.key) {
                parents.remove(&collection.id);
                if parents.is_empty() {
                    self.parents.remove(&element.key);
                }
            }
        }
    }

    fn index(&mut self, collection: &Collection) {
        for element in &collection.elements {
            self.parents
                .entry(element.key.clone())
                .or_default()
                .insert(collection.id.clone());
        }
    }

    fn store_collection(&mut self, collection: Collection) {
        if let Some(previous) = self.collections.remove(&collection.id) {
            self.unindex(&previous);
        }
        self.index(&collection);
        self.collections.insert(collection.id.clone(), collection);
    }

    fn item(&self, id: &ItemId) -> Option<Item> {
        self.documents
            .get(id)
            .cloned()
            .map(Item::Document)
            .or_else(|| self.collections.get(id).cloned().map(Item::Collection))
    }

    fn detach(&mut self, id: &ItemId) {
        let parent_ids: Vec<ItemId> = self.parents.remove(id).into_iter().flatten().collect();
        for parent_id in parent_ids {
            if let Some(parent) = self.collections.get_mut(&parent_id) {
                parent.elements.retain(|e| &e.key != id);
            }
        }
    }
}

/// Item store backed by process memory. Reference backend for tests and
/// embedding.
#[derive(Default)]
pub struct InMemoryItemStore {
    tables: RwLock<ItemTables>,
    unavailable: AtomicBool,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, reads fail with an internal error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("item store unavailable").into());
        }
        Ok(())
    }

    pub async fn put_document(&self, document: Document) {
        self.tables
            .write()
            .await
            .documents
            .insert(document.id.clone(), document);
    }

    pub async fn put_collection(&self, collection: Collection) {
        self.tables.write().await.store_collection(collection);
    }

    /// Store a collection titled after its id, in English.
    pub async fn put_collection_with(
        &self,
        id: &str,
        account_id: &str,
        is_root_collection: bool,
        elements: &[CollectionElement],
    ) {
        self.put_collection(Collection {
            id: id.into(),
            account_id: account_id.into(),
            titles: vec![CollectionTitle {
                language_code: "en".into(),
                title: id.into(),
            }],
            elements: elements.to_vec(),
            is_root_collection,
            is_hidden: false,
            show_in_overview: true,
            ownership: Ownership::Inherited,
            deleted: false,
        })
        .await;
    }

    /// Store a document with one master language.
    pub async fn put_document_titled(&self, id: &str, account_id: &str, language: &str, title: &str) {
        self.put_document(Document {
            id: id.into(),
            account_id: account_id.into(),
            languages: vec![DocumentLanguage {
                code: language.into(),
                title: title.into(),
                is_master: true,
            }],
            ownership: Ownership::Inherited,
            is_hidden: false,
            deleted: false,
        })
        .await;
    }

    pub async fn document(&self, id: &ItemId) -> Option<Document> {
        self.tables.read().await.documents.get(id).cloned()
    }

    pub async fn collection(&self, id: &ItemId) -> Option<Collection> {
        self.tables.read().await.collections.get(id).cloned()
    }

    pub async fn update_document<F>(&self, id: &ItemId, update: F) -> Result<Document>
    where
        F: FnOnce(&mut Document) + Send,
    {
        let mut tables = self.tables.write().await;
        let document = tables
            .documents
            .get_mut(id)
            .ok_or_else(|| HierarchyError::NotFound(format!("document {id}")))?;
        update(document);
        Ok(document.clone())
    }

    /// Flag the item deleted and drop every edge pointing at it.
    pub async fn soft_delete(&self, id: &ItemId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(document) = tables.documents.get_mut(id) {
            document.deleted = true;
        } else if let Some(collection) = tables.collections.get_mut(id) {
            collection.deleted = true;
        } else {
            return Err(HierarchyError::NotFound(format!("item {id}")));
        }
        tables.detach(id);
        Ok(())
    }

    /// Remove the item outright, as a concurrent hard delete would.
    pub async fn hard_delete(&self, id: &ItemId) {
        let mut tables = self.tables.write().await;
        tables.documents.remove(id);
        if let Some(collection) = tables.collections.remove(id) {
            tables.unindex(&collection);
        }
        tables.detach(id);
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn get_collection(&self, id: &ItemId) -> Result<Collection> {
        self.check_available()?;
        self.tables
            .read()
            .await
            .collections
            .get(id)
            .cloned()
            .ok_or_else(|| HierarchyError::NotFound(format!("collection {id}")))
    }

    async fn find_items(&self, ids: &[ItemId]) -> Result<Vec<Item>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.item(id)).collect())
    }

    async fn find_parent_collections(&self, ids: &[ItemId]) -> Result<Vec<Collection>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let parent_ids: BTreeSet<&ItemId> = ids
            .iter()
            .filter_map(|id| tables.parents.get(id))
            .flatten()
            .collect();
        Ok(parent_ids
            .into_iter()
            .filter_map(|id| tables.collections.get(id).cloned())
            .collect())
    }

    async fn count_element_references(&self, keys: &[ItemId]) -> Result<HashMap<ItemId, usize>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| tables.parents.get(key).map(|p| (key.clone(), p.len())))
            .collect())
    }

    async fn patch_collection(&self, id: &ItemId, mutator: CollectionMutator) -> Result<Collection> {
        let mut tables = self.tables.write().await;
        let mut collection = tables
            .collections
            .get(id)
            .cloned()
            .ok_or_else(|| HierarchyError::NotFound(format!("collection {id}")))?;
        mutator(&mut collection)?;
        tables.store_collection(collection.clone());
        Ok(collection)
    }

    async fn update_ownership(&self, id: &ItemId, ownership: Ownership) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(document) = tables.documents.get_mut(id) {
            document.ownership = ownership;
        } else if let Some(collection) = tables.collections.get_mut(id) {
            collection.ownership = ownership;
        } else {
            return Err(HierarchyError::NotFound(format!("item {id}")));
        }
        Ok(())
    }

    async fn find_items_with_owner(&self, account_id: &str, owner_id: &str) -> Result<Vec<Item>> {
        let tables = self.tables.read().await;
        let owned = |ownership: &Ownership| ownership.owner_ids().iter().any(|id| id == owner_id);
        let mut items: Vec<Item> = tables
            .documents
            .values()
            .filter(|d| d.account_id == account_id && owned(&d.ownership))
            .cloned()
            .map(Item::Document)
            .chain(
                tables
                    .collections
                    .values()
                    .filter(|c| c.account_id == account_id && owned(&c.ownership))
                    .cloned()
                    .map(Item::Collection),
            )
            .collect();
        items.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reverse_index_follows_patches() {
        let store = InMemoryItemStore::new();
        store
            .put_collection_with("a", "acc", false, &[CollectionElement::document("d")])
            .await;
        store.put_collection_with("b", "acc", false, &[]).await;

        store
            .patch_collection(
                &"b".into(),
                Box::new(|c: &mut Collection| {
                    c.elements.push(CollectionElement::document("d"));
                    Ok(())
                }),
            )
            .await
            .unwrap();
        let counts = store.count_element_references(&["d".into()]).await.unwrap();
        assert_eq!(counts[&ItemId::from("d")], 2);

        store
            .patch_collection(
                &"a".into(),
                Box::new(|c: &mut Collection| {
                    c.elements.clear();
                    Ok(())
                }),
            )
            .await
            .unwrap();
        let parents = store.find_parent_collections(&["d".into()]).await.unwrap();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].id, ItemId::from("b"));
    }

    #[tokio::test]
    async fn soft_delete_detaches_from_parents() {
        let store = InMemoryItemStore::new();
        store
            .put_collection_with("a", "acc", false, &[CollectionElement::document("d")])
            .await;
        store.put_document_titled("d", "acc", "en", "Doc").await;

        store.soft_delete(&"d".into()).await.unwrap();
        assert!(store.collection(&"a".into()).await.unwrap().elements.is_empty());
        assert!(store.document(&"d".into()).await.unwrap().deleted);
        let found = store.find_items(&["d".into()]).await.unwrap();
        assert!(found[0].is_deleted());
    }

    #[tokio::test]
    async fn unavailable_store_fails_reads() {
        let store = InMemoryItemStore::new();
        store.set_unavailable(true);
        let err = store.find_items(&["x".into()]).await.unwrap_err();
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn owners_are_found_per_account() {
        let store = InMemoryItemStore::new();
        store.put_collection_with("a", "acc", false, &[]).await;
        store.put_collection_with("b", "other", false, &[]).await;
        for id in ["a", "b"] {
            store
                .update_ownership(
                    &id.into(),
                    Ownership::Overridden {
                        ids: vec!["uid-1".into()],
                    },
                )
                .await
                .unwrap();
        }
        let owned = store.find_items_with_owner("acc", "uid-1").await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id(), &ItemId::from("a"));
    }
}
