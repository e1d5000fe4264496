//! Shared fixture: a `HierarchyService` over the in-memory adapters, with
//! typed handles on each adapter for arranging and inspecting state.

#![allow(dead_code)]

use std::sync::Arc;

use item_hierarchy::memory::{
    InMemoryCache, InMemoryContentOperations, InMemoryDirectory, InMemoryFeedbackConfigStore,
    InMemoryItemStore, InMemoryPublicationStore, RecordingLockCoordinator,
};
use item_hierarchy::ports::LockCoordinator;
use item_hierarchy::types::{CollectionElement, Ownership};
use item_hierarchy::{HierarchyConfig, HierarchyPorts, HierarchyService, ItemId};

pub const ACCOUNT: &str = "acc-1";
pub const USER: &str = "uid-ann";

pub struct Fixture {
    pub items: Arc<InMemoryItemStore>,
    pub publications: Arc<InMemoryPublicationStore>,
    pub cache: Arc<InMemoryCache>,
    pub locks: Arc<RecordingLockCoordinator>,
    pub directory: Arc<InMemoryDirectory>,
    pub feedback: Arc<InMemoryFeedbackConfigStore>,
    pub content: Arc<InMemoryContentOperations>,
}

impl Fixture {
    pub async fn new() -> Self {
        let items = Arc::new(InMemoryItemStore::new());
        let publications = Arc::new(InMemoryPublicationStore::new());
        let content = Arc::new(InMemoryContentOperations::new(
            items.clone(),
            publications.clone(),
        ));
        let directory = Arc::new(InMemoryDirectory::new());
        directory.add_user(USER, "ann", "Ann Example").await;
        Self {
            items,
            publications,
            cache: Arc::new(InMemoryCache::new()),
            locks: Arc::new(RecordingLockCoordinator::new()),
            directory,
            feedback: Arc::new(InMemoryFeedbackConfigStore::new()),
            content,
        }
    }

    pub fn ports(&self) -> HierarchyPorts {
        self.ports_with_locks(self.locks.clone())
    }

    pub fn ports_with_locks(&self, locks: Arc<dyn LockCoordinator>) -> HierarchyPorts {
        HierarchyPorts {
            items: self.items.clone(),
            publications: self.publications.clone(),
            cache: self.cache.clone(),
            locks,
            authorization: self.directory.clone(),
            users: self.directory.clone(),
            feedback_configs: self.feedback.clone(),
            content: self.content.clone(),
        }
    }

    pub fn service(&self) -> HierarchyService {
        HierarchyService::new(self.ports(), HierarchyConfig::default())
    }

    pub fn service_with(&self, config: HierarchyConfig) -> HierarchyService {
        HierarchyService::new(self.ports(), config)
    }

    pub async fn root(&self, id: &str, elements: &[CollectionElement]) {
        self.items.put_collection_with(id, ACCOUNT, true, elements).await;
    }

    pub async fn collection(&self, id: &str, elements: &[CollectionElement]) {
        self.items.put_collection_with(id, ACCOUNT, false, elements).await;
    }

    pub async fn document(&self, id: &str, title: &str) {
        self.items.put_document_titled(id, ACCOUNT, "en", title).await;
    }

    pub async fn documents(&self, ids: &[String]) {
        for id in ids {
            self.document(id, &format!("Title of {id}")).await;
        }
    }

    pub async fn override_owners(&self, id: &str, owner_ids: &[&str]) {
        use item_hierarchy::ports::ItemStore;
        self.items
            .update_ownership(
                &ItemId::from(id),
                Ownership::Overridden {
                    ids: owner_ids.iter().map(|o| (*o).to_owned()).collect(),
                },
            )
            .await
            .unwrap();
    }
}

pub fn docs(ids: &[&str]) -> Vec<CollectionElement> {
    ids.iter().map(|id| CollectionElement::document(*id)).collect()
}

pub fn ids(ids: &[&str]) -> Vec<ItemId> {
    ids.iter().map(|id| ItemId::from(*id)).collect()
}
