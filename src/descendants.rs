//! Breadth-first enumeration of a collection's subtree.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ports::ItemStore;
use crate::types::{CollectionElement, Item, ItemId, ItemKind};

/// Subtree elements grouped by depth. Every key appears once, at the
/// shallowest level it was reached from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescendantsMap {
    levels: BTreeMap<usize, Vec<CollectionElement>>,
}

impl DescendantsMap {
    pub fn level(&self, level: usize) -> &[CollectionElement] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.values().all(Vec::is_empty)
    }

    /// All elements, shallowest level first.
    pub fn flatten(&self) -> Vec<&CollectionElement> {
        self.levels.values().flatten().collect()
    }

    pub fn all_ids(&self) -> Vec<ItemId> {
        self.flatten().into_iter().map(|e| e.key.clone()).collect()
    }

    pub fn ids_of_kind(&self, kind: ItemKind) -> Vec<ItemId> {
        self.flatten()
            .into_iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.key.clone())
            .collect()
    }

    pub fn count_of_kind(&self, kind: ItemKind) -> usize {
        self.levels.values().flatten().filter(|e| e.kind == kind).count()
    }

    /// Collection ids, deepest level first.
    pub fn collection_ids_deepest_first(&self) -> Vec<ItemId> {
        self.levels
            .values()
            .rev()
            .flatten()
            .filter(|e| e.kind == ItemKind::Collection)
            .map(|e| e.key.clone())
            .collect()
    }
}

pub struct DescendantsResolver {
    store: Arc<dyn ItemStore>,
}

impl DescendantsResolver {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Level 0 holds the root itself, or its children when `omit_root` is
    /// set; each following level holds the children of the collections on
    /// the previous one. A collection is expanded at most once.
    pub async fn build_descendants_map(
        &self,
        collection_id: &ItemId,
        omit_root: bool,
    ) -> Result<DescendantsMap> {
        let mut levels = BTreeMap::new();
        let mut level = 0;
        if !omit_root {
            levels.insert(0, vec![CollectionElement::collection(collection_id.clone())]);
            level = 1;
        }

        let mut seen: HashSet<ItemId> = HashSet::from([collection_id.clone()]);
        let mut frontier = vec![collection_id.clone()];
        while !frontier.is_empty() {
            let by_id: HashMap<ItemId, Item> = self
                .store
                .find_items(&frontier)
                .await?
                .into_iter()
                .map(|item| (item.id().clone(), item))
                .collect();

            let mut current = Vec::new();
            let mut next = Vec::new();
            for collection in frontier.iter().filter_map(|id| by_id.get(id)?.as_collection()) {
                for element in &collection.elements {
                    if !seen.insert(element.key.clone()) {
                        continue;
                    }
                    if element.kind == ItemKind::Collection {
                        next.push(element.key.clone());
                    }
                    current.push(element.clone());
                }
            }
            if !current.is_empty() {
                levels.insert(level, current);
                level += 1;
            }
            frontier = next;
        }

        tracing::debug!(
            target: "item_hierarchy.descendants",
            collection_id = %collection_id,
            levels = levels.len(),
            "descendants map built"
        );
        Ok(DescendantsMap { levels })
    }

    /// The ids among `item_ids` referenced by two or more collections, in
    /// input order.
    pub async fn get_ids_of_multi_elements(&self, item_ids: &[ItemId]) -> Result<Vec<ItemId>> {
        if item_ids.is_empty() {
            return Ok(vec![]);
        }
        let counts = self.store.count_element_references(item_ids).await?;
        let mut emitted = HashSet::new();
        Ok(item_ids
            .iter()
            .filter(|id| counts.get(*id).copied().unwrap_or(0) >= 2)
            .filter(|id| emitted.insert((*id).clone()))
            .cloned()
            .collect())
    }
}
