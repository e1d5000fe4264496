//! Ancestor resolution over the multi-parent item graph.
//!
//! The item store only knows parent→child edges, so every builder answers
//! "which collections reference these ids?" one level at a time and
//! [`AncestorBuilder::get_ancestors`] repeats that until it reaches roots.
//! Decorators in [`caching`] and [`prefetch`] sit in front of the
//! store-backed builder in [`store`].

pub mod caching;
pub mod prefetch;
pub mod store;

use std::collections::{BTreeMap, HashSet, VecDeque};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Collection, ItemId};

pub use caching::CachingAncestorBuilder;
pub use prefetch::PrefetchingAncestorBuilder;
pub use store::StoreAncestorBuilder;

/// One parent collection of an item, with the flags readers filter on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorItem {
    pub id: ItemId,
    pub is_hidden: bool,
    pub is_deleted: bool,
    pub show_in_overview: bool,
}

impl From<&Collection> for AncestorItem {
    fn from(collection: &Collection) -> Self {
        Self {
            id: collection.id.clone(),
            is_hidden: collection.is_hidden,
            is_deleted: collection.deleted,
            show_in_overview: collection.show_in_overview,
        }
    }
}

/// Direct parents per item. Roots map to an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AncestorTree {
    items: BTreeMap<ItemId, Vec<AncestorItem>>,
}

impl AncestorTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item_id: ItemId, parents: Vec<AncestorItem>) {
        self.items.insert(item_id, parents);
    }

    pub fn merge(&mut self, other: AncestorTree) {
        self.items.extend(other.items);
    }

    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.items.contains_key(item_id)
    }

    pub fn get(&self, item_id: &ItemId) -> Option<&[AncestorItem]> {
        self.items.get(item_id).map(Vec::as_slice)
    }

    /// Parents of `item_id`; empty for roots and unknown ids.
    pub fn parents_of(&self, item_id: &ItemId) -> &[AncestorItem] {
        self.get(item_id).unwrap_or(&[])
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.items.keys()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `item → direct parent ids` for every item in the tree.
    pub fn direct_parents(&self) -> BTreeMap<ItemId, Vec<ItemId>> {
        self.items
            .iter()
            .map(|(id, parents)| (id.clone(), parents.iter().map(|p| p.id.clone()).collect()))
            .collect()
    }

    /// `item → every ancestor id`, nearest first, each listed once.
    pub fn to_document_ancestors(&self) -> BTreeMap<ItemId, Vec<ItemId>> {
        self.items
            .keys()
            .map(|id| (id.clone(), self.transitive_ancestors(id)))
            .collect()
    }

    fn transitive_ancestors(&self, item_id: &ItemId) -> Vec<ItemId> {
        let mut seen: HashSet<&ItemId> = HashSet::new();
        let mut ordered = Vec::new();
        let mut queue: VecDeque<&ItemId> = VecDeque::new();
        queue.push_back(item_id);
        seen.insert(item_id);

        while let Some(current) = queue.pop_front() {
            for parent in self.parents_of(current) {
                if seen.insert(&parent.id) {
                    ordered.push(parent.id.clone());
                    queue.push_back(&parent.id);
                }
            }
        }
        ordered
    }

    /// Distinct parent collections in the tree that are not deleted.
    pub fn get_filtered_items(&self) -> Vec<AncestorItem> {
        let mut seen = HashSet::new();
        self.items
            .values()
            .flatten()
            .filter(|parent| !parent.is_deleted)
            .filter(|parent| seen.insert(parent.id.clone()))
            .cloned()
            .collect()
    }

    /// True when some chain of parents from `item_id` up to a root passes
    /// only through visible, non-deleted collections.
    pub fn has_visible_parent_path(&self, item_id: &ItemId) -> bool {
        let mut visited = HashSet::new();
        self.visible_from(item_id, &mut visited)
    }

    fn visible_from<'a>(&'a self, item_id: &'a ItemId, visited: &mut HashSet<&'a ItemId>) -> bool {
        if !visited.insert(item_id) {
            return false;
        }
        let parents = self.parents_of(item_id);
        if parents.is_empty() {
            return true;
        }
        parents
            .iter()
            .filter(|p| !p.is_hidden && !p.is_deleted)
            .any(|p| self.visible_from(&p.id, visited))
    }
}

impl FromIterator<(ItemId, Vec<AncestorItem>)> for AncestorTree {
    fn from_iter<I: IntoIterator<Item = (ItemId, Vec<AncestorItem>)>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Resolves parent collections, one level or all the way up.
#[async_trait]
pub trait AncestorBuilder: Send + Sync {
    /// Direct parents of each of `item_ids`. Ids without parents may be
    /// absent from the result or mapped to an empty list.
    async fn get_parents(&self, item_ids: &[ItemId]) -> Result<AncestorTree>;

    /// Forget whatever is memoised for `item_id`.
    async fn flush_cache(&self, _item_id: &ItemId) -> Result<()> {
        Ok(())
    }

    /// Transitive parent closure of `item_ids`: every requested id and every
    /// ancestor reached from it, each mapped to its direct parents.
    async fn get_ancestors(&self, item_ids: &[ItemId]) -> Result<AncestorTree> {
        let mut tree = AncestorTree::new();
        let mut queued: HashSet<ItemId> = HashSet::new();
        let mut frontier: Vec<ItemId> = item_ids
            .iter()
            .filter(|id| queued.insert((*id).clone()))
            .cloned()
            .collect();

        while !frontier.is_empty() {
            let parents = self.get_parents(&frontier).await?;
            let mut next = Vec::new();
            for item_id in frontier {
                // An id missing from the answer vanished mid-walk; it ends here.
                let direct = parents.get(&item_id).map(|p| p.to_vec()).unwrap_or_default();
                for parent in &direct {
                    if queued.insert(parent.id.clone()) {
                        next.push(parent.id.clone());
                    }
                }
                tree.insert(item_id, direct);
            }
            tracing::debug!(
                target: "item_hierarchy.ancestors",
                resolved = tree.len(),
                next_level = next.len(),
                "ancestor walk step"
            );
            frontier = next;
        }
        Ok(tree)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Builder over a fixed child→parents table, counting lookups.
    pub(crate) struct FixedBuilder {
        pub table: HashMap<ItemId, Vec<AncestorItem>>,
        pub calls: AtomicUsize,
        pub looked_up: std::sync::Mutex<Vec<ItemId>>,
    }

    impl FixedBuilder {
        pub(crate) fn new(edges: &[(&str, &[&str])]) -> Self {
            let table = edges
                .iter()
                .map(|(child, parents)| {
                    (
                        ItemId::from(*child),
                        parents.iter().map(|p| visible(p)).collect(),
                    )
                })
                .collect();
            Self {
                table,
                calls: AtomicUsize::new(0),
                looked_up: std::sync::Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl AncestorBuilder for FixedBuilder {
        async fn get_parents(&self, item_ids: &[ItemId]) -> Result<AncestorTree> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.looked_up.lock().unwrap().extend(item_ids.iter().cloned());
            Ok(item_ids
                .iter()
                .map(|id| (id.clone(), self.table.get(id).cloned().unwrap_or_default()))
                .collect())
        }
    }

    pub(crate) fn visible(id: &str) -> AncestorItem {
        AncestorItem {
            id: id.into(),
            is_hidden: false,
            is_deleted: false,
            show_in_overview: true,
        }
    }

    fn hidden(id: &str) -> AncestorItem {
        AncestorItem {
            is_hidden: true,
            ..visible(id)
        }
    }

    #[tokio::test]
    async fn walks_to_the_roots_through_every_parent() {
        // doc-1 lives in col-a and col-b, both under root.
        let builder = FixedBuilder::new(&[
            ("doc-1", &["col-a", "col-b"]),
            ("col-a", &["root"]),
            ("col-b", &["root"]),
        ]);
        let tree = builder.get_ancestors(&["doc-1".into()]).await.unwrap();

        assert_eq!(tree.len(), 4);
        assert!(tree.parents_of(&"root".into()).is_empty());
        let all = tree.to_document_ancestors();
        assert_eq!(
            all[&ItemId::from("doc-1")],
            vec![ItemId::from("col-a"), "col-b".into(), "root".into()]
        );
        // root is asked for once even though two children point at it
        assert_eq!(builder.calls.load(Ordering::SeqCst), 3);
        let looked_up = builder.looked_up.lock().unwrap();
        assert_eq!(looked_up.iter().filter(|id| id.as_str() == "root").count(), 1);
    }

    #[tokio::test]
    async fn unknown_ids_are_roots() {
        let builder = FixedBuilder::new(&[]);
        let tree = builder.get_ancestors(&["ghost".into()]).await.unwrap();
        assert!(tree.contains(&"ghost".into()));
        assert!(tree.parents_of(&"ghost".into()).is_empty());
    }

    #[test]
    fn direct_parents_only_lists_one_level() {
        let tree: AncestorTree = [
            (ItemId::from("doc"), vec![visible("a")]),
            (ItemId::from("a"), vec![visible("root")]),
            (ItemId::from("root"), vec![]),
        ]
        .into_iter()
        .collect();
        let direct = tree.direct_parents();
        assert_eq!(direct[&ItemId::from("doc")], vec![ItemId::from("a")]);
    }

    #[test]
    fn filtered_items_skip_deleted_and_duplicates() {
        let mut deleted = visible("gone");
        deleted.is_deleted = true;
        let tree: AncestorTree = [
            (ItemId::from("d1"), vec![visible("a"), deleted]),
            (ItemId::from("d2"), vec![visible("a")]),
        ]
        .into_iter()
        .collect();
        let ids: Vec<_> = tree.get_filtered_items().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![ItemId::from("a")]);
    }

    #[test]
    fn visible_path_needs_one_clean_chain() {
        let tree: AncestorTree = [
            (ItemId::from("doc"), vec![hidden("h"), visible("v")]),
            (ItemId::from("h"), vec![visible("root")]),
            (ItemId::from("v"), vec![hidden("root")]),
            (ItemId::from("root"), vec![]),
        ]
        .into_iter()
        .collect();
        assert!(!tree.has_visible_parent_path(&"doc".into()));

        let tree: AncestorTree = [
            (ItemId::from("doc"), vec![hidden("h"), visible("v")]),
            (ItemId::from("v"), vec![visible("root")]),
            (ItemId::from("root"), vec![]),
        ]
        .into_iter()
        .collect();
        assert!(tree.has_visible_parent_path(&"doc".into()));
    }
}
