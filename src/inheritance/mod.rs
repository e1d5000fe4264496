//! Settings inherited down the item graph.
//!
//! A value set on a collection applies to everything below it until some
//! descendant sets its own. Resolution walks up from an item's direct
//! parents and stops each branch at the first node carrying an explicit
//! value; the nodes where branches stopped are the contributing ancestors.

pub mod feedback;
pub mod ownership;

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ancestors::AncestorTree;
use crate::types::{ItemId, Permission};

pub use feedback::{
    FeedbackConfigResolver, ItemReaderFeedbackConfig, ReaderFeedbackConfig, ReaderFeedbackConfigs,
    ResolvedReaderFeedbackConfig,
};
pub use ownership::{
    DetailedItemOwnership, InheritedOwnershipSettingsItem, OwnershipKind, OwnershipResolver,
};

/// What the requesting user may do with an ancestor's setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemConfigAccess {
    /// No permissions at all; the ancestor's title is withheld.
    Forbidden,
    Readable,
    Editable,
}

impl ItemConfigAccess {
    pub fn from_permissions(permissions: &[Permission]) -> Self {
        if permissions.is_empty() {
            Self::Forbidden
        } else if permissions
            .iter()
            .any(|p| matches!(p, Permission::Edit | Permission::Admin))
        {
            Self::Editable
        } else {
            Self::Readable
        }
    }

    pub fn reveals_title(self) -> bool {
        self != Self::Forbidden
    }
}

/// Breadth-first from the direct parents of `item_id`, visiting each
/// ancestor once. Returns, in visit order, the ancestors for which
/// `has_explicit` holds; their own parents are not explored.
pub fn closest_contributing_ancestors<F>(
    tree: &AncestorTree,
    item_id: &ItemId,
    mut has_explicit: F,
) -> Vec<ItemId>
where
    F: FnMut(&ItemId) -> bool,
{
    let mut visited: HashSet<&ItemId> = HashSet::new();
    let mut queue: VecDeque<&ItemId> = tree.parents_of(item_id).iter().map(|p| &p.id).collect();
    let mut contributing = Vec::new();

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        if has_explicit(current) {
            contributing.push(current.clone());
        } else {
            queue.extend(tree.parents_of(current).iter().map(|p| &p.id));
        }
    }
    contributing
}
