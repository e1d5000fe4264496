use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{closest_contributing_ancestors, ItemConfigAccess};
use crate::ancestors::AncestorBuilder;
use crate::error::{HierarchyError, Result};
use crate::ports::{AuthorizationService, ItemStore, UserService};
use crate::types::{is_user_id, Item, ItemId, Owner, Ownership};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipKind {
    Inherited,
    Overridden,
}

/// An ancestor whose overridden ownership an item inherits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritedOwnershipSettingsItem {
    pub id: ItemId,
    pub title: Option<String>,
    pub is_collection: bool,
    pub access: ItemConfigAccess,
    pub owners: Vec<Owner>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedItemOwnership {
    pub item_id: ItemId,
    pub kind: OwnershipKind,
    pub owners: Vec<Owner>,
    pub ancestors_with_ownership: Vec<InheritedOwnershipSettingsItem>,
}

pub struct OwnershipResolver {
    store: Arc<dyn ItemStore>,
    ancestors: Arc<dyn AncestorBuilder>,
    users: Arc<dyn UserService>,
    authorization: Arc<dyn AuthorizationService>,
}

impl OwnershipResolver {
    pub fn new(
        store: Arc<dyn ItemStore>,
        ancestors: Arc<dyn AncestorBuilder>,
        users: Arc<dyn UserService>,
        authorization: Arc<dyn AuthorizationService>,
    ) -> Self {
        Self {
            store,
            ancestors,
            users,
            authorization,
        }
    }

    /// Effective owners of each existing item among `item_ids`, with the
    /// ancestors they were inherited from.
    pub async fn get_ownership_for_items(
        &self,
        item_ids: &[ItemId],
        account_id: &str,
        expand_groups: bool,
        user_id: Option<&str>,
    ) -> Result<Vec<DetailedItemOwnership>> {
        let user_id = require_caller(account_id, user_id)?;
        if item_ids.is_empty() {
            return Ok(vec![]);
        }
        let items = self.store.find_items(item_ids).await?;
        let mut ownerships = Vec::with_capacity(items.len());
        for item in &items {
            ownerships.push(self.ownership_of(item, account_id, expand_groups, user_id).await?);
        }
        Ok(ownerships)
    }

    pub async fn get_ownership_for_item(
        &self,
        item_id: &ItemId,
        account_id: &str,
        expand_groups: bool,
        user_id: Option<&str>,
    ) -> Result<DetailedItemOwnership> {
        self.get_ownership_for_items(std::slice::from_ref(item_id), account_id, expand_groups, user_id)
            .await?
            .pop()
            .ok_or_else(|| HierarchyError::NotFound(format!("item {item_id}")))
    }

    async fn ownership_of(
        &self,
        item: &Item,
        account_id: &str,
        expand_groups: bool,
        user_id: &str,
    ) -> Result<DetailedItemOwnership> {
        let tree = self.ancestors.get_ancestors(std::slice::from_ref(item.id())).await?;
        let ancestor_ids: Vec<ItemId> = tree.item_ids().filter(|id| *id != item.id()).cloned().collect();
        let ancestor_items: HashMap<ItemId, Item> = self
            .store
            .find_items(&ancestor_ids)
            .await?
            .into_iter()
            .map(|i| (i.id().clone(), i))
            .collect();

        let contributing = closest_contributing_ancestors(&tree, item.id(), |id| {
            ancestor_items
                .get(id)
                .is_some_and(|ancestor| ancestor.ownership().is_overridden())
        });

        let permissions = if contributing.is_empty() {
            HashMap::new()
        } else {
            self.authorization
                .find_multiple_resources_permissions(user_id, &contributing)
                .await?
        };

        let mut ancestors_with_ownership = Vec::with_capacity(contributing.len());
        for id in contributing {
            let Some(ancestor) = ancestor_items.get(&id) else { continue };
            let access = ItemConfigAccess::from_permissions(
                permissions.get(&id).map(Vec::as_slice).unwrap_or(&[]),
            );
            let owners = self
                .resolve_owner_ids(ancestor.ownership().owner_ids(), expand_groups)
                .await?;
            ancestors_with_ownership.push(InheritedOwnershipSettingsItem {
                title: access
                    .reveals_title()
                    .then(|| ancestor.title().map(str::to_owned))
                    .flatten(),
                id,
                is_collection: ancestor.is_collection(),
                access,
                owners,
            });
        }

        let (kind, owners) = match item.ownership() {
            Ownership::Overridden { ids } => (
                OwnershipKind::Overridden,
                self.resolve_owner_ids(ids, expand_groups).await?,
            ),
            Ownership::Inherited => (
                OwnershipKind::Inherited,
                ancestors_with_ownership
                    .iter()
                    .flat_map(|a| a.owners.iter().cloned())
                    .collect(),
            ),
        };

        tracing::debug!(
            target: "item_hierarchy.inheritance",
            item_id = %item.id(),
            account_id,
            kind = ?kind,
            contributing = ancestors_with_ownership.len(),
            "ownership resolved"
        );
        Ok(DetailedItemOwnership {
            item_id: item.id().clone(),
            kind,
            owners: dedup_by_id(owners),
            ancestors_with_ownership,
        })
    }

    /// Users first, then groups; groups become their members when
    /// `expand_groups` is set.
    async fn resolve_owner_ids(&self, owner_ids: &[String], expand_groups: bool) -> Result<Vec<Owner>> {
        let (mut user_ids, mut group_ids): (Vec<String>, Vec<String>) =
            owner_ids.iter().cloned().partition(|id| is_user_id(id));
        if expand_groups && !group_ids.is_empty() {
            let members = self.users.multi_get_group_member_ids(&group_ids).await?;
            for group_id in &group_ids {
                if let Some(member_ids) = members.get(group_id) {
                    user_ids.extend(member_ids.iter().cloned());
                }
            }
            group_ids.clear();
        }

        let mut seen = HashSet::new();
        let ids: Vec<String> = user_ids
            .into_iter()
            .chain(group_ids)
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.users.multi_get_users_and_groups(&ids).await
    }

    /// Replace the ownership of one item. Overridden ids are deduplicated
    /// and must all be known users or groups.
    pub async fn set_ownership_for_item(
        &self,
        item_id: &ItemId,
        ownership: Ownership,
        account_id: &str,
    ) -> Result<()> {
        let ownership = match ownership {
            Ownership::Inherited => Ownership::Inherited,
            Ownership::Overridden { ids } => {
                let mut seen = HashSet::new();
                let ids: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
                let resolved = self.users.multi_get_users_and_groups(&ids).await?;
                let resolved_ids: HashSet<&str> = resolved.iter().map(Owner::id).collect();
                if resolved_ids.len() != ids.len() {
                    return Err(HierarchyError::InvalidInput("invalid ownership".into()));
                }
                Ownership::Overridden { ids }
            }
        };

        let items = self.store.find_items(std::slice::from_ref(item_id)).await?;
        let item = items
            .first()
            .ok_or_else(|| HierarchyError::NotFound(format!("item {item_id}")))?;
        if item.account_id() != account_id {
            return Err(HierarchyError::InvalidInput(format!(
                "item {item_id} does not belong to account {account_id}"
            )));
        }
        self.store.update_ownership(item_id, ownership).await?;
        tracing::info!(
            target: "item_hierarchy.inheritance",
            item_id = %item_id,
            account_id,
            "ownership updated"
        );
        Ok(())
    }

    /// Strip `owner_id` from every overridden ownership in the account. An
    /// ownership left without ids falls back to inherited. Returns the
    /// number of items touched.
    pub async fn remove_owner_id_from_item_ownership_for_account(
        &self,
        owner_id: &str,
        account_id: &str,
    ) -> Result<usize> {
        let items = self.store.find_items_with_owner(account_id, owner_id).await?;
        for item in &items {
            let remaining: Vec<String> = item
                .ownership()
                .owner_ids()
                .iter()
                .filter(|id| id.as_str() != owner_id)
                .cloned()
                .collect();
            let ownership = if remaining.is_empty() {
                Ownership::Inherited
            } else {
                Ownership::Overridden { ids: remaining }
            };
            self.store.update_ownership(item.id(), ownership).await?;
        }
        tracing::info!(
            target: "item_hierarchy.inheritance",
            owner_id,
            account_id,
            items = items.len(),
            "owner removed from account ownerships"
        );
        Ok(items.len())
    }
}

fn require_caller<'a>(account_id: &str, user_id: Option<&'a str>) -> Result<&'a str> {
    match user_id {
        Some(user_id) if !user_id.is_empty() && !account_id.is_empty() => Ok(user_id),
        _ => Err(HierarchyError::Unauthorized("not allowed".into())),
    }
}

fn dedup_by_id(owners: Vec<Owner>) -> Vec<Owner> {
    let mut seen = HashSet::new();
    owners
        .into_iter()
        .filter(|owner| seen.insert(owner.id().to_owned()))
        .collect()
}
