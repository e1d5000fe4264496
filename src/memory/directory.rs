use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::ports::{AuthorizationService, UserService};
use crate::types::{Group, ItemId, Owner, Permission, User};

#[derive(Default)]
struct DirectoryTables {
    users: HashMap<String, User>,
    groups: HashMap<String, Group>,
    grants: HashMap<(String, ItemId), Vec<Permission>>,
}

/// Users, groups and per-item grants. Serves both the user and the
/// authorization port.
#[derive(Default)]
pub struct InMemoryDirectory {
    tables: RwLock<DirectoryTables>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, id: &str, login: &str, display_name: &str) {
        self.tables.write().await.users.insert(
            id.to_owned(),
            User {
                id: id.to_owned(),
                login: login.to_owned(),
                display_name: display_name.to_owned(),
            },
        );
    }

    pub async fn add_group(&self, id: &str, name: &str, member_ids: &[&str]) {
        self.tables.write().await.groups.insert(
            id.to_owned(),
            Group {
                id: id.to_owned(),
                name: name.to_owned(),
                member_ids: member_ids.iter().map(|m| (*m).to_owned()).collect(),
            },
        );
    }

    pub async fn grant(&self, user_id: &str, item_id: &str, permissions: &[Permission]) {
        self.tables
            .write()
            .await
            .grants
            .entry((user_id.to_owned(), item_id.into()))
            .or_default()
            .extend_from_slice(permissions);
    }
}

#[async_trait]
impl UserService for InMemoryDirectory {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(user_id).cloned())
    }

    async fn multi_get_users_and_groups(&self, ids: &[String]) -> Result<Vec<Owner>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                tables.users.get(id).map(Owner::from).or_else(|| {
                    tables.groups.get(id).map(|g| Owner::Group {
                        id: g.id.clone(),
                        name: g.name.clone(),
                    })
                })
            })
            .collect())
    }

    async fn multi_get_group_member_ids(
        &self,
        group_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        let tables = self.tables.read().await;
        Ok(group_ids
            .iter()
            .filter_map(|id| tables.groups.get(id).map(|g| (id.clone(), g.member_ids.clone())))
            .collect())
    }
}

#[async_trait]
impl AuthorizationService for InMemoryDirectory {
    async fn find_multiple_resources_permissions(
        &self,
        user_id: &str,
        item_ids: &[ItemId],
    ) -> Result<HashMap<ItemId, Vec<Permission>>> {
        let tables = self.tables.read().await;
        Ok(item_ids
            .iter()
            .filter_map(|item_id| {
                tables
                    .grants
                    .get(&(user_id.to_owned(), item_id.clone()))
                    .map(|p| (item_id.clone(), p.clone()))
            })
            .collect())
    }
}
