use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{closest_contributing_ancestors, ItemConfigAccess};
use crate::ancestors::AncestorBuilder;
use crate::error::Result;
use crate::ports::{AuthorizationService, FeedbackConfigStore, ItemStore};
use crate::types::{Item, ItemId};

/// Reader feedback switches as stored on one item. `None` means "not set
/// here, inherit".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderFeedbackConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reader_comments_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reader_rating_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_confirmation_enabled: Option<bool>,
}

impl ReaderFeedbackConfig {
    pub fn has_any_setting(&self) -> bool {
        self.reader_comments_enabled.is_some()
            || self.reader_rating_enabled.is_some()
            || self.read_confirmation_enabled.is_some()
    }
}

/// Effective configuration seen by readers. Never partially unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReaderFeedbackConfig {
    pub reader_comments_enabled: bool,
    pub reader_rating_enabled: bool,
    pub read_confirmation_enabled: bool,
}

impl Default for ResolvedReaderFeedbackConfig {
    fn default() -> Self {
        Self {
            reader_comments_enabled: true,
            reader_rating_enabled: true,
            read_confirmation_enabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReaderFeedbackConfig {
    pub id: ItemId,
    pub title: Option<String>,
    pub is_collection: bool,
    pub access: ItemConfigAccess,
    pub config: ReaderFeedbackConfig,
}

pub type ReaderFeedbackConfigs = BTreeMap<ItemId, ItemReaderFeedbackConfig>;

pub struct FeedbackConfigResolver {
    store: Arc<dyn ItemStore>,
    ancestors: Arc<dyn AncestorBuilder>,
    configs: Arc<dyn FeedbackConfigStore>,
    authorization: Arc<dyn AuthorizationService>,
}

impl FeedbackConfigResolver {
    pub fn new(
        store: Arc<dyn ItemStore>,
        ancestors: Arc<dyn AncestorBuilder>,
        configs: Arc<dyn FeedbackConfigStore>,
        authorization: Arc<dyn AuthorizationService>,
    ) -> Self {
        Self {
            store,
            ancestors,
            configs,
            authorization,
        }
    }

    pub async fn get_reader_feedback_config_for_items(
        &self,
        item_ids: &[ItemId],
    ) -> Result<HashMap<ItemId, ReaderFeedbackConfig>> {
        self.configs.get_for_items(item_ids).await
    }

    pub async fn update_reader_feedback_config(
        &self,
        item_id: &ItemId,
        config: ReaderFeedbackConfig,
    ) -> Result<ReaderFeedbackConfig> {
        let stored = self.configs.upsert(item_id, config).await?;
        tracing::info!(
            target: "item_hierarchy.inheritance",
            item_id = %item_id,
            "reader feedback config updated"
        );
        Ok(stored)
    }

    /// Per field: the item's own value, else the OR of the closest
    /// ancestors that set it, else the default.
    pub async fn resolve_reader_feedback_config(
        &self,
        item_id: &ItemId,
    ) -> Result<ResolvedReaderFeedbackConfig> {
        let tree = self.ancestors.get_ancestors(std::slice::from_ref(item_id)).await?;
        let ids: Vec<ItemId> = tree.item_ids().cloned().collect();
        let stored = self.configs.get_for_items(&ids).await?;

        let own = stored.get(item_id).copied().unwrap_or_default();
        let inherited: Vec<ReaderFeedbackConfig> =
            closest_contributing_ancestors(&tree, item_id, |id| {
                stored.get(id).is_some_and(ReaderFeedbackConfig::has_any_setting)
            })
            .iter()
            .filter_map(|id| stored.get(id).copied())
            .collect();

        let defaults = ResolvedReaderFeedbackConfig::default();
        Ok(ResolvedReaderFeedbackConfig {
            reader_comments_enabled: combine(
                own.reader_comments_enabled,
                inherited.iter().map(|c| c.reader_comments_enabled),
                defaults.reader_comments_enabled,
            ),
            reader_rating_enabled: combine(
                own.reader_rating_enabled,
                inherited.iter().map(|c| c.reader_rating_enabled),
                defaults.reader_rating_enabled,
            ),
            read_confirmation_enabled: combine(
                own.read_confirmation_enabled,
                inherited.iter().map(|c| c.read_confirmation_enabled),
                defaults.read_confirmation_enabled,
            ),
        })
    }

    /// The closest ancestors that configure reader feedback, plus the item's
    /// own entry. Empty when the item does not exist.
    pub async fn get_item_and_ancestors_reader_feedback_configs(
        &self,
        item_id: &ItemId,
        user_id: Option<&str>,
    ) -> Result<ReaderFeedbackConfigs> {
        let Some(item) = self
            .store
            .find_items(std::slice::from_ref(item_id))
            .await?
            .into_iter()
            .next()
        else {
            return Ok(ReaderFeedbackConfigs::new());
        };

        let tree = self.ancestors.get_ancestors(std::slice::from_ref(item_id)).await?;
        let ancestor_ids: Vec<ItemId> = tree.item_ids().filter(|id| *id != item_id).cloned().collect();
        let stored = self.configs.get_for_items(&ancestor_ids).await?;
        let contributing = closest_contributing_ancestors(&tree, item_id, |id| {
            stored.get(id).is_some_and(ReaderFeedbackConfig::has_any_setting)
        });

        let permissions = match user_id {
            Some(user_id) if !contributing.is_empty() => {
                self.authorization
                    .find_multiple_resources_permissions(user_id, &contributing)
                    .await?
            }
            _ => HashMap::new(),
        };
        let ancestor_items: HashMap<ItemId, Item> = self
            .store
            .find_items(&contributing)
            .await?
            .into_iter()
            .map(|i| (i.id().clone(), i))
            .collect();

        let mut configs = ReaderFeedbackConfigs::new();
        for id in contributing {
            let access = ItemConfigAccess::from_permissions(
                permissions.get(&id).map(Vec::as_slice).unwrap_or(&[]),
            );
            let ancestor = ancestor_items.get(&id);
            let title = ancestor
                .filter(|_| access.reveals_title())
                .and_then(|a| a.title().map(str::to_owned));
            configs.insert(
                id.clone(),
                ItemReaderFeedbackConfig {
                    config: stored.get(&id).copied().unwrap_or_default(),
                    is_collection: ancestor.map_or(true, Item::is_collection),
                    id,
                    title,
                    access,
                },
            );
        }

        let own = self.configs.get_for_item(item_id).await?.unwrap_or_default();
        configs.insert(
            item_id.clone(),
            ItemReaderFeedbackConfig {
                id: item_id.clone(),
                title: item.title().map(str::to_owned),
                is_collection: item.is_collection(),
                access: ItemConfigAccess::Editable,
                config: own,
            },
        );
        Ok(configs)
    }
}

fn combine(own: Option<bool>, inherited: impl Iterator<Item = Option<bool>>, default: bool) -> bool {
    if let Some(value) = own {
        return value;
    }
    let mut any_set = false;
    let mut enabled = false;
    for value in inherited.flatten() {
        any_set = true;
        enabled |= value;
    }
    if any_set {
        enabled
    } else {
        default
    }
}
