//! Item hierarchy value types.
//! Pure data: no store handles, no async.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Language code used for content whose language was never chosen.
pub const UNDEFINED_LANGUAGE: &str = "xx";

/// Owner ids with this prefix are users; every other owner id is a group.
pub const USER_ID_PREFIX: &str = "uid";

// ── Identifiers ───────────────────────────────────────────────

/// Identifier of a document or collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── Items ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Document,
    Collection,
}

/// A parent→child edge, as stored in a collection's `elements`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionElement {
    pub key: ItemId,
    pub kind: ItemKind,
}

impl CollectionElement {
    pub fn document(key: impl Into<ItemId>) -> Self {
        Self {
            key: key.into(),
            kind: ItemKind::Document,
        }
    }

    pub fn collection(key: impl Into<ItemId>) -> Self {
        Self {
            key: key.into(),
            kind: ItemKind::Collection,
        }
    }
}

/// Who owns an item. `Inherited` defers to the closest ancestors that
/// override it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ownership {
    #[default]
    Inherited,
    Overridden { ids: Vec<String> },
}

impl Ownership {
    pub fn is_overridden(&self) -> bool {
        matches!(self, Self::Overridden { .. })
    }

    pub fn owner_ids(&self) -> &[String] {
        match self {
            Self::Inherited => &[],
            Self::Overridden { ids } => ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLanguage {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub is_master: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: ItemId,
    pub account_id: String,
    pub languages: Vec<DocumentLanguage>,
    #[serde(default)]
    pub ownership: Ownership,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl Document {
    /// Title in the master language, falling back to the first language.
    pub fn title(&self) -> Option<&str> {
        self.languages
            .iter()
            .find(|l| l.is_master)
            .or_else(|| self.languages.first())
            .map(|l| l.title.as_str())
    }

    pub fn has_language(&self, code: &str) -> bool {
        self.languages.iter().any(|l| l.code == code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionTitle {
    pub language_code: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: ItemId,
    pub account_id: String,
    pub titles: Vec<CollectionTitle>,
    #[serde(default)]
    pub elements: Vec<CollectionElement>,
    #[serde(default)]
    pub is_root_collection: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default = "default_true")]
    pub show_in_overview: bool,
    #[serde(default)]
    pub ownership: Ownership,
    #[serde(default)]
    pub deleted: bool,
}

fn default_true() -> bool {
    true
}

impl Collection {
    pub fn title(&self) -> Option<&str> {
        self.titles.first().map(|t| t.title.as_str())
    }

    /// False when the only title carries the undefined language.
    pub fn has_master_language(&self) -> bool {
        !matches!(
            self.titles.as_slice(),
            [only] if only.language_code == UNDEFINED_LANGUAGE
        ) && !self.titles.is_empty()
    }

    pub fn contains(&self, key: &ItemId) -> bool {
        self.elements.iter().any(|e| &e.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Item {
    Document(Document),
    Collection(Collection),
}

impl Item {
    pub fn id(&self) -> &ItemId {
        match self {
            Self::Document(d) => &d.id,
            Self::Collection(c) => &c.id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Document(_) => ItemKind::Document,
            Self::Collection(_) => ItemKind::Collection,
        }
    }

    pub fn account_id(&self) -> &str {
        match self {
            Self::Document(d) => &d.account_id,
            Self::Collection(c) => &c.account_id,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Document(d) => d.title(),
            Self::Collection(c) => c.title(),
        }
    }

    pub fn ownership(&self) -> &Ownership {
        match self {
            Self::Document(d) => &d.ownership,
            Self::Collection(c) => &c.ownership,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            Self::Document(d) => d.deleted,
            Self::Collection(c) => c.deleted,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Self::Collection(c) => Some(c),
            Self::Document(_) => None,
        }
    }
}

// ── Publications ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub id: String,
    pub document_id: ItemId,
    pub language_code: String,
    pub is_active: bool,
}

// ── Users, groups and permissions ─────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub login: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// Resolved owner, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Owner {
    User { id: String, name: String, login: String },
    Group { id: String, name: String },
}

impl Owner {
    pub fn id(&self) -> &str {
        match self {
            Self::User { id, .. } | Self::Group { id, .. } => id,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group { .. })
    }
}

impl From<&User> for Owner {
    fn from(user: &User) -> Self {
        Self::User {
            id: user.id.clone(),
            name: user.display_name.clone(),
            login: user.login.clone(),
        }
    }
}

pub fn is_user_id(owner_id: &str) -> bool {
    owner_id.starts_with(USER_ID_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    View,
    Edit,
    Admin,
    Publish,
    Review,
}

/// Identity broadcast alongside an advisory lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub user_id: String,
    pub login: String,
    pub display_name: String,
}

impl LockHolder {
    /// Holder used when a recursive operation is triggered by another service.
    pub fn backend() -> Self {
        Self {
            user_id: "uid-backend".into(),
            login: "backend".into(),
            display_name: "backend".into(),
        }
    }

    pub fn anonymous(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            login: user_id.to_owned(),
            display_name: user_id.to_owned(),
        }
    }
}

impl From<&User> for LockHolder {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            login: user.login.clone(),
            display_name: user.display_name.clone(),
        }
    }
}
