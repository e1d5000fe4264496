//! Vocabulary shared by the recursive-action validator and executor.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::types::{ItemId, ItemKind};

/// A bulk operation applied to every item of a collection subtree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum RecursiveAction {
    Delete,
    Publish,
    Unpublish,
    Translate,
}

/// Structured reason attached to a [`RecursiveOperationError`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecursiveErrorKind {
    #[serde(rename = "exceeded_max_number_items")]
    #[strum(serialize = "exceeded_max_number_items")]
    ExceededMaxNumber,
    GivenIdIsRootCollection,
    InstancesExist,
    #[serde(rename = "active_publication_exists")]
    #[strum(serialize = "active_publication_exists")]
    ActivePublicationsExists,
    MissingLanguage,
    MissingTitle,
    NothingToPublish,
    NothingToUnpublish,
    MissingApprovals,
    InvalidPublication,
    CognitiveApiTimeout,
    MasterLanguageNotSet,
    #[serde(rename = "unsuported_language")]
    #[strum(serialize = "unsuported_language")]
    UnsupportedLanguage,
    CollectionNotEmpty,
    BinderHasPublications,
    UnknownError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecursiveOperationError {
    pub error: RecursiveErrorKind,
    pub item_id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_title: Option<String>,
    pub is_binder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

impl RecursiveOperationError {
    pub fn new(error: RecursiveErrorKind, item_id: ItemId, is_binder: bool) -> Self {
        Self {
            error,
            item_id,
            item_title: None,
            is_binder,
            language_code: None,
        }
    }

    pub fn document(error: RecursiveErrorKind, item_id: ItemId) -> Self {
        Self::new(error, item_id, true)
    }

    pub fn collection(error: RecursiveErrorKind, item_id: ItemId) -> Self {
        Self::new(error, item_id, false)
    }

    pub fn with_language(mut self, language_code: Option<String>) -> Self {
        self.language_code = language_code;
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.item_title = title;
        self
    }
}

/// Outcome of validating a recursive action against a subtree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<RecursiveOperationError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RecursiveOperationError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_items_count: Option<usize>,
}

impl ValidationResult {
    pub fn invalid(errors: Vec<RecursiveOperationError>) -> Self {
        Self {
            valid: false,
            errors,
            ..Self::default()
        }
    }

    pub fn valid(affected_items_count: usize, warnings: Vec<RecursiveOperationError>) -> Self {
        Self {
            valid: true,
            errors: vec![],
            warnings,
            affected_items_count: Some(affected_items_count),
        }
    }
}

/// Aggregated outcome of a recursive operation: what succeeded, what did
/// not, and how large the subtree was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecursiveOperationResult<T> {
    pub results: Vec<T>,
    pub errors: Vec<RecursiveOperationError>,
    pub total_items_in_subtree: usize,
}

impl<T> RecursiveOperationResult<T> {
    /// Result returned when validation refused the action.
    pub fn rejected(errors: Vec<RecursiveOperationError>) -> Self {
        Self {
            results: vec![],
            errors,
            total_items_in_subtree: 0,
        }
    }

    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty()
    }
}

// ── Result payloads ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedDocument {
    pub document_id: ItemId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationSummary {
    pub document_id: ItemId,
    pub language_code: String,
    pub publication_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpublishedLanguage {
    pub document_id: ItemId,
    pub language_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedItem {
    pub item_id: ItemId,
    pub kind: ItemKind,
    pub language_code: String,
}

// ── Per-item failures ─────────────────────────────────────────

/// Failure of a single item inside a recursive operation.
///
/// Returned by [`crate::ports::ContentOperations`]; the executor turns each
/// variant into a [`RecursiveErrorKind`] and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum ItemOperationError {
    #[error("language {language_code} is missing")]
    MissingLanguage { language_code: String },

    #[error("invalid publication: {0}")]
    InvalidPublication(String),

    #[error("title missing in language {language_code}")]
    MissingTitle { language_code: String },

    #[error("nothing to publish")]
    NothingToPublish,

    #[error("nothing to unpublish")]
    NothingToUnpublish,

    #[error("approvals missing in language {language_code}")]
    MissingApprovals { language_code: String },

    #[error("document still has publications")]
    BinderHasPublications,

    #[error("collection is not empty")]
    CollectionNotEmpty,

    #[error("master language not set")]
    MasterLanguageNotSet,

    #[error("language {language_code} is not supported")]
    UnsupportedLanguage { language_code: String },

    #[error("translation engine timed out")]
    CognitiveApiTimeout,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ItemOperationError {
    pub fn kind(&self) -> RecursiveErrorKind {
        match self {
            Self::MissingLanguage { .. } => RecursiveErrorKind::MissingLanguage,
            Self::InvalidPublication(_) => RecursiveErrorKind::InvalidPublication,
            Self::MissingTitle { .. } => RecursiveErrorKind::MissingTitle,
            Self::NothingToPublish => RecursiveErrorKind::NothingToPublish,
            Self::NothingToUnpublish => RecursiveErrorKind::NothingToUnpublish,
            Self::MissingApprovals { .. } => RecursiveErrorKind::MissingApprovals,
            Self::BinderHasPublications => RecursiveErrorKind::BinderHasPublications,
            Self::CollectionNotEmpty => RecursiveErrorKind::CollectionNotEmpty,
            Self::MasterLanguageNotSet => RecursiveErrorKind::MasterLanguageNotSet,
            Self::UnsupportedLanguage { .. } => RecursiveErrorKind::UnsupportedLanguage,
            Self::CognitiveApiTimeout => RecursiveErrorKind::CognitiveApiTimeout,
            Self::Other(_) => RecursiveErrorKind::UnknownError,
        }
    }

    pub fn language_code(&self) -> Option<&str> {
        match self {
            Self::MissingLanguage { language_code }
            | Self::MissingTitle { language_code }
            | Self::MissingApprovals { language_code }
            | Self::UnsupportedLanguage { language_code } => Some(language_code),
            _ => None,
        }
    }
}
