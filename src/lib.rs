//! Item Hierarchy
//!
//! Documents and collections form a multi-parent graph: a collection's
//! `elements` are its children, and an item may sit in several collections
//! at once. This crate resolves that graph upwards (ancestor trees, cached
//! per item), downwards (level-indexed descendant maps), runs recursive
//! delete/publish/unpublish/translate over whole subtrees, and resolves
//! settings that are inherited down the graph.
//!
//! # Architecture
//!
//! ```text
//! HierarchyService
//!   ├─ RecursiveActionValidator ──┐
//!   ├─ RecursiveOperationExecutor ┼─► DescendantsResolver
//!   │     (advisory lock, batches)│
//!   ├─ OwnershipResolver ─────────┤
//!   ├─ FeedbackConfigResolver ────┼─► CachingAncestorBuilder
//!   └─ MembershipService ─────────┘        └─► StoreAncestorBuilder
//!                                                (paged reverse lookups)
//! ```
//!
//! Every collaborator is a port trait; `memory` provides in-process
//! adapters for all of them.

pub mod ancestors;
pub mod batch;
pub mod config;
pub mod descendants;
pub mod error;
pub mod executor;
pub mod inheritance;
pub mod membership;
pub mod memory;
pub mod ports;
pub mod recursive;
pub mod service;
pub mod telemetry;
pub mod titles;
pub mod types;
pub mod validator;

pub use ancestors::{AncestorBuilder, AncestorItem, AncestorTree};
pub use config::HierarchyConfig;
pub use descendants::DescendantsMap;
pub use error::{HierarchyError, Result};
pub use recursive::{
    ItemOperationError, RecursiveAction, RecursiveErrorKind, RecursiveOperationError,
    RecursiveOperationResult, ValidationResult,
};
pub use service::{HierarchyPorts, HierarchyService};
pub use types::{Collection, CollectionElement, Document, Item, ItemId, ItemKind, Ownership};
