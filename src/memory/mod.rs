//! In-process adapters for every port. Used by the test suites and by
//! embedders that do not need persistence.

mod cache;
mod content;
mod directory;
mod feedback;
mod items;
mod locks;
mod publications;

pub use cache::InMemoryCache;
pub use content::{ContentOp, InMemoryContentOperations};
pub use directory::InMemoryDirectory;
pub use feedback::InMemoryFeedbackConfigStore;
pub use items::InMemoryItemStore;
pub use locks::{LockEvent, RecordingLockCoordinator};
pub use publications::InMemoryPublicationStore;
