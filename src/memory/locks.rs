use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::ports::LockCoordinator;
use crate::types::{ItemId, LockHolder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    Locked { item_id: ItemId, holder: LockHolder },
    Released { item_id: ItemId, holder: LockHolder },
}

/// Lock coordinator that records every notice instead of broadcasting it.
#[derive(Default)]
pub struct RecordingLockCoordinator {
    events: Mutex<Vec<LockEvent>>,
    failing: AtomicBool,
}

impl RecordingLockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, lock and release notices fail after being recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<LockEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn lock_count(&self) -> usize {
        self.count(|e| matches!(e, LockEvent::Locked { .. }))
    }

    pub fn release_count(&self) -> usize {
        self.count(|e| matches!(e, LockEvent::Released { .. }))
    }

    fn count(&self, pred: impl Fn(&LockEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    fn record(&self, event: LockEvent) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("lock broadcast failed").into());
        }
        Ok(())
    }
}

#[async_trait]
impl LockCoordinator for RecordingLockCoordinator {
    async fn lock(&self, _account_id: &str, item_id: &ItemId, holder: &LockHolder) -> Result<()> {
        self.record(LockEvent::Locked {
            item_id: item_id.clone(),
            holder: holder.clone(),
        })
    }

    async fn release(&self, _account_id: &str, item_id: &ItemId, holder: &LockHolder) -> Result<()> {
        self.record(LockEvent::Released {
            item_id: item_id.clone(),
            holder: holder.clone(),
        })
    }
}
