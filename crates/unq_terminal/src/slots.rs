use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;
use unq_core::BridgeResult;

/// Caps how many child processes the bridge runs at once.
///
/// Shared by every component that spawns processes. Callers beyond the cap
/// wait for a slot instead of being rejected.
#[derive(Debug, Clone)]
pub struct ProcessSlots {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ProcessSlots {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held by a running process.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a free slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> BridgeResult<OwnedSemaphorePermit> {
        if self.semaphore.available_permits() == 0 {
            debug!(capacity = self.capacity, "all process slots busy, queueing");
        }
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| anyhow::anyhow!("Process slots closed: {e}"))?;
        Ok(permit)
    }
}
