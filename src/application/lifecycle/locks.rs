//! Per-subscription operation locks.
//!
//! Every lifecycle operation holds its subscription's lock from first
//! read to final write, so at most one transition runs per subscription
//! inside this process. Store-level version checks cover whatever the
//! lock cannot see, such as writers in other processes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::foundation::SubscriptionId;

/// Registry of per-subscription async locks.
///
/// Entries are created on first use and kept for the life of the
/// process; the registry grows with the customer base, not with traffic.
#[derive(Debug, Default)]
pub struct SubscriptionLocks {
    locks: Mutex<HashMap<SubscriptionId, Arc<Mutex<()>>>>,
}

impl SubscriptionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `id`, waiting until any current holder is
    /// done. The guard releases on drop.
    pub async fn acquire(&self, id: SubscriptionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(id).or_default())
        };
        lock.lock_owned().await
    }
}
