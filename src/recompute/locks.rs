//! Per-portfolio mutation locks

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes read-modify-write cycles per portfolio id
#[derive(Default)]
pub struct PortfolioLocks {
    inner: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl PortfolioLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `portfolio_id`
    pub async fn acquire(&self, portfolio_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock();
            map.entry(portfolio_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry of a deleted portfolio
    pub fn forget(&self, portfolio_id: i64) {
        self.inner.lock().remove(&portfolio_id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
