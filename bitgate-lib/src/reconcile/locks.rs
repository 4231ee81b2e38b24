//! Per-order mutual exclusion.
//!
//! - One async mutex per order id, created on first use
//! - Different orders never contend
//! - Entries are weak, so an idle order's mutex is freed with its last guard
//!   and the dead map slots are swept as the map grows

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::store::OrderId;
use crate::{GatewayError, Result};

/// Sweep dead entries once the map grows past this many slots.
const SWEEP_THRESHOLD: usize = 1024;

/// Registry of per-order locks.
#[derive(Default)]
pub struct OrderLocks {
    locks: Mutex<HashMap<OrderId, Weak<AsyncMutex<()>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `order`.
    pub async fn acquire(&self, order: &OrderId) -> Result<OwnedMutexGuard<()>> {
        let lock = self.lock_for(order)?;
        Ok(lock.lock_owned().await)
    }

    fn lock_for(&self, order: &OrderId) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| GatewayError::Storage("order lock registry poisoned".to_string()))?;

        if let Some(lock) = locks.get(order).and_then(Weak::upgrade) {
            return Ok(lock);
        }

        if locks.len() >= SWEEP_THRESHOLD {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(order.clone(), Arc::downgrade(&lock));
        Ok(lock)
    }

    /// Number of orders with a live lock.
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .map(|l| l.values().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }
}
