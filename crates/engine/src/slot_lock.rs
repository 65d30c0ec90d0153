use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// In-process lock registry keyed by slot hash. Commits for the same slot
/// serialize on the same async mutex; distinct slots proceed in parallel.
///
/// Serializing is all this buys. Correctness still comes from the commit
/// transaction's claim-and-recheck, so a second process without the lock
/// cannot double-book, it just races on the database instead of parking.
#[derive(Clone, Default)]
pub struct SlotLockRegistry {
    locks: Arc<Mutex<HashMap<u64, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Once the registry grows past this, acquiring prunes entries nobody holds.
const PRUNE_THRESHOLD: usize = 1024;

impl SlotLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one slot key, waiting if another commit holds it.
    /// The guard releases on drop.
    pub async fn acquire(&self, key: u64) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if locks.len() > PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(key).or_default())
        };
        entry.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::SlotLockRegistry;

    #[tokio::test]
    async fn same_key_serializes_critical_sections() {
        let registry = SlotLockRegistry::new();
        let concurrent = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let concurrent = Arc::clone(&concurrent);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _guard = registry.acquire(42).await;
                let inside = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(inside, Ordering::SeqCst);
                tokio::task::yield_now().await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.expect("task");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block_each_other() {
        let registry = SlotLockRegistry::new();
        let _first = registry.acquire(1).await;
        // Would deadlock if key 2 shared key 1's mutex.
        let _second = registry.acquire(2).await;
        assert_eq!(registry.len(), 2);
    }
}
