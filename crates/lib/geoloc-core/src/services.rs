use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Per-name mutual exclusion for cache population.
///
/// Holding the guard for a key serialises the check-then-insert sequence for
/// that key within this process. Clones share the same table.
#[derive(Clone, Default)]
pub struct ResolutionLocks {
    entries: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

/// Held while a name is being resolved.
pub struct ResolutionGuard {
    _guard: OwnedMutexGuard<()>,
}

impl ResolutionLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock key for a name. Every scope shares it, so a name resolved through
    /// different tools at once is still serialised.
    #[must_use]
    pub fn key(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// Waits for exclusive access to `key`.
    pub async fn acquire(&self, key: &str) -> ResolutionGuard {
        let entry = {
            let map = self.entries.read().await;
            map.get(key).cloned()
        };

        let entry = match entry {
            Some(entry) => entry,
            None => {
                let mut map = self.entries.write().await;
                map.entry(key.to_string()).or_default().clone()
            }
        };

        ResolutionGuard {
            _guard: entry.lock_owned().await,
        }
    }

    /// Drops entries nobody holds or waits on. Returns how many were removed.
    pub async fn prune(&self) -> usize {
        let mut map = self.entries.write().await;
        let before = map.len();
        map.retain(|_, entry| Arc::strong_count(entry) > 1);
        before.saturating_sub(map.len())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
