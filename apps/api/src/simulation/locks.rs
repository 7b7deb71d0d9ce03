//! Per-key async locks. An entry lives only while someone holds or waits on it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

fn entries<K>(map: &LockMap<K>) -> MutexGuard<'_, HashMap<K, Arc<AsyncMutex<()>>>> {
    // The map is only touched in short non-panicking sections.
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct KeyedLocks<K> {
    map: LockMap<K>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            map: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> KeyGuard<K> {
        let lock = Arc::clone(entries(&self.map).entry(key.clone()).or_default());
        // Built before awaiting so a cancelled waiter still cleans up its entry.
        let mut held = KeyGuard {
            map: Arc::clone(&self.map),
            key,
            lock: Arc::clone(&lock),
            guard: None,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        entries(&self.map).len()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct KeyGuard<K: Eq + Hash> {
    map: LockMap<K>,
    key: K,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = entries(&self.map);
        // Two handles left: the map's and ours. Nobody else holds or waits.
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(&self.key);
        }
    }
}
