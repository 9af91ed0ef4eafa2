//! Single-slot request tokens.
//!
//! At most one request per key is in flight. A second claim is refused while
//! the first guard is alive; [`RequestSlots::cancel`] signals the running
//! request and frees the slot straight away.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

struct Slot {
    id: u64,
    token: CancellationToken,
}

struct SlotTable<K> {
    next_id: u64,
    active: HashMap<K, Slot>,
}

pub struct RequestSlots<K> {
    table: Arc<Mutex<SlotTable<K>>>,
}

impl<K> Default for RequestSlots<K> {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(SlotTable {
                next_id: 0,
                active: HashMap::new(),
            })),
        }
    }
}

fn lock<K>(table: &Mutex<SlotTable<K>>) -> MutexGuard<'_, SlotTable<K>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K: Eq + Hash + Clone> RequestSlots<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `key`, or returns `None` while another request holds it.
    pub fn try_claim(&self, key: K) -> Option<RequestGuard<K>> {
        let mut table = lock(&self.table);
        if table.active.contains_key(&key) {
            return None;
        }

        table.next_id += 1;
        let id = table.next_id;
        let token = CancellationToken::new();
        table.active.insert(
            key.clone(),
            Slot {
                id,
                token: token.clone(),
            },
        );

        Some(RequestGuard {
            key,
            id,
            token,
            table: Arc::clone(&self.table),
        })
    }

    pub fn is_busy(&self, key: &K) -> bool {
        lock(&self.table).active.contains_key(key)
    }

    /// Cancels the request holding `key`. Returns false if the slot was free.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.table).active.remove(key) {
            Some(slot) => {
                slot.token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Holds a slot until dropped.
pub struct RequestGuard<K: Eq + Hash> {
    key: K,
    id: u64,
    token: CancellationToken,
    table: Arc<Mutex<SlotTable<K>>>,
}

impl<K: Eq + Hash> RequestGuard<K> {
    /// Resolves once the request has been cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<K: Eq + Hash> Drop for RequestGuard<K> {
    fn drop(&mut self) {
        let mut table = lock(&self.table);
        // after a cancel the slot may already belong to a newer claim
        if table.active.get(&self.key).map(|slot| slot.id) == Some(self.id) {
            table.active.remove(&self.key);
        }
    }
}
