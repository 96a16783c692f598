use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::auth::Identity;

/// Bounded, expiring cache of authenticated users keyed by user id.
///
/// Entries live for at most `ttl`. When full, expired entries are purged
/// first, then the oldest entry is evicted.
pub struct UserCache {
    entries: Mutex<HashMap<Uuid, (Identity, Instant)>>,
    capacity: usize,
    ttl: Duration,
}

impl UserCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn get(&self, user_id: Uuid) -> Option<Identity> {
        let mut entries = self.entries.lock().expect("user cache lock poisoned");
        let cached = entries
            .get(&user_id)
            .map(|(identity, at)| (identity.clone(), at.elapsed() < self.ttl));

        match cached {
            Some((identity, true)) => Some(identity),
            Some((_, false)) => {
                entries.remove(&user_id);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, identity: Identity) {
        let mut entries = self.entries.lock().expect("user cache lock poisoned");

        if entries.len() >= self.capacity && !entries.contains_key(&identity.user_id) {
            let ttl = self.ttl;
            entries.retain(|_, (_, at)| at.elapsed() < ttl);

            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, (_, at))| *at)
                    .map(|(id, _)| *id);
                if let Some(id) = oldest {
                    entries.remove(&id);
                }
            }
        }

        entries.insert(identity.user_id, (identity, Instant::now()));
    }

    pub fn invalidate(&self, user_id: Uuid) {
        self.entries
            .lock()
            .expect("user cache lock poisoned")
            .remove(&user_id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("user cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
