//! Decrypted key cache with a fixed per-entry TTL.
//!
//! Owned by one [`KeyManager`](crate::KeyManager). Every lifecycle write
//! invalidates the affected entries; expired entries are dropped on read.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use sfeed_core::KeyId;

use crate::keypair::KeyPair;

#[derive(Debug)]
pub struct KeyCache {
    ttl: Duration,
    entries: Mutex<HashMap<KeyId, (Instant, KeyPair)>>,
}

impl KeyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A fresh cached copy, if any.
    pub fn get(&self, key_id: &KeyId) -> Option<KeyPair> {
        let mut entries = self.entries.lock();
        let fresh = entries
            .get(key_id)
            .map(|(at, kp)| (at.elapsed() < self.ttl, kp.clone()));
        match fresh {
            Some((true, kp)) => Some(kp),
            Some((false, _)) => {
                entries.remove(key_id);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key_pair: &KeyPair) {
        self.entries
            .lock()
            .insert(key_pair.key_id.clone(), (Instant::now(), key_pair.clone()));
    }

    pub fn invalidate(&self, key_id: &KeyId) {
        self.entries.lock().remove(key_id);
    }

    /// Drop every member of the rotation family rooted at `root`.
    pub fn invalidate_family(&self, root: &KeyId) {
        self.entries.lock().retain(|id, _| !id.is_in_family_of(root));
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::KeyMetadata;

    fn pair(id: &str) -> KeyPair {
        KeyPair::generate(KeyId::new(id).unwrap(), 1, KeyMetadata::default())
    }

    #[test]
    fn hit_within_ttl() {
        let cache = KeyCache::new(Duration::from_secs(60));
        let kp = pair("alice");
        cache.insert(&kp);
        assert_eq!(cache.get(&kp.key_id).unwrap().public_key, kp.public_key);
    }

    #[test]
    fn zero_ttl_always_misses() {
        let cache = KeyCache::new(Duration::ZERO);
        let kp = pair("alice");
        cache.insert(&kp);
        assert!(cache.get(&kp.key_id).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn family_invalidation() {
        let cache = KeyCache::new(Duration::from_secs(60));
        for id in ["u", "u_v2", "u_v3", "other"] {
            cache.insert(&pair(id));
        }
        cache.invalidate_family(&KeyId::new("u").unwrap());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&KeyId::new("other").unwrap()).is_some());
    }
}
