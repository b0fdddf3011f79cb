//! Decision cache for permission evaluations
//!
//! Keys are BLAKE3 hashes over (subject, resource, action, context).
//! There is no TTL: cached decisions, including denials, stay valid
//! until a role mutation triggers a bulk `clear`. Invalidation is
//! deliberately coarse; the whole cache is dropped on any assignment
//! change for any subject.

use crate::types::AccessContext;
use blake3::Hasher;
use dashmap::DashMap;

/// Cache key type (BLAKE3 hash)
pub type DecisionKey = [u8; 32];

/// Capacity-bounded permission decision cache
pub struct DecisionCache {
    entries: DashMap<DecisionKey, bool>,
    capacity: usize,
    stats: DashMap<&'static str, usize>,
}

impl DecisionCache {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            stats: DashMap::new(),
        }
    }

    /// Compute the cache key for a permission check
    pub fn compute_key(
        subject_id: &str,
        resource: &str,
        action: &str,
        ctx: &AccessContext,
    ) -> DecisionKey {
        let mut hasher = Hasher::new();

        hasher.update(subject_id.as_bytes());
        hasher.update(&[0]);
        hasher.update(resource.as_bytes());
        hasher.update(&[0]);
        hasher.update(action.as_bytes());
        hasher.update(&[0]);

        // Context fields in fixed order; tag byte distinguishes
        // None from Some("")
        Self::hash_opt(&mut hasher, ctx.owner_id.as_deref());
        Self::hash_opt(&mut hasher, ctx.department.as_deref());
        Self::hash_opt(&mut hasher, ctx.document_type.as_deref());
        // Length-prefixed so entry boundaries cannot be forged by
        // ids containing delimiter bytes
        hasher.update(&(ctx.assignees.len() as u64).to_le_bytes());
        for assignee in &ctx.assignees {
            hasher.update(&(assignee.len() as u64).to_le_bytes());
            hasher.update(assignee.as_bytes());
        }
        Self::hash_opt(&mut hasher, ctx.status.as_deref());
        match ctx.amount {
            Some(amount) => {
                hasher.update(&[1]);
                hasher.update(&amount.to_le_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }

        *hasher.finalize().as_bytes()
    }

    fn hash_opt(hasher: &mut Hasher, value: Option<&str>) {
        match value {
            Some(v) => {
                hasher.update(&[1]);
                hasher.update(v.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        hasher.update(&[0]);
    }

    /// Look up a cached decision
    pub fn get(&self, key: &DecisionKey) -> Option<bool> {
        match self.entries.get(key) {
            Some(entry) => {
                self.increment("hits");
                Some(*entry)
            }
            None => {
                self.increment("misses");
                None
            }
        }
    }

    /// Store a decision (denials are cached too)
    pub fn put(&self, key: DecisionKey, allowed: bool) {
        if self.entries.len() >= self.capacity {
            self.evict();
        }
        self.entries.insert(key, allowed);
        self.increment("inserts");
    }

    /// Drop every cached decision
    pub fn clear(&self) {
        self.entries.clear();
        self.increment("invalidations");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stat("hits"),
            misses: self.stat("misses"),
            inserts: self.stat("inserts"),
            invalidations: self.stat("invalidations"),
            entries: self.entries.len(),
            capacity: self.capacity,
        }
    }

    /// Drop roughly 10% of entries to make room
    fn evict(&self) {
        let to_remove = (self.capacity / 10).max(1);
        let mut removed = 0;
        self.entries.retain(|_, _| {
            if removed < to_remove {
                removed += 1;
                false
            } else {
                true
            }
        });
    }

    fn increment(&self, key: &'static str) {
        self.stats
            .entry(key)
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn stat(&self, key: &'static str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub inserts: usize,
    pub invalidations: usize,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_clear() {
        let cache = DecisionCache::default();
        let key = DecisionCache::compute_key("user:alice", "contract", "view", &AccessContext::new());

        assert!(cache.get(&key).is_none());
        cache.put(key, true);
        assert_eq!(cache.get(&key), Some(true));

        cache.clear();
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_denials_are_cached() {
        let cache = DecisionCache::default();
        let key = DecisionCache::compute_key("user:bob", "contract", "approve", &AccessContext::new());

        cache.put(key, false);
        assert_eq!(cache.get(&key), Some(false));
    }

    #[test]
    fn test_context_changes_key() {
        let base = AccessContext::new();
        let with_owner = AccessContext::new().with_owner("user:alice");
        let with_amount = AccessContext::new().with_amount(100.0);

        let k1 = DecisionCache::compute_key("u", "contract", "view", &base);
        let k2 = DecisionCache::compute_key("u", "contract", "view", &with_owner);
        let k3 = DecisionCache::compute_key("u", "contract", "view", &with_amount);

        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
        assert_ne!(k2, k3);

        // Same inputs, same key
        let k4 = DecisionCache::compute_key("u", "contract", "view", &AccessContext::new());
        assert_eq!(k1, k4);
    }

    #[test]
    fn test_assignee_boundaries_are_unambiguous() {
        // One id containing a stray control byte must not collide with
        // two separate ids
        let joined = AccessContext::new().with_assignee("a\u{1}b");
        let split = AccessContext::new().with_assignee("a").with_assignee("b");

        let k1 = DecisionCache::compute_key("u", "contract", "view", &joined);
        let k2 = DecisionCache::compute_key("u", "contract", "view", &split);
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = DecisionCache::new(10);
        for i in 0..10 {
            let key = DecisionCache::compute_key(
                &format!("user:{i}"),
                "contract",
                "view",
                &AccessContext::new(),
            );
            cache.put(key, true);
        }
        assert_eq!(cache.len(), 10);

        let key = DecisionCache::compute_key("user:new", "contract", "view", &AccessContext::new());
        cache.put(key, true);
        assert!(cache.len() <= 10);
    }

    #[test]
    fn test_stats() {
        let cache = DecisionCache::default();
        let key = DecisionCache::compute_key("u", "r", "a", &AccessContext::new());

        cache.get(&key);
        cache.put(key, true);
        cache.get(&key);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
