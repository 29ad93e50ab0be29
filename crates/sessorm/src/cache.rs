//! Capacity-bounded identity cache.
//!
//! Uses the generation-counter LRU: every hit stamps the entry with a fresh
//! value from a shared counter (O(1), under the read lock), and eviction scans
//! for the smallest stamp (O(n), under the write lock). Reads therefore never
//! serialize on each other.

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Upper bound on the slots reserved up front; larger caches grow on demand.
const PREALLOCATE_LIMIT: usize = 200;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    last_access: AtomicU64,
}

/// LRU map from row identity keys to shared records.
#[derive(Debug)]
pub struct IdentityCache<V> {
    capacity: usize,
    entries: RwLock<HashMap<String, Entry<V>>>,
    generation: AtomicU64,
}

impl<V: Clone> IdentityCache<V> {
    /// Create a cache holding at most `capacity` entries. `0` disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(HashMap::with_capacity(capacity.min(PREALLOCATE_LIMIT))),
            generation: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        entry
            .last_access
            .store(self.next_generation(), Ordering::Relaxed);
        Some(entry.value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Insert or replace `key`, then evict least recently used entries while over capacity.
    pub fn put(&self, key: String, value: V) {
        if self.capacity == 0 {
            return;
        }
        let generation = self.next_generation();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get_mut(&key) {
            entry.value = value;
            *entry.last_access.get_mut() = generation;
            return;
        }

        entries.insert(
            key,
            Entry {
                value,
                last_access: AtomicU64::new(generation),
            },
        );
        self.evict(&mut entries);
    }

    /// Return the value cached under `key`, inserting `make()` first when absent.
    ///
    /// Lookup and insert happen under one write lock, so concurrent callers
    /// for the same key all receive the value of whichever call inserted it.
    /// With capacity `0` nothing is stored and `make()` is returned as is.
    pub fn get_or_insert_with(&self, key: String, make: impl FnOnce() -> V) -> V {
        if self.capacity == 0 {
            return make();
        }
        let generation = self.next_generation();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get_mut(&key) {
            *entry.last_access.get_mut() = generation;
            return entry.value.clone();
        }

        let value = make();
        entries.insert(
            key,
            Entry {
                value: value.clone(),
                last_access: AtomicU64::new(generation),
            },
        );
        self.evict(&mut entries);
        value
    }

    fn evict(&self, entries: &mut HashMap<String, Entry<V>>) {
        while entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    entries.remove(&k);
                }
                None => break,
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .map(|e| e.value)
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the identity key for a row of `table` from its index column values.
///
/// Components are tagged and length-delimited, so `("ab", "c")` and
/// `("a", "bc")` never collide, nor do `1` and `"1"`. `Int(1)` and `UInt(1)`
/// produce the same key. Accepted kinds: signed and unsigned integers,
/// non-empty text, bytes, UUIDs and datetimes.
pub fn build_key(table: &str, index: &[Value]) -> OrmResult<String> {
    if index.is_empty() {
        return Err(OrmError::cache_key(format!(
            "no index values for table `{table}`"
        )));
    }
    let mut key = String::from(table);
    for value in index {
        key.push('`');
        match value {
            // Non-negative integers share one tag whatever their signedness.
            Value::Int(i) if *i >= 0 => {
                let _ = write!(key, "u{i}");
            }
            Value::Int(i) => {
                let _ = write!(key, "i{i}");
            }
            Value::UInt(u) => {
                let _ = write!(key, "u{u}");
            }
            Value::Text(s) => push_text(&mut key, table, s)?,
            Value::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => push_text(&mut key, table, s)?,
                Err(_) => {
                    key.push('x');
                    for byte in b {
                        let _ = write!(key, "{byte:02x}");
                    }
                }
            },
            Value::Uuid(u) => push_text(&mut key, table, &u.hyphenated().to_string())?,
            Value::DateTime(dt) => {
                push_text(&mut key, table, &dt.format("%Y-%m-%d %H:%M:%S%.f").to_string())?
            }
            other => {
                return Err(OrmError::cache_key(format!(
                    "unsupported {} index value for table `{table}`",
                    other.kind()
                )));
            }
        }
    }
    Ok(key)
}

fn push_text(key: &mut String, table: &str, s: &str) -> OrmResult<()> {
    if s.is_empty() {
        return Err(OrmError::cache_key(format!(
            "empty string index value for table `{table}`"
        )));
    }
    let _ = write!(key, "s{}:{s}", s.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let cache = IdentityCache::new(2);
        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        assert_eq!(cache.get("a"), Some(1));
        cache.put("c".into(), 3);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn put_replaces_and_bumps() {
        let cache = IdentityCache::new(2);
        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        cache.put("a".into(), 10);
        cache.put("c".into(), 3);
        assert_eq!(cache.get("a"), Some(10));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn zero_capacity_disables() {
        let cache = IdentityCache::new(0);
        cache.put("a".into(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn remove_and_clear() {
        let cache = IdentityCache::new(4);
        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.remove("a"), None);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_do_not_collide() {
        let k1 = build_key("t", &[Value::from("ab"), Value::from("c")]).unwrap();
        let k2 = build_key("t", &[Value::from("a"), Value::from("bc")]).unwrap();
        assert_ne!(k1, k2);
        let k3 = build_key("t", &[Value::Int(1)]).unwrap();
        let k4 = build_key("t", &[Value::from("1")]).unwrap();
        assert_ne!(k3, k4);
        assert_eq!(k3, "t`u1");
    }

    #[test]
    fn integer_signedness_shares_a_key() {
        let signed = build_key("t", &[Value::Int(1)]).unwrap();
        let unsigned = build_key("t", &[Value::UInt(1)]).unwrap();
        assert_eq!(signed, unsigned);
        assert_eq!(build_key("t", &[Value::Int(-1)]).unwrap(), "t`i-1");
        assert_eq!(
            build_key("t", &[Value::UInt(u64::MAX)]).unwrap(),
            format!("t`u{}", u64::MAX)
        );
    }

    #[test]
    fn byte_vectors_resolve_like_text() {
        let from_vec = build_key("t", &[Value::from(b"ab".to_vec()), Value::Int(2)]).unwrap();
        let from_text = build_key("t", &[Value::from("ab"), Value::UInt(2)]).unwrap();
        assert_eq!(from_vec, from_text);
    }

    #[test]
    fn get_or_insert_keeps_the_first_value() {
        let cache = IdentityCache::new(2);
        assert_eq!(cache.get_or_insert_with("a".into(), || 1), 1);
        assert_eq!(cache.get_or_insert_with("a".into(), || 2), 1);
        cache.put("b".into(), 2);
        // touching "a" again makes "b" the eviction candidate
        assert_eq!(cache.get_or_insert_with("a".into(), || 3), 1);
        cache.put("c".into(), 3);
        assert!(!cache.contains("b"));
        assert_eq!(cache.len(), 2);

        let disabled = IdentityCache::new(0);
        assert_eq!(disabled.get_or_insert_with("a".into(), || 5), 5);
        assert!(disabled.is_empty());
    }

    #[test]
    fn concurrent_get_or_insert_yields_one_value() {
        use std::sync::{Arc, Barrier};

        const THREADS: usize = 8;
        for round in 0..200 {
            let cache = IdentityCache::new(16);
            let barrier = Barrier::new(THREADS);
            let values: Vec<Arc<usize>> = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..THREADS)
                    .map(|t| {
                        let (cache, barrier) = (&cache, &barrier);
                        scope.spawn(move || {
                            barrier.wait();
                            cache.get_or_insert_with(format!("row{round}"), || Arc::new(t))
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });
            assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
            assert_eq!(cache.len(), 1);
        }
    }

    #[test]
    fn huge_capacity_does_not_preallocate() {
        let cache = IdentityCache::new(usize::MAX);
        cache.put("a".into(), 1);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.capacity(), usize::MAX);
    }

    #[test]
    fn bytes_resolve_to_text() {
        let a = build_key("t", &[Value::bytes(b"abc".to_vec())]).unwrap();
        let b = build_key("t", &[Value::from("abc")]).unwrap();
        assert_eq!(a, b);
        let raw = build_key("t", &[Value::bytes(vec![0xff, 0x00])]).unwrap();
        assert_eq!(raw, "t`xff00");
    }

    #[test]
    fn rejects_empty_and_unsupported() {
        assert!(build_key("t", &[Value::from("")]).unwrap_err().is_cache_key_error());
        assert!(build_key("t", &[Value::Null]).unwrap_err().is_cache_key_error());
        assert!(build_key("t", &[Value::Float(1.5)]).unwrap_err().is_cache_key_error());
        assert!(build_key("t", &[]).unwrap_err().is_cache_key_error());
    }
}
