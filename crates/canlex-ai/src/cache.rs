//! TTL cache over a bounded LRU store.
//!
//! Values are JSON strings: callers serialize on put and deserialize on
//! get, and a value that fails to parse is treated as a miss. Keys are
//! expected to encode every input that affects the value, plus a bumpable
//! namespace prefix, so targeted invalidation is never needed.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use sha1::{Digest, Sha1};
use tracing::debug;

/// Bounded in-process cache with per-entry expiry.
pub struct TtlCache {
    entries: Mutex<LruCache<String, (Instant, String)>>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Raw JSON string lookup; expired entries are evicted and miss.
    pub fn get_raw(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() <= self.ttl => Some(value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put_raw(&self, key: String, value: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key, (Instant::now(), value));
        }
    }

    /// Typed lookup. A cached value that no longer parses is dropped and
    /// reported as a miss.
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "cache value failed to parse; treating as miss");
                if let Ok(mut entries) = self.entries.lock() {
                    entries.pop(key);
                }
                None
            }
        }
    }

    pub fn put<T: serde::Serialize>(&self, key: String, value: &T) {
        if let Ok(raw) = serde_json::to_string(value) {
            self.put_raw(key, raw);
        }
    }
}

/// Hex SHA-1 of a text, for cache keys.
pub fn sha1_hex(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(40);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
