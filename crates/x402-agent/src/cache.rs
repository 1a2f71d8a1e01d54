//! In-memory receipt cache keyed by content id.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Accesses between full expiry sweeps.
const SWEEP_INTERVAL: u32 = 100;

struct Entry {
    token: String,
    expires_at: Instant,
}

struct Inner {
    entries: HashMap<String, Entry>,
    accesses: u32,
}

/// TTL-evicting receipt cache. Lookups of expired entries delete them;
/// every 100 accesses a full sweep removes everything expired.
pub struct ReceiptCache {
    inner: Mutex<Inner>,
}

impl Default for ReceiptCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiptCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                accesses: 0,
            }),
        }
    }

    /// Return the cached token if present and unexpired; expired entries
    /// are removed on the way out.
    pub fn get(&self, content_id: &str) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.tick();

        match inner.entries.get(content_id) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.token.clone());
            }
            Some(_) => {}
            None => return None,
        }
        // Expired: delete on the way out.
        inner.entries.remove(content_id);
        None
    }

    pub fn set(&self, content_id: &str, token: &str, ttl: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.tick();
        inner.entries.insert(
            content_id.to_string(),
            Entry {
                token: token.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn remove(&self, content_id: &str) {
        self.inner.lock().unwrap().entries.remove(content_id);
    }

    /// Live entry count, after sweeping expired entries.
    pub fn size(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.sweep();
        inner.entries.len()
    }

    /// Live keys, after sweeping expired entries.
    pub fn keys(&self) -> Vec<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.sweep();
        inner.entries.keys().cloned().collect()
    }
}

impl Inner {
    fn tick(&mut self) {
        self.accesses += 1;
        if self.accesses.is_multiple_of(SWEEP_INTERVAL) {
            self.sweep();
        }
    }

    fn sweep(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at > now);
    }
}
