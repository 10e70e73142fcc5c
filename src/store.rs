//! Thread-safe local key-value map with the bulk range operations used
//! during join and predecessor handoff.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;

use crate::identifier::{self, Id};
use crate::kv::GetOutcome;

/// `0` means "no expiry".
pub type ExpirationSeconds = u64;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs()
}

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: ExpirationSeconds,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at != 0 && self.expires_at <= now_secs()
    }
}

/// The per-node local store. Readers (`get`, `extract_range`, `size`) take a
/// shared lock; writers (`put`, `delete`, `ingest`) take an exclusive one.
#[derive(Default)]
pub struct Store {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Store {
    pub fn new() -> Self {
        Store {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts or overwrites `key`. `ttl_secs == 0` means the entry never expires.
    pub fn put(&self, key: String, value: String, ttl_secs: ExpirationSeconds) {
        let expires_at = if ttl_secs == 0 { 0 } else { now_secs() + ttl_secs };
        self.entries.write().unwrap().insert(key, Entry { value, expires_at });
    }

    /// Returns the value for `key`, if present and not expired. An expired
    /// entry is evicted as a side effect of the lookup.
    pub fn get(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.entries.write().unwrap().remove(key);
        None
    }

    /// Like `get`, but distinguishes an expired hit from a genuine miss —
    /// the wire-level `Get` RPC reports this as a separate status so a
    /// client can tell "never written" apart from "written, then aged out".
    pub fn get_with_status(&self, key: &str) -> GetOutcome {
        let was_present_but_expired = {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return GetOutcome::Found(entry.value.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if was_present_but_expired {
            self.entries.write().unwrap().remove(key);
            GetOutcome::Expired
        } else {
            GetOutcome::NotFound
        }
    }

    /// Removes `key`. Returns whether it was present (and not already expired).
    pub fn delete(&self, key: &str) -> bool {
        match self.entries.write().unwrap().remove(key) {
            Some(entry) => !entry.is_expired(),
            None => false,
        }
    }

    pub fn size(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Returns all `(key, value)` pairs with `hash(key) ∈ (start, end]`,
    /// skipping expired entries. Runs the filter in parallel over a snapshot
    /// since this is the bulk path the protocol allows to be O(n).
    pub fn extract_range(&self, start: Id, end: Id) -> Vec<(String, String)> {
        let snapshot: Vec<(String, Entry)> = {
            let entries = self.entries.read().unwrap();
            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        snapshot
            .into_par_iter()
            .filter(|(key, entry)| !entry.is_expired() && identifier::in_range(identifier::hash(key.as_bytes()), start, end, false, true))
            .map(|(key, entry)| (key, entry.value))
            .collect()
    }

    /// Merges `pairs` in, last-writer-wins on key collision (the order given).
    pub fn ingest(&self, pairs: Vec<(String, String, ExpirationSeconds)>) {
        let mut entries = self.entries.write().unwrap();
        for (key, value, expires_at) in pairs {
            entries.insert(key, Entry { value, expires_at });
        }
    }

    /// Snapshot of everything currently stored, used by the persistence layer.
    pub fn snapshot(&self) -> Vec<(String, String, ExpirationSeconds)> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone(), e.expires_at))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_roundtrip() {
        let store = Store::new();
        store.put("foo".into(), "bar".into(), 0);
        assert_eq!(store.get("foo"), Some("bar".to_string()));
        assert!(store.delete("foo"));
        assert_eq!(store.get("foo"), None);
    }

    #[test]
    fn delete_missing_key_reports_absent() {
        let store = Store::new();
        assert!(!store.delete("missing"));
    }

    #[test]
    fn ttl_zero_never_expires() {
        let store = Store::new();
        store.put("k".into(), "v".into(), 0);
        assert_eq!(store.get("k"), Some("v".to_string()));
    }

    #[test]
    fn expired_entry_reads_as_absent() {
        let store = Store::new();
        store.entries.write().unwrap().insert(
            "k".into(),
            Entry { value: "v".into(), expires_at: 1 },
        );
        assert_eq!(store.get("k"), None);
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn extract_range_filters_by_hash_interval() {
        let store = Store::new();
        store.put("a".into(), "1".into(), 0);
        store.put("b".into(), "2".into(), 0);
        let full = store.extract_range(0, Id::MAX);
        assert_eq!(full.len(), 2);
        let none = store.extract_range(1, 1);
        assert!(none.is_empty());
    }

    #[test]
    fn ingest_is_last_writer_wins() {
        let store = Store::new();
        store.ingest(vec![("k".into(), "first".into(), 0), ("k".into(), "second".into(), 0)]);
        assert_eq!(store.get("k"), Some("second".to_string()));
    }
}
