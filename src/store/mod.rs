//! Variable store
//!
//! Keeps the latest content of every variable together with the time it was
//! written. One producer writes, any number of readers read; every access
//! goes through a mutex acquired with a bounded wait (see [`LockPolicy`]).
//! A write that cannot get the lock in time is dropped, a read that cannot
//! get it sees nothing. The controller retransmits continuously, so the next
//! cycle fills any gap.

mod lock;

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use lock::lock_within;

use crate::parser::write_wire;

/// Default age after which an entry is evicted on the next dump
pub const DEFAULT_STALENESS_MS: u64 = 5000;

/// Initial capacity reserved for a dump
const DUMP_RESERVE: usize = 2000;

/// How long each kind of access may wait for the store lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// Upper bound for a write; the update is dropped past it
    pub write_wait: Duration,
    /// Upper bound for a read; the read reports nothing past it
    pub read_wait: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            write_wait: Duration::from_millis(5),
            read_wait: Duration::from_millis(50),
        }
    }
}

/// A stored variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Payload with delimiters, raw bytes
    pub content: Vec<u8>,
    /// Commit time in milliseconds
    pub write_time: u64,
}

/// Concurrent map from variable name to its latest value
#[derive(Debug)]
pub struct VariableStore {
    vars: Mutex<BTreeMap<String, Variable>>,
    policy: LockPolicy,
    staleness_ms: u64,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    /// Create an empty store with the default policy and staleness
    pub fn new() -> Self {
        Self::with_policy(LockPolicy::default(), DEFAULT_STALENESS_MS)
    }

    /// Create an empty store
    pub fn with_policy(policy: LockPolicy, staleness_ms: u64) -> Self {
        Self {
            vars: Mutex::new(BTreeMap::new()),
            policy,
            staleness_ms,
        }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    pub fn staleness_ms(&self) -> u64 {
        self.staleness_ms
    }

    /// Insert or overwrite `name`
    ///
    /// Returns false if the lock was not acquired within the write bound and
    /// the update was dropped.
    pub fn upsert(&self, name: &str, content: &[u8], write_time: u64) -> bool {
        let Some(mut vars) = lock_within(&self.vars, self.policy.write_wait) else {
            tracing::debug!(name, "store busy, update dropped");
            return false;
        };

        match vars.get_mut(name) {
            Some(var) => {
                var.content.clear();
                var.content.extend_from_slice(content);
                var.write_time = write_time;
            },
            None => {
                vars.insert(
                    name.to_string(),
                    Variable {
                        content: content.to_vec(),
                        write_time,
                    },
                );
            },
        }
        true
    }

    /// Copy of the current content of `name`
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        let Some(vars) = lock_within(&self.vars, self.policy.read_wait) else {
            tracing::debug!(name, "store busy, read skipped");
            return None;
        };
        vars.get(name).map(|var| var.content.clone())
    }

    /// Copy of the full entry for `name`
    pub fn entry(&self, name: &str) -> Option<Variable> {
        let vars = lock_within(&self.vars, self.policy.read_wait)?;
        vars.get(name).cloned()
    }

    /// Reconstruct every live variable in wire syntax
    ///
    /// Entries older than the staleness threshold at `now` are removed as
    /// they are visited. Survivors are written as `var <name>=<content>;\r\n`
    /// in name order, content bytes untouched. Returns an empty dump if the
    /// lock is not acquired.
    pub fn dump_all(&self, now: u64) -> Vec<u8> {
        let mut dump = Vec::with_capacity(DUMP_RESERVE);

        let Some(mut vars) = lock_within(&self.vars, self.policy.read_wait) else {
            tracing::debug!("store busy, dump skipped");
            return dump;
        };

        let staleness_ms = self.staleness_ms;
        vars.retain(|name, var| {
            if now.saturating_sub(var.write_time) > staleness_ms {
                tracing::trace!(name = %name, "evicting stale variable");
                return false;
            }
            write_wire(&mut dump, name, &var.content);
            dump.extend_from_slice(b"\r\n");
            true
        });

        dump
    }

    /// Number of entries, stale ones included
    pub fn len(&self) -> usize {
        lock_within(&self.vars, self.policy.read_wait).map_or(0, |vars| vars.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names currently held, in order
    pub fn names(&self) -> Vec<String> {
        lock_within(&self.vars, self.policy.read_wait)
            .map(|vars| vars.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_store_upsert_and_get() {
        let store = VariableStore::new();
        assert!(store.upsert("soc", b"\"87\"", 10));

        assert_eq!(store.get("soc").as_deref(), Some(&b"\"87\""[..]));
        assert_eq!(store.get("SOC"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_overwrite_in_place() {
        let store = VariableStore::new();
        store.upsert("a", b"\"1\"", 10);
        store.upsert("a", b"\"2\"", 20);

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.entry("a"),
            Some(Variable {
                content: b"\"2\"".to_vec(),
                write_time: 20,
            })
        );
    }

    #[test]
    fn test_store_dump_format() {
        let store = VariableStore::new();
        store.upsert("b", b"[1,2]", 0);
        store.upsert("a", b"\"x\"", 0);

        assert_eq!(store.dump_all(0), b"var a=\"x\";\r\nvar b=[1,2];\r\n");
    }

    #[test]
    fn test_store_dump_empty() {
        let store = VariableStore::new();
        assert_eq!(store.dump_all(1000), b"");
    }

    #[test]
    fn test_store_dump_evicts_stale() {
        let store = VariableStore::new();
        store.upsert("old", b"\"1\"", 1000);
        store.upsert("new", b"\"2\"", 4000);

        // Exactly at the threshold is still live
        assert_eq!(store.dump_all(6000), b"var new=\"2\";\r\nvar old=\"1\";\r\n");

        assert_eq!(store.dump_all(6001), b"var new=\"2\";\r\n");
        assert_eq!(store.get("old"), None);
        assert_eq!(store.names(), vec!["new".to_string()]);
    }

    #[test]
    fn test_store_dump_is_byte_exact() {
        let store = VariableStore::new();
        store.upsert("a", b"\"\xff\xfe\"", 0);
        store.upsert("b", b"[\x00\x80]", 0);

        assert_eq!(
            store.dump_all(0),
            b"var a=\"\xff\xfe\";\r\nvar b=[\x00\x80];\r\n".to_vec()
        );
        assert_eq!(store.get("a").as_deref(), Some(&b"\"\xff\xfe\""[..]));
    }

    #[test]
    fn test_store_get_does_not_evict() {
        let store = VariableStore::new();
        store.upsert("a", b"\"1\"", 0);

        // No dump has run, the entry is still there however old
        assert_eq!(store.get("a").as_deref(), Some(&b"\"1\""[..]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_clock_behind_write_time() {
        let store = VariableStore::new();
        store.upsert("a", b"\"1\"", 9000);
        assert_eq!(store.dump_all(100), b"var a=\"1\";\r\n");
    }

    #[test]
    fn test_store_write_dropped_while_locked() {
        let store = VariableStore::with_policy(
            LockPolicy {
                write_wait: Duration::from_millis(1),
                read_wait: Duration::from_millis(1),
            },
            DEFAULT_STALENESS_MS,
        );
        store.upsert("a", b"\"1\"", 0);

        let held = store.vars.lock().unwrap();
        assert!(!store.upsert("a", b"\"2\"", 1));
        assert_eq!(store.get("a"), None);
        assert_eq!(store.dump_all(0), b"");
        drop(held);

        assert_eq!(store.get("a").as_deref(), Some(&b"\"1\""[..]));
    }

    #[test]
    fn test_store_concurrent_readers() {
        let store = Arc::new(VariableStore::new());
        store.upsert("a", b"\"0\"", 0);

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..500u64 {
                    store.upsert("a", format!("\"{}\"", i).as_bytes(), i);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..200 {
                        if let Some(content) = store.get("a") {
                            assert!(content.starts_with(b"\"") && content.ends_with(b"\""));
                        }
                        let dump = store.dump_all(0);
                        assert!(dump.is_empty() || dump.ends_with(b";\r\n"));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
