//! Injected key-value storage with per-entry expiry.
//!
//! Entries whose `expires_at` is at or before the current time are treated
//! as absent by every read and are dropped by [`KeyValueStore::purge_expired`].

use crate::error::{VaultError, VaultResult};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;
use zeroize::Zeroizing;

/// Time source for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Storage backend used by profiles and the ephemeral key registry.
pub trait KeyValueStore: Send + Sync {
    /// Inserts or replaces `key`. `ttl` of `None` never expires.
    fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> VaultResult<()>;

    /// Inserts only if no live entry exists. Returns whether it was inserted.
    fn put_if_absent(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
    -> VaultResult<bool>;

    fn get(&self, key: &str) -> VaultResult<Option<Vec<u8>>>;

    /// Removes and returns a live entry in one step.
    fn take(&self, key: &str) -> VaultResult<Option<Vec<u8>>>;

    /// Returns whether a live entry was removed.
    fn delete(&self, key: &str) -> VaultResult<bool>;

    /// Drops expired entries and returns how many were dropped.
    fn purge_expired(&self) -> VaultResult<usize>;

    fn contains(&self, key: &str) -> VaultResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> VaultResult<()> {
        (**self).put(key, value, ttl)
    }

    fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> VaultResult<bool> {
        (**self).put_if_absent(key, value, ttl)
    }

    fn get(&self, key: &str) -> VaultResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn take(&self, key: &str) -> VaultResult<Option<Vec<u8>>> {
        (**self).take(key)
    }

    fn delete(&self, key: &str) -> VaultResult<bool> {
        (**self).delete(key)
    }

    fn purge_expired(&self) -> VaultResult<usize> {
        (**self).purge_expired()
    }
}

struct Entry {
    value: Zeroizing<Vec<u8>>,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process store. Values are zeroized when replaced, removed or purged.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of entries held, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expiry(&self, ttl: Option<Duration>) -> VaultResult<Option<DateTime<Utc>>> {
        expiry_from(self.clock.now(), ttl)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn expiry_from(now: DateTime<Utc>, ttl: Option<Duration>) -> VaultResult<Option<DateTime<Utc>>> {
    match ttl {
        None => Ok(None),
        Some(ttl) => now
            .checked_add_signed(ttl)
            .map(Some)
            .ok_or_else(|| VaultError::Storage(format!("ttl of {ttl} is out of range"))),
    }
}

fn poisoned<T>(_: T) -> VaultError {
    VaultError::Storage("memory store lock poisoned".to_string())
}

impl KeyValueStore for MemoryStore {
    fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> VaultResult<()> {
        let entry = Entry {
            value: Zeroizing::new(value),
            expires_at: self.expiry(ttl)?,
        };
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), entry);
        Ok(())
    }

    fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> VaultResult<bool> {
        let now = self.clock.now();
        let expires_at = expiry_from(now, ttl)?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        if entries.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Zeroizing::new(value),
                expires_at,
            },
        );
        Ok(true)
    }

    fn get(&self, key: &str) -> VaultResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.to_vec()))
    }

    fn take(&self, key: &str) -> VaultResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(poisoned)?;
        match entries.remove(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.to_vec())),
            Some(_) => {
                debug!("dropped expired entry {key} on take");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> VaultResult<bool> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(poisoned)?;
        Ok(entries.remove(key).is_some_and(|e| e.is_live(now)))
    }

    fn purge_expired(&self) -> VaultResult<usize> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        let purged = before - entries.len();
        if purged > 0 {
            debug!("purged {purged} expired entries");
        }
        Ok(purged)
    }
}
