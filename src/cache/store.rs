// Namespaced response cache with a fixed TTL.
// Stale entries are skipped on read and replaced on the next successful write.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;

use super::persist::{CachePersistence, MemoryPersistence};

/// Default TTL for cached responses: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Logical partition of the cache key space, one per resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    ReposByLanguage,
    ReposByUser,
    Users,
    Languages,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::ReposByLanguage => "reposByLanguage",
            Namespace::ReposByUser => "reposByUser",
            Namespace::Users => "users",
            Namespace::Languages => "languages",
        }
    }
}

/// Fully qualified cache key, rendered as `{namespace}:{key}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: Namespace,
    pub key: String,
}

impl CacheKey {
    pub fn new(namespace: Namespace, key: impl Into<String>) -> Self {
        Self {
            namespace,
            key: key.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace.as_str(), self.key)
    }
}

/// A cached payload and the instant it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl CacheEntry {
    /// Valid while `now - timestamp < ttl`.
    pub fn is_valid(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match now.signed_duration_since(self.timestamp).to_std() {
            Ok(age) => age < ttl,
            // Written "in the future" (clock moved backwards): still fresh.
            Err(_) => true,
        }
    }
}

/// All entries, keyed by rendered [`CacheKey`].
pub type CacheMap = HashMap<String, CacheEntry>;

/// Response cache owned by a single client.
pub struct CacheStore {
    entries: Mutex<CacheMap>,
    // Held across persistence I/O so snapshots reach disk in write order.
    persist_lock: Mutex<()>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    persistence: Box<dyn CachePersistence>,
}

impl CacheStore {
    /// Create a store, recovering whatever `persistence` holds.
    ///
    /// A load failure is logged and the store starts empty.
    pub fn new(
        ttl: Duration,
        clock: Arc<dyn Clock>,
        persistence: Box<dyn CachePersistence>,
    ) -> Self {
        let entries = match persistence.load() {
            Ok(Some(entries)) => {
                tracing::debug!(count = entries.len(), "Recovered persisted cache");
                entries
            }
            Ok(None) => CacheMap::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable persisted cache");
                CacheMap::new()
            }
        };

        Self {
            entries: Mutex::new(entries),
            persist_lock: Mutex::new(()),
            ttl,
            clock,
            persistence,
        }
    }

    /// A volatile store using the system clock.
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock), Box::new(MemoryPersistence))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, CacheMap> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the cached payload if present and fresh.
    ///
    /// Entries that no longer deserialize as `T` are treated as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let now = self.clock.now();
        let entries = self.lock();
        let entry = entries.get(&key.to_string())?;

        if !entry.is_valid(now, self.ttl) {
            tracing::debug!(key = %key, "Cache entry stale");
            return None;
        }

        serde_json::from_value(entry.data.clone()).ok()
    }

    /// Write or overwrite an entry stamped with the current time.
    pub fn set<T: Serialize>(&self, key: &CacheKey, data: &T) -> Result<()> {
        let entry = CacheEntry {
            timestamp: self.clock.now(),
            data: serde_json::to_value(data)?,
        };

        let _persisting = self.persist_lock.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = {
            let mut entries = self.lock();
            entries.insert(key.to_string(), entry);
            entries.clone()
        };

        // Readers are not blocked while the snapshot is written out
        if let Err(e) = self.persistence.save(&snapshot) {
            tracing::warn!(key = %key, error = %e, "Failed to persist cache");
        }
        Ok(())
    }

    /// Remove every entry in every namespace, including the persisted copy.
    pub fn clear(&self) {
        let _persisting = self.persist_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.lock().clear();

        if let Err(e) = self.persistence.erase() {
            tracing::warn!(error = %e, "Failed to erase persisted cache");
        }
    }

    /// Number of entries held, fresh or stale.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
