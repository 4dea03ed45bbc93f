// Persistence substrates for the response cache.
// The store hands its whole entry map to one of these on every write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::store::CacheMap;

/// Durable backing for a [`CacheStore`](super::CacheStore).
pub trait CachePersistence: Send + Sync {
    /// Load previously persisted entries. `Ok(None)` means nothing was saved.
    fn load(&self) -> Result<Option<CacheMap>>;

    /// Replace the persisted representation with `entries`.
    fn save(&self, entries: &CacheMap) -> Result<()>;

    /// Remove the persisted representation.
    fn erase(&self) -> Result<()>;
}

/// Volatile substrate: nothing survives a restart.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryPersistence;

impl CachePersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<CacheMap>> {
        Ok(None)
    }

    fn save(&self, _entries: &CacheMap) -> Result<()> {
        Ok(())
    }

    fn erase(&self) -> Result<()> {
        Ok(())
    }
}

/// Stores the cache as a single JSON document on disk.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Persistence at the platform default location, if one can be determined.
    pub fn default_location() -> Option<Self> {
        super::paths::cache_file_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CachePersistence for FilePersistence {
    fn load(&self) -> Result<Option<CacheMap>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        let entries: CacheMap = serde_json::from_str(&contents)?;
        Ok(Some(entries))
    }

    fn save(&self, entries: &CacheMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(entries)?;

        // Write atomically via temp file
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    fn erase(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::CacheEntry;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_file_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = FilePersistence::new(temp_dir.path().join("nested/cache.json"));

        assert!(persistence.load().unwrap().is_none());

        let mut entries = CacheMap::new();
        entries.insert(
            "users:octocat".to_string(),
            CacheEntry {
                timestamp: Utc::now(),
                data: json!({"login": "octocat"}),
            },
        );
        persistence.save(&entries).unwrap();

        let loaded = persistence.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["users:octocat"].data["login"], "octocat");
        assert!(!persistence.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_file_erase() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = FilePersistence::new(temp_dir.path().join("cache.json"));

        persistence.save(&CacheMap::new()).unwrap();
        assert!(persistence.path().exists());

        persistence.erase().unwrap();
        assert!(!persistence.path().exists());

        // Erasing twice is fine
        persistence.erase().unwrap();
    }

    #[test]
    fn test_corrupt_file_fails_to_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();

        assert!(FilePersistence::new(path).load().is_err());
    }
}
