// Cache module for GitHub API responses.
// In-memory store with optional on-disk persistence.

pub mod paths;
pub mod persist;
pub mod store;

pub use persist::{CachePersistence, FilePersistence, MemoryPersistence};
pub use store::{CacheEntry, CacheKey, CacheMap, CacheStore, DEFAULT_TTL, Namespace};
