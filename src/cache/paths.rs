// Filesystem locations used by hubscout.

use std::path::PathBuf;

use directories::ProjectDirs;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "hubscout")
}

/// Get the base cache directory (~/.cache/hubscout on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Path to the persisted response cache.
pub fn cache_file_path() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("cache.json"))
}

/// Path to the user configuration file.
pub fn config_file_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}
