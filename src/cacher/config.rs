use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::hashing::HashAlgorithm;

/// Overrides the directory default save locations are derived under.
pub const CACHE_DIR_ENV: &str = "MEMOCACHE_DIR";

/// Construction-time settings shared by every cacher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacherConfig {
    /// Where state is persisted. Derived from the cacher's type name when unset.
    pub save_path: Option<PathBuf>,
    pub hash_algorithm: HashAlgorithm,
    /// Maximum ledger length for function caches; unbounded when unset.
    pub cache_size: Option<usize>,
    /// Persist after every mutating operation.
    pub auto_save: bool,
    /// Try to load persisted state on construction.
    pub auto_load: bool,
}

impl Default for CacherConfig {
    fn default() -> Self {
        Self {
            save_path: None,
            hash_algorithm: HashAlgorithm::default(),
            cache_size: None,
            auto_save: false,
            auto_load: true,
        }
    }
}

impl CacherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    pub fn with_cache_size(mut self, cache_size: Option<usize>) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn with_auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    pub fn with_auto_load(mut self, auto_load: bool) -> Self {
        self.auto_load = auto_load;
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CacheError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, CacheError> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}

/// Directory default save paths live under: `$MEMOCACHE_DIR` when set,
/// otherwise the current directory.
pub fn cache_root() -> PathBuf {
    match env::var_os(CACHE_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::new(),
    }
}
