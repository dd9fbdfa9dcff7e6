//! Persistence strategies behind the cachers' save/load contract.

pub mod document;
pub mod record_store;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cacher::CacherState;
use crate::error::CacheError;

pub use document::{JsonBackend, YamlBackend};
pub use record_store::RecordStore;

/// Top-level keys every persisted state carries.
pub const METADATA_KEY: &str = "metadata";
pub const CACHE_KEY: &str = "cache";

pub trait Backend: Default + fmt::Debug {
    /// Appended to `cache` when deriving a default save path.
    const EXTENSION: &'static str;

    fn save<C: Serialize>(&self, path: &Path, state: &CacherState<C>) -> Result<(), CacheError>;

    /// Fails with [`CacheError::StateNotFound`] when `path` holds no
    /// recognisable state.
    fn load<C: DeserializeOwned>(&self, path: &Path) -> Result<CacherState<C>, CacheError>;

    /// Every file this backend may create for a state saved at `path`.
    fn artifacts(&self, path: &Path) -> Vec<PathBuf> {
        vec![path.to_path_buf()]
    }

    /// Remove the artifacts that exist; returns how many were removed.
    fn clear(&self, path: &Path) -> Result<usize, CacheError> {
        let mut removed = 0;
        for artifact in self.artifacts(path) {
            match fs::remove_file(&artifact) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(removed)
    }
}

/// Classify a loaded store by which top-level keys it has.
pub(crate) fn check_top_level_keys(
    path: &Path,
    has_metadata: bool,
    has_cache: bool,
) -> Result<(), CacheError> {
    match (has_metadata, has_cache) {
        (true, true) => Ok(()),
        (false, false) => Err(CacheError::state_not_found(path)),
        (true, false) => Err(CacheError::CorruptState {
            path: path.to_path_buf(),
            reason: format!("`{METADATA_KEY}` is present but `{CACHE_KEY}` is missing"),
        }),
        (false, true) => Err(CacheError::CorruptState {
            path: path.to_path_buf(),
            reason: format!("`{CACHE_KEY}` is present but `{METADATA_KEY}` is missing"),
        }),
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
