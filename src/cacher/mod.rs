//! The lifecycle contract shared by every cache type.
//!
//! A concrete cacher owns an in-memory cache object of its own choosing and a
//! [`CacherCore`] holding the settings common to all cachers. Implementing the
//! three conversion hooks of [`Cacher`] is enough to get persistence, loading,
//! clearing, and auto-save behaviour through the provided methods, with the
//! storage format delegated to the cacher's [`Backend`].

pub mod config;
pub mod guard;

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use memocache_utils::snake_case;

use crate::backend::{Backend, ensure_parent_dir};
use crate::error::CacheError;
use crate::hashing::HashAlgorithm;

pub use config::{CACHE_DIR_ENV, CacherConfig, cache_root};
pub use guard::AutoSaveOverride;

/// Metadata persisted alongside every cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub hash_algorithm: String,
}

/// The unit of persistence: metadata plus the persistable form of the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacherState<C> {
    pub metadata: Metadata,
    pub cache: C,
}

/// Settings shared by every cacher, resolved at construction.
#[derive(Debug, Clone)]
pub struct CacherCore {
    save_path: PathBuf,
    hash_algorithm: HashAlgorithm,
    pub(crate) auto_save: bool,
}

impl CacherCore {
    /// Resolve the save location for cacher type `C` and make sure its parent
    /// directory exists.
    pub fn new<C: Cacher>(config: &CacherConfig) -> Result<Self, CacheError> {
        let save_path = config
            .save_path
            .clone()
            .unwrap_or_else(default_save_path::<C>);

        ensure_parent_dir(&save_path)?;
        debug!("cacher save path resolved" = %save_path.display(), cacher = C::TYPE_NAME);

        Ok(Self {
            save_path,
            hash_algorithm: config.hash_algorithm,
            auto_save: config.auto_save,
        })
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }
}

/// `<root>/<snake_case type name>/cache<backend extension>`.
pub fn default_save_path<C: Cacher>() -> PathBuf {
    cache_root()
        .join(snake_case(C::TYPE_NAME))
        .join(format!("cache{}", <C::Backend as Backend>::EXTENSION))
}

pub trait Cacher: Sized {
    /// Name the default save directory is derived from.
    const TYPE_NAME: &'static str;

    /// In-memory cache object.
    type Cache;
    /// Persistable form of [`Self::Cache`].
    type StateCache: Serialize + DeserializeOwned;
    type Backend: Backend;

    fn core(&self) -> &CacherCore;
    fn core_mut(&mut self) -> &mut CacherCore;
    fn backend(&self) -> &Self::Backend;

    fn cache(&self) -> &Self::Cache;
    /// Swap in `cache`, returning the previous one.
    fn replace_cache(&mut self, cache: Self::Cache) -> Self::Cache;

    /// A fresh, empty cache object.
    fn new_cache(&self) -> Self::Cache;
    fn cache_to_state_cache(&self) -> Self::StateCache;
    fn state_cache_to_cache(&self, state_cache: Self::StateCache)
    -> Result<Self::Cache, CacheError>;

    /// Empty the in-memory cache. Cachers whose cache keys carry meaning
    /// beyond their contents may keep the keys.
    fn reset_cache(&mut self) {
        let fresh = self.new_cache();
        self.replace_cache(fresh);
    }

    fn save_path(&self) -> &Path {
        self.core().save_path()
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        self.core().hash_algorithm()
    }

    fn metadata(&self) -> Metadata {
        Metadata {
            hash_algorithm: self.hash_algorithm().name().to_string(),
        }
    }

    fn get_state(&self) -> CacherState<Self::StateCache> {
        CacherState {
            metadata: self.metadata(),
            cache: self.cache_to_state_cache(),
        }
    }

    /// Persist [`Self::get_state`] to `path`, defaulting to the save path.
    fn save(&self, path: Option<&Path>) -> Result<&Self, CacheError> {
        let path = path.unwrap_or_else(|| self.save_path());
        self.backend().save(path, &self.get_state())?;
        debug!("cacher state saved" = %path.display(), cacher = Self::TYPE_NAME);
        Ok(self)
    }

    /// Read persisted state from `path`, defaulting to the save path.
    fn load(&self, path: Option<&Path>) -> Result<CacherState<Self::StateCache>, CacheError> {
        let path = path.unwrap_or_else(|| self.save_path());
        let state: CacherState<Self::StateCache> = self.backend().load(path)?;

        let configured = self.hash_algorithm().name();
        if state.metadata.hash_algorithm != configured {
            warn!(
                path = %path.display(),
                persisted = %state.metadata.hash_algorithm,
                configured,
                "persisted cache was built with a different hash algorithm"
            );
        }

        debug!("cacher state loaded" = %path.display(), cacher = Self::TYPE_NAME);
        Ok(state)
    }

    /// Load persisted state and convert it to an in-memory cache. With
    /// `inplace`, the result also replaces the current in-memory cache.
    fn load_cache(&mut self, path: Option<&Path>, inplace: bool) -> Result<Self::Cache, CacheError>
    where
        Self::Cache: Clone,
    {
        let state = self.load(path)?;
        let cache = self.state_cache_to_cache(state.cache)?;
        if inplace {
            self.replace_cache(cache.clone());
        }
        Ok(cache)
    }

    /// [`Self::load_cache`] in place, without handing back a copy.
    fn reload(&mut self, path: Option<&Path>) -> Result<(), CacheError> {
        let state = self.load(path)?;
        let cache = self.state_cache_to_cache(state.cache)?;
        self.replace_cache(cache);
        Ok(())
    }

    /// [`Self::reload`], treating "nothing persisted yet" as success.
    fn try_auto_load(&mut self) -> Result<bool, CacheError> {
        match self.reload(None) {
            Ok(()) => Ok(true),
            Err(CacheError::StateNotFound { path }) => {
                debug!("no persisted state to auto-load" = %path.display());
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Remove every persisted artifact. Nothing on disk is not an error.
    fn clear_file_cache(&self, path: Option<&Path>) -> Result<(), CacheError> {
        let path = path.unwrap_or_else(|| self.save_path());
        let removed = self.backend().clear(path)?;
        debug!(path = %path.display(), removed, "persisted cache cleared");
        Ok(())
    }

    fn clear_memory_cache(&mut self) -> Result<(), CacheError> {
        self.reset_cache();
        debug!(cacher = Self::TYPE_NAME, "in-memory cache cleared");
        self.save_if_auto()
    }

    /// Clear the in-memory cache, then the persisted one.
    fn clear(&mut self, path: Option<&Path>) -> Result<(), CacheError> {
        self.clear_memory_cache()?;
        self.clear_file_cache(path)
    }

    fn auto_save(&self) -> bool {
        self.core().auto_save
    }

    fn set_auto_save(&mut self, auto_save: bool) {
        self.core_mut().auto_save = auto_save;
    }

    /// Save to the default location when auto-save is enabled. Called at the
    /// end of every mutating operation.
    fn save_if_auto(&self) -> Result<(), CacheError> {
        if self.auto_save() {
            self.save(None)?;
        }
        Ok(())
    }

    /// Override `auto_save` until the returned guard is dropped.
    fn override_auto_save(&mut self, auto_save: bool) -> AutoSaveOverride<'_, Self> {
        AutoSaveOverride::new(self, auto_save)
    }
}
