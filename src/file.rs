//! Content hashing for files on disk.
//!
//! [`FileCacher`] keeps a table of path → hex digest and shares the persistence
//! lifecycle of every other cacher. Comparing the table against a previously
//! persisted one tells which files changed since it was saved.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{self, Path, PathBuf};
use std::vec;

use tracing::debug;

use memocache_paths::{PathPatterns, expand_directories};

use crate::backend::{Backend, JsonBackend};
use crate::cacher::{Cacher, CacherConfig, CacherCore};
use crate::compare::{self, Comparators};
use crate::error::CacheError;

pub type FileHashTable = BTreeMap<PathBuf, String>;

/// A freshly computed digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub file: PathBuf,
    pub digest: String,
}

pub struct FileCacher<B = JsonBackend> {
    core: CacherCore,
    backend: B,
    cache: FileHashTable,
}

impl<B: Backend> FileCacher<B> {
    pub fn new(config: CacherConfig) -> Result<Self, CacheError> {
        Self::with_backend(config, B::default())
    }

    pub fn with_backend(config: CacherConfig, backend: B) -> Result<Self, CacheError> {
        let mut cacher = Self {
            core: CacherCore::new::<Self>(&config)?,
            backend,
            cache: FileHashTable::new(),
        };

        if config.auto_load {
            cacher.try_auto_load()?;
        }

        Ok(cacher)
    }

    pub fn digest(&self, path: &Path) -> Option<&str> {
        let key = table_key(path, env::current_dir().ok().as_deref());
        self.cache.get(&key).map(String::as_str)
    }

    /// Hash one file, overwriting its table entry.
    ///
    /// The entry is keyed the way it comes back from a reload: relative to the
    /// current directory when the file lies under it, absolute otherwise.
    pub fn hash_file(&mut self, path: impl AsRef<Path>) -> Result<FileDigest, CacheError> {
        let path = path.as_ref();

        let mut hasher = self.hash_algorithm().hasher();
        let bytes = hasher.update_reader(BufReader::new(File::open(path)?))?;
        let digest = hasher.finalize_hex();

        let file = table_key(path, env::current_dir().ok().as_deref());
        debug!(file = %file.display(), bytes, %digest, "file hashed");
        self.cache.insert(file.clone(), digest.clone());
        self.save_if_auto()?;

        Ok(FileDigest { file, digest })
    }

    /// Lazily hash every file under `paths`.
    ///
    /// Directories are expanded `depth` levels deep (0 takes only the files
    /// directly inside them). With `patterns`, only matching files are hashed.
    /// The table is updated as the returned iterator is advanced.
    pub fn hash_files<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        patterns: Option<&PathPatterns>,
        depth: usize,
    ) -> Result<HashFiles<'_, B>, CacheError> {
        let mut files = expand_directories(paths, depth)?;
        if let Some(patterns) = patterns {
            files.retain(|file| patterns.matches(file));
        }

        debug!(files = files.len(), depth, "hashing files");

        Ok(HashFiles {
            cacher: self,
            files: files.into_iter(),
        })
    }

    /// Hash every file under `paths` and return how many were hashed.
    ///
    /// Saves once at the end instead of after every file when auto-save is on.
    pub fn hash_all<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        patterns: Option<&PathPatterns>,
        depth: usize,
    ) -> Result<usize, CacheError> {
        let hashed = {
            let mut cacher = self.override_auto_save(false);
            let mut hashed = 0;
            for digest in cacher.hash_files(paths, patterns, depth)? {
                digest?;
                hashed += 1;
            }
            hashed
        };

        self.save_if_auto()?;
        Ok(hashed)
    }

    /// For every file in the table, whether its digest differs from the one in
    /// `other` (persisted state when `None`). Files missing from `other`
    /// count as changed.
    pub fn compare_hashes(
        &mut self,
        other: Option<&FileHashTable>,
    ) -> Result<BTreeMap<PathBuf, bool>, CacheError> {
        let comparators = Comparators::new();
        match other {
            Some(other) => Ok(compare::compare_maps(&self.cache, other, &comparators)),
            None => {
                let persisted = self.load_cache(None, false)?;
                Ok(compare::compare_maps(&self.cache, &persisted, &comparators))
            }
        }
    }

    /// Paths whose digest changed, per [`Self::compare_hashes`].
    pub fn changed_files(&mut self, other: Option<&FileHashTable>) -> Result<Vec<PathBuf>, CacheError> {
        Ok(self
            .compare_hashes(other)?
            .into_iter()
            .filter_map(|(file, changed)| changed.then_some(file))
            .collect())
    }
}

impl<B: Backend> Cacher for FileCacher<B> {
    const TYPE_NAME: &'static str = "FileCacher";

    type Cache = FileHashTable;
    type StateCache = BTreeMap<String, String>;
    type Backend = B;

    fn core(&self) -> &CacherCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CacherCore {
        &mut self.core
    }

    fn backend(&self) -> &B {
        &self.backend
    }

    fn cache(&self) -> &FileHashTable {
        &self.cache
    }

    fn replace_cache(&mut self, cache: FileHashTable) -> FileHashTable {
        std::mem::replace(&mut self.cache, cache)
    }

    fn new_cache(&self) -> FileHashTable {
        FileHashTable::new()
    }

    /// Paths are persisted absolute.
    fn cache_to_state_cache(&self) -> Self::StateCache {
        self.cache
            .iter()
            .map(|(file, digest)| {
                let file = path::absolute(file).unwrap_or_else(|_| file.clone());
                (file.to_string_lossy().into_owned(), digest.clone())
            })
            .collect()
    }

    /// Paths under the current directory come back relative to it.
    fn state_cache_to_cache(&self, state_cache: Self::StateCache) -> Result<FileHashTable, CacheError> {
        let cwd = env::current_dir().ok();
        Ok(state_cache
            .into_iter()
            .map(|(file, digest)| (table_key(Path::new(&file), cwd.as_deref()), digest))
            .collect())
    }
}

/// Absolute form of `path`, made relative to `cwd` when it lies under it.
fn table_key(path: &Path, cwd: Option<&Path>) -> PathBuf {
    let absolute = path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match cwd {
        Some(cwd) => absolute
            .strip_prefix(cwd)
            .map(Path::to_path_buf)
            .unwrap_or(absolute),
        None => absolute,
    }
}

impl<B: fmt::Debug> fmt::Debug for FileCacher<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCacher")
            .field("save_path", &self.core.save_path())
            .field("hash_algorithm", &self.core.hash_algorithm())
            .field("backend", &self.backend)
            .field("files", &self.cache.len())
            .finish()
    }
}

/// Iterator returned by [`FileCacher::hash_files`]; one item per file.
pub struct HashFiles<'a, B: Backend> {
    cacher: &'a mut FileCacher<B>,
    files: vec::IntoIter<PathBuf>,
}

impl<B: Backend> Iterator for HashFiles<'_, B> {
    type Item = Result<FileDigest, CacheError>;

    fn next(&mut self) -> Option<Self::Item> {
        let file = self.files.next()?;
        Some(self.cacher.hash_file(file))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.files.size_hint()
    }
}

impl<B: Backend> ExactSizeIterator for HashFiles<'_, B> {}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::hashing::HashAlgorithm;

    fn cacher(dir: &tempfile::TempDir) -> FileCacher {
        FileCacher::new(CacherConfig::new().with_save_path(dir.path().join("state/files.json")))
            .unwrap()
    }

    #[test]
    fn hash_file_matches_a_direct_digest() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "abc").unwrap();

        let mut cacher = cacher(&dir);
        let digest = cacher.hash_file(&file).unwrap();

        assert_eq!(digest.digest, HashAlgorithm::Sha256.digest_hex("abc"));
        assert_eq!(cacher.digest(&file), Some(digest.digest.as_str()));
    }

    #[test]
    fn rehashing_overwrites_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "one").unwrap();

        let mut cacher = cacher(&dir);
        let first = cacher.hash_file(&file).unwrap();
        fs::write(&file, "two").unwrap();
        let second = cacher.hash_file(&file).unwrap();

        assert_ne!(first.digest, second.digest);
        assert_eq!(cacher.cache().len(), 1);
        assert_eq!(cacher.digest(&file), Some(second.digest.as_str()));
    }

    #[test]
    fn hash_files_is_lazy() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("a.txt"), "a").unwrap();
        fs::write(data.join("b.txt"), "b").unwrap();

        let mut cacher = cacher(&dir);
        let mut files = cacher.hash_files(&[&data], None, 0).unwrap();
        assert_eq!(files.len(), 2);
        let first = files.next().unwrap().unwrap();
        drop(files);

        assert_eq!(cacher.cache().len(), 1);
        assert_eq!(first.file, data.join("a.txt"));
    }

    #[test]
    fn patterns_filter_hashed_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("skip.txt"), "text").unwrap();

        let patterns = PathPatterns::new(&["*.rs"]).unwrap();
        let mut cacher = cacher(&dir);
        let hashed = cacher.hash_all(&[dir.path()], Some(&patterns), 0).unwrap();

        assert_eq!(hashed, 1);
        assert!(cacher.digest(&dir.path().join("keep.rs")).is_some());
    }

    #[test]
    fn hash_all_restores_auto_save_and_saves_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let mut cacher = FileCacher::<JsonBackend>::new(
            CacherConfig::new()
                .with_save_path(dir.path().join("state/files.json"))
                .with_auto_save(true),
        )
        .unwrap();
        cacher.hash_all(&[dir.path()], None, 0).unwrap();

        assert!(cacher.auto_save());
        assert!(cacher.save_path().exists());
    }

    #[test]
    fn persisted_paths_are_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "a").unwrap();

        let mut cacher = cacher(&dir);
        cacher.hash_file(&file).unwrap();
        let state = cacher.cache_to_state_cache();

        let key = state.keys().next().unwrap();
        assert!(Path::new(key).is_absolute());
    }

    #[test]
    fn compare_hashes_flags_changed_and_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "a").unwrap();

        let mut cacher = cacher(&dir);
        cacher.hash_file(&a).unwrap();
        let snapshot = cacher.cache().clone();

        fs::write(&a, "changed").unwrap();
        fs::write(&b, "b").unwrap();
        cacher.hash_file(&a).unwrap();
        cacher.hash_file(&b).unwrap();

        let diff = cacher.compare_hashes(Some(&snapshot)).unwrap();
        assert!(diff[&a]);
        assert!(diff[&b]);
        assert_eq!(cacher.changed_files(Some(&snapshot)).unwrap(), vec![a, b]);
    }

    #[test]
    fn table_keys_are_absolute_or_relative_to_the_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");

        assert_eq!(table_key(&dir.path().join("./a.txt"), None), file);
        assert_eq!(table_key(&file, Some(dir.path())), PathBuf::from("a.txt"));
        assert_eq!(table_key(&file, Some(Path::new("/elsewhere"))), file);
    }

    #[test]
    fn files_under_the_working_directory_match_their_reloaded_keys() {
        let cwd = env::current_dir().unwrap();
        let work = tempfile::Builder::new()
            .prefix(".memocache-cwd")
            .tempdir_in(&cwd)
            .unwrap();
        let file = work.path().join("a.txt");
        fs::write(&file, "a").unwrap();
        let relative = file.strip_prefix(&cwd).unwrap().to_path_buf();

        let mut cacher = cacher(&work);
        let digest = cacher.hash_file(&file).unwrap();
        assert_eq!(digest.file, relative);
        cacher.hash_file(Path::new(".").join(&relative)).unwrap();
        assert_eq!(cacher.cache().len(), 1);
        cacher.save(None).unwrap();

        assert_eq!(cacher.changed_files(None).unwrap(), Vec::<PathBuf>::new());
        assert!(cacher.digest(&file).is_some());
    }
}
