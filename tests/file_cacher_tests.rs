use std::fs;
use std::path::Path;

use anyhow::Result;
use memocache::{
    CacheError, Cacher, CacherConfig, FileCacher, HashAlgorithm, PathPatterns, YamlBackend,
};

fn temp_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("failed to create temp dir")
}

/// `file1.txt` and `folder1/{file1.txt, file2.txt}`.
fn sample_tree(root: &Path) -> Result<()> {
    fs::create_dir_all(root.join("folder1"))?;
    fs::write(root.join("file1.txt"), "top level\n")?;
    fs::write(root.join("folder1/file1.txt"), "nested one\n")?;
    fs::write(root.join("folder1/file2.txt"), "nested two\n")?;
    Ok(())
}

fn config_in(dir: &Path) -> CacherConfig {
    CacherConfig::new().with_save_path(dir.join("file_cacher/cache.json"))
}

#[test]
fn directory_depth_controls_which_files_are_hashed() -> Result<()> {
    let tree = temp_dir("memocache-tree");
    let state = temp_dir("memocache-state");
    sample_tree(tree.path())?;

    let mut cacher: FileCacher = FileCacher::new(config_in(state.path()))?;
    let top_level = tree.path().join("file1.txt");

    assert_eq!(cacher.hash_all(&[tree.path()], None, 0)?, 1);
    assert_eq!(cacher.cache().len(), 1);
    let first_digest = cacher.digest(&top_level).map(str::to_owned);
    assert!(first_digest.is_some());

    assert_eq!(cacher.hash_all(&[tree.path()], None, 1)?, 3);
    assert_eq!(cacher.cache().len(), 3);
    assert_eq!(cacher.digest(&top_level).map(str::to_owned), first_digest);
    Ok(())
}

#[test]
fn hash_files_yields_each_file_once() -> Result<()> {
    let tree = temp_dir("memocache-tree");
    let state = temp_dir("memocache-state");
    sample_tree(tree.path())?;

    let mut cacher: FileCacher = FileCacher::new(config_in(state.path()))?;
    let digests = cacher
        .hash_files(&[tree.path()], None, 1)?
        .collect::<Result<Vec<_>, CacheError>>()?;

    let files: Vec<_> = digests.iter().map(|d| d.file.clone()).collect();
    assert_eq!(
        files,
        [
            tree.path().join("file1.txt"),
            tree.path().join("folder1/file1.txt"),
            tree.path().join("folder1/file2.txt"),
        ]
    );
    assert_eq!(
        digests[0].digest,
        HashAlgorithm::Sha256.digest_hex("top level\n")
    );

    // restartable: a second pass yields the same files again
    assert_eq!(cacher.hash_files(&[tree.path()], None, 1)?.count(), 3);
    Ok(())
}

#[test]
fn patterns_select_nested_files() -> Result<()> {
    let tree = temp_dir("memocache-tree");
    let state = temp_dir("memocache-state");
    sample_tree(tree.path())?;

    let patterns = PathPatterns::new(&["folder1/*.txt"])?;
    let mut cacher: FileCacher = FileCacher::new(config_in(state.path()))?;

    assert_eq!(cacher.hash_all(&[tree.path()], Some(&patterns), 1)?, 2);
    assert!(cacher.digest(&tree.path().join("file1.txt")).is_none());
    Ok(())
}

#[test]
fn missing_files_surface_io_errors() -> Result<()> {
    let state = temp_dir("memocache-state");
    let mut cacher: FileCacher = FileCacher::new(config_in(state.path()))?;

    let err = cacher
        .hash_file(state.path().join("does-not-exist.txt"))
        .unwrap_err();
    assert!(matches!(err, CacheError::Io(_)));
    assert!(cacher.cache().is_empty());
    Ok(())
}

#[test]
fn compare_hashes_defaults_to_persisted_state() -> Result<()> {
    let tree = temp_dir("memocache-tree");
    let state = temp_dir("memocache-state");
    sample_tree(tree.path())?;

    let mut cacher: FileCacher = FileCacher::new(config_in(state.path()))?;
    cacher.hash_all(&[tree.path()], None, 1)?;
    cacher.save(None)?;

    let edited = tree.path().join("folder1/file2.txt");
    fs::write(&edited, "edited\n")?;
    cacher.hash_file(&edited)?;

    let diff = cacher.compare_hashes(None)?;
    assert_eq!(diff.len(), 3);
    assert!(diff[&edited]);
    assert!(!diff[&tree.path().join("file1.txt")]);
    assert_eq!(cacher.changed_files(None)?, vec![edited]);
    Ok(())
}

#[test]
fn yaml_state_round_trips() -> Result<()> {
    let tree = temp_dir("memocache-tree");
    let state = temp_dir("memocache-state");
    sample_tree(tree.path())?;

    let config = CacherConfig::new()
        .with_save_path(state.path().join("files.yaml"))
        .with_hash_algorithm(HashAlgorithm::Sha1)
        .with_auto_save(true);

    let mut cacher = FileCacher::<YamlBackend>::new(config.clone())?;
    cacher.hash_all(&[tree.path()], None, 1)?;

    let restored = FileCacher::<YamlBackend>::new(config)?;
    assert_eq!(restored.cache(), cacher.cache());
    assert_eq!(
        restored.get_state().metadata.hash_algorithm,
        HashAlgorithm::Sha1.name()
    );
    Ok(())
}

#[test]
fn clear_forgets_digests_and_removes_the_document() -> Result<()> {
    let tree = temp_dir("memocache-tree");
    let state = temp_dir("memocache-state");
    sample_tree(tree.path())?;

    let mut cacher: FileCacher = FileCacher::new(config_in(state.path()).with_auto_save(true))?;
    cacher.hash_all(&[tree.path()], None, 0)?;
    assert!(cacher.save_path().exists());

    cacher.clear(None)?;
    assert!(cacher.cache().is_empty());
    assert!(!cacher.save_path().exists());
    assert!(cacher.load(None).unwrap_err().is_state_not_found());
    Ok(())
}
