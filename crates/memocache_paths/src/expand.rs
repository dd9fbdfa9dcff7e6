use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Flatten `paths` into a list of files.
///
/// Non-directories are passed through untouched (they are not required to
/// exist; reading them is the caller's business). Directories are replaced by
/// the files they contain, descending into subdirectories up to `depth` levels:
/// `depth == 0` yields only the files directly inside each directory.
pub fn expand_directories<P: AsRef<Path>>(paths: &[P], depth: usize) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            files.extend(collect_files(path, depth)?);
        } else {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Collect the files under `base_dir`, recursing at most `depth` levels.
///
/// Entries are visited in file-name order so the result is stable across runs.
pub fn collect_files(base_dir: &Path, depth: usize) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(base_dir, 0, depth, &mut files)?;
    Ok(files)
}

fn walk(dir: &Path, level: usize, depth: usize, files: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();

    let mut subdirs = Vec::new();
    for entry in entries {
        if entry.is_dir() {
            subdirs.push(entry);
        } else {
            files.push(entry);
        }
    }

    if level < depth {
        for subdir in subdirs {
            walk(&subdir, level + 1, depth, files)?;
        }
    }

    Ok(())
}
