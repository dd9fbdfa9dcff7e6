//! Binary record-store backend.
//!
//! A store is a header followed by length-prefixed records, each holding a
//! key and a bincode payload. Values keep their native Rust shape; nothing is
//! flattened to text. Records can be appended to an existing store, and when
//! a key occurs more than once the last record wins. A trailing record cut
//! short by an interrupted write is ignored.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Backend, CACHE_KEY, METADATA_KEY, check_top_level_keys, ensure_parent_dir};
use crate::cacher::{CacherState, Metadata};
use crate::error::CacheError;

const MAGIC: &[u8; 8] = b"MEMOREC1";
const LEN_PREFIX: usize = std::mem::size_of::<u64>();

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    key: String,
    payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStore;

impl RecordStore {
    /// Append one `key` record to the store at `path`, creating the store if
    /// needed.
    pub fn append<T: Serialize>(&self, path: &Path, key: &str, value: &T) -> Result<(), CacheError> {
        ensure_parent_dir(path)?;
        let is_new = fs::metadata(path).map_or(true, |meta| meta.len() == 0);

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        if is_new {
            writer.write_all(MAGIC)?;
        }
        write_record(&mut writer, key, value)?;
        writer.flush()?;
        Ok(())
    }

    /// Every key present in the store, latest record per key.
    pub fn keys(&self, path: &Path) -> Result<Vec<String>, CacheError> {
        let mut keys: Vec<String> = read_records(path)?.into_keys().collect();
        keys.sort();
        Ok(keys)
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl Backend for RecordStore {
    const EXTENSION: &'static str = ".db";

    /// Writes the state to a sibling temp file and renames it into place, so
    /// a failed save leaves the previous store intact.
    fn save<C: Serialize>(&self, path: &Path, state: &CacherState<C>) -> Result<(), CacheError> {
        ensure_parent_dir(path)?;
        let temp = Self::temp_path(path);

        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            writer.write_all(MAGIC)?;
            write_record(&mut writer, METADATA_KEY, &state.metadata)?;
            write_record(&mut writer, CACHE_KEY, &state.cache)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&temp, path)?;
        Ok(())
    }

    fn load<C: DeserializeOwned>(&self, path: &Path) -> Result<CacherState<C>, CacheError> {
        let mut records = read_records(path)?;
        check_top_level_keys(
            path,
            records.contains_key(METADATA_KEY),
            records.contains_key(CACHE_KEY),
        )?;

        let metadata = records.remove(METADATA_KEY).unwrap_or_default();
        let cache = records.remove(CACHE_KEY).unwrap_or_default();

        Ok(CacherState {
            metadata: bincode::deserialize::<Metadata>(&metadata)?,
            cache: bincode::deserialize::<C>(&cache)?,
        })
    }

    fn artifacts(&self, path: &Path) -> Vec<PathBuf> {
        vec![path.to_path_buf(), Self::temp_path(path)]
    }
}

fn write_record<W: Write, T: Serialize + ?Sized>(
    writer: &mut W,
    key: &str,
    value: &T,
) -> Result<(), CacheError> {
    let record = Record {
        key: key.to_string(),
        payload: bincode::serialize(value)?,
    };
    let bytes = bincode::serialize(&record)?;
    writer.write_all(&(bytes.len() as u64).to_le_bytes())?;
    writer.write_all(&bytes)?;
    Ok(())
}

/// Latest payload per key. A missing file, an empty file, or a file too short
/// to hold the header reads as an empty store.
fn read_records(path: &Path) -> Result<HashMap<String, Vec<u8>>, CacheError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(err) => return Err(err.into()),
    };

    if data.len() < MAGIC.len() {
        return Ok(HashMap::new());
    }
    if &data[..MAGIC.len()] != MAGIC {
        return Err(CacheError::CorruptState {
            path: path.to_path_buf(),
            reason: "not a record store (bad header)".to_string(),
        });
    }

    let mut records = HashMap::new();
    let mut rest = &data[MAGIC.len()..];
    while !rest.is_empty() {
        let Some((len_bytes, tail)) = rest.split_first_chunk::<LEN_PREFIX>() else {
            warn!(path = %path.display(), "ignoring truncated record length");
            break;
        };
        let len = usize::try_from(u64::from_le_bytes(*len_bytes)).unwrap_or(usize::MAX);
        if len > tail.len() {
            warn!(path = %path.display(), "ignoring truncated trailing record");
            break;
        }

        let (body, tail) = tail.split_at(len);
        let record: Record = bincode::deserialize(body)?;
        records.insert(record.key, record.payload);
        rest = tail;
    }

    Ok(records)
}
