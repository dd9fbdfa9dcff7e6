//! Human-readable document backends.
//!
//! The persisted cache must already be primitive-shaped (string-keyed maps,
//! sequences, scalars) when it reaches these backends; cachers flatten their
//! in-memory representation in `cache_to_state_cache`.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Backend, CACHE_KEY, METADATA_KEY, check_top_level_keys, ensure_parent_dir};
use crate::cacher::CacherState;
use crate::error::CacheError;

/// JSON document backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonBackend {
    pub pretty: bool,
}

impl Default for JsonBackend {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonBackend {
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Backend for JsonBackend {
    const EXTENSION: &'static str = ".json";

    fn save<C: Serialize>(&self, path: &Path, state: &CacherState<C>) -> Result<(), CacheError> {
        ensure_parent_dir(path)?;
        let mut writer = BufWriter::new(File::create(path)?);
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, state)?;
        } else {
            serde_json::to_writer(&mut writer, state)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn load<C: DeserializeOwned>(&self, path: &Path) -> Result<CacherState<C>, CacheError> {
        let Some(text) = read_document(path)? else {
            return Err(CacheError::state_not_found(path));
        };

        let document: serde_json::Value = serde_json::from_str(&text)?;
        let Some(object) = document.as_object() else {
            return Err(CacheError::state_not_found(path));
        };
        check_top_level_keys(
            path,
            object.contains_key(METADATA_KEY),
            object.contains_key(CACHE_KEY),
        )?;

        Ok(serde_json::from_value(document)?)
    }
}

/// YAML document backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YamlBackend;

impl Backend for YamlBackend {
    const EXTENSION: &'static str = ".yaml";

    fn save<C: Serialize>(&self, path: &Path, state: &CacherState<C>) -> Result<(), CacheError> {
        ensure_parent_dir(path)?;
        let mut writer = BufWriter::new(File::create(path)?);
        serde_yaml::to_writer(&mut writer, state)?;
        writer.flush()?;
        Ok(())
    }

    fn load<C: DeserializeOwned>(&self, path: &Path) -> Result<CacherState<C>, CacheError> {
        let Some(text) = read_document(path)? else {
            return Err(CacheError::state_not_found(path));
        };

        let document: serde_yaml::Value = serde_yaml::from_str(&text)?;
        let Some(mapping) = document.as_mapping() else {
            return Err(CacheError::state_not_found(path));
        };
        check_top_level_keys(
            path,
            mapping.contains_key(METADATA_KEY),
            mapping.contains_key(CACHE_KEY),
        )?;

        Ok(serde_yaml::from_value(document)?)
    }
}

/// Contents of the document at `path`, or `None` when it is missing or blank.
fn read_document(path: &Path) -> Result<Option<String>, CacheError> {
    match fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(None),
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use super::*;
    use crate::cacher::Metadata;

    fn state() -> CacherState<BTreeMap<String, String>> {
        CacherState {
            metadata: Metadata {
                hash_algorithm: "sha256".into(),
            },
            cache: BTreeMap::from([("src/lib.rs".to_string(), "abc123".to_string())]),
        }
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/cache.json");
        JsonBackend::default().save(&path, &state()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"hash_algorithm\": \"sha256\""));

        let loaded: CacherState<BTreeMap<String, String>> =
            JsonBackend::default().load(&path).unwrap();
        assert_eq!(loaded, state());
    }

    #[test]
    fn yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.yaml");
        YamlBackend.save(&path, &state()).unwrap();

        let loaded: CacherState<BTreeMap<String, String>> = YamlBackend.load(&path).unwrap();
        assert_eq!(loaded, state());
    }

    #[test]
    fn missing_or_blank_documents_have_no_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let err = JsonBackend::default()
            .load::<BTreeMap<String, String>>(&path)
            .unwrap_err();
        assert!(err.is_state_not_found());

        fs::write(&path, "  \n").unwrap();
        let err = JsonBackend::default()
            .load::<BTreeMap<String, String>>(&path)
            .unwrap_err();
        assert!(err.is_state_not_found());
    }

    #[test]
    fn documents_without_either_key_have_no_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, r#"{"unrelated": 1}"#).unwrap();
        let err = JsonBackend::default()
            .load::<BTreeMap<String, String>>(&path)
            .unwrap_err();
        assert!(err.is_state_not_found());

        fs::write(&path, r#"{"metadata": {"hash_algorithm": "sha256"}}"#).unwrap();
        let err = JsonBackend::default()
            .load::<BTreeMap<String, String>>(&path)
            .unwrap_err();
        assert!(matches!(err, CacheError::CorruptState { .. }));
    }

    #[test]
    fn malformed_documents_surface_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();
        let err = JsonBackend::default()
            .load::<BTreeMap<String, String>>(&path)
            .unwrap_err();
        assert!(matches!(err, CacheError::Json(_)));
    }

    #[test]
    fn clear_removes_the_document_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        JsonBackend::default().save(&path, &state()).unwrap();

        assert_eq!(JsonBackend::default().clear(&path).unwrap(), 1);
        assert!(!path.exists());
        assert_eq!(JsonBackend::default().clear(&path).unwrap(), 0);
    }
}
