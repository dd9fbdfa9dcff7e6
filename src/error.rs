use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the cachers and their persistence backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Nothing recognisable was persisted at `path`. Callers may treat this as
    /// "start empty".
    #[error("no cacher state found at {}", path.display())]
    StateNotFound { path: PathBuf },
    #[error("persisted cacher state at {} is corrupt: {reason}", path.display())]
    CorruptState { path: PathBuf, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Bincode(#[from] bincode::Error),
}

impl CacheError {
    pub fn state_not_found(path: impl Into<PathBuf>) -> Self {
        Self::StateNotFound { path: path.into() }
    }

    pub fn is_state_not_found(&self) -> bool {
        matches!(self, Self::StateNotFound { .. })
    }
}

/// Errors raised while binding call arguments against a function signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("`{function}` takes {expected} positional arguments but {found} were given")]
    TooManyPositional {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("`{function}` got an unexpected keyword argument `{name}`")]
    UnknownKeyword { function: String, name: String },
    #[error("`{function}` got multiple values for argument `{name}`")]
    Duplicate { function: String, name: String },
    #[error("`{function}` is missing required argument `{name}`")]
    Missing { function: String, name: String },
}
