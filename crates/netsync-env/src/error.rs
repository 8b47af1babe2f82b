//! Error types for environment stores.

use std::path::PathBuf;

use thiserror::Error;

pub type EnvResult<T> = Result<T, EnvError>;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse compose file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to serialize compose file: {0}")]
    Serialize(String),

    #[error("section not found: {0}")]
    MissingSection(String),

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("unexpected shape at {0}")]
    Shape(String),
}
