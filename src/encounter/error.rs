//! Error types for definition loading

use std::path::PathBuf;

use thiserror::Error;

/// Errors during encounter definition loading
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read definition file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse definition TOML in {path}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read definition directory {path}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("definition in {path} has an empty id")]
    MissingId { path: PathBuf },

    #[error("duplicate encounter id `{id}` in {path}")]
    DuplicateId { id: String, path: PathBuf },
}
