//! Error types for catalog building, variable resolution and reading.

use std::path::PathBuf;

use aerocom_common::CommonError;
use thiserror::Error;

/// Errors that can occur while indexing or reading gridded data.
#[derive(Error, Debug)]
pub enum GriddedError {
    /// No registered naming convention validates against a filename.
    #[error("no naming convention matches: {0}")]
    Convention(String),

    /// The catalog could not be built from the directory.
    #[error("failed to build catalog: {0}")]
    CatalogBuild(String),

    /// The variable is not present, aliasable or computable.
    #[error("variable not available: {0}")]
    VariableNotAvailable(String),

    /// Filters matched no files, or no common resolution exists.
    #[error("insufficient data coverage: {0}")]
    DataCoverage(String),

    /// Filters matched files that cannot be told apart.
    #[error("ambiguous data query: {0}")]
    DataQuery(String),

    /// Time chunks of one series cannot be joined.
    #[error("failed to concatenate time chunks: {0}")]
    Concatenation(String),

    /// Invalid rule, constraint or reader configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A query was issued before `index()` ran.
    #[error("catalog for {} has not been indexed", .0.display())]
    NotIndexed(PathBuf),

    /// The data directory does not exist.
    #[error("data directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Two grids that must align do not.
    #[error("grid mismatch: {0}")]
    GridMismatch(String),

    /// The grid loader failed to decode a file.
    #[error("failed to load {path}: {message}")]
    Load { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl GriddedError {
    pub fn not_available(msg: impl Into<String>) -> Self {
        Self::VariableNotAvailable(msg.into())
    }

    pub fn data_coverage(msg: impl Into<String>) -> Self {
        Self::DataCoverage(msg.into())
    }

    pub fn data_query(msg: impl Into<String>) -> Self {
        Self::DataQuery(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn concatenation(msg: impl Into<String>) -> Self {
        Self::Concatenation(msg.into())
    }

    pub fn grid_mismatch(msg: impl Into<String>) -> Self {
        Self::GridMismatch(msg.into())
    }

    pub fn load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for gridded reader operations.
pub type Result<T> = std::result::Result<T, GriddedError>;
