// ⚠️ Error Types - Failures that can stop a run before matching starts
//
// Normalization and matching never fail. Everything here is raised by the
// adapters around the engine (config, header discovery, CSV decoding).

use thiserror::Error;

/// Result alias for library operations
pub type Result<T> = std::result::Result<T, MatchError>;

#[derive(Error, Debug)]
pub enum MatchError {
    /// A required survey/licensing column could not be located by header substring
    #[error("{source_name}: no column header contains '{needle}' (headers: {headers:?})")]
    MissingColumn {
        source_name: String,
        needle: String,
        headers: Vec<String>,
    },

    /// Config JSON could not be parsed
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Config parsed but holds unusable values
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// CSV content could not be decoded into rows
    #[error("CSV error in {path}: {message}")]
    Csv { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
