// modgraph-common/src/error.rs
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ModgraphError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Unable to resolve module [{specifier}] from [{requiring_file}]\n{options}\n{reason}")]
    Resolution {
        specifier: String,
        requiring_file: PathBuf,
        options: String,
        reason: String,
    },

    #[error("Unable to read [{path}]: {source}")]
    Read {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("Parse error in [{filename}] at {line}:{column}: {message}")]
    Parse {
        filename: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Transform failed for [{filename}]: {message}")]
    Transform { filename: PathBuf, message: String },

    #[error("Resolution of [{0}] was interrupted before it settled")]
    Interrupted(PathBuf),

    #[error("Background task failed: {0}")]
    Join(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for ModgraphError {
    fn from(err: std::io::Error) -> Self {
        ModgraphError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for ModgraphError {
    fn from(err: serde_json::Error) -> Self {
        ModgraphError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for ModgraphError {
    fn from(err: toml::de::Error) -> Self {
        ModgraphError::Toml(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ModgraphError>;
