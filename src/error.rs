//! Crate-level error type for the serving shell.
//!
//! The protocol core (markers, messages, observer, render state) has no error
//! path: malformed input there means "no marker" or "not for us".

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed HTTP request: {0}")]
    Request(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;

impl From<httparse::Error> for RelayError {
    fn from(e: httparse::Error) -> Self {
        RelayError::Request(e.to_string())
    }
}
