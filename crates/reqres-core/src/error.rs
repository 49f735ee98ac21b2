use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::http::StatusCode;

/// Errors surfaced by the response side of an exchange and by configuration loading.
///
/// Malformed request input never produces one of these; the affected request field simply
/// degrades to its default.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("invalid configuration: {message}")]
    Config { message: String },
    #[error("invalid value for header {name}")]
    InvalidHeader { name: String },
    #[error("invalid status line: {value}")]
    InvalidStatus { value: String },
    #[error("failed to serialize response body: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("failed to send file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("response has already been finalized")]
    Finalized,
}

impl ExchangeError {
    pub fn config(message: impl Into<String>) -> Self {
        ExchangeError::Config {
            message: message.into(),
        }
    }

    pub fn invalid_header(name: impl Into<String>) -> Self {
        ExchangeError::InvalidHeader { name: name.into() }
    }

    pub fn invalid_status(value: impl Into<String>) -> Self {
        ExchangeError::InvalidStatus {
            value: value.into(),
        }
    }

    pub fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ExchangeError::File {
            path: path.into(),
            source,
        }
    }

    /// Status code an adapter should answer with when this error escapes a handler.
    pub fn status(&self) -> StatusCode {
        match self {
            ExchangeError::File { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
