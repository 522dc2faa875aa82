//! The error taxonomy shared by the codec, protocol engine and mission glue.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed json: {0}")]
    MalformedJson(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch on field {field}: expected {expected}")]
    TypeMismatch { field: String, expected: String },

    #[error("inbound buffer exceeded 1 MiB without a newline")]
    BufferOverflow,

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("index out of range: {0}")]
    IndexOutOfRange(usize),

    #[error("not connected")]
    NotConnected,
}

pub type CoreResult<T> = Result<T, CoreError>;
