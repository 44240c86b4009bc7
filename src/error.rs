use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SlipError>;

#[derive(Debug, Error)]
pub enum SlipError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDateFormat(String),

    #[error("remote request failed with status {status}: {body}")]
    RemoteRequestFailed { status: u16, body: String },

    #[error("response failed validation: {0}")]
    ResponseSchemaInvalid(String),

    #[error("failed to write cache file {}: {source}", .path.display())]
    CacheWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}
