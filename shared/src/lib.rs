// shared/src/lib.rs

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The backing medium could not complete a retrieve, delete or insert.
    #[error("storage unavailable: {0}")]
    Storage(String),
    /// Cached data is present but cannot be read back.
    #[error("decode: {0}")]
    Decode(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

pub mod config;
