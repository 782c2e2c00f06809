//! Sync Error Types

use derive_more::{Display, Error};

/// A comparison error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for comparison operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Existence or attribute lookup against the backend failed.
    #[display("could not inspect remote path {_0}")]
    Remote(#[error(not(source))] String),
    /// The local side could not be inspected or read.
    #[display("could not inspect local file {_0}")]
    Local(#[error(not(source))] String),
    #[display("could not compute checksum of {_0}")]
    Checksum(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(_) => true,
            Self::Local(_) | Self::Checksum(_) => false,
        }
    }
}
