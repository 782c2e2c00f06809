//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Every backend adapter translates its
//! provider's failures into one of these kinds; callers key their retry and
//! fallback logic on the kind, never on provider-specific codes.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
///
/// ### Conclusive
/// - [`ErrorKind::NotFound`] - the path does not resolve; don't retry.
/// - [`ErrorKind::AlreadyExists`]
/// - [`ErrorKind::PermissionDenied`]
/// - [`ErrorKind::InvalidPath`]
/// - [`ErrorKind::Interoperability`] - the provider doesn't support the
///   requested capability at all; never silently degrade.
///
/// ### Transient
/// - [`ErrorKind::Io`]
/// - [`ErrorKind::Network`]
/// - [`ErrorKind::Backend`]
///
/// ### State
/// - [`ErrorKind::Pending`] - the object exists but is mid-upload.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Path does not exist remotely.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Access denied (permissions or credentials).
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// Object already exists (for operations that require new objects).
    #[display("already exists: {_0}")]
    AlreadyExists(#[error(not(source))] String),
    /// The provider does not support the requested operation.
    #[display("interoperability failure: {_0}")]
    Interoperability(#[error(not(source))] String),
    /// Object exists but an upload to it has not been committed yet.
    #[display("upload pending: {_0}")]
    Pending(#[error(not(source))] String),
    /// Underlying local I/O error.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Network-related error (connection resets, throttling, 5xx responses).
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Path contains invalid characters or escapes root.
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// Backend-specific error that doesn't fit elsewhere.
    #[display("backend error: {_0}")]
    Backend(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::Backend(_))
    }

    /// Returns `true` if the error means the path doesn't exist, as opposed
    /// to the lookup itself failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
