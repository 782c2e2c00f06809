use super::client::{ApiError, ClientError};
use crate::error::ErrorKind;
use crate::path::Path;

/// Translate a B2 client failure on `path` into a storage error kind.
///
/// `file_state_none` is what B2 answers for a large file that was started but
/// never finished; it maps to [`Pending`](ErrorKind::Pending) so callers can
/// tell an in-flight upload apart from a missing object.
pub(crate) fn map(err: ClientError, path: &Path) -> ErrorKind {
    match err {
        ClientError::Io(err) => ErrorKind::Io(err),
        ClientError::Api(err) => map_api(err, path),
    }
}

fn map_api(err: ApiError, path: &Path) -> ErrorKind {
    let detail = format!("{path} ({err})");
    match (err.status, err.code.as_str()) {
        (_, "file_state_none") => ErrorKind::Pending(detail),
        (404, _) | (_, "not_found" | "file_not_present" | "no_such_file") => ErrorKind::NotFound(detail),
        (_, "duplicate_bucket_name") => ErrorKind::AlreadyExists(detail),
        (401 | 403, _) => ErrorKind::PermissionDenied(detail),
        (405 | 501, _) => ErrorKind::Interoperability(detail),
        (408 | 429, _) | (500..=599, _) => ErrorKind::Network(detail),
        _ => ErrorKind::Backend(detail),
    }
}
