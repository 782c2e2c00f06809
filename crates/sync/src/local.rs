use async_trait::async_trait;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use stratus_storage::Attributes;
use stratus_storage::checksum::Checksum;
use stratus_storage::error::{ErrorKind, Result};
use time::OffsetDateTime;

/// The local half of a comparison.
#[async_trait]
pub trait LocalEntry: Send + Sync {
    /// Display name for progress messages and logs.
    fn name(&self) -> String;

    async fn exists(&self) -> Result<bool>;

    /// Size, modification time and any checksum previously stored with
    /// [`set_checksum()`](Self::set_checksum), as long as the content hasn't
    /// changed since.
    async fn attributes(&self) -> Result<Attributes>;

    /// Cache a checksum computed while the entry looked like `snapshot`, so
    /// later comparisons can reuse it until the size or modification time
    /// changes.
    fn set_checksum(&self, checksum: Checksum, snapshot: &Attributes);

    /// Open the content for a blocking read.
    fn open(&self) -> Result<Box<dyn Read + Send>>;
}

/// Size and modification time a cached checksum was computed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Snapshot {
    size: Option<u64>,
    modified: Option<OffsetDateTime>,
}
impl From<&Attributes> for Snapshot {
    fn from(attributes: &Attributes) -> Self {
        Self {
            size: attributes.size,
            modified: attributes.modified,
        }
    }
}

/// A file on the local filesystem.
#[derive(Debug)]
pub struct LocalFile {
    path: PathBuf,
    checksum: Mutex<Option<(Snapshot, Checksum)>>,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(format!("{} is not absolute", path.display())));
        }
        Ok(Self {
            path,
            checksum: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached checksum, dropped if the file no longer matches the
    /// snapshot it was computed under.
    fn cached_checksum(&self, current: Snapshot) -> Option<Checksum> {
        // A panic while holding the lock can't leave an `Option` half-written.
        let mut cached = self.checksum.lock().unwrap_or_else(PoisonError::into_inner);
        match cached.as_ref() {
            Some((snapshot, checksum)) if *snapshot == current => Some(checksum.clone()),
            Some(_) => {
                tracing::debug!(path = %self.path.display(), "Local file changed, discarding cached checksum");
                *cached = None;
                None
            },
            None => None,
        }
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.display().to_string()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl LocalEntry for LocalFile {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn exists(&self) -> Result<bool> {
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| Self::map_io_error(e, &self.path))?;
        Ok(exists)
    }

    async fn attributes(&self) -> Result<Attributes> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| Self::map_io_error(e, &self.path))?;
        let mut attributes = Attributes::default();
        if metadata.is_file() {
            attributes = attributes.with_size(metadata.len());
        }
        // Not every platform records modification times.
        if let Ok(modified) = metadata.modified() {
            attributes = attributes.with_modified(OffsetDateTime::from(modified));
        }
        let checksum = self.cached_checksum(Snapshot::from(&attributes));
        Ok(attributes.with_checksum(checksum))
    }

    fn set_checksum(&self, checksum: Checksum, snapshot: &Attributes) {
        *self.checksum.lock().unwrap_or_else(PoisonError::into_inner) = Some((Snapshot::from(snapshot), checksum));
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let file = std::fs::File::open(&self.path).map_err(|e| Self::map_io_error(e, &self.path))?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use stratus_storage::checksum::Algorithm;

    #[test]
    fn test_relative_path_rejected() {
        let err = LocalFile::new("relative/file.txt").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = LocalFile::new(dir.path().join("missing.txt")).unwrap();
        assert!(!file.exists().await.unwrap());
        let err = file.attributes().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_attributes_and_cached_checksum() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(b"hello").unwrap();
        let file = LocalFile::new(temp.path()).unwrap();
        assert!(file.exists().await.unwrap());

        let attributes = file.attributes().await.unwrap();
        assert_eq!(attributes.size, Some(5));
        assert!(attributes.modified.is_some());
        assert_eq!(attributes.checksum, None);

        let checksum = Checksum::of(Algorithm::Sha1, b"hello");
        file.set_checksum(checksum.clone(), &attributes);
        assert_eq!(file.attributes().await.unwrap().checksum, Some(checksum));
    }

    #[tokio::test]
    async fn test_cached_checksum_dropped_when_file_changes() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), b"hello").unwrap();
        let file = LocalFile::new(temp.path()).unwrap();
        let before = file.attributes().await.unwrap();
        file.set_checksum(Checksum::of(Algorithm::Sha1, b"hello"), &before);

        // Same size, different content and modification time.
        std::fs::write(temp.path(), b"jello").unwrap();
        let later = before.modified.unwrap() + time::Duration::seconds(10);
        temp.as_file().set_modified(later.into()).unwrap();

        let after = file.attributes().await.unwrap();
        assert_eq!(after.size, Some(5));
        assert_eq!(after.checksum, None);
    }

    #[tokio::test]
    async fn test_directory_has_no_size() {
        let dir = tempfile::tempdir().unwrap();
        let entry = LocalFile::new(dir.path()).unwrap();
        assert_eq!(entry.attributes().await.unwrap().size, None);
    }

    #[test]
    fn test_open_reads_content() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(b"content").unwrap();
        let file = LocalFile::new(temp.path()).unwrap();
        let mut buffer = String::new();
        file.open().unwrap().read_to_string(&mut buffer).unwrap();
        assert_eq!(buffer, "content");
    }
}
