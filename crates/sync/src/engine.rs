use crate::error::{ErrorKind, Result};
use crate::local::LocalEntry;
use crate::progress::{ProgressListener, TracingProgress};
use crate::strategy::{ChecksumComparison, ComparisonStrategy, SizeComparison, TimestampComparison};
use crate::verdict::Verdict;
use exn::ResultExt;
use std::sync::Arc;
use stratus_storage::capability::{AttributesFinder, Find};
use stratus_storage::checksum::{Algorithm, Checksum, ChecksumService, DefaultChecksumService};
use stratus_storage::{Attributes, Path, Session};
use time::UtcOffset;
use tracing::instrument;

/// Produces one authoritative [`Verdict`] per remote/local pair.
///
/// 1. Local missing: [`RemoteAhead`](Verdict::RemoteAhead) if the remote
///    exists, otherwise [`Equal`](Verdict::Equal).
/// 2. Remote missing: [`LocalAhead`](Verdict::LocalAhead).
/// 3. Directories on both sides are always equal.
/// 4. Differing sizes decide.
/// 5. If the remote declares a checksum, the local one is computed (or
///    reused) and a match means equal.
/// 6. A differing modification time decides.
/// 7. Otherwise the side with more content is ahead, and equal sizes are
///    trusted as equal.
pub struct ComparisonEngine {
    finder: Arc<dyn Find>,
    attributes: Arc<dyn AttributesFinder>,
    checksums: Arc<dyn ChecksumService>,
    progress: Arc<dyn ProgressListener>,
    timestamp: TimestampComparison,
}

impl ComparisonEngine {
    /// Use the session's existence check and attribute lookup, falling back
    /// to generic implementations where it has no native one.
    pub fn new(session: &dyn Session, offset: UtcOffset) -> stratus_storage::error::Result<Self> {
        Ok(Self::from_features(session.finder()?, session.attributes_finder()?, offset))
    }

    pub fn from_features(finder: Arc<dyn Find>, attributes: Arc<dyn AttributesFinder>, offset: UtcOffset) -> Self {
        Self {
            finder,
            attributes,
            checksums: Arc::new(DefaultChecksumService),
            progress: Arc::new(TracingProgress),
            timestamp: TimestampComparison::new(offset),
        }
    }

    pub fn with_finder(mut self, finder: Arc<dyn Find>) -> Self {
        self.finder = finder;
        self
    }

    pub fn with_attributes(mut self, attributes: Arc<dyn AttributesFinder>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_checksum_service(mut self, checksums: Arc<dyn ChecksumService>) -> Self {
        self.checksums = checksums;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressListener>) -> Self {
        self.progress = progress;
        self
    }

    #[instrument(level = "debug", skip_all, fields(path = %remote, local = %local.name()))]
    pub async fn compare(&self, remote: &Path, local: &dyn LocalEntry) -> Result<Verdict> {
        let local_exists = local.exists().await.or_raise(|| ErrorKind::Local(local.name()))?;
        let remote_exists = self.remote_exists(remote).await?;
        if !local_exists {
            let verdict = if remote_exists { Verdict::RemoteAhead } else { Verdict::Equal };
            tracing::debug!(%verdict, "Local file missing");
            return Ok(verdict);
        }
        if !remote_exists {
            tracing::debug!("Remote path missing");
            return Ok(Verdict::LocalAhead);
        }
        if remote.is_root() || remote.kind().is_directory() {
            return Ok(Verdict::Equal);
        }

        let remote_attributes = self
            .attributes
            .attributes(remote)
            .await
            .or_raise(|| ErrorKind::Remote(remote.to_string()))?;
        let mut local_attributes = local.attributes().await.or_raise(|| ErrorKind::Local(local.name()))?;

        let size = SizeComparison.compare(&remote_attributes, &local_attributes);
        if size.is_conclusive() {
            tracing::debug!(verdict = %size, "Decided by size");
            return Ok(size);
        }

        if let Some(expected) = &remote_attributes.checksum
            && let Some(computed) = self.local_checksum(local, &local_attributes, expected.algorithm).await?
        {
            // Compare against a copy; the caller's entry only receives the cache.
            local_attributes.checksum = Some(computed);
            if ChecksumComparison.compare(&remote_attributes, &local_attributes) == Verdict::Equal {
                tracing::debug!("Decided by checksum");
                return Ok(Verdict::Equal);
            }
        }

        let timestamp = self.timestamp.compare(&remote_attributes, &local_attributes);
        if timestamp.is_conclusive() {
            tracing::debug!(verdict = %timestamp, "Decided by modification time");
            return Ok(timestamp);
        }

        let verdict = fallback(&remote_attributes, &local_attributes);
        tracing::debug!(%verdict, "No conclusive strategy, falling back to size");
        Ok(verdict)
    }

    async fn remote_exists(&self, remote: &Path) -> Result<bool> {
        let exists = self
            .finder
            .find(remote)
            .await
            .or_raise(|| ErrorKind::Remote(remote.to_string()))?;
        Ok(exists)
    }

    /// Checksum of the local content with `algorithm`, reusing one cached on
    /// the entry. `None` when no implementation of `algorithm` is available.
    async fn local_checksum(
        &self,
        local: &dyn LocalEntry,
        attributes: &Attributes,
        algorithm: Algorithm,
    ) -> Result<Option<Checksum>> {
        if let Some(cached) = &attributes.checksum
            && cached.algorithm == algorithm
        {
            return Ok(Some(cached.clone()));
        }
        if !self.checksums.supports(algorithm) {
            tracing::warn!(%algorithm, "Checksum algorithm not supported, skipping checksum comparison");
            return Ok(None);
        }
        let name = local.name();
        self.progress.message(&format!("Computing {algorithm} checksum of {name}"));
        let mut reader = local.open().or_raise(|| ErrorKind::Local(name.clone()))?;
        let checksums = Arc::clone(&self.checksums);
        let computed = tokio::task::spawn_blocking(move || checksums.compute(algorithm, &mut *reader))
            .await
            .or_raise(|| ErrorKind::Checksum(name.clone()))?
            .or_raise(|| ErrorKind::Checksum(name.clone()))?;
        local.set_checksum(computed.clone(), attributes);
        Ok(Some(computed))
    }
}

/// Trust equal sizes once every other strategy has abstained.
fn fallback(remote: &Attributes, local: &Attributes) -> Verdict {
    match (remote.size, local.size) {
        (Some(remote), Some(local)) if local > remote => Verdict::LocalAhead,
        (Some(remote), Some(local)) if local < remote => Verdict::RemoteAhead,
        _ => Verdict::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::DisabledProgress;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::io::{Cursor, Read};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stratus_storage::EntryType;
    use stratus_storage::backend::b2::{B2Options, B2Session, MockB2Client};
    use stratus_storage::error::ErrorKind as StorageErrorKind;
    use time::OffsetDateTime;
    use time::macros::{datetime, offset};

    const EARLIER: OffsetDateTime = datetime!(2024-05-01 12:00:00 UTC);
    const LATER: OffsetDateTime = datetime!(2024-05-01 13:00:00 UTC);

    /// Remote side with a single, fixed answer.
    struct Remote {
        attributes: Option<Attributes>,
        lookups: AtomicUsize,
    }

    impl Remote {
        fn new(attributes: Option<Attributes>) -> Arc<Self> {
            Arc::new(Self {
                attributes,
                lookups: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Find for Remote {
        async fn find(&self, _path: &Path) -> stratus_storage::error::Result<bool> {
            Ok(self.attributes.is_some())
        }
    }

    #[async_trait]
    impl AttributesFinder for Remote {
        async fn attributes(&self, path: &Path) -> stratus_storage::error::Result<Attributes> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            match &self.attributes {
                Some(attributes) => Ok(attributes.clone()),
                None => exn::bail!(StorageErrorKind::NotFound(path.to_string())),
            }
        }
    }

    struct Local {
        content: Option<Vec<u8>>,
        modified: Option<OffsetDateTime>,
        checksum: Mutex<Option<Checksum>>,
        opens: AtomicUsize,
    }

    impl Local {
        fn new(content: Option<&[u8]>, modified: Option<OffsetDateTime>) -> Self {
            Self {
                content: content.map(|content| content.to_vec()),
                modified,
                checksum: Mutex::new(None),
                opens: AtomicUsize::new(0),
            }
        }

        fn missing() -> Self {
            Self::new(None, None)
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LocalEntry for Local {
        fn name(&self) -> String {
            "local.bin".to_string()
        }

        async fn exists(&self) -> stratus_storage::error::Result<bool> {
            Ok(self.content.is_some())
        }

        async fn attributes(&self) -> stratus_storage::error::Result<Attributes> {
            let content = self.content.as_deref().unwrap_or_default();
            let mut attributes = Attributes::default()
                .with_size(content.len() as u64)
                .with_checksum(self.checksum.lock().unwrap().clone());
            attributes.modified = self.modified;
            Ok(attributes)
        }

        fn set_checksum(&self, checksum: Checksum, _snapshot: &Attributes) {
            *self.checksum.lock().unwrap() = Some(checksum);
        }

        fn open(&self) -> stratus_storage::error::Result<Box<dyn Read + Send>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Cursor::new(self.content.clone().unwrap_or_default())))
        }
    }

    /// Pretends every input hashes to `hash`.
    struct FixedChecksum(&'static str);

    impl ChecksumService for FixedChecksum {
        fn compute(&self, algorithm: Algorithm, reader: &mut dyn Read) -> stratus_storage::error::Result<Checksum> {
            std::io::copy(reader, &mut std::io::sink()).map_err(StorageErrorKind::Io)?;
            Ok(Checksum::new(algorithm, self.0))
        }
    }

    struct NoChecksums;

    impl ChecksumService for NoChecksums {
        fn supports(&self, _algorithm: Algorithm) -> bool {
            false
        }

        fn compute(&self, algorithm: Algorithm, _reader: &mut dyn Read) -> stratus_storage::error::Result<Checksum> {
            exn::bail!(StorageErrorKind::Interoperability(format!("{algorithm} unsupported")))
        }
    }

    #[derive(Default)]
    struct Messages(Mutex<Vec<String>>);

    impl ProgressListener for Messages {
        fn message(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn engine(remote: Arc<Remote>) -> ComparisonEngine {
        ComparisonEngine::from_features(remote.clone(), remote, UtcOffset::UTC).with_progress(Arc::new(DisabledProgress))
    }

    fn file() -> Path {
        Path::parse("/bucket/dir/file.bin", EntryType::File).unwrap()
    }

    fn remote(size: u64, checksum: Option<&str>, modified: Option<OffsetDateTime>) -> Attributes {
        let mut attributes = Attributes::default()
            .with_size(size)
            .with_checksum(checksum.map(|hash| Checksum::new(Algorithm::Sha1, hash)));
        attributes.modified = modified;
        attributes
    }

    #[tokio::test]
    async fn test_neither_side_exists() {
        let verdict = engine(Remote::new(None)).compare(&file(), &Local::missing()).await.unwrap();
        assert_eq!(verdict, Verdict::Equal);
    }

    #[tokio::test]
    async fn test_remote_only() {
        let remote = Remote::new(Some(remote(10, None, None)));
        let verdict = engine(remote).compare(&file(), &Local::missing()).await.unwrap();
        assert_eq!(verdict, Verdict::RemoteAhead);
    }

    #[rstest]
    #[case(b"")]
    #[case(b"anything at all")]
    #[tokio::test]
    async fn test_local_only(#[case] content: &[u8]) {
        let local = Local::new(Some(content), Some(EARLIER));
        let verdict = engine(Remote::new(None)).compare(&file(), &local).await.unwrap();
        assert_eq!(verdict, Verdict::LocalAhead);
    }

    #[rstest]
    #[case(Path::parse("/bucket/dir", EntryType::Directory).unwrap())]
    #[case(Path::volume("bucket").unwrap())]
    #[tokio::test]
    async fn test_directories_are_equal(#[case] path: Path) {
        let remote = Remote::new(Some(remote(4096, None, Some(LATER))));
        let local = Local::new(Some(&b"different listing"[..]), Some(EARLIER));
        let engine = engine(remote.clone());
        assert_eq!(engine.compare(&path, &local).await.unwrap(), Verdict::Equal);
        assert_eq!(remote.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_size_decides_without_checksum() {
        let remote = Remote::new(Some(remote(50, Some("abc"), Some(LATER))));
        let local = Local::new(Some(&[0u8; 80][..]), Some(EARLIER));
        let engine = engine(remote).with_checksum_service(Arc::new(FixedChecksum("abc")));
        assert_eq!(engine.compare(&file(), &local).await.unwrap(), Verdict::LocalAhead);
        assert_eq!(local.opens(), 0);
    }

    #[tokio::test]
    async fn test_checksum_match_is_equal() {
        let remote = Remote::new(Some(remote(100, Some("abc"), Some(LATER))));
        let local = Local::new(Some(&[0u8; 100][..]), Some(EARLIER));
        let messages = Arc::new(Messages::default());
        let engine = engine(remote)
            .with_checksum_service(Arc::new(FixedChecksum("abc")))
            .with_progress(messages.clone());
        assert_eq!(engine.compare(&file(), &local).await.unwrap(), Verdict::Equal);
        assert_eq!(local.opens(), 1);
        assert_eq!(
            local.checksum.lock().unwrap().clone(),
            Some(Checksum::new(Algorithm::Sha1, "abc"))
        );
        assert_eq!(*messages.0.lock().unwrap(), vec!["Computing sha1 checksum of local.bin".to_string()]);
    }

    #[tokio::test]
    async fn test_cached_checksum_is_reused() {
        let remote = Remote::new(Some(remote(100, Some("abc"), None)));
        let local = Local::new(Some(&[0u8; 100][..]), None);
        local.set_checksum(Checksum::new(Algorithm::Sha1, "abc"), &Attributes::default());
        let engine = engine(remote).with_checksum_service(Arc::new(NoChecksums));
        assert_eq!(engine.compare(&file(), &local).await.unwrap(), Verdict::Equal);
        assert_eq!(local.opens(), 0);
    }

    #[tokio::test]
    async fn test_checksum_mismatch_defers_to_timestamp() {
        let remote = Remote::new(Some(remote(100, Some("abc"), Some(LATER))));
        let local = Local::new(Some(&[0u8; 100][..]), Some(EARLIER));
        let engine = engine(remote).with_checksum_service(Arc::new(FixedChecksum("def")));
        assert_eq!(engine.compare(&file(), &local).await.unwrap(), Verdict::RemoteAhead);
    }

    #[tokio::test]
    async fn test_timestamp_uses_offset() {
        // 14:00 wall-clock in UTC+01:00 is 13:00 UTC, an hour after the local file.
        let remote = Remote::new(Some(remote(100, None, Some(datetime!(2024-05-01 14:00:00 UTC)))));
        let local = Local::new(Some(&[0u8; 100][..]), Some(EARLIER));
        let engine = ComparisonEngine::from_features(remote.clone(), remote, offset!(+1));
        assert_eq!(engine.compare(&file(), &local).await.unwrap(), Verdict::RemoteAhead);
    }

    #[tokio::test]
    async fn test_unsupported_algorithm_is_skipped() {
        let remote = Remote::new(Some(remote(100, Some("abc"), Some(EARLIER))));
        let local = Local::new(Some(&[0u8; 100][..]), Some(LATER));
        let engine = engine(remote).with_checksum_service(Arc::new(NoChecksums));
        assert_eq!(engine.compare(&file(), &local).await.unwrap(), Verdict::LocalAhead);
        assert_eq!(local.opens(), 0);
    }

    #[rstest]
    #[case(Some(EARLIER), Some(EARLIER))]
    #[case(None, None)]
    #[case(Some(EARLIER), None)]
    #[tokio::test]
    async fn test_equal_sizes_fall_back_to_equal(
        #[case] remote_modified: Option<OffsetDateTime>,
        #[case] local_modified: Option<OffsetDateTime>,
    ) {
        let remote = Remote::new(Some(remote(100, None, remote_modified)));
        let local = Local::new(Some(&[0u8; 100][..]), local_modified);
        assert_eq!(engine(remote).compare(&file(), &local).await.unwrap(), Verdict::Equal);
    }

    #[rstest]
    #[case(Some(10), Some(20), Verdict::LocalAhead)]
    #[case(Some(20), Some(10), Verdict::RemoteAhead)]
    #[case(Some(10), Some(10), Verdict::Equal)]
    #[case(None, Some(10), Verdict::Equal)]
    fn test_fallback(#[case] remote: Option<u64>, #[case] local: Option<u64>, #[case] expected: Verdict) {
        let remote = Attributes {
            size: remote,
            ..Attributes::default()
        };
        let local = Attributes {
            size: local,
            ..Attributes::default()
        };
        assert_eq!(fallback(&remote, &local), expected);
    }

    struct FailingFind;

    #[async_trait]
    impl Find for FailingFind {
        async fn find(&self, _path: &Path) -> stratus_storage::error::Result<bool> {
            exn::bail!(StorageErrorKind::Network("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let remote = Remote::new(Some(remote(100, None, None)));
        let engine = engine(remote).with_finder(Arc::new(FailingFind));
        let local = Local::new(Some(&b"data"[..]), None);
        let err = engine.compare(&file(), &local).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Remote(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_with_attributes_override() {
        let engine = engine(Remote::new(Some(remote(100, None, None))))
            .with_attributes(Remote::new(Some(remote(10, None, None))));
        let local = Local::new(Some(&[0u8; 50][..]), None);
        assert_eq!(engine.compare(&file(), &local).await.unwrap(), Verdict::LocalAhead);
    }

    #[tokio::test]
    async fn test_b2_session_end_to_end() {
        let client = Arc::new(MockB2Client::with_buckets(["photos"]));
        client.put("photos", "2024/beach.jpg", b"sunny day").await;
        let session = B2Session::new("archive", client, B2Options::default());
        let engine = ComparisonEngine::new(&session, UtcOffset::UTC)
            .unwrap()
            .with_progress(Arc::new(DisabledProgress));

        let dir = tempfile::tempdir().unwrap();
        let same = dir.path().join("same.jpg");
        std::fs::write(&same, b"sunny day").unwrap();
        let differs = dir.path().join("differs.jpg");
        std::fs::write(&differs, b"rainy day").unwrap();
        let missing = dir.path().join("missing.jpg");

        let remote = Path::parse("/photos/2024/beach.jpg", EntryType::File).unwrap();
        let absent = Path::parse("/photos/2024/absent.jpg", EntryType::File).unwrap();

        let local = crate::LocalFile::new(&same).unwrap();
        assert_eq!(engine.compare(&remote, &local).await.unwrap(), Verdict::Equal);
        assert_eq!(
            local.attributes().await.unwrap().checksum,
            Some(Checksum::of(Algorithm::Sha1, b"sunny day"))
        );

        // Same size, different content, and the local file was written after the upload.
        let local = crate::LocalFile::new(&differs).unwrap();
        assert_eq!(engine.compare(&remote, &local).await.unwrap(), Verdict::LocalAhead);

        let local = crate::LocalFile::new(&missing).unwrap();
        assert_eq!(engine.compare(&remote, &local).await.unwrap(), Verdict::RemoteAhead);
        assert_eq!(engine.compare(&absent, &local).await.unwrap(), Verdict::Equal);

        let folder = Path::parse("/photos/2024", EntryType::Directory).unwrap();
        let local = crate::LocalFile::new(dir.path()).unwrap();
        assert_eq!(engine.compare(&folder, &local).await.unwrap(), Verdict::Equal);
    }

    #[tokio::test]
    async fn test_local_edit_after_checksum_is_detected() {
        let client = Arc::new(MockB2Client::with_buckets(["photos"]));
        client.put("photos", "beach.jpg", b"sunny day").await;
        let session = B2Session::new("archive", client, B2Options::default());
        let engine = ComparisonEngine::new(&session, UtcOffset::UTC)
            .unwrap()
            .with_progress(Arc::new(DisabledProgress));
        let remote = Path::parse("/photos/beach.jpg", EntryType::File).unwrap();

        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), b"sunny day").unwrap();
        let local = crate::LocalFile::new(temp.path()).unwrap();
        assert_eq!(engine.compare(&remote, &local).await.unwrap(), Verdict::Equal);

        // Same size, new content, newer modification time: the same entry must
        // not keep matching the remote through its cached checksum.
        let modified = local.attributes().await.unwrap().modified.unwrap();
        std::fs::write(temp.path(), b"rainy day").unwrap();
        temp.as_file()
            .set_modified((modified + time::Duration::seconds(5)).into())
            .unwrap();
        assert_eq!(engine.compare(&remote, &local).await.unwrap(), Verdict::LocalAhead);
        assert_eq!(
            local.attributes().await.unwrap().checksum,
            Some(Checksum::of(Algorithm::Sha1, b"rainy day"))
        );
    }
}
