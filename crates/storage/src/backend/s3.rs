//! S3-compatible storage backend.
//!
//! Buckets are containers and object keys are the paths below them. Folders
//! are either implied by keys or represented by a zero-byte object whose key
//! ends in `/`. Works against AWS S3 and the S3-compatible APIs of Backblaze,
//! Tigris, MinIO and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file. Each
//! backend specifies its own `key_id` and `key_secret`.

use crate::attributes::{Attributes, from_millis, to_millis};
use crate::capability::{
    Append, AttributesFinder, CopyOptions, Delete, DeleteCallback, DeleteReport, Directory, Find, List, PathStream,
    ServerSideCopy, Touch, Write, WriteOptions,
};
use crate::checksum::Checksum;
use crate::error::{ErrorKind, Result};
use crate::path::{DELIMITER, EntryType, Path};
use crate::session::Session;
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, http::HttpResponse, retry::RetryConfig},
    error::{ProvideErrorMetadata, SdkError},
    primitives::{ByteStream, DateTime},
    types::{BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration, StorageClass},
};
use exn::ResultExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;
/// User metadata key holding the client-side modification time in
/// milliseconds.
pub const MODIFIED_METADATA: &str = "src-last-modified-millis";
const MIB: u64 = 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S3Options {
    /// Uploads larger than this become multipart uploads.
    pub large_upload_threshold: u64,
    pub part_size: u64,
}
impl Default for S3Options {
    fn default() -> Self {
        Self {
            large_upload_threshold: 100 * MIB,
            part_size: 10 * MIB,
        }
    }
}

/// Every capability of an S3-compatible service, backed by one SDK client.
///
/// # Examples
///
/// ```no_run
/// use stratus_storage::backend::s3::{S3Backend, S3Options};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     "access_key_id",
///     "secret_access_key",
///     S3Options::default(),
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
    options: S3Options,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub fn new(
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        options: S3Options,
    ) -> Self {
        let region = Region::new(region.into());
        let credentials = Credentials::new(key_id, key_secret, None, None, "stratus-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self::from_client(Client::from_conf(config_builder.build()), options)
    }

    pub fn from_client(client: Client, options: S3Options) -> Self {
        Self {
            client,
            options,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        }
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        let permit = self
            .rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::Backend("S3 rate limiter closed".to_string()))?;
        Ok(permit)
    }

    /// Bucket name and object key of `path`. Directories get the trailing
    /// delimiter of their placeholder object.
    fn locate(path: &Path) -> Result<(String, String)> {
        let (Some(container), Some(key)) = (path.container(), path.key()) else {
            exn::bail!(ErrorKind::InvalidPath(format!("{path} is not an object")));
        };
        let key = if path.is_directory() { format!("{key}{DELIMITER}") } else { key };
        Ok((container.name().to_string(), key))
    }

    /// Convert AWS DateTime to OffsetDateTime.
    fn parse_datetime(dt: &DateTime) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos()).ok()
    }

    fn metadata(options: &WriteOptions) -> HashMap<String, String> {
        let mut metadata: HashMap<String, String> = options.metadata.clone().into_iter().collect();
        if let Some(modified) = options.modified {
            metadata.insert(MODIFIED_METADATA.to_string(), to_millis(modified).to_string());
        }
        metadata
    }

    async fn head_object(&self, path: &Path) -> Result<Option<Attributes>> {
        let (bucket, key) = Self::locate(path)?;
        let _permit = self.acquire_permit().await?;
        let head = match self.client.head_object().bucket(&bucket).key(&key).send().await {
            Ok(head) => head,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => return Ok(None),
            Err(err) => return Err(map_error(err, path).into()),
        };
        let user_metadata: BTreeMap<String, String> =
            head.metadata().map(|m| m.clone().into_iter().collect()).unwrap_or_default();
        let mut attributes = Attributes::default().with_checksum(head.e_tag().and_then(Checksum::parse));
        attributes.size = head.content_length().and_then(|size| u64::try_from(size).ok());
        attributes.modified = modified(&user_metadata, head.last_modified());
        attributes.version_id = head.version_id().map(str::to_string);
        attributes.storage_class = head.storage_class().map(|class| class.as_str().to_string());
        attributes.metadata = user_metadata;
        Ok(Some(attributes))
    }

    async fn has_children(&self, directory: &Path) -> Result<bool> {
        let (bucket, prefix) = Self::locate(directory)?;
        let _permit = self.acquire_permit().await?;
        let listing = self
            .client
            .list_objects_v2()
            .bucket(&bucket)
            .prefix(&prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| map_error(e, directory))?;
        Ok(listing.key_count().unwrap_or_default() > 0)
    }

    /// Upload id of an in-progress multipart upload to `file`.
    async fn pending_upload(&self, file: &Path) -> Result<Option<String>> {
        let (bucket, key) = Self::locate(file)?;
        let _permit = self.acquire_permit().await?;
        let uploads = self
            .client
            .list_multipart_uploads()
            .bucket(&bucket)
            .prefix(&key)
            .send()
            .await
            .map_err(|e| map_error(e, file))?;
        Ok(uploads
            .uploads()
            .iter()
            .find(|upload| upload.key() == Some(key.as_str()))
            .and_then(|upload| upload.upload_id().map(str::to_string)))
    }

    /// Committed parts of a multipart upload as `(part number, size, etag)`.
    async fn parts(&self, file: &Path, upload_id: &str) -> Result<Vec<(i32, u64, String)>> {
        let (bucket, key) = Self::locate(file)?;
        let _permit = self.acquire_permit().await?;
        let listing = self
            .client
            .list_parts()
            .bucket(&bucket)
            .key(&key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| map_error(e, file))?;
        let mut parts: Vec<(i32, u64, String)> = listing
            .parts()
            .iter()
            .filter_map(|part| {
                let size = part.size().and_then(|size| u64::try_from(size).ok())?;
                Some((part.part_number()?, size, part.e_tag()?.to_string()))
            })
            .collect();
        parts.sort_by_key(|(number, _, _)| *number);
        Ok(parts)
    }

    async fn upload_multipart(&self, file: &Path, data: &[u8], options: &WriteOptions, upload_id: Option<String>) -> Result<()> {
        let (bucket, key) = Self::locate(file)?;
        let (upload_id, mut committed) = match upload_id {
            Some(upload_id) => {
                let parts = self.parts(file, &upload_id).await?;
                (upload_id, parts)
            },
            None => {
                let _permit = self.acquire_permit().await?;
                let created = self
                    .client
                    .create_multipart_upload()
                    .bucket(&bucket)
                    .key(&key)
                    .set_content_type(options.content_type.clone())
                    .set_storage_class(options.storage_class.as_deref().map(StorageClass::from))
                    .set_metadata(Some(Self::metadata(options)))
                    .send()
                    .await
                    .map_err(|e| map_error(e, file))?;
                let Some(upload_id) = created.upload_id() else {
                    exn::bail!(ErrorKind::Backend(format!("no upload id returned for {file}")));
                };
                (upload_id.to_string(), Vec::new())
            },
        };
        let part_size = usize::try_from(self.options.part_size)
            .map_err(|_| ErrorKind::Interoperability(format!("part size {} too large", self.options.part_size)))?;
        let mut completed = Vec::new();
        for (index, chunk) in data.chunks(part_size.max(1)).enumerate() {
            let number = i32::try_from(index + 1)
                .map_err(|_| ErrorKind::Interoperability(format!("too many parts for {file}")))?;
            let existing = committed
                .iter()
                .position(|(part, size, _)| *part == number && *size == chunk.len() as u64);
            let e_tag = match existing {
                Some(position) => committed.remove(position).2,
                None => {
                    let _permit = self.acquire_permit().await?;
                    let uploaded = self
                        .client
                        .upload_part()
                        .bucket(&bucket)
                        .key(&key)
                        .upload_id(&upload_id)
                        .part_number(number)
                        .body(ByteStream::from(chunk.to_vec()))
                        .send()
                        .await
                        .map_err(|e| map_error(e, file))?;
                    uploaded.e_tag().unwrap_or_default().to_string()
                },
            };
            completed.push(CompletedPart::builder().part_number(number).e_tag(e_tag).build());
        }
        let _permit = self.acquire_permit().await?;
        self.client
            .complete_multipart_upload()
            .bucket(&bucket)
            .key(&key)
            .upload_id(&upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(completed)).build())
            .send()
            .await
            .map_err(|e| map_error(e, file))?;
        Ok(())
    }

    async fn delete_one(&self, path: &Path) -> Result<()> {
        let permit = self.acquire_permit().await?;
        if path.is_container() {
            self.client
                .delete_bucket()
                .bucket(path.name())
                .send()
                .await
                .map_err(|e| map_error(e, path))?;
            return Ok(());
        }
        let (bucket, key) = Self::locate(path)?;
        self.client
            .delete_object()
            .bucket(&bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_error(e, path))?;
        drop(permit);
        if path.is_file()
            && let Some(upload_id) = self.pending_upload(path).await?
        {
            let _permit = self.acquire_permit().await?;
            self.client
                .abort_multipart_upload()
                .bucket(&bucket)
                .key(&key)
                .upload_id(upload_id)
                .send()
                .await
                .map_err(|e| map_error(e, path))?;
        }
        Ok(())
    }

    /// One page of direct children, plus the continuation token.
    async fn page(&self, directory: &Path, token: Option<String>) -> Result<(Vec<Path>, Option<String>)> {
        let bucket = match directory.container() {
            Some(container) => container.name().to_string(),
            None => exn::bail!(ErrorKind::InvalidPath(directory.to_string())),
        };
        let prefix = match directory.key() {
            Some(key) => format!("{key}{DELIMITER}"),
            None => String::new(),
        };
        let _permit = self.acquire_permit().await?;
        let listing = self
            .client
            .list_objects_v2()
            .bucket(&bucket)
            .prefix(&prefix)
            .delimiter(DELIMITER.to_string())
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|e| map_error(e, directory))?;
        let mut children = Vec::new();
        for common in listing.common_prefixes() {
            let Some(name) = common.prefix().and_then(|p| p.strip_prefix(&prefix)) else {
                continue;
            };
            children.push(directory.child(name.trim_end_matches(DELIMITER), EntryType::Directory)?);
        }
        for object in listing.contents() {
            let Some(name) = object.key().and_then(|k| k.strip_prefix(&prefix)) else {
                continue;
            };
            // The folder's own placeholder.
            if name.is_empty() {
                continue;
            }
            let mut attributes = Attributes::default().with_checksum(object.e_tag().and_then(Checksum::parse));
            attributes.size = object.size().and_then(|size| u64::try_from(size).ok());
            attributes.modified = object.last_modified().and_then(Self::parse_datetime);
            attributes.storage_class = object.storage_class().map(|class| class.as_str().to_string());
            children.push(directory.child(name, EntryType::File)?.with_attributes(attributes));
        }
        let next = match listing.is_truncated() {
            Some(true) => listing.next_continuation_token().map(str::to_string),
            _ => None,
        };
        Ok((children, next))
    }

    async fn buckets(&self, root: &Path) -> Result<Vec<Path>> {
        let _permit = self.acquire_permit().await?;
        let listing = self.client.list_buckets().send().await.map_err(|e| map_error(e, root))?;
        listing
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name())
            .map(Path::volume)
            .collect()
    }
}

/// Modification time from the user metadata, falling back to the provider's
/// last-modified time.
fn modified(metadata: &BTreeMap<String, String>, last_modified: Option<&DateTime>) -> Option<OffsetDateTime> {
    metadata
        .get(MODIFIED_METADATA)
        .and_then(|millis| millis.parse::<i64>().ok())
        .and_then(from_millis)
        .or_else(|| last_modified.and_then(S3Backend::parse_datetime))
}

/// Translate an SDK failure on `path` into a storage error kind.
fn map_error<E>(err: SdkError<E, HttpResponse>, path: &Path) -> ErrorKind
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    if matches!(err, SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)) {
        return ErrorKind::Network(format!("{path}: {err}"));
    }
    let status = err.raw_response().map(|response| response.status().as_u16());
    let code = err.code().map(str::to_string);
    classify(status, code.as_deref(), format!("{path}: {}", err.message().unwrap_or("unknown error")))
}

fn classify(status: Option<u16>, code: Option<&str>, detail: String) -> ErrorKind {
    match (status, code) {
        (_, Some("NoSuchKey" | "NoSuchBucket" | "NoSuchUpload" | "NotFound")) | (Some(404), _) => {
            ErrorKind::NotFound(detail)
        },
        (_, Some("BucketAlreadyExists" | "BucketAlreadyOwnedByYou")) => ErrorKind::AlreadyExists(detail),
        (_, Some("NotImplemented" | "MethodNotAllowed")) | (Some(405 | 501), _) => ErrorKind::Interoperability(detail),
        (_, Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch")) | (Some(401 | 403), _) => {
            ErrorKind::PermissionDenied(detail)
        },
        (_, Some("SlowDown" | "RequestTimeout")) | (Some(408 | 429 | 500..=599), _) => ErrorKind::Network(detail),
        _ => ErrorKind::Backend(detail),
    }
}

#[async_trait]
impl Find for S3Backend {
    async fn find(&self, path: &Path) -> Result<bool> {
        if path.is_root() {
            return Ok(true);
        }
        if path.is_container() {
            let _permit = self.acquire_permit().await?;
            return match self.client.head_bucket().bucket(path.name()).send().await {
                Ok(_) => Ok(true),
                Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
                Err(err) => Err(map_error(err, path).into()),
            };
        }
        if self.head_object(path).await?.is_some() {
            return Ok(true);
        }
        if path.is_directory() {
            return self.has_children(path).await;
        }
        Ok(self.pending_upload(path).await?.is_some())
    }
}

#[async_trait]
impl AttributesFinder for S3Backend {
    #[tracing::instrument(level = "debug", skip(self), fields(path = %path))]
    async fn attributes(&self, path: &Path) -> Result<Attributes> {
        if path.is_root() {
            return Ok(Attributes::EMPTY);
        }
        if path.is_container() {
            let _permit = self.acquire_permit().await?;
            let head = self.client.head_bucket().bucket(path.name()).send().await.map_err(|e| map_error(e, path))?;
            let mut attributes = Attributes::default();
            attributes.region = head.bucket_region().map(str::to_string);
            return Ok(attributes);
        }
        if let Some(attributes) = self.head_object(path).await? {
            return Ok(attributes);
        }
        if path.is_directory() && self.has_children(path).await? {
            return Ok(Attributes::EMPTY);
        }
        // In-progress multipart uploads are invisible to HEAD.
        match self.append(path).await? {
            Append::Resume { size } => Ok(Attributes::default().with_size(size)),
            Append::Fresh if self.pending_upload(path).await?.is_some() => Ok(Attributes::EMPTY),
            Append::Fresh => exn::bail!(ErrorKind::NotFound(path.to_string())),
        }
    }
}

#[async_trait]
impl Directory for S3Backend {
    /// Creating an existing bucket fails with
    /// [`AlreadyExists`](ErrorKind::AlreadyExists); creating an existing
    /// folder rewrites its placeholder.
    async fn mkdir(&self, directory: &Path, region: Option<&str>) -> Result<Path> {
        let _permit = self.acquire_permit().await?;
        if directory.is_container() {
            let configuration = region.map(|region| {
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build()
            });
            self.client
                .create_bucket()
                .bucket(directory.name())
                .set_create_bucket_configuration(configuration)
                .send()
                .await
                .map_err(|e| map_error(e, directory))?;
            tracing::info!(bucket = %directory, "Created bucket");
            let mut attributes = Attributes::default();
            attributes.region = region.map(str::to_string);
            return Ok(directory.clone().with_attributes(attributes));
        }
        let (bucket, key) = Self::locate(directory)?;
        let put = self
            .client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .body(ByteStream::from_static(b""))
            .send()
            .await
            .map_err(|e| map_error(e, directory))?;
        tracing::info!(path = %directory, "Created folder placeholder");
        let mut attributes = Attributes::default().with_size(0);
        attributes.version_id = put.version_id().map(str::to_string);
        Ok(directory.clone().with_attributes(attributes))
    }

    fn is_supported(&self, workdir: &Path, name: &str) -> bool {
        if workdir.is_root() {
            // Bucket names: 3 to 63 lowercase alphanumerics, dots and hyphens.
            return (3..=63).contains(&name.len())
                && name.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-');
        }
        crate::validate_name(name).is_ok()
    }
}

#[async_trait]
impl Touch for S3Backend {
    async fn touch(&self, file: &Path) -> Result<Path> {
        let options = WriteOptions {
            modified: Some(OffsetDateTime::now_utc()),
            ..WriteOptions::default()
        };
        self.write(file, &[], &options).await
    }

    fn is_supported(&self, workdir: &Path, name: &str) -> bool {
        !workdir.is_root() && crate::validate_name(name).is_ok()
    }
}

#[async_trait]
impl ServerSideCopy for S3Backend {
    async fn copy(&self, source: &Path, target: &Path, options: CopyOptions) -> Result<Path> {
        if source.is_directory() || target.is_directory() {
            exn::bail!(ErrorKind::Interoperability(format!("cannot copy directory {source} server side")));
        }
        if !options.overwrite && self.head_object(target).await?.is_some() {
            exn::bail!(ErrorKind::AlreadyExists(target.to_string()));
        }
        let (source_bucket, source_key) = Self::locate(source)?;
        let (bucket, key) = Self::locate(target)?;
        let _permit = self.acquire_permit().await?;
        let copied = self
            .client
            .copy_object()
            .copy_source(format!("{source_bucket}/{source_key}"))
            .bucket(&bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_error(e, source))?;
        tracing::info!(source = %source, target = %target, "Copied");
        let result = copied.copy_object_result();
        let mut attributes = Attributes::default().with_checksum(result.and_then(|r| r.e_tag()).and_then(Checksum::parse));
        attributes.modified = result.and_then(|r| r.last_modified()).and_then(Self::parse_datetime);
        attributes.version_id = copied.version_id().map(str::to_string);
        Ok(target.clone().with_attributes(attributes))
    }
}

#[async_trait]
impl Delete for S3Backend {
    async fn delete(&self, paths: &[Path], callback: &dyn DeleteCallback) -> DeleteReport {
        let mut report = DeleteReport::default();
        let (buckets, objects): (Vec<&Path>, Vec<&Path>) = paths.iter().partition(|path| path.is_container());
        for path in objects.into_iter().chain(buckets) {
            let outcome = self.delete_one(path).await;
            report.record(path, outcome, callback);
        }
        report
    }
}

#[async_trait]
impl Write for S3Backend {
    #[tracing::instrument(level = "debug", skip(self, data, options), fields(path = %file, size = data.len()))]
    async fn write(&self, file: &Path, data: &[u8], options: &WriteOptions) -> Result<Path> {
        let upload_id = if options.resume { self.pending_upload(file).await? } else { None };
        if upload_id.is_some() || data.len() as u64 > self.options.large_upload_threshold {
            self.upload_multipart(file, data, options, upload_id).await?;
        } else {
            let (bucket, key) = Self::locate(file)?;
            let _permit = self.acquire_permit().await?;
            self.client
                .put_object()
                .bucket(&bucket)
                .key(&key)
                .body(ByteStream::from(data.to_vec()))
                .set_content_type(options.content_type.clone())
                .set_storage_class(options.storage_class.as_deref().map(StorageClass::from))
                .set_metadata(Some(Self::metadata(options)))
                .send()
                .await
                .map_err(|e| map_error(e, file))?;
        }
        tracing::info!(path = %file, "Uploaded");
        let attributes = self.head_object(file).await?.unwrap_or_default();
        Ok(file.clone().with_attributes(attributes))
    }

    async fn append(&self, file: &Path) -> Result<Append> {
        let Some(upload_id) = self.pending_upload(file).await? else {
            return Ok(Append::Fresh);
        };
        let parts = self.parts(file, &upload_id).await?;
        if parts.is_empty() {
            return Ok(Append::Fresh);
        }
        Ok(Append::Resume {
            size: parts.iter().map(|(_, size, _)| size).sum(),
        })
    }
}

impl List for S3Backend {
    fn list<'a>(&'a self, directory: &'a Path) -> PathStream<'a> {
        Box::pin(stream! {
            if directory.is_root() {
                match self.buckets(directory).await {
                    Ok(buckets) => {
                        for bucket in buckets {
                            yield Ok(bucket);
                        }
                    },
                    Err(err) => yield Err(err),
                }
            } else {
                let mut token: Option<String> = None;
                loop {
                    let (children, next) = match self.page(directory, token.take()).await {
                        Ok(page) => page,
                        Err(err) => {
                            yield Err(err);
                            break;
                        },
                    };
                    for child in children {
                        yield Ok(child);
                    }
                    match next {
                        Some(next) => token = Some(next),
                        None => break,
                    }
                }
            }
        })
    }
}

/// Session over an S3-compatible service.
pub struct S3Session {
    name: String,
    backend: S3Backend,
}
impl S3Session {
    pub fn new(name: impl Into<String>, backend: S3Backend) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }
}

impl Session for S3Session {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &'static str {
        "s3"
    }

    fn find(&self) -> Option<Arc<dyn Find>> {
        Some(Arc::new(self.backend.clone()))
    }

    fn attributes(&self) -> Option<Arc<dyn AttributesFinder>> {
        Some(Arc::new(self.backend.clone()))
    }

    fn directory(&self) -> Option<Arc<dyn Directory>> {
        Some(Arc::new(self.backend.clone()))
    }

    fn touch(&self) -> Option<Arc<dyn Touch>> {
        Some(Arc::new(self.backend.clone()))
    }

    fn copy(&self) -> Option<Arc<dyn ServerSideCopy>> {
        Some(Arc::new(self.backend.clone()))
    }

    fn delete(&self) -> Option<Arc<dyn Delete>> {
        Some(Arc::new(self.backend.clone()))
    }

    fn write(&self) -> Option<Arc<dyn Write>> {
        Some(Arc::new(self.backend.clone()))
    }

    fn list(&self) -> Option<Arc<dyn List>> {
        Some(Arc::new(self.backend.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::head_object::{HeadObjectError, HeadObjectOutput};
    use aws_sdk_s3::types::error::NotFound;
    use aws_smithy_mocks::{mock, mock_client};
    use rstest::rstest;

    #[rstest]
    #[case(Some(404), None, "NotFound")]
    #[case(Some(400), Some("NoSuchBucket"), "NotFound")]
    #[case(Some(409), Some("BucketAlreadyOwnedByYou"), "AlreadyExists")]
    #[case(Some(501), Some("NotImplemented"), "Interoperability")]
    #[case(Some(405), None, "Interoperability")]
    #[case(Some(403), Some("AccessDenied"), "PermissionDenied")]
    #[case(Some(503), Some("SlowDown"), "Network")]
    #[case(Some(400), Some("InvalidArgument"), "Backend")]
    fn test_classify(#[case] status: Option<u16>, #[case] code: Option<&str>, #[case] expected: &str) {
        let kind = classify(status, code, "detail".to_string());
        assert!(format!("{kind:?}").starts_with(expected), "{kind:?}");
    }

    #[rstest]
    #[case("/bucket/dir/file.txt", EntryType::File, "bucket", "dir/file.txt")]
    #[case("/bucket/dir", EntryType::Directory, "bucket", "dir/")]
    fn test_locate(#[case] path: &str, #[case] kind: EntryType, #[case] bucket: &str, #[case] key: &str) {
        let path = Path::parse(path, kind).unwrap();
        assert_eq!(S3Backend::locate(&path).unwrap(), (bucket.to_string(), key.to_string()));
    }

    #[test]
    fn test_locate_rejects_containers() {
        assert!(S3Backend::locate(&Path::volume("bucket").unwrap()).is_err());
        assert!(S3Backend::locate(&Path::root()).is_err());
    }

    #[test]
    fn test_modified_prefers_metadata() {
        let last_modified = DateTime::from_secs(1_700_000_000);
        let mut metadata = BTreeMap::new();
        assert_eq!(modified(&metadata, Some(&last_modified)).unwrap().unix_timestamp(), 1_700_000_000);
        metadata.insert(MODIFIED_METADATA.to_string(), "1600000000000".to_string());
        assert_eq!(modified(&metadata, Some(&last_modified)).unwrap().unix_timestamp(), 1_600_000_000);
        assert!(modified(&BTreeMap::new(), None).is_none());
    }

    #[tokio::test]
    async fn test_head_object_attributes() {
        let rule = mock!(Client::head_object).then_output(|| {
            HeadObjectOutput::builder()
                .content_length(3)
                .e_tag("\"900150983cd24fb0d6963f7d28e17f72\"")
                .version_id("v1")
                .build()
        });
        let backend = S3Backend::from_client(mock_client!(aws_sdk_s3, [&rule]), S3Options::default());
        let path = Path::parse("/bucket/abc.txt", EntryType::File).unwrap();
        let attributes = backend.attributes(&path).await.unwrap();
        assert_eq!(attributes.size, Some(3));
        assert_eq!(attributes.checksum.unwrap().hash, "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(attributes.version_id.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_find_missing_object() {
        let head = mock!(Client::head_object).then_error(|| HeadObjectError::NotFound(NotFound::builder().build()));
        let uploads = mock!(Client::list_multipart_uploads)
            .then_output(|| aws_sdk_s3::operation::list_multipart_uploads::ListMultipartUploadsOutput::builder().build());
        let backend = S3Backend::from_client(mock_client!(aws_sdk_s3, [&head, &uploads]), S3Options::default());
        let path = Path::parse("/bucket/missing.txt", EntryType::File).unwrap();
        assert!(!backend.find(&path).await.unwrap());
    }
}
