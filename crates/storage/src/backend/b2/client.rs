//! Transport seam for the B2 native API.
//!
//! [`B2Client`] mirrors the subset of API calls the adapter needs, returning
//! plain response structs. The adapter owns every piece of logic on top
//! (id resolution, error mapping, pagination); a client only moves bytes.

use async_trait::async_trait;
use derive_more::{Display, Error};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum BucketType {
    #[display("allPrivate")]
    AllPrivate,
    #[display("allPublic")]
    AllPublic,
}
impl FromStr for BucketType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allPrivate" => Ok(Self::AllPrivate),
            "allPublic" => Ok(Self::AllPublic),
            other => Err(ApiError::new(400, "bad_request", format!("invalid bucket type `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketResponse {
    pub bucket_id: String,
    pub bucket_name: String,
    pub bucket_type: BucketType,
    pub bucket_info: BTreeMap<String, String>,
}

/// What a file version in a bucket represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileAction {
    /// A committed upload.
    Upload,
    /// A large file that was started but not finished.
    Start,
    /// A hide marker.
    Hide,
    /// A virtual folder returned when listing with a delimiter.
    Folder,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileResponse {
    pub file_id: String,
    pub file_name: String,
    pub bucket_id: String,
    pub content_length: u64,
    /// Hex SHA-1, possibly prefixed with `unverified:`, or the literal `none`
    /// for large files.
    pub content_sha1: Option<String>,
    pub content_type: String,
    pub file_info: BTreeMap<String, String>,
    /// Milliseconds since the epoch.
    pub upload_timestamp: i64,
    pub action: FileAction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartResponse {
    pub file_id: String,
    pub part_number: u32,
    pub content_length: u64,
    pub content_sha1: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListResponse {
    pub files: Vec<FileResponse>,
    /// Where to continue listing from, if the listing was truncated.
    pub next_file_name: Option<String>,
}

/// Error body returned by the B2 API.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
#[display("{status} {code}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: String,
    pub message: String,
}
impl ApiError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Display, Error)]
pub enum ClientError {
    #[display("{_0}")]
    Api(ApiError),
    #[display("I/O error: {_0}")]
    Io(std::io::Error),
}
impl From<ApiError> for ClientError {
    fn from(err: ApiError) -> Self {
        Self::Api(err)
    }
}
impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Parameters for a single `b2_upload_file` call.
#[derive(Clone, Debug)]
pub struct UploadRequest<'a> {
    pub bucket_id: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub file_info: BTreeMap<String, String>,
    pub data: &'a [u8],
}

#[async_trait]
pub trait B2Client: Send + Sync {
    async fn list_buckets(&self) -> ClientResult<Vec<BucketResponse>>;
    /// Look up a single bucket by name.
    async fn list_bucket(&self, name: &str) -> ClientResult<Option<BucketResponse>>;
    async fn create_bucket(&self, name: &str, bucket_type: BucketType) -> ClientResult<BucketResponse>;
    async fn delete_bucket(&self, bucket_id: &str) -> ClientResult<()>;

    /// List the latest version of each file, in name order, starting at
    /// `start` (inclusive). With a `delimiter`, names sharing a prefix up to
    /// the next delimiter collapse into one [`FileAction::Folder`] entry.
    async fn list_file_names(
        &self,
        bucket_id: &str,
        start: Option<&str>,
        prefix: Option<&str>,
        delimiter: Option<&str>,
        max: usize,
    ) -> ClientResult<ListResponse>;
    async fn get_file_info(&self, file_id: &str) -> ClientResult<FileResponse>;
    async fn upload_file(&self, request: UploadRequest<'_>) -> ClientResult<FileResponse>;

    async fn start_large_file(
        &self,
        bucket_id: &str,
        file_name: &str,
        content_type: &str,
        file_info: BTreeMap<String, String>,
    ) -> ClientResult<FileResponse>;
    async fn upload_part(&self, file_id: &str, part_number: u32, data: &[u8]) -> ClientResult<PartResponse>;
    async fn list_parts(&self, file_id: &str) -> ClientResult<Vec<PartResponse>>;
    async fn finish_large_file(&self, file_id: &str, part_sha1s: &[String]) -> ClientResult<FileResponse>;
    async fn cancel_large_file(&self, file_id: &str) -> ClientResult<()>;
    async fn list_unfinished_large_files(&self, bucket_id: &str, prefix: Option<&str>)
    -> ClientResult<Vec<FileResponse>>;

    /// Server-side copy into `bucket_id` under `file_name`. Always creates a
    /// new file version.
    async fn copy_file(&self, source_id: &str, bucket_id: &str, file_name: &str) -> ClientResult<FileResponse>;
    async fn delete_file_version(&self, file_name: &str, file_id: &str) -> ClientResult<()>;
}
