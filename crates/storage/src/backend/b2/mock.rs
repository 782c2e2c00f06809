//! In-memory B2 API for testing.

use super::client::{
    ApiError, B2Client, BucketResponse, BucketType, ClientResult, FileAction, FileResponse, ListResponse, PartResponse,
    UploadRequest,
};
use crate::checksum::{Algorithm, Checksum};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

const NO_SHA1: &str = "none";

#[derive(Default)]
struct State {
    buckets: BTreeMap<String, BucketResponse>,
    /// Every file version, oldest first.
    files: Vec<FileResponse>,
    parts: HashMap<String, BTreeMap<u32, PartResponse>>,
    next_id: u64,
    clock: i64,
    failures: HashMap<String, ApiError>,
    delete_failures: HashMap<String, ApiError>,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:08}", self.next_id)
    }

    fn tick(&mut self) -> i64 {
        self.clock += 1000;
        1_700_000_000_000 + self.clock
    }

    fn check(&self, name: &str) -> ClientResult<()> {
        match self.failures.get(name) {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }

    fn bucket_exists(&self, bucket_id: &str) -> ClientResult<()> {
        if self.buckets.values().any(|bucket| bucket.bucket_id == bucket_id) {
            return Ok(());
        }
        Err(ApiError::new(400, "bad_bucket_id", format!("invalid bucket id: {bucket_id}")).into())
    }

    fn file(&self, file_id: &str) -> ClientResult<&FileResponse> {
        self.files
            .iter()
            .find(|file| file.file_id == file_id)
            .ok_or_else(|| ApiError::new(404, "not_found", format!("file not present: {file_id}")).into())
    }

    fn upload(&mut self, request: UploadRequest<'_>) -> ClientResult<FileResponse> {
        self.bucket_exists(request.bucket_id)?;
        self.check(request.file_name)?;
        let file = FileResponse {
            file_id: self.id("4_z"),
            file_name: request.file_name.to_string(),
            bucket_id: request.bucket_id.to_string(),
            content_length: request.data.len() as u64,
            content_sha1: Some(Checksum::of(Algorithm::Sha1, request.data).hash),
            content_type: request.content_type.to_string(),
            file_info: request.file_info,
            upload_timestamp: self.tick(),
            action: FileAction::Upload,
        };
        self.files.push(file.clone());
        Ok(file)
    }

    fn start(&mut self, bucket_id: &str, file_name: &str, content_type: &str, info: BTreeMap<String, String>) -> ClientResult<FileResponse> {
        self.bucket_exists(bucket_id)?;
        self.check(file_name)?;
        let file = FileResponse {
            file_id: self.id("4_z"),
            file_name: file_name.to_string(),
            bucket_id: bucket_id.to_string(),
            content_length: 0,
            content_sha1: Some(NO_SHA1.to_string()),
            content_type: content_type.to_string(),
            file_info: info,
            upload_timestamp: self.tick(),
            action: FileAction::Start,
        };
        self.files.push(file.clone());
        Ok(file)
    }

    fn part(&mut self, file_id: &str, part_number: u32, data: &[u8]) -> ClientResult<PartResponse> {
        if self.file(file_id)?.action != FileAction::Start {
            return Err(ApiError::new(400, "bad_request", "file is not an unfinished large file").into());
        }
        let part = PartResponse {
            file_id: file_id.to_string(),
            part_number,
            content_length: data.len() as u64,
            content_sha1: Checksum::of(Algorithm::Sha1, data).hash,
        };
        self.parts.entry(file_id.to_string()).or_default().insert(part_number, part.clone());
        Ok(part)
    }

    fn bucket_id(&self, name: &str) -> String {
        match self.buckets.get(name) {
            Some(bucket) => bucket.bucket_id.clone(),
            None => panic!("MockB2Client: no bucket named {name}"),
        }
    }
}

/// In-memory stand-in for the B2 API.
///
/// Mirrors the behaviours the adapter depends on: `file_state_none` for
/// unfinished large files, `none` as the content SHA-1 of finished large
/// files, and refusal to delete non-empty buckets. Any call addressing a file
/// name registered with [`fail_on()`](Self::fail_on) returns that error.
#[derive(Default)]
pub struct MockB2Client {
    state: RwLock<State>,
    calls: AtomicUsize,
    uploaded_parts: AtomicUsize,
}

impl MockB2Client {
    /// Create a mock pre-populated with empty private buckets.
    pub fn with_buckets<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut state = State::default();
        for name in names {
            let bucket = BucketResponse {
                bucket_id: state.id("b"),
                bucket_name: name.to_string(),
                bucket_type: BucketType::AllPrivate,
                bucket_info: BTreeMap::new(),
            };
            state.buckets.insert(name.to_string(), bucket);
        }
        Self {
            state: RwLock::new(state),
            ..Self::default()
        }
    }

    /// Upload a file directly, returning its id. Panics if the bucket does
    /// not exist.
    pub async fn put(&self, bucket: &str, file_name: &str, data: &[u8]) -> String {
        let mut state = self.state.write().await;
        let bucket_id = state.bucket_id(bucket);
        let request = UploadRequest {
            bucket_id: &bucket_id,
            file_name,
            content_type: "application/octet-stream",
            file_info: BTreeMap::new(),
            data,
        };
        match state.upload(request) {
            Ok(file) => file.file_id,
            Err(err) => panic!("MockB2Client::put: {err}"),
        }
    }

    /// Start a large file without finishing it, returning its id.
    pub async fn start(&self, bucket: &str, file_name: &str) -> String {
        let mut state = self.state.write().await;
        let bucket_id = state.bucket_id(bucket);
        match state.start(&bucket_id, file_name, "application/octet-stream", BTreeMap::new()) {
            Ok(file) => file.file_id,
            Err(err) => panic!("MockB2Client::start: {err}"),
        }
    }

    /// Commit a part of an unfinished large file.
    pub async fn part(&self, file_id: &str, part_number: u32, data: &[u8]) {
        if let Err(err) = self.state.write().await.part(file_id, part_number, data) {
            panic!("MockB2Client::part: {err}");
        }
    }

    /// Fail every call addressing `file_name` with `err`.
    pub async fn fail_on(&self, file_name: &str, err: ApiError) {
        self.state.write().await.failures.insert(file_name.to_string(), err);
    }

    /// Fail only deletions of versions of `file_name` with `err`.
    pub async fn fail_delete_on(&self, file_name: &str, err: ApiError) {
        self.state.write().await.delete_failures.insert(file_name.to_string(), err);
    }

    /// Number of committed versions of `file_name` in `bucket`.
    pub async fn versions(&self, bucket: &str, file_name: &str) -> usize {
        let state = self.state.read().await;
        let bucket_id = state.bucket_id(bucket);
        state
            .files
            .iter()
            .filter(|file| file.bucket_id == bucket_id && file.file_name == file_name)
            .filter(|file| file.action == FileAction::Upload)
            .count()
    }

    pub async fn unfinished_count(&self) -> usize {
        let state = self.state.read().await;
        state.files.iter().filter(|file| file.action == FileAction::Start).count()
    }

    /// Number of API calls made through the [`B2Client`] trait.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of parts uploaded through the [`B2Client`] trait.
    pub fn uploaded_parts(&self) -> usize {
        self.uploaded_parts.load(Ordering::SeqCst)
    }

    fn called(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl B2Client for MockB2Client {
    async fn list_buckets(&self) -> ClientResult<Vec<BucketResponse>> {
        self.called();
        Ok(self.state.read().await.buckets.values().cloned().collect())
    }

    async fn list_bucket(&self, name: &str) -> ClientResult<Option<BucketResponse>> {
        self.called();
        Ok(self.state.read().await.buckets.get(name).cloned())
    }

    async fn create_bucket(&self, name: &str, bucket_type: BucketType) -> ClientResult<BucketResponse> {
        self.called();
        let mut state = self.state.write().await;
        if state.buckets.contains_key(name) {
            return Err(ApiError::new(400, "duplicate_bucket_name", format!("bucket name is already in use: {name}")).into());
        }
        let bucket = BucketResponse {
            bucket_id: state.id("b"),
            bucket_name: name.to_string(),
            bucket_type,
            bucket_info: BTreeMap::new(),
        };
        state.buckets.insert(name.to_string(), bucket.clone());
        Ok(bucket)
    }

    async fn delete_bucket(&self, bucket_id: &str) -> ClientResult<()> {
        self.called();
        let mut state = self.state.write().await;
        state.bucket_exists(bucket_id)?;
        if state.files.iter().any(|file| file.bucket_id == bucket_id) {
            return Err(ApiError::new(400, "cannot_delete_non_empty_bucket", "bucket is not empty").into());
        }
        state.buckets.retain(|_, bucket| bucket.bucket_id != bucket_id);
        Ok(())
    }

    async fn list_file_names(
        &self,
        bucket_id: &str,
        start: Option<&str>,
        prefix: Option<&str>,
        delimiter: Option<&str>,
        max: usize,
    ) -> ClientResult<ListResponse> {
        self.called();
        let state = self.state.read().await;
        state.bucket_exists(bucket_id)?;
        if let Some(start) = start {
            state.check(start)?;
        }
        let prefix = prefix.unwrap_or("");
        // Latest committed version of each name.
        let mut latest: BTreeMap<String, FileResponse> = BTreeMap::new();
        for file in state.files.iter().filter(|file| file.bucket_id == bucket_id) {
            if file.action == FileAction::Upload {
                latest.insert(file.file_name.clone(), file.clone());
            }
        }
        let mut entries: BTreeMap<String, FileResponse> = BTreeMap::new();
        for (name, file) in latest {
            let Some(rest) = name.strip_prefix(prefix) else {
                continue;
            };
            let folder = delimiter.and_then(|delimiter| rest.find(delimiter).map(|at| at + delimiter.len()));
            match folder {
                Some(end) => {
                    let folder = format!("{prefix}{}", &rest[..end]);
                    let entry = FileResponse {
                        file_id: String::new(),
                        file_name: folder.clone(),
                        content_length: 0,
                        content_sha1: None,
                        file_info: BTreeMap::new(),
                        upload_timestamp: 0,
                        action: FileAction::Folder,
                        ..file
                    };
                    entries.entry(folder).or_insert(entry);
                },
                None => {
                    entries.insert(name, file);
                },
            }
        }
        let mut remaining = entries
            .into_values()
            .filter(|entry| start.is_none_or(|start| entry.file_name.as_str() >= start));
        let files: Vec<FileResponse> = remaining.by_ref().take(max).collect();
        let next_file_name = remaining.next().map(|entry| entry.file_name);
        Ok(ListResponse { files, next_file_name })
    }

    async fn get_file_info(&self, file_id: &str) -> ClientResult<FileResponse> {
        self.called();
        let state = self.state.read().await;
        let file = state.file(file_id)?;
        state.check(&file.file_name)?;
        if file.action == FileAction::Start {
            return Err(ApiError::new(400, "file_state_none", "large file upload not finished").into());
        }
        Ok(file.clone())
    }

    async fn upload_file(&self, request: UploadRequest<'_>) -> ClientResult<FileResponse> {
        self.called();
        self.state.write().await.upload(request)
    }

    async fn start_large_file(
        &self,
        bucket_id: &str,
        file_name: &str,
        content_type: &str,
        file_info: BTreeMap<String, String>,
    ) -> ClientResult<FileResponse> {
        self.called();
        self.state.write().await.start(bucket_id, file_name, content_type, file_info)
    }

    async fn upload_part(&self, file_id: &str, part_number: u32, data: &[u8]) -> ClientResult<PartResponse> {
        self.called();
        let part = self.state.write().await.part(file_id, part_number, data)?;
        self.uploaded_parts.fetch_add(1, Ordering::SeqCst);
        Ok(part)
    }

    async fn list_parts(&self, file_id: &str) -> ClientResult<Vec<PartResponse>> {
        self.called();
        let state = self.state.read().await;
        state.file(file_id)?;
        Ok(state.parts.get(file_id).map(|parts| parts.values().cloned().collect()).unwrap_or_default())
    }

    async fn finish_large_file(&self, file_id: &str, part_sha1s: &[String]) -> ClientResult<FileResponse> {
        self.called();
        let mut state = self.state.write().await;
        if state.file(file_id)?.action != FileAction::Start {
            return Err(ApiError::new(400, "bad_request", "file is not an unfinished large file").into());
        }
        let parts = state.parts.remove(file_id).unwrap_or_default();
        let committed: Vec<&String> = parts.values().map(|part| &part.content_sha1).collect();
        if committed != part_sha1s.iter().collect::<Vec<_>>() {
            state.parts.insert(file_id.to_string(), parts);
            return Err(ApiError::new(400, "bad_request", "part checksums do not match").into());
        }
        let timestamp = state.tick();
        let position = state.files.iter().position(|file| file.file_id == file_id).unwrap_or_default();
        let mut file = state.files.remove(position);
        file.action = FileAction::Upload;
        file.content_length = parts.values().map(|part| part.content_length).sum();
        file.upload_timestamp = timestamp;
        state.files.push(file.clone());
        Ok(file)
    }

    async fn cancel_large_file(&self, file_id: &str) -> ClientResult<()> {
        self.called();
        let mut state = self.state.write().await;
        if state.file(file_id)?.action != FileAction::Start {
            return Err(ApiError::new(400, "bad_request", "file is not an unfinished large file").into());
        }
        state.files.retain(|file| file.file_id != file_id);
        state.parts.remove(file_id);
        Ok(())
    }

    async fn list_unfinished_large_files(
        &self,
        bucket_id: &str,
        prefix: Option<&str>,
    ) -> ClientResult<Vec<FileResponse>> {
        self.called();
        let state = self.state.read().await;
        state.bucket_exists(bucket_id)?;
        if let Some(prefix) = prefix {
            state.check(prefix)?;
        }
        Ok(state
            .files
            .iter()
            .filter(|file| file.bucket_id == bucket_id && file.action == FileAction::Start)
            .filter(|file| prefix.is_none_or(|prefix| file.file_name.starts_with(prefix)))
            .cloned()
            .collect())
    }

    async fn copy_file(&self, source_id: &str, bucket_id: &str, file_name: &str) -> ClientResult<FileResponse> {
        self.called();
        let mut state = self.state.write().await;
        state.bucket_exists(bucket_id)?;
        state.check(file_name)?;
        let source = state.file(source_id)?.clone();
        if source.action != FileAction::Upload {
            return Err(ApiError::new(400, "file_state_none", "source is not a committed file").into());
        }
        let file = FileResponse {
            file_id: state.id("4_z"),
            file_name: file_name.to_string(),
            bucket_id: bucket_id.to_string(),
            upload_timestamp: state.tick(),
            ..source
        };
        state.files.push(file.clone());
        Ok(file)
    }

    async fn delete_file_version(&self, file_name: &str, file_id: &str) -> ClientResult<()> {
        self.called();
        let mut state = self.state.write().await;
        state.check(file_name)?;
        if let Some(err) = state.delete_failures.get(file_name) {
            return Err(err.clone().into());
        }
        let Some(file) = state.files.iter().find(|file| file.file_id == file_id && file.file_name == file_name) else {
            return Err(ApiError::new(400, "file_not_present", format!("file not present: {file_name} {file_id}")).into());
        };
        if file.action == FileAction::Start {
            return Err(ApiError::new(400, "file_state_none", "large file upload not finished").into());
        }
        state.files.retain(|file| file.file_id != file_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_with_delimiter_and_pagination() {
        let client = MockB2Client::with_buckets(["bucket"]);
        for name in ["a", "b/1", "b/2", "c", "d/e/f"] {
            client.put("bucket", name, b"x").await;
        }
        let bucket_id = client.list_bucket("bucket").await.unwrap().unwrap().bucket_id;
        let page = client.list_file_names(&bucket_id, None, None, Some("/"), 2).await.unwrap();
        let names: Vec<&str> = page.files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b/"]);
        assert_eq!(page.files[1].action, FileAction::Folder);
        let next = page.next_file_name.unwrap();
        let page = client.list_file_names(&bucket_id, Some(&next), None, Some("/"), 10).await.unwrap();
        let names: Vec<&str> = page.files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["c", "d/"]);
        assert!(page.next_file_name.is_none());
    }

    #[tokio::test]
    async fn test_latest_version_wins() {
        let client = MockB2Client::with_buckets(["bucket"]);
        client.put("bucket", "a", b"old").await;
        let newest = client.put("bucket", "a", b"newer").await;
        let bucket_id = client.list_bucket("bucket").await.unwrap().unwrap().bucket_id;
        let page = client.list_file_names(&bucket_id, Some("a"), None, None, 1).await.unwrap();
        assert_eq!(page.files[0].file_id, newest);
        assert_eq!(client.versions("bucket", "a").await, 2);
    }
}
