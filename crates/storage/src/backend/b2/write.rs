use super::attributes::to_attributes;
use super::client::{FileResponse, PartResponse, UploadRequest};
use super::{B2Context, DEFAULT_CONTENT_TYPE, LARGE_FILE_SHA1, PLACEHOLDER, SRC_LAST_MODIFIED_MILLIS, error};
use crate::attributes::to_millis;
use crate::capability::{Append, Touch, Write, WriteOptions};
use crate::checksum::{Algorithm, Checksum};
use crate::error::{ErrorKind, Result};
use crate::path::{Path, validate_name};
use async_trait::async_trait;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Uploads, switching to multipart large files above the configured
/// threshold.
pub struct B2Write {
    context: B2Context,
}
impl B2Write {
    pub fn new(context: B2Context) -> Self {
        Self { context }
    }

    fn file_info(options: &WriteOptions) -> BTreeMap<String, String> {
        let mut info = options.metadata.clone();
        if let Some(modified) = options.modified {
            info.insert(SRC_LAST_MODIFIED_MILLIS.to_string(), to_millis(modified).to_string());
        }
        info
    }

    async fn upload_large(
        &self,
        file: &Path,
        bucket_id: &str,
        key: &str,
        data: &[u8],
        options: &WriteOptions,
        unfinished: Option<FileResponse>,
    ) -> Result<FileResponse> {
        let client = &self.context.client;
        let (file_id, mut committed) = match unfinished {
            Some(unfinished) => {
                let mut parts = client.list_parts(&unfinished.file_id).await.map_err(|e| error::map(e, file))?;
                parts.sort_by_key(|part| part.part_number);
                tracing::debug!(path = %file, parts = parts.len(), "Resuming large file upload");
                (unfinished.file_id, parts)
            },
            None => {
                let mut info = Self::file_info(options);
                info.insert(LARGE_FILE_SHA1.to_string(), Checksum::of(Algorithm::Sha1, data).hash);
                let content_type = options.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
                let started = client
                    .start_large_file(bucket_id, key, content_type, info)
                    .await
                    .map_err(|e| error::map(e, file))?;
                (started.file_id, Vec::new())
            },
        };
        // Parts are always cut at the configured size, so previously
        // committed parts line up with the chunks of the same content.
        let part_size = usize::try_from(self.context.options.part_size)
            .map_err(|_| ErrorKind::Interoperability(format!("part size {} too large", self.context.options.part_size)))?;
        let mut sha1s = Vec::new();
        for (index, chunk) in data.chunks(part_size.max(1)).enumerate() {
            let part_number = u32::try_from(index + 1)
                .map_err(|_| ErrorKind::Interoperability(format!("too many parts for {file}")))?;
            let existing = committed.iter().position(|part: &PartResponse| part.part_number == part_number);
            let part = match existing {
                Some(position) if committed[position].content_length == chunk.len() as u64 => committed.remove(position),
                _ => client.upload_part(&file_id, part_number, chunk).await.map_err(|e| error::map(e, file))?,
            };
            sha1s.push(part.content_sha1);
        }
        tracing::debug!(path = %file, parts = sha1s.len(), "Finishing large file upload");
        let finished = client.finish_large_file(&file_id, &sha1s).await.map_err(|e| error::map(e, file))?;
        Ok(finished)
    }
}

#[async_trait]
impl Write for B2Write {
    #[tracing::instrument(level = "debug", skip(self, data, options), fields(path = %file, size = data.len()))]
    async fn write(&self, file: &Path, data: &[u8], options: &WriteOptions) -> Result<Path> {
        let Some(key) = file.key() else {
            exn::bail!(ErrorKind::InvalidPath(format!("cannot upload to {file}")));
        };
        let bucket_id = self.context.fileid.bucket_id(file).await?;
        let unfinished = if options.resume {
            self.context.fileid.unfinished(&bucket_id, &key, file).await?
        } else {
            None
        };
        let response = if unfinished.is_some() || data.len() as u64 > self.context.options.large_upload_threshold {
            self.upload_large(file, &bucket_id, &key, data, options, unfinished).await?
        } else {
            let request = UploadRequest {
                bucket_id: &bucket_id,
                file_name: &key,
                content_type: options.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE),
                file_info: Self::file_info(options),
                data,
            };
            self.context.client.upload_file(request).await.map_err(|e| error::map(e, file))?
        };
        tracing::info!(path = %file, id = %response.file_id, "Uploaded");
        self.context.fileid.cache(file, Some(&response.file_id)).await;
        Ok(file.clone().with_attributes(to_attributes(&response)))
    }

    async fn append(&self, file: &Path) -> Result<Append> {
        let Some(key) = file.key() else {
            return Ok(Append::Fresh);
        };
        let bucket_id = self.context.fileid.bucket_id(file).await?;
        let Some(unfinished) = self.context.fileid.unfinished(&bucket_id, &key, file).await? else {
            return Ok(Append::Fresh);
        };
        let parts = self
            .context
            .client
            .list_parts(&unfinished.file_id)
            .await
            .map_err(|e| error::map(e, file))?;
        if parts.is_empty() {
            return Ok(Append::Fresh);
        }
        Ok(Append::Resume {
            size: parts.iter().map(|part| part.content_length).sum(),
        })
    }
}

/// Empty file creation as a zero byte upload stamped with the current time.
pub struct B2Touch {
    context: B2Context,
}
impl B2Touch {
    pub fn new(context: B2Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Touch for B2Touch {
    async fn touch(&self, file: &Path) -> Result<Path> {
        let options = WriteOptions {
            modified: Some(OffsetDateTime::now_utc()),
            ..WriteOptions::default()
        };
        B2Write::new(self.context.clone()).write(file, &[], &options).await
    }

    fn is_supported(&self, workdir: &Path, name: &str) -> bool {
        // Files can't live outside a bucket.
        !workdir.is_root() && name != PLACEHOLDER && validate_name(name).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntryType;
    use crate::backend::b2::{B2AttributesFinder, B2Options, MockB2Client};
    use crate::capability::AttributesFinder;
    use std::sync::Arc;

    fn context(client: &Arc<MockB2Client>) -> B2Context {
        let options = B2Options {
            large_upload_threshold: 8,
            part_size: 4,
            ..B2Options::default()
        };
        B2Context::new(client.clone(), options)
    }

    #[tokio::test]
    async fn test_small_upload() {
        let client = Arc::new(MockB2Client::with_buckets(["bucket"]));
        let writer = B2Write::new(context(&client));
        let file = Path::parse("/bucket/small.txt", EntryType::File).unwrap();
        let modified = OffsetDateTime::from_unix_timestamp(1_600_000_000).unwrap();
        let options = WriteOptions {
            modified: Some(modified),
            ..WriteOptions::default()
        };
        let written = writer.write(&file, b"abc", &options).await.unwrap();
        let attributes = written.attributes();
        assert_eq!(attributes.size, Some(3));
        assert_eq!(attributes.modified, Some(modified));
        assert_eq!(attributes.checksum, Some(Checksum::of(Algorithm::Sha1, b"abc")));
        assert_eq!(client.unfinished_count().await, 0);
    }

    #[tokio::test]
    async fn test_large_upload_stores_whole_file_sha1() {
        let client = Arc::new(MockB2Client::with_buckets(["bucket"]));
        let context = context(&client);
        let writer = B2Write::new(context.clone());
        let file = Path::parse("/bucket/large.bin", EntryType::File).unwrap();
        let data = b"0123456789abc";
        let written = writer.write(&file, data, &WriteOptions::default()).await.unwrap();
        assert_eq!(written.attributes().size, Some(data.len() as u64));
        assert_eq!(written.attributes().checksum, Some(Checksum::of(Algorithm::Sha1, data)));

        let finder = B2AttributesFinder::new(context);
        let attributes = finder.attributes(&file).await.unwrap();
        assert_eq!(attributes.checksum, Some(Checksum::of(Algorithm::Sha1, data)));
        assert_eq!(client.uploaded_parts(), 4);
    }

    #[tokio::test]
    async fn test_resume_skips_committed_parts() {
        let client = Arc::new(MockB2Client::with_buckets(["bucket"]));
        let writer = B2Write::new(context(&client));
        let file = Path::parse("/bucket/large.bin", EntryType::File).unwrap();
        let data = b"0123456789abc";

        let file_id = client.start("bucket", "large.bin").await;
        client.part(&file_id, 1, b"0123").await;
        client.part(&file_id, 2, b"4567").await;
        assert_eq!(writer.append(&file).await.unwrap(), Append::Resume { size: 8 });

        let options = WriteOptions {
            resume: true,
            ..WriteOptions::default()
        };
        let written = writer.write(&file, data, &options).await.unwrap();
        assert_eq!(written.attributes().size, Some(data.len() as u64));
        assert_eq!(written.attributes().version_id.as_deref(), Some(file_id.as_str()));
        // Only the two trailing parts were sent by the writer.
        assert_eq!(client.uploaded_parts(), 2);
        assert_eq!(writer.append(&file).await.unwrap(), Append::Fresh);
    }

    #[tokio::test]
    async fn test_touch() {
        let client = Arc::new(MockB2Client::with_buckets(["bucket"]));
        let touch = B2Touch::new(context(&client));
        let file = Path::parse("/bucket/dir/empty", EntryType::File).unwrap();
        let touched = touch.touch(&file).await.unwrap();
        assert_eq!(touched.attributes().size, Some(0));
        assert!(touched.attributes().modified.is_some());

        let bucket = Path::volume("bucket").unwrap();
        assert!(touch.is_supported(&bucket, "file"));
        assert!(!touch.is_supported(&Path::root(), "file"));
        assert!(!touch.is_supported(&bucket, PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_touch_then_attributes() {
        let client = Arc::new(MockB2Client::with_buckets(["bucket"]));
        let context = context(&client);
        let file = Path::parse("/bucket/dir/empty", EntryType::File).unwrap();
        let touched = B2Touch::new(context.clone()).touch(&file).await.unwrap();

        let attributes = B2AttributesFinder::new(context).attributes(&file).await.unwrap();
        assert_eq!(attributes.size, Some(0));
        assert_eq!(attributes.checksum, Some(Checksum::of(Algorithm::Sha1, b"")));
        assert!(attributes.version_id.is_some());
        assert_eq!(attributes.version_id, touched.attributes().version_id);
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_version_id() {
        let client = Arc::new(MockB2Client::with_buckets(["bucket"]));
        let context = context(&client);
        let writer = B2Write::new(context.clone());
        let finder = B2AttributesFinder::new(context);
        let file = Path::parse("/bucket/notes.txt", EntryType::File).unwrap();

        let first = writer.write(&file, b"one", &WriteOptions::default()).await.unwrap();
        let first_id = first.attributes().version_id.clone();
        assert_eq!(finder.attributes(&file).await.unwrap().version_id, first_id);

        let second = writer.write(&file, b"two!", &WriteOptions::default()).await.unwrap();
        let second_id = second.attributes().version_id.clone();
        assert_ne!(first_id, second_id);
        let attributes = finder.attributes(&file).await.unwrap();
        assert_eq!(attributes.version_id, second_id);
        assert_eq!(attributes.size, Some(4));
    }

    #[tokio::test]
    async fn test_upload_into_missing_bucket() {
        let client = Arc::new(MockB2Client::with_buckets(["bucket"]));
        let writer = B2Write::new(context(&client));
        let file = Path::parse("/nope/file", EntryType::File).unwrap();
        let err = writer.write(&file, b"", &WriteOptions::default()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
