use super::attributes::to_attributes;
use super::client::{BucketType, UploadRequest};
use super::{B2Context, DEFAULT_CONTENT_TYPE, PLACEHOLDER, error};
use crate::attributes::Attributes;
use crate::capability::Directory;
use crate::error::{ErrorKind, Result};
use crate::path::{Path, validate_name};
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::BTreeMap;

/// Buckets at the top level, placeholder objects below.
///
/// Creating a bucket that already exists fails with
/// [`AlreadyExists`](ErrorKind::AlreadyExists). Creating an existing folder
/// uploads a fresh placeholder and succeeds.
pub struct B2Directory {
    context: B2Context,
}
impl B2Directory {
    pub fn new(context: B2Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Directory for B2Directory {
    #[tracing::instrument(level = "debug", skip(self), fields(path = %directory))]
    async fn mkdir(&self, directory: &Path, region: Option<&str>) -> Result<Path> {
        if directory.is_root() {
            exn::bail!(ErrorKind::InvalidPath("cannot create the root".to_string()));
        }
        if directory.is_container() {
            let bucket_type = match region {
                Some(region) => region
                    .parse::<BucketType>()
                    .or_raise(|| ErrorKind::InvalidPath(format!("unknown bucket type `{region}`")))?,
                None => self.context.options.default_bucket_type,
            };
            let bucket = self
                .context
                .client
                .create_bucket(directory.name(), bucket_type)
                .await
                .map_err(|e| error::map(e, directory))?;
            tracing::info!(bucket = %directory, id = %bucket.bucket_id, "Created bucket");
            self.context.fileid.cache(directory, Some(&bucket.bucket_id)).await;
            let attributes = Attributes::default()
                .with_version_id(bucket.bucket_id)
                .with_region(bucket.bucket_type.to_string());
            return Ok(Path::volume(directory.name())?.with_attributes(attributes));
        }
        let Some(key) = directory.key() else {
            exn::bail!(ErrorKind::InvalidPath(directory.to_string()));
        };
        let bucket_id = self.context.fileid.bucket_id(directory).await?;
        let placeholder = format!("{key}/{PLACEHOLDER}");
        let request = UploadRequest {
            bucket_id: &bucket_id,
            file_name: &placeholder,
            content_type: DEFAULT_CONTENT_TYPE,
            file_info: BTreeMap::new(),
            data: &[],
        };
        let response = self.context.client.upload_file(request).await.map_err(|e| error::map(e, directory))?;
        tracing::info!(path = %directory, "Created folder placeholder");
        self.context.fileid.cache(directory, Some(&response.file_id)).await;
        Ok(directory.clone().with_attributes(to_attributes(&response)))
    }

    fn is_supported(&self, workdir: &Path, name: &str) -> bool {
        if validate_name(name).is_err() || name == PLACEHOLDER {
            return false;
        }
        // Bucket names: 6 to 50 alphanumerics and hyphens.
        if workdir.is_root() {
            return (6..=50).contains(&name.len()) && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
        }
        true
    }
}
