//! Resolution of paths to B2 bucket and file ids.
//!
//! Every B2 call beyond listing is addressed by id, never by name. Ids are
//! resolved lazily and cached per path; a path carrying a `version_id` in its
//! attributes snapshot is trusted without a lookup.

use super::client::{B2Client, FileAction, FileResponse};
use super::{PLACEHOLDER, error};
use crate::error::{ErrorKind, Result};
use crate::path::Path;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type Slot = Arc<Mutex<Option<String>>>;

pub struct VersionIdProvider {
    client: Arc<dyn B2Client>,
    cache: Mutex<HashMap<Path, Slot>>,
}

impl VersionIdProvider {
    pub fn new(client: Arc<dyn B2Client>) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Id of the bucket (for containers), the latest file version (for
    /// files) or the placeholder object (for other directories).
    ///
    /// Concurrent lookups of the same path share one resolution.
    pub async fn version_id(&self, path: &Path) -> Result<String> {
        if let Some(id) = &path.attributes().version_id {
            return Ok(id.clone());
        }
        if path.is_root() {
            exn::bail!(ErrorKind::InvalidPath("the root has no version id".to_string()));
        }
        if path.is_container() {
            return self.bucket_id(path).await;
        }
        let bucket_id = self.bucket_id(path).await?;
        let slot = self.slot(path).await;
        let mut guard = slot.lock().await;
        if let Some(id) = guard.as_ref() {
            return Ok(id.clone());
        }
        let id = self.resolve(path, &bucket_id).await?;
        tracing::trace!(path = %path, id = %id, "Resolved version id");
        *guard = Some(id.clone());
        Ok(id)
    }

    /// Id of the bucket containing `path`.
    pub async fn bucket_id(&self, path: &Path) -> Result<String> {
        let Some(container) = path.container() else {
            exn::bail!(ErrorKind::InvalidPath("the root has no bucket".to_string()));
        };
        let slot = self.slot(container).await;
        let mut guard = slot.lock().await;
        if let Some(id) = guard.as_ref() {
            return Ok(id.clone());
        }
        let id = match self.client.list_bucket(container.name()).await.map_err(|e| error::map(e, container))? {
            Some(bucket) => bucket.bucket_id,
            None => exn::bail!(ErrorKind::NotFound(container.to_string())),
        };
        tracing::trace!(bucket = %container, id = %id, "Resolved bucket id");
        *guard = Some(id.clone());
        Ok(id)
    }

    /// Record the id of `path` after a mutation, or forget it with `None`.
    pub async fn cache(&self, path: &Path, id: Option<&str>) {
        let mut cache = self.cache.lock().await;
        match id {
            Some(id) => {
                cache.insert(path.clone(), Arc::new(Mutex::new(Some(id.to_string()))));
            },
            None => {
                cache.remove(path);
            },
        }
    }

    /// Latest committed version of `file_name`, if any.
    pub(crate) async fn latest(&self, bucket_id: &str, file_name: &str, path: &Path) -> Result<Option<FileResponse>> {
        let listing = self
            .client
            .list_file_names(bucket_id, Some(file_name), None, None, 1)
            .await
            .map_err(|e| error::map(e, path))?;
        Ok(listing
            .files
            .into_iter()
            .find(|file| file.file_name == file_name && file.action == FileAction::Upload))
    }

    /// Unfinished large file uploading to `file_name`, if any.
    pub(crate) async fn unfinished(&self, bucket_id: &str, file_name: &str, path: &Path) -> Result<Option<FileResponse>> {
        let unfinished = self
            .client
            .list_unfinished_large_files(bucket_id, Some(file_name))
            .await
            .map_err(|e| error::map(e, path))?;
        Ok(unfinished.into_iter().find(|file| file.file_name == file_name))
    }

    async fn slot(&self, path: &Path) -> Slot {
        let mut cache = self.cache.lock().await;
        cache.entry(path.clone()).or_default().clone()
    }

    async fn resolve(&self, path: &Path, bucket_id: &str) -> Result<String> {
        let Some(key) = path.key() else {
            exn::bail!(ErrorKind::InvalidPath(path.to_string()));
        };
        if path.is_directory() {
            let placeholder = format!("{key}/{PLACEHOLDER}");
            return match self.latest(bucket_id, &placeholder, path).await? {
                Some(file) => Ok(file.file_id),
                None => exn::bail!(ErrorKind::NotFound(path.to_string())),
            };
        }
        if let Some(file) = self.latest(bucket_id, &key, path).await? {
            return Ok(file.file_id);
        }
        // Pending uploads still have an id; looking it up reports the pending
        // state instead of a missing file.
        match self.unfinished(bucket_id, &key, path).await? {
            Some(file) => Ok(file.file_id),
            None => exn::bail!(ErrorKind::NotFound(path.to_string())),
        }
    }
}
