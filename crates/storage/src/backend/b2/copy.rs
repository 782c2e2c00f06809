use super::attributes::to_attributes;
use super::{B2Context, error};
use crate::capability::{CopyOptions, ServerSideCopy};
use crate::error::{ErrorKind, Result};
use crate::path::Path;
use async_trait::async_trait;

/// Server-side copy of single files, within or across buckets.
///
/// Overwriting keeps only the copy: the target's previous version is deleted
/// afterwards. If that deletion fails the copy still exists, but the error is
/// returned so the caller knows a stale version was left behind.
pub struct B2Copy {
    context: B2Context,
}
impl B2Copy {
    pub fn new(context: B2Context) -> Self {
        Self { context }
    }

    /// Id of the latest committed version at `target`, if any.
    async fn existing(&self, target: &Path) -> Result<Option<String>> {
        match self.context.fileid.version_id(target).await {
            Ok(id) => Ok(Some(id)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl ServerSideCopy for B2Copy {
    #[tracing::instrument(level = "debug", skip(self), fields(source = %source, target = %target))]
    async fn copy(&self, source: &Path, target: &Path, options: CopyOptions) -> Result<Path> {
        if source.is_directory() || target.is_directory() {
            exn::bail!(ErrorKind::Interoperability(format!(
                "cannot copy directory {source} server side"
            )));
        }
        let Some(key) = target.key() else {
            exn::bail!(ErrorKind::InvalidPath(target.to_string()));
        };
        let source_id = self.context.fileid.version_id(source).await?;
        let previous = self.existing(target).await?;
        if previous.is_some() && !options.overwrite {
            exn::bail!(ErrorKind::AlreadyExists(target.to_string()));
        }
        let bucket_id = self.context.fileid.bucket_id(target).await?;
        let copied = self
            .context
            .client
            .copy_file(&source_id, &bucket_id, &key)
            .await
            .map_err(|e| error::map(e, target))?;
        tracing::info!(source = %source, target = %target, id = %copied.file_id, "Copied");
        self.context.fileid.cache(target, Some(&copied.file_id)).await;
        if let Some(previous) = previous
            && previous != copied.file_id
        {
            // Only the latest version counts; drop the overwritten one.
            if let Err(err) = self.context.client.delete_file_version(&key, &previous).await {
                tracing::warn!(target = %target, error = %err, "Failed to delete overwritten version");
                exn::bail!(error::map(err, target));
            }
        }
        Ok(target.clone().with_attributes(to_attributes(&copied)))
    }
}
