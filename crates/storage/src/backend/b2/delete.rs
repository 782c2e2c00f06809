use super::{B2Context, PLACEHOLDER, error};
use crate::capability::{Delete, DeleteCallback, DeleteReport};
use crate::error::{ErrorKind, Result};
use crate::path::Path;
use async_trait::async_trait;

/// Deletes file versions, folder placeholders and buckets.
///
/// Files and folders go first so buckets emptied by the same batch can be
/// removed afterwards.
pub struct B2Delete {
    context: B2Context,
}
impl B2Delete {
    pub fn new(context: B2Context) -> Self {
        Self { context }
    }

    async fn delete_object(&self, path: &Path) -> Result<()> {
        let Some(key) = path.key() else {
            exn::bail!(ErrorKind::InvalidPath(path.to_string()));
        };
        let file_name = if path.is_directory() {
            format!("{key}/{PLACEHOLDER}")
        } else {
            key
        };
        let id = match self.context.fileid.version_id(path).await {
            Ok(id) => id,
            Err(err) if err.is_not_found() && path.is_directory() => {
                tracing::debug!(path = %path, "Folder has no placeholder, nothing to delete");
                return Ok(());
            },
            Err(err) => return Err(err),
        };
        let client = &self.context.client;
        match client.delete_file_version(&file_name, &id).await.map_err(|e| error::map(e, path)) {
            Ok(()) => Ok(()),
            Err(ErrorKind::Pending(_)) => {
                tracing::debug!(path = %path, "Cancelling unfinished large file");
                client.cancel_large_file(&id).await.map_err(|e| error::map(e, path))?;
                Ok(())
            },
            Err(kind) => Err(kind.into()),
        }
    }

    async fn delete_bucket(&self, bucket: &Path) -> Result<()> {
        let id = self.context.fileid.version_id(bucket).await?;
        self.context.client.delete_bucket(&id).await.map_err(|e| error::map(e, bucket))?;
        Ok(())
    }
}

#[async_trait]
impl Delete for B2Delete {
    #[tracing::instrument(level = "debug", skip_all, fields(count = paths.len()))]
    async fn delete(&self, paths: &[Path], callback: &dyn DeleteCallback) -> DeleteReport {
        let mut report = DeleteReport::default();
        let (buckets, objects): (Vec<&Path>, Vec<&Path>) = paths.iter().partition(|path| path.is_container());
        for path in objects {
            let outcome = if path.is_root() {
                Err(ErrorKind::InvalidPath("cannot delete the root".to_string()).into())
            } else {
                self.delete_object(path).await
            };
            if outcome.is_ok() {
                self.context.fileid.cache(path, None).await;
            }
            report.record(path, outcome, callback);
        }
        for bucket in buckets {
            let outcome = self.delete_bucket(bucket).await;
            if outcome.is_ok() {
                self.context.fileid.cache(bucket, None).await;
            }
            report.record(bucket, outcome, callback);
        }
        report
    }
}
