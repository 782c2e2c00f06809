use crate::error::Error;
use crate::path::Path;

/// Notified after each successful deletion.
pub trait DeleteCallback: Send + Sync {
    fn deleted(&self, path: &Path);
}

/// Callback that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledDeleteCallback;
impl DeleteCallback for DisabledDeleteCallback {
    fn deleted(&self, _path: &Path) {}
}

/// Per-item outcome of a batch deletion.
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub deleted: Vec<Path>,
    pub failed: Vec<(Path, Error)>,
}

impl DeleteReport {
    /// `true` when every requested path was deleted.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn record(&mut self, path: &Path, outcome: crate::error::Result<()>, callback: &dyn DeleteCallback) {
        match outcome {
            Ok(()) => {
                callback.deleted(path);
                self.deleted.push(path.clone());
            },
            Err(err) => {
                tracing::warn!(path = %path, error = %*err, "Failed to delete");
                self.failed.push((path.clone(), err));
            },
        }
    }
}
