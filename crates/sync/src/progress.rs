/// Fire-and-forget sink for human-readable status messages, such as
/// "computing checksum of X".
///
/// Implementations must return promptly; the comparison waits on nothing
/// but the call itself.
pub trait ProgressListener: Send + Sync {
    fn message(&self, message: &str);
}

/// Emits every message as an `info` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingProgress;

impl ProgressListener for TracingProgress {
    fn message(&self, message: &str) {
        tracing::info!(target: "stratus::progress", "{message}");
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledProgress;

impl ProgressListener for DisabledProgress {
    fn message(&self, _message: &str) {}
}
