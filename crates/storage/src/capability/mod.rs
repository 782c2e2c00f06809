//! Capability traits.
//!
//! Every remote operation is its own narrow trait. A backend implements only
//! the subset its provider supports and advertises them through
//! [`Session`](crate::Session); callers hold trait objects and never a
//! concrete backend type. Operations a provider can't perform at all are
//! reported as [`Interoperability`](crate::error::ErrorKind::Interoperability)
//! errors, never silently degraded.
//!
//! # Object lifecycle
//!
//! ```text
//! absent -> pending (upload started, attributes not queryable)
//!        -> committed (attributes() succeeds)
//!        -> deleted (absent)
//! ```
//!
//! Adapters map provider "incomplete upload" signals onto the pending state
//! instead of reporting them as [`NotFound`](crate::error::ErrorKind::NotFound).

mod default;
mod delete;

pub use self::default::{DefaultFind, ListAttributesFinder};
pub use self::delete::{DeleteCallback, DeleteReport, DisabledDeleteCallback};
use crate::attributes::Attributes;
use crate::error::Result;
use crate::path::Path;
use async_trait::async_trait;
use futures::Stream;
use std::collections::BTreeMap;
use std::pin::Pin;
use time::OffsetDateTime;

/// Stream of directory entries, each carrying its attributes.
pub type PathStream<'a> = Pin<Box<dyn Stream<Item = Result<Path>> + Send + 'a>>;

/// Existence check.
#[async_trait]
pub trait Find: Send + Sync {
    /// Returns `Ok(false)` when the path does not exist. Transport and
    /// authentication failures are errors, never `false`.
    async fn find(&self, path: &Path) -> Result<bool>;
}

/// Attribute lookup.
#[async_trait]
pub trait AttributesFinder: Send + Sync {
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the path
    /// does not resolve, and [`Attributes::EMPTY`] for the root.
    async fn attributes(&self, path: &Path) -> Result<Attributes>;
}

/// Directory (or container) creation.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Create `directory`, optionally in `region` (the meaning of a region
    /// is provider-specific). Returns the directory with its attributes.
    ///
    /// Whether creating an existing directory fails or is a no-op is decided
    /// by each backend and documented on its implementation.
    async fn mkdir(&self, directory: &Path, region: Option<&str>) -> Result<Path>;

    fn is_supported(&self, workdir: &Path, name: &str) -> bool {
        let _ = (workdir, name);
        true
    }
}

/// Empty file creation.
#[async_trait]
pub trait Touch: Send + Sync {
    /// Create a zero-length file. Parent ids are resolved at call time, so
    /// touching into a directory created moments earlier is fine.
    async fn touch(&self, file: &Path) -> Result<Path>;

    fn is_supported(&self, workdir: &Path, name: &str) -> bool {
        let _ = (workdir, name);
        true
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Replace an existing target instead of failing with
    /// [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists).
    pub overwrite: bool,
}

/// Server-side copy.
#[async_trait]
pub trait ServerSideCopy: Send + Sync {
    /// Copy `source` to `target` without downloading it. The returned path
    /// always carries a version id different from the source's.
    async fn copy(&self, source: &Path, target: &Path, options: CopyOptions) -> Result<Path>;
}

/// Batch deletion.
#[async_trait]
pub trait Delete: Send + Sync {
    /// Delete every path, reporting each outcome. One failure never stops
    /// the remaining paths from being attempted or reported.
    async fn delete(&self, paths: &[Path], callback: &dyn DeleteCallback) -> DeleteReport;
}

/// Upload options.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    pub content_type: Option<String>,
    /// Client-side modification time to store alongside the object.
    pub modified: Option<OffsetDateTime>,
    pub storage_class: Option<String>,
    pub metadata: BTreeMap<String, String>,
    /// Continue an incomplete upload reported by [`Write::append`] instead of
    /// starting over.
    pub resume: bool,
}

/// State of a previous upload to the same path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Append {
    /// Nothing to resume; upload from the start.
    Fresh,
    /// An incomplete upload exists with `size` bytes already committed.
    Resume { size: u64 },
}

/// Uploads.
#[async_trait]
pub trait Write: Send + Sync {
    /// Upload `data` to `file`, returning the file with its new attributes.
    async fn write(&self, file: &Path, data: &[u8], options: &WriteOptions) -> Result<Path>;

    /// Report whether an incomplete upload to `file` can be resumed.
    async fn append(&self, file: &Path) -> Result<Append>;
}

/// Directory listing.
pub trait List: Send + Sync {
    /// Stream the direct children of `directory`. Listing the root yields
    /// containers.
    fn list<'a>(&'a self, directory: &'a Path) -> PathStream<'a>;
}
