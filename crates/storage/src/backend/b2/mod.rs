//! Backblaze B2 adapter over the native API.
//!
//! Buckets are containers; folders are either virtual (implied by object
//! names) or represented by a zero-byte [`PLACEHOLDER`] object. Files at or
//! below [`B2Options::large_upload_threshold`] are uploaded in a single call,
//! larger ones as multipart "large files" whose whole-file SHA-1 is stored in
//! the [`LARGE_FILE_SHA1`] file info.

mod attributes;
mod client;
mod copy;
mod delete;
mod directory;
mod error;
mod fileid;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod write;

pub use self::attributes::B2AttributesFinder;
pub use self::client::{
    ApiError, B2Client, BucketResponse, BucketType, ClientError, ClientResult, FileAction, FileResponse, ListResponse,
    PartResponse, UploadRequest,
};
pub use self::copy::B2Copy;
pub use self::delete::B2Delete;
pub use self::directory::B2Directory;
pub use self::fileid::VersionIdProvider;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockB2Client;
pub use self::write::{B2Touch, B2Write};
use crate::capability::{
    AttributesFinder, Delete, Directory, Find, List, ServerSideCopy, Touch, Write as WriteCapability,
};
use crate::session::Session;
use std::sync::Arc;

/// Name of the zero-byte object standing in for an empty folder.
pub const PLACEHOLDER: &str = ".bzEmpty";
/// File info key holding the client-side modification time in milliseconds.
pub const SRC_LAST_MODIFIED_MILLIS: &str = "src_last_modified_millis";
/// File info key holding the whole-file SHA-1 of a large file.
pub const LARGE_FILE_SHA1: &str = "large_file_sha1";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const MIB: u64 = 1024 * 1024;
/// Smallest part B2 accepts for all but the last part of a large file.
pub const MINIMUM_PART_SIZE: u64 = 5 * MIB;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct B2Options {
    /// Uploads larger than this become multipart large files.
    pub large_upload_threshold: u64,
    pub part_size: u64,
    /// Bucket type for new buckets when `mkdir` is given no region.
    pub default_bucket_type: BucketType,
}
impl Default for B2Options {
    fn default() -> Self {
        Self {
            large_upload_threshold: 200 * MIB,
            part_size: 100 * MIB,
            default_bucket_type: BucketType::AllPrivate,
        }
    }
}

/// State shared by every B2 capability of one session.
#[derive(Clone)]
pub struct B2Context {
    pub(crate) client: Arc<dyn B2Client>,
    pub(crate) fileid: Arc<VersionIdProvider>,
    pub(crate) options: B2Options,
}
impl B2Context {
    pub fn new(client: Arc<dyn B2Client>, options: B2Options) -> Self {
        Self {
            fileid: Arc::new(VersionIdProvider::new(client.clone())),
            client,
            options,
        }
    }
}

/// Session advertising every capability the B2 native API supports.
pub struct B2Session {
    name: String,
    context: B2Context,
}
impl B2Session {
    pub fn new(name: impl Into<String>, client: Arc<dyn B2Client>, options: B2Options) -> Self {
        Self {
            name: name.into(),
            context: B2Context::new(client, options),
        }
    }

    pub fn context(&self) -> &B2Context {
        &self.context
    }
}

impl Session for B2Session {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &'static str {
        "b2"
    }

    fn find(&self) -> Option<Arc<dyn Find>> {
        Some(Arc::new(B2AttributesFinder::new(self.context.clone())))
    }

    fn attributes(&self) -> Option<Arc<dyn AttributesFinder>> {
        Some(Arc::new(B2AttributesFinder::new(self.context.clone())))
    }

    fn directory(&self) -> Option<Arc<dyn Directory>> {
        Some(Arc::new(B2Directory::new(self.context.clone())))
    }

    fn touch(&self) -> Option<Arc<dyn Touch>> {
        Some(Arc::new(B2Touch::new(self.context.clone())))
    }

    fn copy(&self) -> Option<Arc<dyn ServerSideCopy>> {
        Some(Arc::new(B2Copy::new(self.context.clone())))
    }

    fn delete(&self) -> Option<Arc<dyn Delete>> {
        Some(Arc::new(B2Delete::new(self.context.clone())))
    }

    fn write(&self) -> Option<Arc<dyn WriteCapability>> {
        Some(Arc::new(B2Write::new(self.context.clone())))
    }

    fn list(&self) -> Option<Arc<dyn List>> {
        Some(Arc::new(B2AttributesFinder::new(self.context.clone())))
    }
}
