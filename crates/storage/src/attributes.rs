//! Normalized, provider-agnostic metadata.
//!
//! Every field a backend can't determine stays `None`. A known-empty file
//! has `size: Some(0)`, which comparators must be able to tell apart from an
//! unknown size.

use crate::checksum::Checksum;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Metadata snapshot of a remote (or local) entry at lookup time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    /// Content length in bytes.
    pub size: Option<u64>,
    /// Content checksum. `None` means the backend offers none, which is
    /// different from a checksum the backend reported but didn't verify.
    pub checksum: Option<Checksum>,
    /// Modification time; client-set source time where the provider keeps it.
    pub modified: Option<OffsetDateTime>,
    /// Backend-assigned object/file/bucket id.
    pub version_id: Option<String>,
    pub region: Option<String>,
    pub storage_class: Option<String>,
    /// Extra backend-specific key-value metadata, carried opaquely.
    pub metadata: BTreeMap<String, String>,
}

impl Attributes {
    /// Sentinel for entries without intrinsic attributes (roots, pending
    /// uploads with nothing committed).
    pub const EMPTY: Self = Self {
        size: None,
        checksum: None,
        modified: None,
        version_id: None,
        region: None,
        storage_class: None,
        metadata: BTreeMap::new(),
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<Option<Checksum>>) -> Self {
        self.checksum = checksum.into();
        self
    }

    pub fn with_modified(mut self, modified: OffsetDateTime) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_storage_class(mut self, storage_class: impl Into<String>) -> Self {
        self.storage_class = Some(storage_class.into());
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Convert epoch milliseconds (the unit most provider APIs use) to an instant.
pub fn from_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

/// Convert an instant to epoch milliseconds.
pub fn to_millis(instant: OffsetDateTime) -> i64 {
    (instant.unix_timestamp_nanos() / 1_000_000) as i64
}
