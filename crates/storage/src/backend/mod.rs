//! Backend adapters.
//!
//! Each adapter translates one provider's API into the capability traits and
//! exposes them through a [`Session`](crate::Session):
//!
//! - [`b2`]: Backblaze B2 native API, over a pluggable [`B2Client`](b2::B2Client)
//!   transport.
//! - `s3` (feature `s3`): any S3-compatible service via `aws-sdk-s3`.

pub mod b2;
#[cfg(feature = "s3")]
pub mod s3;
