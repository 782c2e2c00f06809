//! Deciding which side of a remote/local pair holds the authoritative copy.
//!
//! The [`ComparisonEngine`] checks existence on both sides, then cascades
//! through [size](SizeComparison), [checksum](ChecksumComparison) and
//! [timestamp](TimestampComparison) strategies until one of them yields a
//! conclusive [`Verdict`]. A sync planner consumes that verdict to decide
//! whether to upload, download or skip.

mod engine;
pub mod error;
mod local;
mod progress;
mod strategy;
mod verdict;

pub use crate::engine::ComparisonEngine;
pub use crate::local::{LocalEntry, LocalFile};
pub use crate::progress::{DisabledProgress, ProgressListener, TracingProgress};
pub use crate::strategy::{ChecksumComparison, ComparisonStrategy, SizeComparison, TimestampComparison};
pub use crate::verdict::Verdict;
