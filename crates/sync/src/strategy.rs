use crate::verdict::Verdict;
use stratus_storage::Attributes;
use time::UtcOffset;

/// A single, pure comparison of remote and local attributes.
///
/// Strategies never fail: "cannot decide" is [`Verdict::Indeterminate`].
pub trait ComparisonStrategy: Send + Sync {
    fn compare(&self, remote: &Attributes, local: &Attributes) -> Verdict;
}

/// Differing sizes decide in favour of the larger side.
///
/// Equal sizes are indeterminate: size alone can't prove equal content.
#[derive(Clone, Copy, Debug, Default)]
pub struct SizeComparison;

impl ComparisonStrategy for SizeComparison {
    fn compare(&self, remote: &Attributes, local: &Attributes) -> Verdict {
        match (remote.size, local.size) {
            (Some(remote), Some(local)) if local > remote => Verdict::LocalAhead,
            (Some(remote), Some(local)) if local < remote => Verdict::RemoteAhead,
            _ => Verdict::Indeterminate,
        }
    }
}

/// Matching digests prove equality; anything else says nothing about
/// direction.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChecksumComparison;

impl ComparisonStrategy for ChecksumComparison {
    fn compare(&self, remote: &Attributes, local: &Attributes) -> Verdict {
        match (&remote.checksum, &local.checksum) {
            (Some(remote), Some(local)) if remote.matches(local) => Verdict::Equal,
            _ => Verdict::Indeterminate,
        }
    }
}

/// Newer modification time wins, compared at second precision.
///
/// Remote instants are reinterpreted in `offset` first, for providers that
/// report wall-clock time without a zone.
#[derive(Clone, Copy, Debug)]
pub struct TimestampComparison {
    offset: UtcOffset,
}

impl TimestampComparison {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Default for TimestampComparison {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl ComparisonStrategy for TimestampComparison {
    fn compare(&self, remote: &Attributes, local: &Attributes) -> Verdict {
        let (Some(remote), Some(local)) = (remote.modified, local.modified) else {
            return Verdict::Indeterminate;
        };
        let remote = remote.replace_offset(self.offset).unix_timestamp();
        let local = local.unix_timestamp();
        match remote.cmp(&local) {
            std::cmp::Ordering::Greater => Verdict::RemoteAhead,
            std::cmp::Ordering::Less => Verdict::LocalAhead,
            std::cmp::Ordering::Equal => Verdict::Indeterminate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use stratus_storage::checksum::{Algorithm, Checksum};
    use time::macros::{datetime, offset};

    fn sized(size: Option<u64>) -> Attributes {
        Attributes {
            size,
            ..Attributes::default()
        }
    }

    #[rstest]
    #[case(Some(50), Some(80), Verdict::LocalAhead)]
    #[case(Some(80), Some(50), Verdict::RemoteAhead)]
    #[case(Some(100), Some(100), Verdict::Indeterminate)]
    #[case(Some(0), Some(0), Verdict::Indeterminate)]
    #[case(None, Some(10), Verdict::Indeterminate)]
    #[case(Some(10), None, Verdict::Indeterminate)]
    fn test_size(#[case] remote: Option<u64>, #[case] local: Option<u64>, #[case] expected: Verdict) {
        assert_eq!(SizeComparison.compare(&sized(remote), &sized(local)), expected);
    }

    #[rstest]
    #[case(Some("ABC"), Some("abc"), Verdict::Equal)]
    #[case(Some("abc"), Some("abd"), Verdict::Indeterminate)]
    #[case(None, Some("abc"), Verdict::Indeterminate)]
    #[case(Some("abc"), None, Verdict::Indeterminate)]
    fn test_checksum(#[case] remote: Option<&str>, #[case] local: Option<&str>, #[case] expected: Verdict) {
        let remote = Attributes::default().with_checksum(remote.map(|hash| Checksum::new(Algorithm::Sha1, hash)));
        let local = Attributes::default().with_checksum(local.map(|hash| Checksum::new(Algorithm::Sha1, hash)));
        assert_eq!(ChecksumComparison.compare(&remote, &local), expected);
    }

    #[test]
    fn test_checksum_algorithms_must_agree() {
        let remote = Attributes::default().with_checksum(Checksum::new(Algorithm::Sha1, "abc"));
        let local = Attributes::default().with_checksum(Checksum::new(Algorithm::Md5, "abc"));
        assert_eq!(ChecksumComparison.compare(&remote, &local), Verdict::Indeterminate);
    }

    #[rstest]
    #[case(datetime!(2024-05-01 12:00:10 UTC), datetime!(2024-05-01 12:00:00 UTC), Verdict::RemoteAhead)]
    #[case(datetime!(2024-05-01 12:00:00 UTC), datetime!(2024-05-01 12:00:10 UTC), Verdict::LocalAhead)]
    #[case(datetime!(2024-05-01 12:00:00 UTC), datetime!(2024-05-01 12:00:00 UTC), Verdict::Indeterminate)]
    #[case(datetime!(2024-05-01 12:00:00.100 UTC), datetime!(2024-05-01 12:00:00.900 UTC), Verdict::Indeterminate)]
    fn test_timestamp(
        #[case] remote: time::OffsetDateTime,
        #[case] local: time::OffsetDateTime,
        #[case] expected: Verdict,
    ) {
        let remote = Attributes::default().with_modified(remote);
        let local = Attributes::default().with_modified(local);
        assert_eq!(TimestampComparison::default().compare(&remote, &local), expected);
    }

    #[test]
    fn test_timestamp_unknown() {
        let known = Attributes::default().with_modified(datetime!(2024-05-01 12:00:00 UTC));
        let unknown = Attributes::default();
        let strategy = TimestampComparison::default();
        assert_eq!(strategy.compare(&known, &unknown), Verdict::Indeterminate);
        assert_eq!(strategy.compare(&unknown, &known), Verdict::Indeterminate);
    }

    #[test]
    fn test_timestamp_remote_offset() {
        // Remote reports 14:00 wall-clock time in UTC+02:00, which is 12:00 UTC.
        let remote = Attributes::default().with_modified(datetime!(2024-05-01 14:00:00 UTC));
        let local = Attributes::default().with_modified(datetime!(2024-05-01 12:00:00 UTC));
        let strategy = TimestampComparison::new(offset!(+2));
        assert_eq!(strategy.compare(&remote, &local), Verdict::Indeterminate);
        assert_eq!(TimestampComparison::default().compare(&remote, &local), Verdict::RemoteAhead);
    }
}
