use chrono::{DateTime, Days, Utc};

/// Whether a snapshot created at `created_at` may still be used at `now`.
///
/// Valid iff `now < created_at + max_age`. A snapshot exactly `max_age` old is
/// already stale, as is one whose expiry falls outside the representable
/// calendar.
pub fn is_valid(created_at: DateTime<Utc>, now: DateTime<Utc>, max_age: Days) -> bool {
    match created_at.checked_add_days(max_age) {
        Some(expires_at) => now < expires_at,
        None => false,
    }
}

/// Staleness rule shared by every cache use case
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedCachePolicy {
    max_age_days: u64,
}

impl FeedCachePolicy {
    pub const DEFAULT_MAX_AGE_DAYS: u64 = 7;

    pub fn new(max_age_days: u64) -> Self {
        Self { max_age_days }
    }

    pub fn max_age(&self) -> Days {
        Days::new(self.max_age_days)
    }

    pub fn validate(&self, timestamp: DateTime<Utc>, against: DateTime<Utc>) -> bool {
        is_valid(timestamp, against, self.max_age())
    }
}

impl Default for FeedCachePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_AGE_DAYS)
    }
}
