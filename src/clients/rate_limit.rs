//! Per-credential rate-limit tracking.
//!
//! The [`RateLimitLedger`] records the most recent `x-ratelimit-*` headers
//! seen for each API key. The dispatcher updates it after every response and
//! consults it before sending, so a call that would certainly be throttled
//! waits for the reset instead of spending a round trip.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::clients::http_response::HttpResponse;

/// Header carrying the request quota of the current window.
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";

/// Header carrying the requests left in the current window.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Header carrying the end of the current window.
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Reset values above this are taken to be epoch milliseconds.
const MILLISECOND_RESET_THRESHOLD: i64 = 100_000_000_000;

/// The last observed rate-limit state of one API key.
///
/// Serializes with `reset_at` as an RFC 3339 timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RateLimitRecord {
    /// Requests allowed per window.
    pub limit: i64,
    /// Requests left in the current window.
    pub remaining: i64,
    /// When the current window ends.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitRecord {
    /// Parses a record from response headers.
    ///
    /// Returns `None` unless all three `x-ratelimit-*` headers are present
    /// and well formed. The reset header is read as epoch seconds, or as
    /// epoch milliseconds when the value is too large to be seconds.
    #[must_use]
    pub fn from_response(response: &HttpResponse) -> Option<Self> {
        let number = |name: &str| {
            response
                .header(name)
                .and_then(|value| value.trim().parse::<i64>().ok())
        };

        let limit = number(RATE_LIMIT_LIMIT_HEADER)?;
        let remaining = number(RATE_LIMIT_REMAINING_HEADER)?;
        let reset = number(RATE_LIMIT_RESET_HEADER)?;

        let reset_at = if reset > MILLISECOND_RESET_THRESHOLD {
            Utc.timestamp_millis_opt(reset).single()?
        } else {
            Utc.timestamp_opt(reset, 0).single()?
        };

        Some(Self {
            limit,
            remaining,
            reset_at,
        })
    }

    /// Returns `true` if no requests are left in the current window.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining <= 0
    }

    /// Returns the time left until the window resets, zero if it already has.
    #[must_use]
    pub fn time_until_reset(&self) -> Duration {
        (self.reset_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Shared table of [`RateLimitRecord`]s keyed by API key.
///
/// Cloning a ledger is cheap and every clone shares the same table, so one
/// ledger can be handed to several clients. Records are overwritten, never
/// merged: when two in-flight calls for the same key race, the last response
/// observed wins.
///
/// # Example
///
/// ```rust
/// use postmen_api::clients::RateLimitLedger;
///
/// let ledger = RateLimitLedger::new();
/// let shared = ledger.clone();
///
/// assert!(!ledger.is_exhausted("KEY"));
/// assert!(shared.get("KEY").is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RateLimitLedger {
    records: Arc<RwLock<HashMap<String, RateLimitRecord>>>,
}

// Verify RateLimitLedger is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RateLimitLedger>();
};

impl RateLimitLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the rate-limit headers of a response for `api_key`.
    ///
    /// Responses without a complete set of rate-limit headers leave the
    /// existing record untouched. Returns `true` if the record was updated.
    pub fn observe(&self, api_key: &str, response: &HttpResponse) -> bool {
        let Some(record) = RateLimitRecord::from_response(response) else {
            return false;
        };
        self.insert(api_key, record);
        true
    }

    /// Stores a record for `api_key`, replacing any previous one.
    pub fn insert(&self, api_key: &str, record: RateLimitRecord) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(api_key.to_string(), record);
    }

    /// Returns the record for `api_key`, if one has been observed.
    #[must_use]
    pub fn get(&self, api_key: &str) -> Option<RateLimitRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(api_key)
            .copied()
    }

    /// Returns a copy of every record.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, RateLimitRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns `true` if a record exists for `api_key` and it has no
    /// requests left.
    #[must_use]
    pub fn is_exhausted(&self, api_key: &str) -> bool {
        self.get(api_key).is_some_and(|r| r.is_exhausted())
    }

    /// Returns the time left until the window of `api_key` resets.
    ///
    /// Returns `None` if no record exists; a reset in the past yields zero.
    #[must_use]
    pub fn time_until_reset(&self, api_key: &str) -> Option<Duration> {
        self.get(api_key).map(|r| r.time_until_reset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::http_response::ResponseBody;
    use serde_json::json;

    fn response_with(headers: &[(&str, String)]) -> HttpResponse {
        let headers = headers
            .iter()
            .map(|(name, value)| ((*name).to_string(), vec![value.clone()]))
            .collect();
        HttpResponse::new(200, headers, ResponseBody::json(json!({})))
    }

    fn rate_headers(limit: i64, remaining: i64, reset: i64) -> HttpResponse {
        response_with(&[
            ("X-RateLimit-Limit", limit.to_string()),
            ("X-RateLimit-Remaining", remaining.to_string()),
            ("X-RateLimit-Reset", reset.to_string()),
        ])
    }

    #[test]
    fn test_observe_records_complete_headers() {
        let ledger = RateLimitLedger::new();
        let reset = Utc::now().timestamp() + 60;

        assert!(ledger.observe("KEY", &rate_headers(10, 9, reset)));

        let record = ledger.get("KEY").unwrap();
        assert_eq!(record.limit, 10);
        assert_eq!(record.remaining, 9);
        assert_eq!(record.reset_at.timestamp(), reset);
        assert!(!ledger.is_exhausted("KEY"));
    }

    #[test]
    fn test_incomplete_headers_leave_record_untouched() {
        let ledger = RateLimitLedger::new();
        let reset = Utc::now().timestamp() + 60;
        ledger.observe("KEY", &rate_headers(10, 5, reset));

        let partial = response_with(&[("x-ratelimit-remaining", "0".to_string())]);
        assert!(!ledger.observe("KEY", &partial));
        assert!(!ledger.observe("KEY", &response_with(&[])));

        assert_eq!(ledger.get("KEY").unwrap().remaining, 5);
    }

    #[test]
    fn test_records_are_overwritten_not_merged() {
        let ledger = RateLimitLedger::new();
        let reset = Utc::now().timestamp() + 60;
        ledger.observe("KEY", &rate_headers(10, 5, reset));
        ledger.observe("KEY", &rate_headers(20, 0, reset + 30));

        let record = ledger.get("KEY").unwrap();
        assert_eq!(record.limit, 20);
        assert_eq!(record.remaining, 0);
        assert!(ledger.is_exhausted("KEY"));
    }

    #[test]
    fn test_records_are_keyed_by_api_key() {
        let ledger = RateLimitLedger::new();
        let reset = Utc::now().timestamp() + 60;
        ledger.observe("A", &rate_headers(10, 0, reset));

        assert!(ledger.is_exhausted("A"));
        assert!(!ledger.is_exhausted("B"));
        assert!(ledger.time_until_reset("B").is_none());
        assert_eq!(ledger.snapshot().len(), 1);
    }

    #[test]
    fn test_time_until_reset_is_clamped_to_zero() {
        let ledger = RateLimitLedger::new();
        ledger.observe("KEY", &rate_headers(10, 0, Utc::now().timestamp() - 60));
        assert_eq!(ledger.time_until_reset("KEY"), Some(Duration::ZERO));
    }

    #[test]
    fn test_time_until_reset_counts_down_to_reset() {
        let ledger = RateLimitLedger::new();
        ledger.observe("KEY", &rate_headers(10, 0, Utc::now().timestamp() + 30));

        let wait = ledger.time_until_reset("KEY").unwrap();
        assert!(wait > Duration::from_secs(28));
        assert!(wait <= Duration::from_secs(30));
    }

    #[test]
    fn test_millisecond_reset_values_are_recognized() {
        let reset_ms = Utc::now().timestamp_millis() + 5_000;
        let record = RateLimitRecord::from_response(&rate_headers(10, 0, reset_ms)).unwrap();
        assert_eq!(record.reset_at.timestamp_millis(), reset_ms);
    }

    #[test]
    fn test_record_serializes_reset_as_timestamp() {
        let record = RateLimitRecord {
            limit: 10,
            remaining: 3,
            reset_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };
        let value = serde_json::to_value(record).unwrap();
        assert_eq!(value["remaining"], json!(3));
        assert_eq!(value["reset_at"], json!("2023-11-14T22:13:20Z"));
    }

    #[test]
    fn test_clones_share_state() {
        let ledger = RateLimitLedger::new();
        let shared = ledger.clone();
        shared.observe("KEY", &rate_headers(10, 0, Utc::now().timestamp() + 60));
        assert!(ledger.is_exhausted("KEY"));
    }
}
