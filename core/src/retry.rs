//! Retry decisions and backoff delays.
//!
//! # Design
//! The policy is pure: given an attempt number and (optionally) the response
//! that failed, it answers "retry?" and "how long to wait?". The client
//! loop owns sleeping and cancellation, which keeps this module trivially
//! testable.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::is_transient_status;
use crate::http::HttpResponse;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// Server hints longer than this are ignored in favor of our own backoff.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Whether a failure on attempt `attempt` (zero-based) should be retried.
    pub fn should_retry(&self, attempt: u32, response: Option<&HttpResponse>) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        match response {
            Some(response) => is_transient_status(response.status),
            // No response at all: connection or timeout failure.
            None => true,
        }
    }

    /// Wait before the retry that follows attempt `attempt`.
    pub fn delay(&self, attempt: u32, response: Option<&HttpResponse>) -> Duration {
        if let Some(hint) = response.and_then(retry_after) {
            return hint;
        }
        self.backoff(attempt, jitter_fraction())
    }

    /// `min(initial * 2^attempt, max)` scaled into `[0.75, 1.0]` by `jitter`.
    pub fn backoff(&self, attempt: u32, jitter: f64) -> Duration {
        let exp = 2u32.saturating_pow(attempt.min(31));
        let base = self.initial_delay.saturating_mul(exp).min(self.max_delay);
        base.mul_f64(1.0 - 0.25 * jitter.clamp(0.0, 1.0))
    }
}

/// Parse `Retry-After-Ms`, then `Retry-After` as seconds or an HTTP-date.
pub fn retry_after(response: &HttpResponse) -> Option<Duration> {
    let millis = if let Some(ms) = response.header("retry-after-ms") {
        ms.trim().parse::<f64>().ok()?
    } else {
        let value = response.header("retry-after")?.trim();
        match value.parse::<f64>() {
            Ok(seconds) => seconds * 1000.0,
            Err(_) => {
                let at = DateTime::parse_from_rfc2822(value).ok()?;
                (at.with_timezone(&Utc) - Utc::now()).num_milliseconds() as f64
            }
        }
    };

    let limit = MAX_RETRY_AFTER.as_millis() as f64;
    if millis.is_finite() && (0.0..=limit).contains(&millis) {
        Some(Duration::from_millis(millis.round() as u64))
    } else {
        None
    }
}

/// A uniform value in `[0, 1)` taken from the leading random bytes of a v4 UUID.
fn jitter_fraction() -> f64 {
    let bits = (Uuid::new_v4().as_u128() >> 80) as u64;
    bits as f64 / (1u64 << 48) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: String::new(),
        }
    }

    #[test]
    fn retries_transient_statuses_only() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0, Some(&response(429, &[]))));
        assert!(policy.should_retry(0, Some(&response(500, &[]))));
        assert!(policy.should_retry(1, Some(&response(503, &[]))));
        assert!(policy.should_retry(0, None));
        assert!(!policy.should_retry(0, Some(&response(404, &[]))));
        assert!(!policy.should_retry(0, Some(&response(409, &[]))));
        assert!(!policy.should_retry(0, Some(&response(422, &[]))));
    }

    #[test]
    fn stops_at_max_retries() {
        let policy = RetryPolicy {
            max_retries: 2,
            ..Default::default()
        };
        assert!(policy.should_retry(1, None));
        assert!(!policy.should_retry(2, None));

        let none = RetryPolicy {
            max_retries: 0,
            ..Default::default()
        };
        assert!(!none.should_retry(0, Some(&response(500, &[]))));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0, 0.0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1, 0.0), Duration::from_secs(1));
        assert_eq!(policy.backoff(3, 0.0), Duration::from_secs(4));
        assert_eq!(policy.backoff(10, 0.0), Duration::from_secs(8));
        assert_eq!(policy.backoff(40, 0.0), Duration::from_secs(8));
        assert_eq!(policy.backoff(0, 1.0), Duration::from_millis(375));
    }

    #[test]
    fn jittered_delay_stays_in_range() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay(1, None);
            assert!(delay >= Duration::from_millis(750), "{delay:?}");
            assert!(delay <= Duration::from_secs(1), "{delay:?}");
        }
    }

    #[test]
    fn retry_after_seconds_and_ms() {
        assert_eq!(
            retry_after(&response(429, &[("Retry-After", "2")])),
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            retry_after(&response(429, &[("retry-after-ms", "150")])),
            Some(Duration::from_millis(150))
        );
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay(0, Some(&response(429, &[("Retry-After", "0")]))),
            Duration::ZERO
        );
    }

    #[test]
    fn retry_after_http_date() {
        let at = (Utc::now() + chrono::Duration::seconds(30)).to_rfc2822();
        let delay = retry_after(&response(503, &[("Retry-After", at.as_str())])).unwrap();
        assert!(delay <= Duration::from_secs(30));
        assert!(delay >= Duration::from_secs(25));
    }

    #[test]
    fn out_of_range_hints_are_ignored() {
        assert_eq!(retry_after(&response(429, &[("Retry-After", "3600")])), None);
        assert_eq!(retry_after(&response(429, &[("Retry-After", "-1")])), None);
        assert_eq!(retry_after(&response(429, &[("Retry-After", "soon")])), None);
    }
}
