use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub(crate) const RATE_LIMIT_MAX_RETRIES: usize = 5;
pub(crate) const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(2);
pub(crate) const RATE_LIMIT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Exponential backoff for overloaded or rate limited backends. Other
/// failures are never retried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RATE_LIMIT_MAX_RETRIES,
            base_delay: RATE_LIMIT_BASE_DELAY,
            max_delay: RATE_LIMIT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub(crate) fn should_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    pub(crate) async fn wait_with_backoff(
        &self,
        provider: &str,
        attempt: usize,
        delay: Duration,
        retry_after: Option<Duration>,
    ) -> Duration {
        let mut wait = delay;
        if let Some(retry_after) = retry_after
            && retry_after > wait
        {
            wait = retry_after.min(self.max_delay);
        }
        warn!(
            "{} overloaded or rate limited; retrying in {:.1}s (attempt {}/{})",
            provider,
            wait.as_secs_f32(),
            attempt,
            self.max_attempts
        );
        sleep(wait).await;
        self.next_delay(delay)
    }

    pub(crate) fn next_delay(&self, current: Duration) -> Duration {
        let next = current.saturating_mul(2).max(self.base_delay);
        next.min(self.max_delay)
    }
}

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    let code = status.as_u16();
    if code == 529 || code == 503 {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("overloaded")
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    value.parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn detects_overload_and_rate_limits() {
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_rate_limited(StatusCode::SERVICE_UNAVAILABLE, ""));
        assert!(is_rate_limited(
            StatusCode::from_u16(529).expect("status"),
            ""
        ));
        assert!(is_rate_limited(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#
        ));
        assert!(!is_rate_limited(StatusCode::UNAUTHORIZED, "invalid x-api-key"));
    }

    #[test]
    fn delay_doubles_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.next_delay(Duration::from_secs(2)),
            Duration::from_secs(4)
        );
        assert_eq!(
            policy.next_delay(Duration::from_secs(40)),
            Duration::from_secs(60)
        );
        assert_eq!(policy.next_delay(Duration::ZERO), Duration::from_secs(2));
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
    }

    #[test]
    fn parses_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert("retry-after", HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert("retry-after", HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);
    }
}
