use chrono::{DateTime, TimeZone, Utc};
use derive_more::Constructor;
use log::{debug, warn};
use repo_top::api::{Error, Result};
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const USED_HEADER: &str = "x-ratelimit-used";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Quota as last reported by GitHub.
#[derive(Constructor, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u32,
    pub remaining: u32,
    pub used: u32,
    pub reset: Option<DateTime<Utc>>,
}

impl RateLimit {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

impl Display for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "You have used {} queries of {}. Remaining: {}",
            self.used, self.limit, self.remaining
        )
    }
}

/// Shared quota gate of every request a `GithubClient` sends.
///
/// State is never decremented locally. It is overwritten by the counters of each successful
/// response, so parallel requests may read a value that is already stale. Requests slightly over
/// the quota are tolerated, the server rejects them anyway.
#[derive(Clone)]
pub struct RateLimiter {
    limit: Arc<Mutex<RateLimit>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        RateLimiter {
            limit: Arc::new(Mutex::new(limit)),
        }
    }

    /// Fails with `Error::QuotaExceeded` once the last reported `remaining` is zero.
    pub(crate) async fn check(&self) -> Result<()> {
        let rate_limit = self.limit.lock().await;
        if rate_limit.is_exhausted() {
            match rate_limit.reset {
                Some(reset) => warn!("Rate limit of {} exhausted until {}", rate_limit.limit, reset),
                None => warn!("Rate limit of {} exhausted", rate_limit.limit),
            }
            return Err(Error::QuotaExceeded);
        }
        debug!("Remaining limit {}", rate_limit.remaining);
        Ok(())
    }

    pub(crate) async fn update(&self, headers: &HeaderMap<HeaderValue>) -> Result<()> {
        let limit = read_header::<u32>(headers, LIMIT_HEADER)?;
        let remaining = read_header::<u32>(headers, REMAINING_HEADER)?;
        let used = read_header::<u32>(headers, USED_HEADER)?;
        let reset = match headers.get(RESET_HEADER) {
            Some(_) => Utc.timestamp_opt(read_header::<i64>(headers, RESET_HEADER)?, 0).single(),
            None => None,
        };

        let mut rate_limit = self.limit.lock().await;
        *rate_limit = RateLimit::new(limit, remaining, used, reset);
        debug!("Updated limits: {:?}", rate_limit);
        Ok(())
    }

    pub async fn snapshot(&self) -> RateLimit {
        *self.limit.lock().await
    }
}

fn read_header<T>(headers: &HeaderMap<HeaderValue>, name: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    let invalid = |reason: String| Error::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    headers
        .get(name)
        .ok_or_else(|| invalid("not found".to_string()))?
        .to_str()
        .map_err(|err| invalid(err.to_string()))?
        .parse::<T>()
        .map_err(|err| invalid(err.to_string()))
}

/// Tests

#[cfg(test)]
fn quota_headers(limit: &str, remaining: &str, used: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(LIMIT_HEADER, HeaderValue::from_str(limit).unwrap());
    headers.insert(REMAINING_HEADER, HeaderValue::from_str(remaining).unwrap());
    headers.insert(USED_HEADER, HeaderValue::from_str(used).unwrap());
    headers
}

#[tokio::test]
async fn check_passes_while_quota_remains_test() -> anyhow::Result<()> {
    let limiter = RateLimiter::new(RateLimit::new(5000, 1, 4999, None));

    limiter.check().await?;
    limiter.check().await?;

    assert_eq!(limiter.snapshot().await.remaining, 1, "Check must not consume quota locally");
    Ok(())
}

#[tokio::test]
async fn exhausted_quota_is_sticky_until_reported_otherwise_test() -> anyhow::Result<()> {
    let limiter = RateLimiter::new(RateLimit::new(5000, 3, 4997, None));

    limiter.update(&quota_headers("5000", "0", "5000")).await?;
    assert!(matches!(limiter.check().await, Err(Error::QuotaExceeded)));
    assert!(matches!(limiter.check().await, Err(Error::QuotaExceeded)));

    limiter.update(&quota_headers("5000", "4999", "1")).await?;
    limiter.check().await?;
    Ok(())
}

#[tokio::test]
async fn update_overwrites_state_wholesale_test() -> anyhow::Result<()> {
    let limiter = RateLimiter::new(RateLimit::new(60, 10, 50, None));

    let mut headers = quota_headers("5000", "4990", "10");
    headers.insert(RESET_HEADER, HeaderValue::from_static("1700000000"));
    limiter.update(&headers).await?;

    let expected_reset = Utc.timestamp_opt(1_700_000_000, 0).single();
    assert_eq!(
        limiter.snapshot().await,
        RateLimit::new(5000, 4990, 10, expected_reset),
        "Late responses with a larger remaining are taken as is"
    );
    Ok(())
}

#[tokio::test]
async fn missing_header_keeps_previous_state_test() {
    let initial = RateLimit::new(5000, 10, 4990, None);
    let limiter = RateLimiter::new(initial);

    let mut headers = quota_headers("5000", "9", "4991");
    headers.remove(USED_HEADER);
    let result = limiter.update(&headers).await;

    assert!(matches!(result, Err(Error::InvalidHeader { ref name, .. }) if name == USED_HEADER));
    assert_eq!(limiter.snapshot().await, initial);
}

#[tokio::test]
async fn malformed_header_is_rejected_test() {
    let limiter = RateLimiter::new(RateLimit::new(5000, 10, 4990, None));

    let result = limiter.update(&quota_headers("5000", "many", "4990")).await;

    assert!(matches!(result, Err(Error::InvalidHeader { ref name, .. }) if name == REMAINING_HEADER));
}

#[test]
fn rate_limit_display_test() {
    let rate_limit = RateLimit::new(5000, 4900, 100, None);
    assert_eq!(
        rate_limit.to_string(),
        "You have used 100 queries of 5000. Remaining: 4900"
    );
}
