use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::config::RateLimitConfig;

/// Persisted state of one limiter key.
///
/// Reset-style token bucket: `remaining_requests` counts down from
/// `request_limit` and snaps back to full once `now >= reset_time`, at which
/// point `reset_time` moves to `now + reset_interval_ms`. There is no
/// continuous refill. All times are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitState {
    pub request_limit: i32,
    pub reset_interval_ms: i64,
    pub remaining_requests: i32,
    pub reset_time: i64,
    /// Scheduled wake-up, if any
    pub alarm_at: Option<i64>,
}

/// Per-key limiter reconfiguration. Missing or non-positive values fall
/// back to the configured defaults.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOptions {
    #[serde(default)]
    pub request_limit: Option<i32>,
    #[serde(default)]
    pub reset_interval_ms: Option<i64>,
}

/// Client-visible header triad
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitHeaders {
    #[serde(rename = "X-RateLimit-Limit")]
    pub limit: i32,
    #[serde(rename = "X-RateLimit-Remaining")]
    pub remaining: i32,
    /// Unix seconds, rounded up
    #[serde(rename = "X-RateLimit-Reset")]
    pub reset: i64,
}

/// Outcome of `check_request`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitCheck {
    /// 0 when admitted, otherwise milliseconds until the window resets
    pub wait_time_ms: i64,
    pub headers: RateLimitHeaders,
}

impl RateLimitOptions {
    /// Resolves the effective `(request_limit, reset_interval_ms)`
    pub fn resolve(&self, defaults: &RateLimitConfig) -> (i32, i64) {
        let limit = self
            .request_limit
            .filter(|l| *l > 0)
            .unwrap_or(defaults.request_limit);
        let interval = self
            .reset_interval_ms
            .filter(|i| *i > 0)
            .unwrap_or(defaults.reset_interval_ms);
        (limit, interval)
    }
}

impl RateLimitState {
    /// A full bucket whose window starts at `now`
    pub fn fresh(request_limit: i32, reset_interval_ms: i64, now: i64) -> Self {
        Self {
            request_limit,
            reset_interval_ms,
            remaining_requests: request_limit,
            reset_time: now.saturating_add(reset_interval_ms),
            alarm_at: None,
        }
    }

    /// Applies new limits. Always starts a fresh window; partial
    /// consumption under the old limits is discarded.
    pub fn reconfigure(&mut self, options: &RateLimitOptions, defaults: &RateLimitConfig, now: i64) {
        let (limit, interval) = options.resolve(defaults);
        self.request_limit = limit;
        self.reset_interval_ms = interval;
        self.remaining_requests = limit;
        self.reset_time = now.saturating_add(interval);
    }

    /// Resets the bucket if the window has elapsed. Returns true on reset.
    pub fn refresh(&mut self, now: i64) -> bool {
        if now >= self.reset_time {
            self.wake(now);
            true
        } else {
            false
        }
    }

    /// Unconditional reset, used by the scheduled wake-up
    pub fn wake(&mut self, now: i64) {
        self.remaining_requests = self.request_limit;
        self.reset_time = now.saturating_add(self.reset_interval_ms);
    }

    /// Consumes one request if available.
    ///
    /// Returns the wait time: 0 when admitted, otherwise the milliseconds
    /// left until `reset_time` (never negative).
    pub fn admit(&mut self, now: i64) -> i64 {
        if self.remaining_requests > 0 {
            self.remaining_requests -= 1;
            0
        } else {
            (self.reset_time - now).max(0)
        }
    }

    /// Points the wake-up at `reset_time`. Returns false when a wake-up for
    /// exactly that instant was already scheduled.
    pub fn schedule_alarm(&mut self) -> bool {
        if self.alarm_at == Some(self.reset_time) {
            return false;
        }
        self.alarm_at = Some(self.reset_time);
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_requests == 0
    }

    pub fn headers(&self) -> RateLimitHeaders {
        RateLimitHeaders {
            limit: self.request_limit,
            remaining: self.remaining_requests,
            reset: ceil_seconds(self.reset_time),
        }
    }
}

impl RateLimitHeaders {
    /// Header name/value pairs ready to attach to a response
    pub fn pairs(&self) -> [(&'static str, String); 3] {
        [
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset.to_string()),
        ]
    }
}

impl RateLimitCheck {
    pub fn is_limited(&self) -> bool {
        self.wait_time_ms > 0
    }

    /// Seconds for a `Retry-After` header (at least 1 when limited)
    pub fn retry_after_secs(&self) -> i64 {
        ceil_seconds(self.wait_time_ms).max(1)
    }
}

fn ceil_seconds(ms: i64) -> i64 {
    let secs = ms.div_euclid(1000);
    if ms.rem_euclid(1000) > 0 {
        secs + 1
    } else {
        secs
    }
}
