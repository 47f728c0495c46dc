//! Rate-limit snapshots read from Strava response headers.
//!
//! Strava reports two windows (15 minutes and daily) as comma-separated pairs,
//! e.g. `X-RateLimit-Usage: 10,100` against `X-RateLimit-Limit: 100,1000`.
//! The values are only logged; nothing here throttles requests.

use reqwest::header::HeaderMap;
use std::fmt;

pub const USAGE_HEADER: &str = "X-RateLimit-Usage";
pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";

/// Fraction of a window's limit at which the snapshot is reported as close.
const NEAR_LIMIT_RATIO: f64 = 0.9;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub usage: Option<String>,
    pub limit: Option<String>,
}

impl RateLimitSnapshot {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            usage: read(USAGE_HEADER),
            limit: read(LIMIT_HEADER),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.usage.is_none() && self.limit.is_none()
    }

    /// True when any window has used at least 90% of its limit.
    pub fn near_limit(&self) -> bool {
        let (Some(usage), Some(limit)) = (&self.usage, &self.limit) else {
            return false;
        };
        parse_windows(usage)
            .zip(parse_windows(limit))
            .any(|(used, cap)| cap > 0 && used as f64 >= cap as f64 * NEAR_LIMIT_RATIO)
    }
}

impl fmt::Display for RateLimitSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        write!(
            f,
            "usage={} limit={}",
            self.usage.as_deref().unwrap_or(""),
            self.limit.as_deref().unwrap_or("")
        )
    }
}

fn parse_windows(raw: &str) -> impl Iterator<Item = u64> + '_ {
    raw.split(',').filter_map(|p| p.trim().parse().ok())
}
