//! Authenticated, paginated access to the Strava athlete activity feed.
//!
//! The crate is split along the run's data flow: [`config`] supplies
//! credentials, [`auth::TokenManager`] turns them into a working access token,
//! [`StravaApi::fetch_page`] retrieves one page with bounded retry,
//! [`pagination::PaginationDriver`] walks pages until exhaustion and
//! [`aggregate`] reduces the collection to a summary.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregate;
pub mod auth;
pub mod config;
pub mod http_client;
pub mod observability;
pub mod pagination;
pub mod retry;
pub mod utils;

#[cfg(test)]
mod test_utils;

use observability::RateLimitSnapshot;

/// Maximum number of activities Strava returns per page.
pub const PER_PAGE: usize = 200;

#[derive(Debug, Error)]
pub enum StravaError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("authorization failed (status {status}): {body}")]
    Auth { status: u16, body: String },
    #[error("page {page} still rejected after token refresh (status {status})")]
    Reauthentication { page: u32, status: u16 },
    #[error("page {page} rate limited right after token refresh")]
    RateLimited { page: u32 },
    #[error("unexpected status {status} on page {page}: {body}")]
    UnexpectedStatus { page: u32, status: u16, body: String },
    #[error("malformed activities on page {page}: {reason}")]
    MalformedPage { page: u32, reason: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("probe /athlete status={status} body={body}")]
    AthleteProbe { status: u16, body: String },
    #[error("page {page} unresolved after {attempts} attempts (last status {last_status}): {reason}")]
    RetriesExhausted {
        page: u32,
        attempts: u32,
        last_status: u16,
        reason: String,
    },
}

/// A single activity as returned by `GET /athlete/activities`.
///
/// Only the fields the totals need are kept; everything else in the payload
/// is ignored.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Activity {
    pub id: i64,
    pub name: String,
    /// Meters.
    pub distance: f64,
}

/// Body of a successful `refresh_token` grant.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Form fields for the OAuth2 `refresh_token` grant.
#[derive(Debug)]
pub struct RefreshGrant<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a SecretString,
    pub refresh_token: &'a SecretString,
}

/// How a single page request resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Activities(Vec<Activity>),
    Unauthorized { body: String },
    /// 200 whose body was not an activity list.
    Malformed { reason: String },
    /// Still 429 once the attempt budget ran out.
    RateLimited,
    UnexpectedStatus { body: String },
    /// No usable response within the attempt budget.
    Exhausted { attempts: u32, reason: String },
}

/// Result of [`StravaApi::fetch_page`].
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub index: u32,
    /// Last HTTP status observed, 0 if no response was ever received.
    pub status: u16,
    pub rate_limit: RateLimitSnapshot,
    pub outcome: FetchOutcome,
}

impl Page {
    pub fn len(&self) -> usize {
        match &self.outcome {
            FetchOutcome::Activities(items) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The Strava calls the run depends on.
#[async_trait]
pub trait StravaApi: Send + Sync + 'static {
    /// Exchange a refresh token for a new access token.
    async fn refresh_token(&self, grant: &RefreshGrant<'_>) -> Result<TokenResponse, StravaError>;

    /// Issue a one-item activities request and report the status.
    ///
    /// Transport failures are returned as errors so the caller can tell them
    /// apart from an HTTP rejection.
    async fn probe_token(&self, access_token: &SecretString) -> Result<u16, StravaError>;

    /// `GET /athlete` with the token. Succeeds only on a 200; a token that
    /// passes here but fails on activities is missing the `activity:read`
    /// scope.
    async fn probe_athlete(&self, access_token: &SecretString) -> Result<(), StravaError>;

    /// Fetch one page of activities, retrying transient failures.
    async fn fetch_page(&self, access_token: &SecretString, page: u32) -> Page;
}
