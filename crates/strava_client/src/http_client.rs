//! HTTP client implementation for the Strava API.
//!
//! This module provides a reqwest-based implementation of the [`StravaApi`](crate::StravaApi) trait.

use crate::config::Config;
use crate::observability::RateLimitSnapshot;
use crate::retry::{RetryPolicy, Sleeper, tokio_sleeper};
use crate::utils::{PROBE_SNIPPET_CHARS, body_snippet, truncate};
use crate::{
    Activity, FetchOutcome, PER_PAGE, Page, RefreshGrant, StravaApi, StravaError, TokenResponse,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, WWW_AUTHENTICATE};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the Strava API using reqwest.
///
/// One instance is meant to serve a whole run so the underlying connection
/// pool is reused across pages.
#[derive(Clone)]
pub struct ReqwestStravaClient {
    api_base_url: String,
    token_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for ReqwestStravaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestStravaClient")
            .field("api_base_url", &self.api_base_url)
            .field("token_url", &self.token_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ReqwestStravaClient {
    /// Create a new client instance.
    ///
    /// # Arguments
    /// * `api_base_url` - API root, e.g. "https://www.strava.com/api/v3"
    /// * `token_url` - OAuth token endpoint, e.g. "https://www.strava.com/oauth/token"
    /// * `timeout` - Per-request timeout
    pub fn new(api_base_url: &str, token_url: &str, timeout: Duration) -> Result<Self, StravaError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
            client,
            retry: RetryPolicy::default(),
            sleeper: tokio_sleeper(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, StravaError> {
        Self::new(&config.api_base_url, &config.token_url, config.timeout)
    }

    /// Replace the sleeper used between retries.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn athlete_url(&self) -> String {
        format!("{}/athlete", self.api_base_url)
    }

    fn activities_url(&self) -> String {
        format!("{}/athlete/activities", self.api_base_url)
    }

    /// Build an authenticated activities request.
    fn activities_request(
        &self,
        access_token: &SecretString,
        per_page: usize,
        page: u32,
    ) -> reqwest::RequestBuilder {
        self.client
            .get(self.activities_url())
            .query(&[("per_page", per_page.to_string()), ("page", page.to_string())])
            .bearer_auth(access_token.expose_secret())
            .header(ACCEPT, "application/json")
    }

    async fn backoff(&self, attempt: u32) {
        self.sleeper.sleep(self.retry.delay_for(attempt)).await;
    }
}

#[async_trait]
impl StravaApi for ReqwestStravaClient {
    async fn refresh_token(&self, grant: &RefreshGrant<'_>) -> Result<TokenResponse, StravaError> {
        let form = [
            ("client_id", grant.client_id),
            ("client_secret", grant.client_secret.expose_secret()),
            ("grant_type", "refresh_token"),
            ("refresh_token", grant.refresh_token.expose_secret()),
        ];
        let resp = self
            .client
            .post(&self.token_url)
            .form(&form)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(StravaError::Auth {
                status: status.as_u16(),
                body: body_snippet(&body),
            });
        }
        serde_json::from_str(&body)
            .map_err(|e| StravaError::Malformed(format!("token response: {e}")))
    }

    async fn probe_token(&self, access_token: &SecretString) -> Result<u16, StravaError> {
        let resp = self.activities_request(access_token, 1, 1).send().await?;
        let status = resp.status().as_u16();
        // A body cut short counts as a transport failure.
        if let Err(e) = resp.bytes().await {
            debug!(status, error = %e, "token probe body read failed");
            return Err(e.into());
        }
        Ok(status)
    }

    async fn probe_athlete(&self, access_token: &SecretString) -> Result<(), StravaError> {
        let resp = self
            .client
            .get(self.athlete_url())
            .bearer_auth(access_token.expose_secret())
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if status != StatusCode::OK {
            return Err(StravaError::AthleteProbe {
                status: status.as_u16(),
                body: truncate(&body, PROBE_SNIPPET_CHARS),
            });
        }
        Ok(())
    }

    async fn fetch_page(&self, access_token: &SecretString, page: u32) -> Page {
        let max = self.retry.max_attempts;
        let mut last_status = 0u16;
        let mut rate_limit = RateLimitSnapshot::default();
        let mut last_reason = String::from("no attempt made");

        for attempt in 1..=max {
            let resp = match self
                .activities_request(access_token, PER_PAGE, page)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(page, attempt, max, error = %e, "request error; retrying");
                    last_reason = format!("request error: {e}");
                    self.backoff(attempt).await;
                    continue;
                }
            };

            let status = resp.status();
            last_status = status.as_u16();
            rate_limit = RateLimitSnapshot::from_headers(resp.headers());
            let www_authenticate = resp
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(page, attempt, max, error = %e, "failed reading body; retrying");
                    last_reason = format!("body read error: {e}");
                    self.backoff(attempt).await;
                    continue;
                }
            };

            let outcome = match status {
                StatusCode::OK => match serde_json::from_str::<Vec<Activity>>(&body) {
                    Ok(items) => FetchOutcome::Activities(items),
                    Err(e) => {
                        warn!(page, error = %e, "could not decode activities");
                        FetchOutcome::Malformed {
                            reason: e.to_string(),
                        }
                    }
                },
                StatusCode::TOO_MANY_REQUESTS => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        page,
                        attempt,
                        max,
                        delay_secs = delay.as_secs(),
                        %rate_limit,
                        "429 rate limited; retrying"
                    );
                    last_reason = "rate limited".into();
                    self.sleeper.sleep(delay).await;
                    continue;
                }
                StatusCode::UNAUTHORIZED => {
                    // Missing `activity:read` scope is the usual culprit.
                    let snippet = body_snippet(&body);
                    warn!(
                        page,
                        www_authenticate = www_authenticate.as_deref().unwrap_or(""),
                        body = %snippet,
                        "401 unauthorized"
                    );
                    FetchOutcome::Unauthorized { body: snippet }
                }
                other => {
                    let snippet = body_snippet(&body);
                    warn!(page, status = other.as_u16(), body = %snippet, "unexpected status");
                    FetchOutcome::UnexpectedStatus { body: snippet }
                }
            };

            debug!(page, attempt, status = last_status, "page request resolved");
            return Page {
                index: page,
                status: last_status,
                rate_limit,
                outcome,
            };
        }

        let outcome = if last_status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
            FetchOutcome::RateLimited
        } else {
            FetchOutcome::Exhausted {
                attempts: max,
                reason: last_reason,
            }
        };
        Page {
            index: page,
            status: last_status,
            rate_limit,
            outcome,
        }
    }
}
