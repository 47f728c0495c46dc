//! Access-token acquisition and refresh.
//!
//! Expiry is discovered reactively: a cached token is trusted until the API
//! rejects it with a 401, at which point the refresh-token grant is used.

use crate::config::Credentials;
use crate::{RefreshGrant, StravaApi, StravaError, TokenResponse};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{info, warn};

/// Tokens currently in force for the run.
#[derive(Clone, Debug)]
pub struct TokenState {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Advisory only; never used to refresh ahead of a rejection.
    pub expires_in: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenState {
    fn from_response(resp: TokenResponse) -> Self {
        let expires_at = resp
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| {
                resp.expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            });
        Self {
            access_token: SecretString::from(resp.access_token),
            refresh_token: SecretString::from(resp.refresh_token),
            expires_in: resp.expires_in,
            expires_at,
        }
    }
}

pub struct TokenManager {
    api: Arc<dyn StravaApi>,
    credentials: Credentials,
    state: Option<TokenState>,
}

impl TokenManager {
    pub fn new(api: Arc<dyn StravaApi>, credentials: Credentials) -> Self {
        Self {
            api,
            credentials,
            state: None,
        }
    }

    /// Tokens in force, if any have been established yet.
    pub fn state(&self) -> Option<&TokenState> {
        self.state.as_ref()
    }

    /// Return a usable access token, refreshing only when the cached one is
    /// missing, rejected with a 401, or cannot be probed at all.
    ///
    /// Any other probe status (including non-2xx) leaves the cached token in
    /// place; the page requests will surface the real problem.
    pub async fn ensure_access_token(&mut self) -> Result<&TokenState, StravaError> {
        let Some(cached) = self.credentials.cached_access_token().cloned() else {
            info!("no STRAVA_ACCESS_TOKEN provided; refreshing with STRAVA_REFRESH_TOKEN");
            return self.refresh_access_token().await;
        };

        match self.api.probe_token(&cached).await {
            Err(e) => {
                warn!(error = %e, "token probe failed; refreshing");
                self.refresh_access_token().await
            }
            Ok(401) => {
                info!("configured access token rejected; refreshing");
                self.refresh_access_token().await
            }
            Ok(status) => {
                info!(status, "using configured access token");
                let refresh_token = self.current_refresh_token().clone();
                Ok(&*self.state.insert(TokenState {
                    access_token: cached,
                    refresh_token,
                    expires_in: None,
                    expires_at: None,
                }))
            }
        }
    }

    /// Run the `refresh_token` grant and make its result authoritative.
    ///
    /// Fails with [`StravaError::Config`] before touching the network when
    /// any of client id, client secret or refresh token is blank.
    pub async fn refresh_access_token(&mut self) -> Result<&TokenState, StravaError> {
        let missing = self.credentials.missing_refresh_fields();
        if !missing.is_empty() {
            return Err(StravaError::Config(format!(
                "missing {}",
                missing.join("/")
            )));
        }

        let refresh_token = self.current_refresh_token().clone();
        let grant = RefreshGrant {
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
            refresh_token: &refresh_token,
        };
        let resp = self.api.refresh_token(&grant).await?;
        if resp.access_token.trim().is_empty() {
            return Err(StravaError::Malformed(
                "token response carried an empty access_token".into(),
            ));
        }

        let mut next = TokenState::from_response(resp);
        if next.refresh_token.expose_secret().trim().is_empty() {
            next.refresh_token = refresh_token;
        }
        info!(
            expires_in_secs = next.expires_in.unwrap_or_default(),
            expires_at = %next.expires_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            "token refreshed"
        );
        Ok(&*self.state.insert(next))
    }

    /// The refresh token issued by Strava if it differs from the configured
    /// one; the stored credential is stale once this returns `Some`.
    pub fn rotated_refresh_token(&self) -> Option<&SecretString> {
        let current = &self.state.as_ref()?.refresh_token;
        let configured = self.credentials.refresh_token.expose_secret();
        (current.expose_secret() != configured).then_some(current)
    }

    fn current_refresh_token(&self) -> &SecretString {
        self.state
            .as_ref()
            .map(|s| &s.refresh_token)
            .unwrap_or(&self.credentials.refresh_token)
    }
}
