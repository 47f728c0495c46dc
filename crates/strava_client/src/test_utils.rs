//! Scripted `StravaApi` and recording sleeper shared by unit tests.
#![cfg(test)]

use crate::config::Credentials;
use crate::observability::RateLimitSnapshot;
use crate::retry::Sleeper;
use crate::{Activity, FetchOutcome, Page, RefreshGrant, StravaApi, StravaError, TokenResponse};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

pub fn credentials(access_token: Option<&str>) -> Credentials {
    Credentials {
        client_id: "123".into(),
        client_secret: SecretString::from("secret"),
        refresh_token: SecretString::from("rt"),
        access_token: access_token.map(SecretString::from),
    }
}

pub fn activities(count: usize, name: &str) -> Vec<Activity> {
    (0..count)
        .map(|i| Activity {
            id: i as i64,
            name: name.to_string(),
            distance: 100.0,
        })
        .collect()
}

/// Replays queued responses in order and records every call.
#[derive(Default)]
pub struct ScriptedApi {
    refreshes: Mutex<VecDeque<Result<TokenResponse, StravaError>>>,
    probes: Mutex<VecDeque<Result<u16, StravaError>>>,
    pages: Mutex<VecDeque<(u16, FetchOutcome)>>,
    refresh_tokens_sent: Mutex<Vec<String>>,
    probe_calls: Mutex<usize>,
    fetches: Mutex<Vec<(String, u32)>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(access: &str, refresh: &str) -> TokenResponse {
        TokenResponse {
            access_token: access.into(),
            refresh_token: refresh.into(),
            expires_in: Some(21600),
            expires_at: None,
            token_type: Some("Bearer".into()),
        }
    }

    pub fn push_refresh(&self, r: Result<TokenResponse, StravaError>) {
        self.refreshes.lock().unwrap().push_back(r);
    }

    pub fn push_probe(&self, r: Result<u16, StravaError>) {
        self.probes.lock().unwrap().push_back(r);
    }

    pub fn push_page(&self, status: u16, outcome: FetchOutcome) {
        self.pages.lock().unwrap().push_back((status, outcome));
    }

    /// Queue a 200 page with `count` activities.
    pub fn push_ok(&self, count: usize) {
        self.push_page(200, FetchOutcome::Activities(activities(count, "Run")));
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_tokens_sent.lock().unwrap().len()
    }

    pub fn refresh_tokens_sent(&self) -> Vec<String> {
        self.refresh_tokens_sent.lock().unwrap().clone()
    }

    pub fn probe_calls(&self) -> usize {
        *self.probe_calls.lock().unwrap()
    }

    /// `(access token, page)` for every fetch, in call order.
    pub fn fetches(&self) -> Vec<(String, u32)> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl StravaApi for ScriptedApi {
    async fn refresh_token(&self, grant: &RefreshGrant<'_>) -> Result<TokenResponse, StravaError> {
        self.refresh_tokens_sent
            .lock()
            .unwrap()
            .push(grant.refresh_token.expose_secret().to_string());
        self.refreshes
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted refresh call")
    }

    async fn probe_token(&self, _access_token: &SecretString) -> Result<u16, StravaError> {
        *self.probe_calls.lock().unwrap() += 1;
        self.probes
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted probe call")
    }

    async fn probe_athlete(&self, _access_token: &SecretString) -> Result<(), StravaError> {
        Ok(())
    }

    async fn fetch_page(&self, access_token: &SecretString, page: u32) -> Page {
        self.fetches
            .lock()
            .unwrap()
            .push((access_token.expose_secret().to_string(), page));
        let (status, outcome) = self
            .pages
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted page fetch");
        Page {
            index: page,
            status,
            rate_limit: RateLimitSnapshot::default(),
            outcome,
        }
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
