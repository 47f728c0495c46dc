//! Page-by-page retrieval of the full activity history.
//!
//! The driver is an explicit state machine:
//!
//! ```text
//! Fetching(p) --200, full page--> Fetching(p+1)
//! Fetching(p) --200, short page--> Done
//! Fetching(p) --401--> Reauthenticating(p) --refreshed--> Fetching(p, after_refresh)
//! Fetching(p) --429--> (pause) Fetching(p)
//! Fetching(p, after_refresh) --anything but 200--> Failed
//! Fetching(p) --other--> Failed
//! ```
//!
//! Pages are strictly sequential: the number of pages is unknown up front and
//! the access token may change between pages.

use crate::auth::TokenManager;
use crate::retry::Sleeper;
use crate::{Activity, FetchOutcome, PER_PAGE, Page, StravaApi, StravaError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Pause before re-requesting a page the API keeps answering with 429.
pub const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub enum DriverState {
    Fetching { page: u32, after_refresh: bool },
    Reauthenticating { page: u32 },
    Done,
    Failed(StravaError),
}

pub struct PaginationDriver {
    api: Arc<dyn StravaApi>,
    sleeper: Arc<dyn Sleeper>,
    per_page: usize,
    rate_limit_pause: Duration,
}

impl PaginationDriver {
    pub fn new(api: Arc<dyn StravaApi>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            api,
            sleeper,
            per_page: PER_PAGE,
            rate_limit_pause: RATE_LIMIT_PAUSE,
        }
    }

    pub fn with_rate_limit_pause(mut self, pause: Duration) -> Self {
        self.rate_limit_pause = pause;
        self
    }

    /// Fetch every page, re-authenticating through `tokens` when the API
    /// rejects the current access token.
    ///
    /// Returns the concatenation of all pages in page order, or the error that
    /// moved the driver to `Failed`.
    pub async fn run(&self, tokens: &mut TokenManager) -> Result<Vec<Activity>, StravaError> {
        let mut access_token = match tokens.state() {
            Some(state) => state.access_token.clone(),
            None => tokens.ensure_access_token().await?.access_token.clone(),
        };
        let mut collected: Vec<Activity> = Vec::new();
        let mut state = DriverState::Fetching {
            page: 1,
            after_refresh: false,
        };

        loop {
            state = match state {
                DriverState::Fetching {
                    page,
                    after_refresh,
                } => {
                    let fetched = self.api.fetch_page(&access_token, page).await;
                    self.step(fetched, after_refresh, &mut collected).await
                }
                DriverState::Reauthenticating { page } => {
                    info!(page, "401 unauthorized; attempting token refresh");
                    match tokens.refresh_access_token().await {
                        Ok(fresh) => {
                            access_token = fresh.access_token.clone();
                            DriverState::Fetching {
                                page,
                                after_refresh: true,
                            }
                        }
                        Err(e) => DriverState::Failed(e),
                    }
                }
                DriverState::Done => {
                    info!(total = collected.len(), "total activities fetched");
                    return Ok(collected);
                }
                DriverState::Failed(e) => return Err(e),
            };
        }
    }

    async fn step(
        &self,
        fetched: Page,
        after_refresh: bool,
        collected: &mut Vec<Activity>,
    ) -> DriverState {
        let Page {
            index: page,
            status,
            rate_limit,
            outcome,
        } = fetched;
        if rate_limit.near_limit() {
            warn!(page, status, %rate_limit, retry = after_refresh, "page fetched; rate limit nearly used");
        } else {
            info!(page, status, %rate_limit, retry = after_refresh, "page fetched");
        }

        match outcome {
            FetchOutcome::Activities(items) => {
                let count = items.len();
                info!(page, count, "page retrieved");
                collected.extend(items);
                if count < self.per_page {
                    DriverState::Done
                } else {
                    DriverState::Fetching {
                        page: page + 1,
                        after_refresh: false,
                    }
                }
            }
            FetchOutcome::Unauthorized { .. } if after_refresh => {
                DriverState::Failed(StravaError::Reauthentication { page, status })
            }
            FetchOutcome::Unauthorized { .. } => DriverState::Reauthenticating { page },
            FetchOutcome::RateLimited if after_refresh => {
                DriverState::Failed(StravaError::RateLimited { page })
            }
            FetchOutcome::RateLimited => {
                warn!(
                    page,
                    pause_secs = self.rate_limit_pause.as_secs(),
                    "429 rate limited; backing off before retrying page"
                );
                self.sleeper.sleep(self.rate_limit_pause).await;
                DriverState::Fetching {
                    page,
                    after_refresh: false,
                }
            }
            FetchOutcome::Malformed { reason } => {
                DriverState::Failed(StravaError::MalformedPage { page, reason })
            }
            FetchOutcome::UnexpectedStatus { body } => {
                DriverState::Failed(StravaError::UnexpectedStatus { page, status, body })
            }
            FetchOutcome::Exhausted { attempts, reason } => {
                DriverState::Failed(StravaError::RetriesExhausted {
                    page,
                    attempts,
                    last_status: status,
                    reason,
                })
            }
        }
    }
}

/// Fetch the whole history with the default page size and rate-limit pause.
pub async fn fetch_all(
    api: Arc<dyn StravaApi>,
    sleeper: Arc<dyn Sleeper>,
    tokens: &mut TokenManager,
) -> Result<Vec<Activity>, StravaError> {
    PaginationDriver::new(api, sleeper).run(tokens).await
}
