use crate::StravaError;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://www.strava.com/api/v3";
pub const DEFAULT_TOKEN_URL: &str = "https://www.strava.com/oauth/token";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// OAuth2 application credentials plus the tokens issued to the athlete.
///
/// Fields may be blank; they are validated when a refresh is attempted, since
/// a valid cached access token is enough to run without them.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
    pub access_token: Option<SecretString>,
}

impl Credentials {
    /// The cached access token, if one was supplied and is not blank.
    pub fn cached_access_token(&self) -> Option<&SecretString> {
        self.access_token
            .as_ref()
            .filter(|t| !is_blank(t.expose_secret()))
    }

    /// Names of the fields a refresh grant needs but that are blank.
    pub fn missing_refresh_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.client_id) {
            missing.push("STRAVA_CLIENT_ID");
        }
        if is_blank(self.client_secret.expose_secret()) {
            missing.push("STRAVA_CLIENT_SECRET");
        }
        if is_blank(self.refresh_token.expose_secret()) {
            missing.push("STRAVA_REFRESH_TOKEN");
        }
        missing
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub api_base_url: String,
    pub token_url: String,
    pub timeout: Duration,
}

impl Config {
    /// Read configuration values through `get`, normally the process
    /// environment layered over an env file.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, StravaError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let secret = |v: Option<String>| SecretString::from(v.unwrap_or_default());

        let client_id = get("STRAVA_CLIENT_ID").unwrap_or_default();
        let client_secret = secret(get("STRAVA_CLIENT_SECRET"));
        let refresh_token = secret(get("STRAVA_REFRESH_TOKEN"));
        let access_token = get("STRAVA_ACCESS_TOKEN").map(SecretString::from);

        let api_base_url =
            get("STRAVA_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.into());
        let token_url = get("STRAVA_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.into());
        let timeout = match get("STRAVA_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| {
                    StravaError::Config(format!("STRAVA_HTTP_TIMEOUT_SECS is not a number: {raw}"))
                })?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            credentials: Credentials {
                client_id: client_id.trim().to_string(),
                client_secret,
                refresh_token,
                access_token,
            },
            api_base_url,
            token_url,
            timeout,
        })
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
