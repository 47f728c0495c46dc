//! Command-line front end: loads credentials, runs the paginated fetch and
//! reports how far the athlete walked on the desk treadmill.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strava_client::{PER_PAGE, StravaApi};
use strava_client::aggregate::{DESK_TREADMILL, NameMatch, aggregate};
use strava_client::auth::TokenManager;
use strava_client::config::Config;
use strava_client::http_client::ReqwestStravaClient;
use strava_client::pagination::fetch_all;
use strava_client::retry::Sleeper;
use tracing::{info, warn};

pub const DEFAULT_ENV_FILE: &str = "strava.env";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Sum the distance of Strava activities with a given name.
#[derive(Debug, Parser)]
#[command(name = "strava-totals", version)]
pub struct Cli {
    /// Env file with STRAVA_CLIENT_ID, STRAVA_CLIENT_SECRET, STRAVA_REFRESH_TOKEN
    /// and optionally STRAVA_ACCESS_TOKEN. Defaults to ./strava.env when present.
    #[arg(long, env = "STRAVA_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Activity name to total (trimmed, case-insensitive exact match).
    #[arg(long, default_value = DESK_TREADMILL)]
    pub activity_name: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Log filter from `STRAVA_LOG_LEVEL`, then `RUST_LOG`, then `info`.
pub fn log_filter<F>(get: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    get("STRAVA_LOG_LEVEL")
        .or_else(|| get("RUST_LOG"))
        .unwrap_or_else(|| "info".to_string())
}

/// Read `KEY=value` pairs from an env file without touching the process
/// environment.
///
/// A missing file is only an error when the caller asked for it explicitly.
pub fn load_env_file(path: &Path, required: bool) -> Result<HashMap<String, String>> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() && !required => {
            warn!(path = %path.display(), "env file not found; using process environment only");
            return Ok(HashMap::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("read env file {}", path.display()));
        }
    };
    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.with_context(|| format!("parse env file {}", path.display()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// Build the run configuration. Process environment wins over the env file.
pub fn resolve_config<F>(env: F, file_vars: &HashMap<String, String>) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    Config::from_env_with(|k| env(k).or_else(|| file_vars.get(k).cloned()))
        .context("unmarshal config")
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub activity_name: String,
    pub activities_fetched: usize,
    pub match_count: usize,
    pub total_distance_meters: f64,
    pub total_distance_miles: f64,
    /// Strava issued a new refresh token; the stored one is stale.
    pub refresh_token_rotated: bool,
}

impl Summary {
    pub fn text_lines(&self) -> [String; 2] {
        [
            format!("{} Activities: {}", self.activity_name, self.match_count),
            format!("Total Distance: {:.2} miles", self.total_distance_miles),
        ]
    }
}

/// Load configuration as described by `cli` and run the whole workflow.
pub async fn run(cli: &Cli, sleeper: Arc<dyn Sleeper>) -> Result<Summary> {
    let (path, required) = match &cli.env_file {
        Some(p) => (p.clone(), true),
        None => (PathBuf::from(DEFAULT_ENV_FILE), false),
    };
    let file_vars = load_env_file(&path, required)?;
    let config = resolve_config(|k| std::env::var(k).ok(), &file_vars)?;
    execute(&config, &cli.activity_name, sleeper).await
}

/// Authenticate, fetch every page and aggregate the matching activities.
pub async fn execute(
    config: &Config,
    activity_name: &str,
    sleeper: Arc<dyn Sleeper>,
) -> Result<Summary> {
    let api = Arc::new(
        ReqwestStravaClient::from_config(config)
            .context("build http client")?
            .with_sleeper(sleeper.clone()),
    );
    let mut tokens = TokenManager::new(api.clone(), config.credentials.clone());
    let access_token = tokens
        .ensure_access_token()
        .await
        .context("ensure access token")?
        .access_token
        .clone();

    if let Err(e) = api.probe_athlete(&access_token).await {
        warn!("token probe warning: {e}");
    }

    info!("authenticated; fetching activities (pages of {PER_PAGE})");
    let activities = fetch_all(api, sleeper, &mut tokens)
        .await
        .context("fetch activities")?;

    let matcher = NameMatch::new(activity_name);
    let result = aggregate(&activities, |a| matcher.matches(a));
    Ok(Summary {
        activity_name: matcher.label().to_string(),
        activities_fetched: activities.len(),
        match_count: result.match_count,
        total_distance_meters: result.total_distance_meters,
        total_distance_miles: result.total_distance_miles(),
        refresh_token_rotated: tokens.rotated_refresh_token().is_some(),
    })
}
