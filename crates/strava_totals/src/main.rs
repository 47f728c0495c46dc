use std::process::ExitCode;

use clap::Parser;
use strava_client::retry::tokio_sleeper;
use strava_totals::{Cli, OutputFormat, log_filter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configure logging from env var `STRAVA_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = log_filter(|k| std::env::var(k).ok());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::debug!(%log_env, "strava_totals: log filter");

    let summary = match strava_totals::run(&cli, tokio_sleeper()).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    if summary.refresh_token_rotated {
        tracing::warn!("NOTICE: Strava issued a new refresh token during auth.");
        tracing::warn!("Update STRAVA_REFRESH_TOKEN in your secrets to avoid future auth failures.");
    }

    match cli.format {
        OutputFormat::Text => {
            for line in summary.text_lines() {
                tracing::info!("{line}");
            }
        }
        OutputFormat::Json => match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!("encode summary: {e}");
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}
