mod aggregate;
mod auth;
mod collectors;
mod compare;
mod config;
mod error;
mod models;
mod routes;
mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::{Command, Config, LogFormat};
use crate::models::report::NO_RESULTS_MESSAGE;
use crate::state::AppState;

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jobscan=info,tower_http=info"));
    // stdout carries command output, so logs go to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_format);

    match config.resolved_command() {
        Command::GenerateToken => {
            let token = auth::generate_token();
            println!("token:           {token}");
            println!("API_TOKEN_SHA256={}", auth::hash_token(&token));
        }
        Command::Crawl => {
            let state = AppState::from_config(&config)?;
            let output = state.crawl().await;
            if output.listings.is_empty() {
                eprintln!("{NO_RESULTS_MESSAGE}");
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Scan => {
            let state = AppState::from_config(&config)?;
            if !state.has_resume(None) {
                anyhow::bail!("no resume text: set JOBSCAN_RESUME_TEXT or pass --resume-file");
            }
            let report = state.scan(None).await;
            match &report.message {
                Some(message) => println!("{message}"),
                None => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        Command::Serve { listen_addr } => {
            let state = Arc::new(AppState::from_config(&config)?);
            if state.api_token_hash.is_none() {
                tracing::warn!("API_TOKEN_SHA256 not set; /api/v1 is open");
            }

            let app = Router::new()
                .route("/healthz", get(healthz))
                .merge(routes::api::router(state))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive());

            let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
            tracing::info!("Listening on {}", listen_addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
