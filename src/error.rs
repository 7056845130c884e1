use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        };

        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Failures while fetching a page for a collector. Never leaves the collector:
/// a failed search becomes an "unavailable" listing and a failed description
/// fetch keeps the text already known.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Http(reqwest::Error),

    #[error("server returned {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to read response body: {0}")]
    Body(reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(e)
        }
    }
}

/// Reasons a comparison ends in the failed state.
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("Comparison automation unavailable: {0}. Ensure Chromium is installed or set CHROME_PATH.")]
    Launch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Could not find {0} input on the comparison page")]
    RequiredFieldNotFound(&'static str),

    #[error("Could not find Scan/Compare button")]
    SubmitAffordanceNotFound,

    #[error("Timeout: {0} step exceeded its time budget")]
    StepTimeout(&'static str),

    #[error("Browser error during {step}: {reason}")]
    Browser { step: &'static str, reason: String },

    #[error("Login skipped: {0}")]
    Login(String),

    #[error("Comparison automation panicked: {0}")]
    Panicked(String),
}
