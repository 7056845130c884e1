use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::report::{CrawlOutput, ScanReport};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    /// Overrides the configured resume for this scan only.
    pub resume_text: Option<String>,
}

/// POST /api/v1/crawl
///
/// Run one crawl and return the retained listings. Nothing is persisted.
pub async fn crawl(State(state): State<Arc<AppState>>) -> Json<CrawlOutput> {
    Json(state.crawl().await)
}

/// POST /api/v1/scan
///
/// Crawl, then compare every listing against the resume. The body is
/// optional; an empty body uses the configured resume.
pub async fn scan(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ScanReport>, AppError> {
    let request: ScanRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ScanRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("invalid scan request: {e}")))?
    };

    let override_text = request.resume_text.as_deref();
    if !state.has_resume(override_text) {
        return Err(AppError::BadRequest(
            "No resume text configured; pass resume_text in the request body".to_string(),
        ));
    }

    Ok(Json(state.scan(override_text).await))
}
