use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::models::listing::Source;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<Source>,
    pub categories: Vec<String>,
    pub comparisons_enabled: bool,
}

/// GET /api/v1/sources
pub async fn list(State(state): State<Arc<AppState>>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: state.sources.clone(),
        categories: state.crawl_settings.categories.clone(),
        comparisons_enabled: state.engine.is_some(),
    })
}
