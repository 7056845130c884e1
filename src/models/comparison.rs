use serde::{Deserialize, Serialize};

/// Outcome of one resume/job comparison.
///
/// `error` is set exactly when `success` is false, and `match_score` is
/// always within 0..=100 when present. Use the constructors to keep that so.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub match_score: Option<u8>,
    pub summary: String,
    pub details: String,
    /// Rendered page markup, kept for diagnostics only.
    #[serde(default, skip_serializing)]
    pub raw_content: String,
    pub success: bool,
    pub error: Option<String>,
}

impl ComparisonResult {
    pub fn completed(match_score: Option<u8>, details: String, raw_content: String) -> Self {
        let match_score = match_score.filter(|score| *score <= 100);
        let summary = match match_score {
            Some(score) => format!("Match score: {score}%"),
            None => "Scan completed; match score could not be extracted automatically.".to_string(),
        };
        ComparisonResult {
            match_score,
            summary,
            details,
            raw_content,
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, raw_content: String) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "comparison failed for an unknown reason".to_string();
        }
        ComparisonResult {
            match_score: None,
            summary: String::new(),
            details: String::new(),
            raw_content,
            success: false,
            error: Some(error),
        }
    }
}
