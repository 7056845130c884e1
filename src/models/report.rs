use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::comparison::ComparisonResult;
use crate::models::listing::{JobListing, Source};

/// One line of the final report: a listing's display fields and its comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub job_title: String,
    pub company: String,
    pub source: Source,
    /// `None` when no comparison was computed for this listing.
    pub comparison: Option<ComparisonResult>,
    pub job_url: String,
}

impl ReportRow {
    pub fn new(listing: &JobListing, comparison: Option<ComparisonResult>) -> Self {
        ReportRow {
            job_title: listing.title.clone(),
            company: listing.company.clone(),
            source: listing.source,
            comparison,
            job_url: listing.url.clone(),
        }
    }
}

/// Listings retained by one crawl run, in first-seen order.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutput {
    pub run_id: Uuid,
    pub listings: Vec<JobListing>,
}

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub const NO_RESULTS_MESSAGE: &str =
    "No jobs found (sites may block automated requests). Try again later.";
