use crate::compare::engine::ComparisonEngine;
use crate::models::comparison::ComparisonResult;
use crate::models::listing::JobListing;
use crate::models::report::ReportRow;

/// One row per listing, in listing order. A listing with no matching result
/// gets a row marked as not computed.
pub fn build_report(
    listings: &[JobListing],
    comparisons: Vec<Option<ComparisonResult>>,
) -> Vec<ReportRow> {
    let mut comparisons = comparisons.into_iter();
    listings
        .iter()
        .map(|listing| ReportRow::new(listing, comparisons.next().flatten()))
        .collect()
}

/// Compare `resume_text` against each listing in turn. Without an engine
/// nothing is computed.
pub async fn run_comparisons(
    engine: Option<&ComparisonEngine>,
    listings: &[JobListing],
    resume_text: &str,
    min_description_len: usize,
) -> Vec<Option<ComparisonResult>> {
    let Some(engine) = engine else {
        return vec![None; listings.len()];
    };

    let mut results = Vec::with_capacity(listings.len());
    for (i, listing) in listings.iter().enumerate() {
        let description = listing.description.trim();
        if description.chars().count() < min_description_len {
            results.push(Some(too_short(min_description_len)));
            continue;
        }
        tracing::info!(
            "Comparing {}/{}: {} at {}",
            i + 1,
            listings.len(),
            listing.title,
            listing.company
        );
        let result = engine.run_comparison(resume_text, description).await;
        if let Some(error) = &result.error {
            tracing::warn!(url = %listing.url, "comparison failed: {error}");
        }
        results.push(Some(result));
    }
    results
}

fn too_short(min_description_len: usize) -> ComparisonResult {
    let mut result = ComparisonResult::failed(
        format!("Description length < {min_description_len} characters"),
        String::new(),
    );
    result.summary = "Job description too short to scan".to_string();
    result
}
