use async_trait::async_trait;
use scraper::Html;

use crate::collectors::extract::LocatorChain;
use crate::collectors::http::{PageFetcher, search_url};
use crate::collectors::{JobCollector, enrich, fetch_text};
use crate::models::listing::{JobListing, Source};

const BASE_URL: &str = "https://www.indeed.com";

const CARDS: LocatorChain = LocatorChain(&["[data-jk]"]);
const TITLE: LocatorChain = LocatorChain(&["[data-testid=\"jobTitle\"]", ".jobTitle"]);
const COMPANY: LocatorChain = LocatorChain(&["[data-testid=\"companyName\"]", ".companyName"]);
const SNIPPET: LocatorChain = LocatorChain(&[".job-snippet", ".jobSummary"]);
const DESCRIPTION: LocatorChain = LocatorChain(&[
    "#jobDescriptionText",
    "[data-testid=\"job-description\"]",
    ".jobsearch-JobComponent-description",
]);

pub struct Indeed {
    fetcher: PageFetcher,
    base_url: String,
}

impl Indeed {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self::with_base_url(fetcher, BASE_URL)
    }

    pub fn with_base_url(fetcher: PageFetcher, base_url: impl Into<String>) -> Self {
        Indeed {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl JobCollector for Indeed {
    fn source(&self) -> Source {
        Source::Indeed
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<JobListing> {
        let params = [("q", query), ("l", ""), ("start", "0")];
        let url = search_url(&self.base_url, "/jobs", &params)
            .unwrap_or_else(|_| format!("{}/jobs", self.base_url));
        let html = match self.fetcher.get(&url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Indeed search for '{query}' failed: {e}");
                return vec![JobListing::unavailable(
                    Source::Indeed,
                    &url,
                    e,
                    "Indeed may block automated requests.",
                )];
            }
        };

        let mut listings = parse_cards(&html, &self.base_url, max_results);
        enrich(self, &mut listings).await;
        listings
    }

    async fn fetch_description(&self, listing: &JobListing) -> String {
        if listing.url.is_empty() || !listing.url.contains("viewjob") {
            return listing.description.clone();
        }
        fetch_text(&self.fetcher, &listing.url, DESCRIPTION)
            .await
            .unwrap_or_else(|| listing.description.clone())
    }
}

/// Listings from a search results page, at most `max_results` of them.
/// Cards without a job key are skipped.
fn parse_cards(html: &str, base_url: &str, max_results: usize) -> Vec<JobListing> {
    let document = Html::parse_document(html);
    CARDS
        .select_all(&document)
        .into_iter()
        .take(max_results)
        .filter_map(|card| {
            let jk = card.value().attr("data-jk").map(str::trim).filter(|jk| !jk.is_empty())?;
            Some(JobListing {
                title: TITLE.text_in(card).unwrap_or_else(|| "Unknown Title".to_string()),
                company: COMPANY
                    .text_in(card)
                    .unwrap_or_else(|| "Unknown Company".to_string()),
                description: SNIPPET.text_in(card).unwrap_or_default(),
                url: format!("{base_url}/viewjob?jk={jk}"),
                source: Source::Indeed,
            })
        })
        .collect()
}
