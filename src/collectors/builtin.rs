use std::collections::HashSet;

use async_trait::async_trait;
use scraper::Html;

use crate::collectors::extract::LocatorChain;
use crate::collectors::http::{PageFetcher, absolute_url, search_url};
use crate::collectors::{JobCollector, enrich, fetch_text};
use crate::models::listing::{JobListing, Source};

const BASE_URL: &str = "https://builtin.com";

const CARDS: LocatorChain =
    LocatorChain(&[".job-row", "article.job", "[class*='job']", "a[href*='/job/']"]);
const LINK: LocatorChain = LocatorChain(&["a[href*='/job/']", "a[href*='/jobs/']"]);
const TITLE: LocatorChain = LocatorChain(&["h2", ".job-title", ".title", "[class*='title']"]);
const COMPANY: LocatorChain = LocatorChain(&[".company-name", ".company", "[class*='company']"]);
const SNIPPET: LocatorChain = LocatorChain(&[".description", ".snippet", "[class*='description']"]);
const DESCRIPTION: LocatorChain =
    LocatorChain(&[".job-description", "[class*='description']", "main article"]);

pub struct BuiltIn {
    fetcher: PageFetcher,
    base_url: String,
}

impl BuiltIn {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self::with_base_url(fetcher, BASE_URL)
    }

    pub fn with_base_url(fetcher: PageFetcher, base_url: impl Into<String>) -> Self {
        BuiltIn {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl JobCollector for BuiltIn {
    fn source(&self) -> Source {
        Source::BuiltIn
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<JobListing> {
        let jobs_url = format!("{}/jobs", self.base_url);
        let url = search_url(&self.base_url, "/jobs", &[("search", query)])
            .unwrap_or_else(|_| jobs_url.clone());
        let html = match self.fetcher.get(&url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("BuiltIn search for '{query}' failed: {e}");
                return vec![JobListing::unavailable(Source::BuiltIn, &jobs_url, e, "")];
            }
        };

        let mut listings = parse_cards(&html, &self.base_url, max_results);
        if listings.is_empty() {
            return vec![JobListing {
                title: format!("BuiltIn: {query}"),
                company: String::new(),
                description: "No results or page structure changed. Visit builtin.com/jobs."
                    .to_string(),
                url: jobs_url,
                source: Source::BuiltIn,
            }];
        }
        enrich(self, &mut listings).await;
        listings
    }

    async fn fetch_description(&self, listing: &JobListing) -> String {
        if listing.url.is_empty() {
            return listing.description.clone();
        }
        fetch_text(&self.fetcher, &listing.url, DESCRIPTION)
            .await
            .unwrap_or_else(|| listing.description.clone())
    }
}

/// Card selectors here are loose, so up to twice `max_results` cards are
/// scanned to make up for ones without a job link or repeating one.
fn parse_cards(html: &str, base_url: &str, max_results: usize) -> Vec<JobListing> {
    let document = Html::parse_document(html);
    let base = format!("{base_url}/");
    let mut seen_links = HashSet::new();
    let mut listings = Vec::new();

    for card in CARDS
        .select_all(&document)
        .into_iter()
        .take(max_results.saturating_mul(2))
    {
        if listings.len() >= max_results {
            break;
        }
        let link = if card.value().name() == "a" {
            Some(card)
        } else {
            LINK.first_in(card)
        };
        let Some(href) = link.and_then(|a| a.value().attr("href")) else {
            continue;
        };
        if !seen_links.insert(href.to_string()) {
            continue;
        }
        let Some(url) = absolute_url(&base, href) else {
            continue;
        };
        listings.push(JobListing {
            title: TITLE.text_in(card).unwrap_or_else(|| "Job".to_string()),
            company: COMPANY.text_in(card).unwrap_or_else(|| "Company".to_string()),
            description: SNIPPET.text_in(card).unwrap_or_default(),
            url,
            source: Source::BuiltIn,
        });
    }
    listings
}
