use async_trait::async_trait;
use scraper::Html;

use crate::collectors::JobCollector;
use crate::collectors::extract::LocatorChain;
use crate::collectors::http::{PageFetcher, search_url};
use crate::models::listing::{JobListing, Source};

const BASE_URL: &str = "https://www.google.com";

/// Extra result blocks scanned beyond `max_results`, for skipped links.
const SCAN_SLACK: usize = 5;

const RESULTS: LocatorChain = LocatorChain(&[".g"]);
const LINK: LocatorChain = LocatorChain(&["a[href^='http']"]);
const TITLE: LocatorChain = LocatorChain(&["h3"]);
const SNIPPET: LocatorChain = LocatorChain(&[".VwiC3b", ".s"]);

/// Plain web search used as a rough job signal. Only snippets are
/// available, so descriptions are never fetched.
pub struct Google {
    fetcher: PageFetcher,
    base_url: String,
}

impl Google {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self::with_base_url(fetcher, BASE_URL)
    }

    pub fn with_base_url(fetcher: PageFetcher, base_url: impl Into<String>) -> Self {
        Google {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl JobCollector for Google {
    fn source(&self) -> Source {
        Source::Google
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<JobListing> {
        let terms = format!("{query} jobs");
        let url = search_url(&self.base_url, "/search", &[("q", terms.as_str())])
            .unwrap_or_else(|_| format!("{}/search", self.base_url));
        let html = match self.fetcher.get(&url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Google search for '{query}' failed: {e}");
                return vec![JobListing::unavailable(Source::Google, &url, e, "")];
            }
        };

        let listings = parse_results(&html, max_results);
        if listings.is_empty() {
            return vec![JobListing {
                title: format!("Google: {terms}"),
                company: String::new(),
                description: "Run a Google search for job listings. \
                              Google often requires JavaScript for the Jobs carousel."
                    .to_string(),
                url,
                source: Source::Google,
            }];
        }
        listings
    }

    async fn fetch_description(&self, listing: &JobListing) -> String {
        listing.description.clone()
    }
}

fn parse_results(html: &str, max_results: usize) -> Vec<JobListing> {
    let document = Html::parse_document(html);
    let mut listings = Vec::new();

    for block in RESULTS
        .select_all(&document)
        .into_iter()
        .take(max_results + SCAN_SLACK)
    {
        if listings.len() >= max_results {
            break;
        }
        let Some(href) = LINK.first_in(block).and_then(|a| a.value().attr("href")) else {
            continue;
        };
        if ["google.com", "webcache", "/search"]
            .iter()
            .any(|marker| href.contains(marker))
        {
            continue;
        }

        let heading = TITLE.text_in(block).unwrap_or_else(|| "Job".to_string());
        let (title, company) = split_heading(&heading);
        listings.push(JobListing {
            title,
            company: company.unwrap_or_else(|| "Various".to_string()),
            description: SNIPPET.text_in(block).unwrap_or_default(),
            url: href.to_string(),
            source: Source::Google,
        });
    }
    listings
}

/// "Rust Engineer - Acme" -> ("Rust Engineer", Some("Acme")).
fn split_heading(heading: &str) -> (String, Option<String>) {
    match heading.split_once(" - ") {
        Some((title, company)) => {
            let company = company.trim();
            (
                title.trim().to_string(),
                (!company.is_empty()).then(|| company.to_string()),
            )
        }
        None => (heading.to_string(), None),
    }
}
