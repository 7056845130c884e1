use async_trait::async_trait;
use scraper::Html;

use crate::collectors::extract::LocatorChain;
use crate::collectors::http::{PageFetcher, absolute_url, same_site, search_url};
use crate::collectors::{JobCollector, enrich, fetch_text};
use crate::models::listing::{JobListing, Source};

const BASE_URL: &str = "https://www.linkedin.com";

const CARDS: LocatorChain = LocatorChain(&[".base-card", "[data-job-id]", ".job-search-card"]);
const LINK: LocatorChain = LocatorChain(&["a.base-card__full-link", "a[href*='/jobs/view/']"]);
const TITLE: LocatorChain = LocatorChain(&[".base-search-card__title", ".job-title"]);
const COMPANY: LocatorChain = LocatorChain(&[".base-search-card__subtitle", ".company-name"]);
const SNIPPET: LocatorChain = LocatorChain(&[".base-search-card__snippet", ".job-snippet"]);
const DESCRIPTION: LocatorChain = LocatorChain(&[
    ".show-more-less-html__markup",
    "section.jobs-description",
    ".jobs-description__content",
    ".jobs-box__html-content",
    "[class*='description__content']",
    "[class*='job-details']",
    "main",
]);

/// Public (logged-out) LinkedIn job search. LinkedIn limits automated access
/// heavily, so an empty page yields a pointer listing instead of nothing.
pub struct LinkedIn {
    fetcher: PageFetcher,
    base_url: String,
}

impl LinkedIn {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self::with_base_url(fetcher, BASE_URL)
    }

    pub fn with_base_url(fetcher: PageFetcher, base_url: impl Into<String>) -> Self {
        LinkedIn {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl JobCollector for LinkedIn {
    fn source(&self) -> Source {
        Source::LinkedIn
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<JobListing> {
        let params = [("keywords", query), ("position", "1"), ("pageNum", "0")];
        let url = search_url(&self.base_url, "/jobs/search", &params)
            .unwrap_or_else(|_| format!("{}/jobs/search", self.base_url));
        let html = match self.fetcher.get(&url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("LinkedIn search for '{query}' failed: {e}");
                return vec![JobListing::unavailable(
                    Source::LinkedIn,
                    &url,
                    e,
                    "LinkedIn often blocks or requires login.",
                )];
            }
        };

        let mut listings = parse_cards(&html, &self.base_url, max_results);
        if listings.is_empty() {
            return vec![JobListing {
                title: format!("LinkedIn jobs: {query}"),
                company: "(search manually for more details)".to_string(),
                description: "LinkedIn limits automated access. Open the URL to see jobs."
                    .to_string(),
                url,
                source: Source::LinkedIn,
            }];
        }
        enrich(self, &mut listings).await;
        listings
    }

    async fn fetch_description(&self, listing: &JobListing) -> String {
        if !same_site(&listing.url, &self.base_url) {
            return listing.description.clone();
        }
        fetch_text(&self.fetcher, &listing.url, DESCRIPTION)
            .await
            .unwrap_or_else(|| listing.description.clone())
    }
}

fn parse_cards(html: &str, base_url: &str, max_results: usize) -> Vec<JobListing> {
    let document = Html::parse_document(html);
    CARDS
        .select_all(&document)
        .into_iter()
        .take(max_results)
        .filter_map(|card| {
            let href = LINK.first_in(card)?.value().attr("href")?;
            let url = absolute_url(base_url, href)?;
            let url = url.split('?').next().unwrap_or_default().to_string();
            Some(JobListing {
                title: TITLE.text_in(card).unwrap_or_else(|| "Unknown Title".to_string()),
                company: COMPANY
                    .text_in(card)
                    .unwrap_or_else(|| "Unknown Company".to_string()),
                description: SNIPPET.text_in(card).unwrap_or_default(),
                url,
                source: Source::LinkedIn,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::collectors::http::FetchSettings;

    fn fetcher() -> PageFetcher {
        PageFetcher::new(&FetchSettings {
            timeout: Duration::from_secs(5),
            delay: Duration::ZERO,
        })
        .unwrap()
    }

    #[test]
    fn parses_secondary_card_layout_and_strips_tracking() {
        let html = r#"
            <ul>
              <li data-job-id="1">
                <a href="/jobs/view/111?refId=xyz&trk=abc">view</a>
                <h3 class="job-title">Platform Engineer</h3>
                <h4 class="company-name">Initech</h4>
              </li>
              <li data-job-id="2"><h3 class="job-title">No link here</h3></li>
            </ul>
        "#;
        let listings = parse_cards(html, "https://www.linkedin.com", 10);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].url, "https://www.linkedin.com/jobs/view/111");
        assert_eq!(listings[0].title, "Platform Engineer");
        assert_eq!(listings[0].company, "Initech");
    }

    #[tokio::test]
    async fn empty_results_yield_pointer_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .mount(&server)
            .await;

        let linkedin = LinkedIn::with_base_url(fetcher(), server.uri());
        let listings = linkedin.search("python developer", 5).await;

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title, "LinkedIn jobs: python developer");
        assert!(!listings[0].is_unavailable());
    }

    #[tokio::test]
    async fn search_enriches_from_detail_page() {
        let server = MockServer::start().await;
        let search_page = format!(
            r#"<div class="base-card">
                 <a class="base-card__full-link" href="{}/jobs/view/42?trk=x"></a>
                 <h3 class="base-search-card__title">Java Developer</h3>
                 <h4 class="base-search-card__subtitle">Globex</h4>
                 <p class="base-search-card__snippet">short</p>
               </div>"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/jobs/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(search_page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jobs/view/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="show-more-less-html__markup">About the job: ship Java services.</div>"#,
            ))
            .mount(&server)
            .await;

        let linkedin = LinkedIn::with_base_url(fetcher(), server.uri());
        let listings = linkedin.search("java developer", 5).await;

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].description, "About the job: ship Java services.");
    }
}
