// Collectors: one per job board, plus the runner that sweeps them.

pub mod builtin;
pub mod extract;
pub mod google;
pub mod http;
pub mod indeed;
pub mod linkedin;
pub mod runner;

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;

use crate::collectors::extract::LocatorChain;
use crate::collectors::http::{FetchSettings, PageFetcher};
use crate::error::FetchError;
use crate::models::listing::{JobListing, Source};

/// Trait that all job collectors must implement.
///
/// Neither method may fail from the caller's point of view: a search that
/// cannot reach its source returns a single "unavailable" listing, and a
/// description fetch that fails returns the description already known.
#[async_trait]
pub trait JobCollector: Send + Sync {
    fn source(&self) -> Source;

    /// Search the source for `query`, returning at most `max_results`
    /// listings in the order the source shows them.
    async fn search(&self, query: &str, max_results: usize) -> Vec<JobListing>;

    /// Best-effort full description for `listing`.
    async fn fetch_description(&self, listing: &JobListing) -> String;
}

pub fn get_collector(source: Source, fetcher: PageFetcher) -> Arc<dyn JobCollector> {
    match source {
        Source::Indeed => Arc::new(indeed::Indeed::new(fetcher)),
        Source::LinkedIn => Arc::new(linkedin::LinkedIn::new(fetcher)),
        Source::BuiltIn => Arc::new(builtin::BuiltIn::new(fetcher)),
        Source::Google => Arc::new(google::Google::new(fetcher)),
    }
}

/// Collectors for `sources`, in the given order, sharing one fetcher.
pub fn build_collectors(
    sources: &[Source],
    settings: &FetchSettings,
) -> Result<Vec<Arc<dyn JobCollector>>, FetchError> {
    let fetcher = PageFetcher::new(settings)?;
    Ok(sources
        .iter()
        .map(|source| get_collector(*source, fetcher.clone()))
        .collect())
}

/// Fetch `url` and pull the description text out with `chain`.
/// `None` on any failure or when nothing matched.
pub(crate) async fn fetch_text(
    fetcher: &PageFetcher,
    url: &str,
    chain: LocatorChain,
) -> Option<String> {
    let html = match fetcher.get(url).await {
        Ok(html) => html,
        Err(e) => {
            tracing::debug!("description fetch for {url} failed: {e}");
            return None;
        }
    };
    let document = Html::parse_document(&html);
    chain.text_in_document(&document)
}

/// Replace each listing's description with the fetched one when available.
pub(crate) async fn enrich(collector: &dyn JobCollector, listings: &mut [JobListing]) {
    for listing in listings.iter_mut() {
        let full = collector.fetch_description(listing).await;
        if !full.trim().is_empty() {
            listing.description = full;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Collector serving canned listings per query. Panics on queries listed
    /// in `panics_on` and never answers queries listed in `hangs_on`.
    pub struct StaticCollector {
        pub source: Source,
        pub results: HashMap<String, Vec<JobListing>>,
        pub panics_on: Vec<String>,
        pub hangs_on: Vec<String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl StaticCollector {
        pub fn new(source: Source) -> Self {
            StaticCollector {
                source,
                results: HashMap::new(),
                panics_on: Vec::new(),
                hangs_on: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with(mut self, query: &str, titles: &[(&str, &str)]) -> Self {
            let listings = titles
                .iter()
                .map(|(title, company)| listing(self.source, title, company))
                .collect();
            self.results.insert(query.to_string(), listings);
            self
        }

        pub fn panicking_on(mut self, query: &str) -> Self {
            self.panics_on.push(query.to_string());
            self
        }

        pub fn hanging_on(mut self, query: &str) -> Self {
            self.hangs_on.push(query.to_string());
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    pub fn listing(source: Source, title: &str, company: &str) -> JobListing {
        JobListing {
            title: title.to_string(),
            company: company.to_string(),
            description: format!("{title} at {company}"),
            url: format!("https://example.com/{}", title.replace(' ', "-")),
            source,
        }
    }

    #[async_trait]
    impl JobCollector for StaticCollector {
        fn source(&self) -> Source {
            self.source
        }

        async fn search(&self, query: &str, _max_results: usize) -> Vec<JobListing> {
            self.calls.lock().unwrap().push(query.to_string());
            if self.panics_on.iter().any(|q| q == query) {
                panic!("collector blew up on {query}");
            }
            if self.hangs_on.iter().any(|q| q == query) {
                std::future::pending::<()>().await;
            }
            self.results.get(query).cloned().unwrap_or_default()
        }

        async fn fetch_description(&self, listing: &JobListing) -> String {
            listing.description.clone()
        }
    }
}
