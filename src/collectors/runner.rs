use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tracing::Instrument;
use uuid::Uuid;

use crate::collectors::JobCollector;
use crate::models::listing::{DedupeKey, JobListing};
use crate::models::report::CrawlOutput;

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Search categories, swept in this order for every collector.
    pub categories: Vec<String>,
    /// Most listings one (source, category) pair may contribute.
    pub per_category_cap: usize,
    /// Most listings retained across the whole run.
    pub global_cap: usize,
    /// Upper bound for one collector search, description fetches included.
    pub search_timeout: Duration,
    /// Sources searched concurrently. 1 means strictly sequential.
    pub workers: usize,
}

/// Mutable state of one crawl run. Created fresh per run and never shared
/// with collectors.
struct CrawlRun {
    seen: HashSet<DedupeKey>,
    listings: Vec<JobListing>,
    global_cap: usize,
}

impl CrawlRun {
    fn new(global_cap: usize) -> Self {
        CrawlRun {
            seen: HashSet::new(),
            listings: Vec::new(),
            global_cap,
        }
    }

    fn is_full(&self) -> bool {
        self.listings.len() >= self.global_cap
    }

    /// Fold one search batch into the run. Returns false once the global cap
    /// is reached; the rest of the batch is then left unprocessed.
    fn ingest(&mut self, batch: Vec<JobListing>, per_category_cap: usize) -> bool {
        let mut contributed = 0;
        for listing in batch {
            if self.is_full() {
                return false;
            }
            if contributed >= per_category_cap {
                break;
            }
            let key = listing.dedupe_key();
            if self.seen.contains(&key) || listing.is_unavailable() {
                continue;
            }
            self.seen.insert(key);
            self.listings.push(listing);
            contributed += 1;
        }
        !self.is_full()
    }
}

/// Sweep every collector across every category, deduplicating and capping
/// as listings arrive.
///
/// Sources and categories are processed in their configured order, which
/// decides which duplicate survives and which listings fill the global cap.
/// A collector that panics or runs past its time budget only loses its own
/// (source, category) pair.
pub async fn crawl(collectors: &[Arc<dyn JobCollector>], settings: &CrawlSettings) -> CrawlOutput {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("crawl", %run_id);

    let listings = async {
        tracing::info!(
            "Crawling {} sources x {} categories (per-category cap {}, total cap {})",
            collectors.len(),
            settings.categories.len(),
            settings.per_category_cap,
            settings.global_cap
        );
        let listings = if settings.workers <= 1 {
            crawl_sequential(collectors, settings).await
        } else {
            crawl_concurrent(collectors, settings).await
        };
        tracing::info!("Crawl finished with {} listings", listings.len());
        listings
    }
    .instrument(span)
    .await;

    CrawlOutput { run_id, listings }
}

async fn crawl_sequential(
    collectors: &[Arc<dyn JobCollector>],
    settings: &CrawlSettings,
) -> Vec<JobListing> {
    let mut run = CrawlRun::new(settings.global_cap);
    if run.is_full() {
        return run.listings;
    }

    'sources: for collector in collectors {
        for category in &settings.categories {
            let Some(batch) = search_isolated(collector.as_ref(), category, settings).await else {
                continue;
            };
            if !run.ingest(batch, settings.per_category_cap) {
                tracing::info!("Global cap of {} reached", settings.global_cap);
                break 'sources;
            }
        }
    }
    run.listings
}

/// Sources are swept concurrently, but every batch is collected before any
/// is ingested, and ingestion follows the configured order. The outcome is
/// identical to the sequential sweep.
async fn crawl_concurrent(
    collectors: &[Arc<dyn JobCollector>],
    settings: &CrawlSettings,
) -> Vec<JobListing> {
    let mut run = CrawlRun::new(settings.global_cap);
    if run.is_full() {
        return run.listings;
    }

    let shared = Arc::new(settings.clone());
    let sweeps: Vec<BoxFuture<'static, Vec<Option<Vec<JobListing>>>>> = collectors
        .iter()
        .map(|collector| {
            let collector = Arc::clone(collector);
            let settings = Arc::clone(&shared);
            async move {
                let mut batches = Vec::with_capacity(settings.categories.len());
                for category in &settings.categories {
                    batches.push(search_isolated(collector.as_ref(), category, &settings).await);
                }
                batches
            }
            .boxed()
        })
        .collect();

    let sweeps: Vec<_> = futures::stream::iter(sweeps)
        .buffered(settings.workers)
        .collect()
        .await;

    for batch in sweeps.into_iter().flatten().flatten() {
        if !run.ingest(batch, settings.per_category_cap) {
            tracing::info!("Global cap of {} reached", settings.global_cap);
            break;
        }
    }
    run.listings
}

/// Run one collector search, converting panics and overruns into `None`.
async fn search_isolated(
    collector: &dyn JobCollector,
    category: &str,
    settings: &CrawlSettings,
) -> Option<Vec<JobListing>> {
    let source = collector.source();
    let search = AssertUnwindSafe(collector.search(category, settings.per_category_cap));

    match tokio::time::timeout(settings.search_timeout, search.catch_unwind()).await {
        Ok(Ok(batch)) => {
            tracing::debug!(%source, category, "search returned {} listings", batch.len());
            Some(batch)
        }
        Ok(Err(_)) => {
            tracing::error!(%source, category, "search panicked; skipping");
            None
        }
        Err(_) => {
            tracing::warn!(
                %source,
                category,
                "search exceeded {:?}; skipping",
                settings.search_timeout
            );
            None
        }
    }
}
