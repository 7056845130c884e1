use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::aggregate::{build_report, run_comparisons};
use crate::collectors::runner::{CrawlSettings, crawl};
use crate::collectors::{JobCollector, build_collectors};
use crate::compare::chromium::ChromiumLauncher;
use crate::compare::engine::ComparisonEngine;
use crate::config::Config;
use crate::models::listing::Source;
use crate::models::report::{CrawlOutput, NO_RESULTS_MESSAGE, ScanReport};

/// Everything a run needs, built once from the configuration.
pub struct AppState {
    pub sources: Vec<Source>,
    pub collectors: Vec<Arc<dyn JobCollector>>,
    pub crawl_settings: CrawlSettings,
    /// `None` when comparisons are switched off.
    pub engine: Option<ComparisonEngine>,
    pub min_description_len: usize,
    pub resume_text: Option<String>,
    /// Required bearer token digest for /api/v1, if any.
    pub api_token_hash: Option<String>,
    /// Held for the length of a run so the API never drives two at once.
    run_lock: Mutex<()>,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let collectors = build_collectors(&config.crawl.sources, &config.fetch_settings())?;
        let engine = (!config.compare.skip_comparison).then(|| {
            let launcher = ChromiumLauncher::new(config.compare.chrome_path.clone());
            ComparisonEngine::new(Arc::new(launcher), config.compare_settings())
        });
        let mut state = AppState::new(collectors, config.crawl_settings(), engine);
        state.min_description_len = config.compare.min_description_len;
        state.resume_text = config.resume()?;
        state.api_token_hash = config
            .api_token_sha256
            .as_ref()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty());
        Ok(state)
    }

    pub fn new(
        collectors: Vec<Arc<dyn JobCollector>>,
        crawl_settings: CrawlSettings,
        engine: Option<ComparisonEngine>,
    ) -> Self {
        AppState {
            sources: collectors.iter().map(|c| c.source()).collect(),
            collectors,
            crawl_settings,
            engine,
            min_description_len: 50,
            resume_text: None,
            api_token_hash: None,
            run_lock: Mutex::new(()),
        }
    }

    pub async fn crawl(&self) -> CrawlOutput {
        let _guard = self.run_lock.lock().await;
        crawl(&self.collectors, &self.crawl_settings).await
    }

    /// Crawl, then compare `resume_text` (or the configured resume) against
    /// every listing.
    pub async fn scan(&self, resume_text: Option<&str>) -> ScanReport {
        let _guard = self.run_lock.lock().await;
        let resume = resume_text
            .filter(|r| !r.trim().is_empty())
            .or(self.resume_text.as_deref())
            .unwrap_or_default();

        let output = crawl(&self.collectors, &self.crawl_settings).await;
        if output.listings.is_empty() {
            tracing::warn!(run_id = %output.run_id, "crawl returned no listings");
            return ScanReport {
                run_id: output.run_id,
                generated_at: Utc::now(),
                rows: Vec::new(),
                message: Some(NO_RESULTS_MESSAGE.to_string()),
            };
        }

        let comparisons = run_comparisons(
            self.engine.as_ref(),
            &output.listings,
            resume,
            self.min_description_len,
        )
        .await;
        ScanReport {
            run_id: output.run_id,
            generated_at: Utc::now(),
            rows: build_report(&output.listings, comparisons),
            message: None,
        }
    }

    /// Whether a scan can run: comparisons need a resume from somewhere.
    pub fn has_resume(&self, override_text: Option<&str>) -> bool {
        self.engine.is_none()
            || override_text.is_some_and(|r| !r.trim().is_empty())
            || self.resume_text.is_some()
    }
}
