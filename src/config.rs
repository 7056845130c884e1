use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, ValueEnum};

use crate::collectors::http::FetchSettings;
use crate::collectors::runner::CrawlSettings;
use crate::compare::engine::{CompareSettings, Credentials};
use crate::models::listing::Source;

const DEFAULT_CATEGORIES: &str = "software engineer,software developer,implementation engineer,\
forward deployed engineer,python developer,java developer,backend developer,\
senior software engineer,senior software developer,senior implementation engineer,\
senior python developer,senior java developer,senior backend developer";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "jobscan",
    about = "Crawl job boards and compare each posting against a resume"
)]
pub struct Config {
    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    #[command(flatten)]
    pub crawl: CrawlArgs,

    #[command(flatten)]
    pub compare: CompareArgs,

    /// Resume text used for every comparison
    #[arg(long, env = "JOBSCAN_RESUME_TEXT", hide_env_values = true)]
    pub resume_text: Option<String>,

    /// Read the resume text from a file instead
    #[arg(long, conflicts_with = "resume_text")]
    pub resume_file: Option<PathBuf>,

    /// SHA-256 hex digest of the bearer token required by /api/v1
    #[arg(long, env = "API_TOKEN_SHA256")]
    pub api_token_sha256: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Search categories, in sweep order
    #[arg(
        long,
        env = "JOB_CATEGORIES",
        value_delimiter = ',',
        default_value = DEFAULT_CATEGORIES
    )]
    pub categories: Vec<String>,

    /// Job boards to search, in priority order
    #[arg(
        long,
        env = "JOB_SOURCES",
        value_delimiter = ',',
        default_value = "indeed,linkedin,builtin,google"
    )]
    pub sources: Vec<Source>,

    /// Most listings one (source, category) pair may contribute
    #[arg(long, env = "MAX_JOBS_PER_CATEGORY_PER_SITE", default_value = "10")]
    pub max_per_category: usize,

    /// Most listings kept per run
    #[arg(long, env = "MAX_JOBS_TOTAL", default_value = "100")]
    pub max_total: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "15")]
    pub request_timeout: u64,

    /// Pause after every request, in seconds
    #[arg(long, env = "CRAWL_DELAY", default_value = "2.0")]
    pub crawl_delay: f64,

    /// Sources searched concurrently (1 = sequential)
    #[arg(long, env = "CRAWL_WORKERS", default_value = "1")]
    pub workers: usize,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    /// Entry page of the comparison site
    #[arg(long, env = "JOBSCAN_URL", default_value = "https://app.jobscan.co/dashboard")]
    pub jobscan_url: String,

    /// Login email for the comparison site
    #[arg(long, env = "JOBSCAN_EMAIL", requires = "jobscan_password")]
    pub jobscan_email: Option<String>,

    /// Login password for the comparison site
    #[arg(long, env = "JOBSCAN_PASSWORD", hide_env_values = true)]
    pub jobscan_password: Option<String>,

    /// Resume and job text are cut to this many characters
    #[arg(long, env = "MAX_TEXT_LEN", default_value = "15000")]
    pub max_text_len: usize,

    /// Result details are cut to this many characters
    #[arg(long, env = "MAX_DETAILS_LEN", default_value = "8000")]
    pub max_details_len: usize,

    /// Navigation timeout in seconds
    #[arg(long, env = "NAVIGATION_TIMEOUT", default_value = "30")]
    pub navigation_timeout: u64,

    /// How long to wait for the resume field, in seconds
    #[arg(long, env = "FIELD_WAIT", default_value = "5")]
    pub field_wait: u64,

    /// Wait for results after submitting, in seconds
    #[arg(long, env = "RESULTS_WAIT", default_value = "8")]
    pub results_wait: u64,

    /// Run the browser without a window
    #[arg(long, env = "HEADLESS", default_value = "true", action = clap::ArgAction::Set)]
    pub headless: bool,

    /// Chromium binary to launch
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Descriptions shorter than this are not compared
    #[arg(long, env = "MIN_DESCRIPTION_LEN", default_value = "50")]
    pub min_description_len: usize,

    /// Crawl only; report rows carry no comparison
    #[arg(long, env = "SKIP_COMPARISON")]
    pub skip_comparison: bool,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the web server (default when no subcommand given)
    Serve {
        /// Listen address
        #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        listen_addr: String,
    },
    /// Run one crawl and print the listings as JSON
    Crawl,
    /// Crawl, compare every listing and print the report as JSON
    Scan,
    /// Print a new API token and the digest to configure
    GenerateToken,
}

impl Config {
    /// Resolve the command, defaulting to Serve if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(self.crawl.request_timeout),
            delay: Duration::from_secs_f64(self.crawl.crawl_delay.max(0.0)),
        }
    }

    pub fn crawl_settings(&self) -> CrawlSettings {
        let fetch = self.fetch_settings();
        CrawlSettings {
            categories: self
                .crawl
                .categories
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            per_category_cap: self.crawl.max_per_category,
            global_cap: self.crawl.max_total,
            search_timeout: search_budget(&fetch, self.crawl.max_per_category),
            workers: self.crawl.workers.max(1),
        }
    }

    pub fn compare_settings(&self) -> CompareSettings {
        let c = &self.compare;
        let credentials = match (&c.jobscan_email, &c.jobscan_password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(Credentials {
                    email: email.clone(),
                    password: password.clone(),
                })
            }
            _ => None,
        };
        CompareSettings {
            entry_url: c.jobscan_url.clone(),
            credentials,
            max_text_len: c.max_text_len,
            max_details_len: c.max_details_len,
            navigation_timeout: Duration::from_secs(c.navigation_timeout),
            step_timeout: Duration::from_secs(c.navigation_timeout),
            field_wait: Duration::from_secs(c.field_wait),
            login_settle: Duration::from_secs(2),
            results_wait: Duration::from_secs(c.results_wait),
            headless: c.headless,
        }
    }

    /// Configured resume text, from the file when one is given.
    pub fn resume(&self) -> anyhow::Result<Option<String>> {
        let text = match &self.resume_file {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read resume file {}", path.display()))?,
            ),
            None => self.resume_text.clone(),
        };
        Ok(text.filter(|t| !t.trim().is_empty()))
    }
}

/// Time allowed for one collector search: the search page plus a
/// description fetch per listing, with slack. Saturates instead of
/// overflowing for absurd caps.
fn search_budget(fetch: &FetchSettings, per_category_cap: usize) -> Duration {
    let requests = u32::try_from(per_category_cap)
        .unwrap_or(u32::MAX)
        .saturating_add(2);
    fetch
        .timeout
        .saturating_add(fetch.delay)
        .checked_mul(requests)
        .unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("jobscan").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_production_limits() {
        let config = parse(&[]);
        let crawl = config.crawl_settings();
        assert_eq!(crawl.categories.len(), 13);
        assert_eq!(crawl.categories[0], "software engineer");
        assert_eq!(crawl.per_category_cap, 10);
        assert_eq!(crawl.global_cap, 100);
        assert_eq!(crawl.workers, 1);
        assert_eq!(config.crawl.sources, Source::ALL.to_vec());

        let fetch = config.fetch_settings();
        assert_eq!(fetch.timeout, Duration::from_secs(15));
        assert_eq!(fetch.delay, Duration::from_secs(2));

        let compare = config.compare_settings();
        assert_eq!(compare.max_text_len, 15_000);
        assert_eq!(compare.max_details_len, 8_000);
        assert!(compare.headless);
        assert!(compare.credentials.is_none());
    }

    #[test]
    fn sources_parse_case_insensitively_in_order() {
        let config = parse(&["--sources", "Google,INDEED"]);
        assert_eq!(config.crawl.sources, vec![Source::Google, Source::Indeed]);
        assert!(Config::try_parse_from(["jobscan", "--sources", "monster"]).is_err());
    }

    #[test]
    fn credentials_need_both_halves() {
        let config = parse(&["--jobscan-email", "me@example.com", "--jobscan-password", "pw"]);
        assert!(config.compare_settings().credentials.is_some());
        assert!(Config::try_parse_from(["jobscan", "--jobscan-email", "me@example.com"]).is_err());
    }

    #[test]
    fn headless_can_be_disabled() {
        let config = parse(&["--headless", "false"]);
        assert!(!config.compare_settings().headless);
    }

    #[test]
    fn blank_resume_counts_as_missing() {
        let config = parse(&["--resume-text", "   "]);
        assert_eq!(config.resume().unwrap(), None);
    }

    #[test]
    fn search_budget_scales_and_saturates() {
        let fetch = FetchSettings {
            timeout: Duration::from_secs(15),
            delay: Duration::from_secs(2),
        };
        assert_eq!(search_budget(&fetch, 10), Duration::from_secs(17 * 12));
        assert_eq!(search_budget(&fetch, usize::MAX), Duration::MAX);

        let config = parse(&["--max-per-category", "18446744073709551615"]);
        assert_eq!(config.crawl_settings().search_timeout, Duration::MAX);
    }

    #[test]
    fn subcommands() {
        assert!(matches!(parse(&["crawl"]).resolved_command(), Command::Crawl));
        assert!(matches!(
            parse(&["serve", "--listen-addr", "127.0.0.1:9000"]).resolved_command(),
            Command::Serve { listen_addr } if listen_addr == "127.0.0.1:9000"
        ));
    }
}
