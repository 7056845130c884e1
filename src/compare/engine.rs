use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{Instant, sleep, timeout};

use crate::compare::score::{looks_like_comparison, percentage_in, score_in_markup, truncate_chars};
use crate::compare::{BrowserLauncher, BrowserSession, Locator};
use crate::error::CompareError;
use crate::models::comparison::ComparisonResult;

const RESUME_FIELD: &[Locator] = &[
    Locator::Css(r#"textarea[placeholder*="resume"]"#),
    Locator::Css(r#"textarea[placeholder*="Resume"]"#),
    Locator::Css(r#"textarea[name*="resume"]"#),
    Locator::Css("#resume-input"),
    Locator::Css("[data-testid='resume-input']"),
    // last resort: the first textarea on the page
    Locator::Nth { tag: "textarea", index: 0 },
];

const JOB_FIELD: &[Locator] = &[
    Locator::Css(r#"textarea[placeholder*="job"]"#),
    Locator::Css(r#"textarea[placeholder*="Job"]"#),
    Locator::Css(r#"textarea[name*="description"]"#),
    Locator::Css("#job-description"),
    Locator::Css("[data-testid='job-description']"),
    // last resort: the second textarea on the page
    Locator::Nth { tag: "textarea", index: 1 },
];

const SUBMIT: &[Locator] = &[
    Locator::Text { tag: "button", text: "Scan" },
    Locator::Text { tag: "button", text: "Compare" },
    Locator::Text { tag: "button", text: "Analyze" },
    Locator::Css("[type='submit']"),
    Locator::Css("button[type='submit']"),
    Locator::Text { tag: "a", text: "Scan" },
    Locator::Css(".scan-button"),
];

const SIGN_IN: &[Locator] = &[
    Locator::Text { tag: "a", text: "Sign in" },
    Locator::Text { tag: "a", text: "Log in" },
    Locator::Text { tag: "button", text: "Sign in" },
    Locator::Text { tag: "button", text: "Log in" },
];

const EMAIL_FIELD: &[Locator] = &[
    Locator::Css(r#"input[type="email"]"#),
    Locator::Css(r#"input[name*="email"]"#),
    Locator::Css(r#"input[placeholder*="email"]"#),
];

const PASSWORD_FIELD: &[Locator] = &[
    Locator::Css(r#"input[type="password"]"#),
    Locator::Css(r#"input[name*="password"]"#),
];

const LOGIN_SUBMIT: &[Locator] = &[
    Locator::Css(r#"button[type="submit"]"#),
    Locator::Css(r#"input[type="submit"]"#),
    Locator::Text { tag: "button", text: "Sign in" },
    Locator::Text { tag: "button", text: "Log in" },
];

const SCORE_REGION: &[Locator] = &[
    Locator::Css("[class*='score']"),
    Locator::Css("[class*='match']"),
    Locator::Css(".percentage"),
    Locator::Css("[data-testid*='score']"),
];

const RESULT_REGION: &[Locator] = &[
    Locator::Css("[class*='result']"),
    Locator::Css("[class*='report']"),
    Locator::Css("main"),
    Locator::Css(".content"),
];

const FIELD_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CompareSettings {
    pub entry_url: String,
    pub credentials: Option<Credentials>,
    /// Resume and job description are each cut to this many characters.
    pub max_text_len: usize,
    pub max_details_len: usize,
    pub navigation_timeout: Duration,
    /// Bound for every single browser call other than navigation.
    pub step_timeout: Duration,
    /// How long to keep looking for the resume field while the page renders.
    pub field_wait: Duration,
    /// Pause after login clicks for the page to react.
    pub login_settle: Duration,
    /// Fixed wait for results to render after submitting.
    pub results_wait: Duration,
    pub headless: bool,
}

/// States of one comparison. Transitions only move forward, and any state
/// may end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    NavigateEntry,
    OptionalLogin,
    LocateResumeField,
    LocateJobField,
    SubmitCompare,
    WaitForResults,
    ExtractScore,
    ExtractDetails,
    Done,
    Failed,
}

/// Drives the external comparison site. Each call gets its own browser, and
/// nothing that goes wrong inside escapes as anything but a failed result.
pub struct ComparisonEngine {
    launcher: Arc<dyn BrowserLauncher>,
    settings: CompareSettings,
}

impl ComparisonEngine {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, settings: CompareSettings) -> Self {
        ComparisonEngine { launcher, settings }
    }

    pub async fn run_comparison(&self, resume_text: &str, job_description: &str) -> ComparisonResult {
        let run = AssertUnwindSafe(self.run_session(resume_text, job_description));
        match run.catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("comparison panicked: {reason}");
                ComparisonResult::failed(CompareError::Panicked(reason).to_string(), String::new())
            }
        }
    }

    async fn run_session(&self, resume_text: &str, job_description: &str) -> ComparisonResult {
        let launched = timeout(
            self.settings.navigation_timeout,
            self.launcher.launch(self.settings.headless),
        )
        .await;
        let session = match launched {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                tracing::warn!("browser launch failed: {e:#}");
                return failed(CompareError::Launch(format!("{e:#}")), String::new());
            }
            Err(_) => {
                return failed(CompareError::Launch("browser launch timed out".into()), String::new());
            }
        };

        let mut scan = Scan {
            session,
            settings: &self.settings,
            resume_text: truncate_chars(resume_text, self.settings.max_text_len),
            job_description: truncate_chars(job_description, self.settings.max_text_len),
            raw_content: String::new(),
            match_score: None,
            details: String::new(),
        };
        let result = scan.drive().await;

        if let Err(e) = timeout(self.settings.step_timeout, scan.session.close()).await {
            tracing::debug!("browser close timed out: {e}");
        }
        result
    }
}

fn failed(error: CompareError, raw_content: String) -> ComparisonResult {
    ComparisonResult::failed(error.to_string(), raw_content)
}

/// Working state of one comparison.
struct Scan<'a> {
    session: Box<dyn BrowserSession>,
    settings: &'a CompareSettings,
    resume_text: String,
    job_description: String,
    raw_content: String,
    match_score: Option<u8>,
    details: String,
}

impl Scan<'_> {
    async fn drive(&mut self) -> ComparisonResult {
        let mut state = ScanState::NavigateEntry;
        loop {
            tracing::debug!(?state, "comparison step");
            match self.step(state).await {
                Ok(ScanState::Done) => {
                    return ComparisonResult::completed(
                        self.match_score,
                        std::mem::take(&mut self.details),
                        std::mem::take(&mut self.raw_content),
                    );
                }
                Ok(next) => state = next,
                Err(e) => {
                    tracing::warn!(?state, next = ?ScanState::Failed, "comparison failed: {e}");
                    if self.raw_content.is_empty() {
                        self.raw_content = self.page_content().await;
                    }
                    return failed(e, std::mem::take(&mut self.raw_content));
                }
            }
        }
    }

    async fn step(&mut self, state: ScanState) -> Result<ScanState, CompareError> {
        match state {
            ScanState::NavigateEntry => {
                self.open_entry().await?;
                Ok(if self.settings.credentials.is_some() {
                    ScanState::OptionalLogin
                } else {
                    ScanState::LocateResumeField
                })
            }
            ScanState::OptionalLogin => {
                if let Err(e) = self.login().await {
                    tracing::info!("continuing anonymously: {e}");
                }
                Ok(ScanState::LocateResumeField)
            }
            ScanState::LocateResumeField => {
                let text = self.resume_text.clone();
                if self.fill_first(RESUME_FIELD, &text, self.settings.field_wait).await {
                    Ok(ScanState::LocateJobField)
                } else {
                    Err(CompareError::RequiredFieldNotFound("resume"))
                }
            }
            ScanState::LocateJobField => {
                let text = self.job_description.clone();
                if self.fill_first(JOB_FIELD, &text, Duration::ZERO).await {
                    Ok(ScanState::SubmitCompare)
                } else {
                    Err(CompareError::RequiredFieldNotFound("job description"))
                }
            }
            ScanState::SubmitCompare => {
                if self.click_first(SUBMIT).await {
                    Ok(ScanState::WaitForResults)
                } else {
                    Err(CompareError::SubmitAffordanceNotFound)
                }
            }
            ScanState::WaitForResults => {
                sleep(self.settings.results_wait).await;
                self.raw_content = self.page_content().await;
                Ok(ScanState::ExtractScore)
            }
            ScanState::ExtractScore => {
                self.match_score = self.extract_score().await;
                Ok(ScanState::ExtractDetails)
            }
            ScanState::ExtractDetails => {
                self.extract_details().await;
                Ok(ScanState::Done)
            }
            ScanState::Done | ScanState::Failed => Ok(state),
        }
    }

    async fn open_entry(&mut self) -> Result<(), CompareError> {
        let url = self.settings.entry_url.clone();
        match timeout(self.settings.navigation_timeout, self.session.goto(&url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CompareError::Navigation {
                url,
                reason: format!("{e:#}"),
            }),
            Err(_) => Err(CompareError::Navigation {
                url,
                reason: format!("timed out after {:?}", self.settings.navigation_timeout),
            }),
        }
    }

    async fn login(&mut self) -> Result<(), CompareError> {
        let Some(credentials) = self.settings.credentials.clone() else {
            return Ok(());
        };

        if self.click_first(SIGN_IN).await {
            sleep(self.settings.login_settle).await;
        }
        let email_filled = self.fill_first(EMAIL_FIELD, &credentials.email, Duration::ZERO).await;
        if !email_filled {
            return Err(CompareError::Login("no email field".into()));
        }
        if !self.fill_first(PASSWORD_FIELD, &credentials.password, Duration::ZERO).await {
            return Err(CompareError::Login("no password field".into()));
        }
        self.click_first(LOGIN_SUBMIT).await;
        sleep(self.settings.login_settle).await;
        self.open_entry().await
    }

    /// Fill the first field in `chain` that exists, retrying the whole chain
    /// until `wait` has elapsed. A zero `wait` makes a single pass.
    async fn fill_first(&self, chain: &[Locator], text: &str, wait: Duration) -> bool {
        // a zero wait makes one pass with the usual per-call bound
        let deadline = (!wait.is_zero()).then(|| Instant::now() + wait);
        loop {
            for locator in chain {
                let limit = match deadline {
                    Some(deadline) => {
                        let left = deadline.saturating_duration_since(Instant::now());
                        if left.is_zero() {
                            return false;
                        }
                        left.min(self.settings.step_timeout)
                    }
                    None => self.settings.step_timeout,
                };
                match self
                    .bounded_by(limit, "fill", self.session.fill(locator, text))
                    .await
                {
                    Ok(true) => {
                        tracing::debug!(?locator, "filled field");
                        return true;
                    }
                    Ok(false) => {}
                    Err(e) => tracing::debug!(?locator, "fill failed: {e}"),
                }
            }
            let Some(deadline) = deadline else {
                return false;
            };
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            sleep(FIELD_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn click_first(&self, chain: &[Locator]) -> bool {
        for locator in chain {
            match self.bounded("click", self.session.click(locator)).await {
                Ok(true) => {
                    tracing::debug!(?locator, "clicked");
                    return true;
                }
                Ok(false) => {}
                Err(e) => tracing::debug!(?locator, "click failed: {e}"),
            }
        }
        false
    }

    async fn text_of(&self, locator: &Locator) -> Option<String> {
        match self.bounded("read text", self.session.inner_text(locator)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(?locator, "reading text failed: {e}");
                None
            }
        }
    }

    async fn page_content(&self) -> String {
        self.bounded("read page", self.session.content())
            .await
            .unwrap_or_default()
    }

    /// Visible score regions first, then the raw markup. Not finding a score
    /// is not an error.
    async fn extract_score(&self) -> Option<u8> {
        for locator in SCORE_REGION {
            if let Some(score) = self.text_of(locator).await.as_deref().and_then(percentage_in) {
                return Some(score);
            }
        }
        score_in_markup(&self.raw_content)
    }

    async fn extract_details(&mut self) {
        for locator in RESULT_REGION {
            let Some(text) = self.text_of(locator).await else {
                continue;
            };
            if !looks_like_comparison(&text) {
                continue;
            }
            if self.match_score.is_none() {
                self.match_score = percentage_in(&text);
            }
            self.details = truncate_chars(&text, self.settings.max_details_len);
            return;
        }
    }

    async fn bounded<T>(
        &self,
        step: &'static str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, CompareError> {
        self.bounded_by(self.settings.step_timeout, step, call).await
    }

    async fn bounded_by<T>(
        &self,
        limit: Duration,
        step: &'static str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, CompareError> {
        match timeout(limit, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CompareError::Browser {
                step,
                reason: format!("{e:#}"),
            }),
            Err(_) => Err(CompareError::StepTimeout(step)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::testing::{ScriptedLauncher, ScriptedPage};

    const RESUME_PRIMARY: Locator = Locator::Css(r#"textarea[placeholder*="resume"]"#);
    const JOB_PRIMARY: Locator = Locator::Css(r#"textarea[placeholder*="job"]"#);
    const SCAN_BUTTON: Locator = Locator::Text { tag: "button", text: "Scan" };

    fn settings() -> CompareSettings {
        CompareSettings {
            entry_url: "https://compare.example.com/dashboard".into(),
            credentials: None,
            max_text_len: 15_000,
            max_details_len: 8_000,
            navigation_timeout: Duration::from_secs(5),
            step_timeout: Duration::from_secs(5),
            field_wait: Duration::ZERO,
            login_settle: Duration::ZERO,
            results_wait: Duration::ZERO,
            headless: true,
        }
    }

    fn engine(page: ScriptedPage, settings: CompareSettings) -> ComparisonEngine {
        let launcher = ScriptedLauncher { page, fail_launch: false };
        ComparisonEngine::new(Arc::new(launcher), settings)
    }

    fn ready_page() -> ScriptedPage {
        ScriptedPage {
            fields: vec![RESUME_PRIMARY, JOB_PRIMARY],
            buttons: vec![SCAN_BUTTON],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn extracts_score_from_result_region() {
        let mut page = ready_page();
        page.texts = vec![(Locator::Css("[class*='score']"), "87% match".into())];
        let result = engine(page.clone(), settings())
            .run_comparison("my resume", "the job")
            .await;

        assert!(result.success);
        assert_eq!(result.match_score, Some(87));
        assert_eq!(result.error, None);
        assert_eq!(result.summary, "Match score: 87%");
        assert_eq!(
            page.filled(),
            vec![
                (RESUME_PRIMARY, "my resume".to_string()),
                (JOB_PRIMARY, "the job".to_string())
            ]
        );
        assert_eq!(page.clicked(), vec![SCAN_BUTTON]);
    }

    #[tokio::test]
    async fn missing_resume_field_fails() {
        let page = ScriptedPage {
            buttons: vec![SCAN_BUTTON],
            ..Default::default()
        };
        let result = engine(page.clone(), settings())
            .run_comparison("resume", "job")
            .await;

        assert!(!result.success);
        assert_eq!(result.match_score, None);
        assert!(result.error.unwrap().contains("resume"));
        assert!(page.clicked().is_empty());
    }

    #[tokio::test]
    async fn resume_field_wait_is_bounded() {
        let mut s = settings();
        s.field_wait = Duration::from_millis(600);
        let started = Instant::now();
        let result = engine(ScriptedPage::default(), s).run_comparison("r", "j").await;

        assert!(!result.success);
        assert!(started.elapsed() >= Duration::from_millis(600));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn falls_back_to_positional_textareas() {
        let page = ScriptedPage {
            fields: vec![
                Locator::Nth { tag: "textarea", index: 0 },
                Locator::Nth { tag: "textarea", index: 1 },
            ],
            buttons: vec![Locator::Css("[type='submit']")],
            ..Default::default()
        };
        let result = engine(page.clone(), settings()).run_comparison("r", "j").await;

        assert!(result.success);
        assert_eq!(page.filled().len(), 2);
    }

    #[tokio::test]
    async fn missing_job_field_fails() {
        let page = ScriptedPage {
            fields: vec![RESUME_PRIMARY],
            buttons: vec![SCAN_BUTTON],
            ..Default::default()
        };
        let result = engine(page, settings()).run_comparison("r", "j").await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("job description"));
    }

    #[tokio::test]
    async fn missing_submit_button_fails() {
        let page = ScriptedPage {
            fields: vec![RESUME_PRIMARY, JOB_PRIMARY],
            html: "<html>diagnostic</html>".into(),
            ..Default::default()
        };
        let result = engine(page, settings()).run_comparison("r", "j").await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Could not find Scan/Compare button")
        );
        assert_eq!(result.raw_content, "<html>diagnostic</html>");
    }

    #[tokio::test]
    async fn absent_score_is_still_success() {
        let mut page = ready_page();
        page.texts = vec![(Locator::Css("main"), "Welcome to your dashboard".into())];
        let result = engine(page, settings()).run_comparison("r", "j").await;

        assert!(result.success);
        assert_eq!(result.match_score, None);
        assert!(result.summary.contains("could not be extracted"));
        assert_eq!(result.details, "");
    }

    #[tokio::test]
    async fn score_found_in_markup_and_details_truncated() {
        let mut page = ready_page();
        page.html = r#"<div class="x">Overall: 72 % match</div>"#.into();
        page.texts = vec![(Locator::Css("main"), "Keyword report ".repeat(100))];
        let mut s = settings();
        s.max_details_len = 20;
        let result = engine(page, s).run_comparison("r", "j").await;

        assert_eq!(result.match_score, Some(72));
        assert_eq!(result.details.chars().count(), 20);
    }

    #[tokio::test]
    async fn details_region_supplies_score_as_last_resort() {
        let mut page = ready_page();
        page.texts = vec![(Locator::Css("[class*='result']"), "You matched 55% of keywords".into())];
        let result = engine(page, settings()).run_comparison("r", "j").await;

        assert_eq!(result.match_score, Some(55));
        assert_eq!(result.details, "You matched 55% of keywords");
    }

    #[tokio::test]
    async fn long_inputs_are_truncated() {
        let page = ready_page();
        let mut s = settings();
        s.max_text_len = 10;
        let long = "x".repeat(50);
        engine(page.clone(), s).run_comparison(&long, &long).await;

        assert!(page.filled().iter().all(|(_, text)| text.len() == 10));
    }

    #[tokio::test]
    async fn navigation_failure_fails() {
        let page = ScriptedPage {
            fail_goto: true,
            ..ready_page()
        };
        let result = engine(page, settings()).run_comparison("r", "j").await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("ERR_NAME_NOT_RESOLVED"));
    }

    #[tokio::test]
    async fn launch_failure_fails() {
        let launcher = ScriptedLauncher {
            page: ScriptedPage::default(),
            fail_launch: true,
        };
        let engine = ComparisonEngine::new(Arc::new(launcher), settings());
        let result = engine.run_comparison("", "").await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn panics_become_failed_results() {
        let page = ScriptedPage {
            panic_on_click: true,
            ..ready_page()
        };
        let result = engine(page, settings()).run_comparison("r", "j").await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("renderer crashed"));
    }

    #[tokio::test]
    async fn login_is_attempted_and_failure_is_not_fatal() {
        let mut s = settings();
        s.credentials = Some(Credentials {
            email: "me@example.com".into(),
            password: "hunter2".into(),
        });

        // no login fields at all: continue anonymously
        let page = ready_page();
        let result = engine(page.clone(), s.clone()).run_comparison("r", "j").await;
        assert!(result.success);
        assert_eq!(page.visited().len(), 1);

        // full login form: fill credentials, then reopen the entry page
        let mut page = ready_page();
        page.fields.push(Locator::Css(r#"input[type="email"]"#));
        page.fields.push(Locator::Css(r#"input[type="password"]"#));
        page.buttons.push(Locator::Css(r#"button[type="submit"]"#));
        let result = engine(page.clone(), s).run_comparison("r", "j").await;
        assert!(result.success);
        assert_eq!(page.visited().len(), 2);
        assert!(
            page.filled()
                .contains(&(Locator::Css(r#"input[type="password"]"#), "hunter2".to_string()))
        );
    }

    #[tokio::test]
    async fn navigation_timeout_fails() {
        let page = ScriptedPage {
            hang_on_goto: true,
            ..ready_page()
        };
        let mut s = settings();
        s.navigation_timeout = Duration::from_millis(100);
        let started = Instant::now();
        let result = engine(page, s).run_comparison("r", "j").await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn stalled_fields_time_out_each_call() {
        let page = ScriptedPage {
            hang_on_fill: true,
            ..ready_page()
        };
        let mut s = settings();
        s.step_timeout = Duration::from_millis(50);
        let started = Instant::now();
        let result = engine(page.clone(), s).run_comparison("r", "j").await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("resume"));
        assert!(page.clicked().is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn field_wait_bounds_stalled_fills() {
        let page = ScriptedPage {
            hang_on_fill: true,
            ..ready_page()
        };
        let mut s = settings();
        s.field_wait = Duration::from_millis(200);
        s.step_timeout = Duration::from_secs(10);
        let started = Instant::now();
        let result = engine(page, s).run_comparison("r", "j").await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("resume"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            email: "me@example.com".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
