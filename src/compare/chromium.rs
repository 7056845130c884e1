//! Chromium-backed browser sessions via chromiumoxide.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::compare::{BrowserLauncher, BrowserSession, Locator};

/// Launches a private Chromium per comparison.
pub struct ChromiumLauncher {
    chrome_path: Option<PathBuf>,
}

impl ChromiumLauncher {
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        ChromiumLauncher { chrome_path }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, headless: bool) -> Result<Box<dyn BrowserSession>> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if !headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("browser handler event error: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(e).context("failed to open a page");
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler,
        }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    async fn eval(&self, script: String) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }
}

/// JS expression yielding the located element or null. Lookups never throw.
fn locate_js(locator: &Locator) -> String {
    let quote = |s: &str| Value::String(s.to_string()).to_string();
    match locator {
        Locator::Css(selector) => format!(
            "(() => {{ try {{ return document.querySelector({}); }} catch (e) {{ return null; }} }})()",
            quote(selector)
        ),
        // case-insensitive and whitespace-collapsed, like a user reads it
        Locator::Text { tag, text } => format!(
            "Array.from(document.querySelectorAll({})).find(el => \
             (el.innerText || el.textContent || '').replace(/\\s+/g, ' ').toLowerCase().includes({}) \
             && {}) || null",
            quote(tag),
            quote(&normalize_text(text)),
            VISIBLE_JS
        ),
        Locator::Nth { tag, index } => format!(
            "document.querySelectorAll({})[{}] || null",
            quote(tag),
            index
        ),
    }
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Like `locate_js`, but CSS lookups skip hidden matches.
fn locate_visible_js(locator: &Locator) -> String {
    match locator {
        Locator::Css(selector) => format!(
            "(() => {{ try {{ return Array.from(document.querySelectorAll({})).find(el => {}) || null; }} \
             catch (e) {{ return null; }} }})()",
            Value::String(selector.to_string()),
            VISIBLE_JS
        ),
        _ => locate_js(locator),
    }
}

const VISIBLE_JS: &str = "(el.offsetWidth > 0 || el.offsetHeight > 0 || el.getClientRects().length > 0)";

fn fill_js(locator: &Locator, text: &str) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; \
         const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype \
           : el instanceof HTMLInputElement ? HTMLInputElement.prototype : null; \
         el.focus(); \
         if (proto) {{ Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, {}); }} \
         else {{ el.textContent = {}; }} \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
         return true; }})()",
        locate_visible_js(locator),
        Value::String(text.to_string()),
        Value::String(text.to_string()),
    )
}

fn click_js(locator: &Locator) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; \
         if (!{}) return false; el.click(); return true; }})()",
        locate_js(locator),
        VISIBLE_JS
    )
}

fn text_js(locator: &Locator) -> String {
    format!(
        "(() => {{ const el = {}; return el ? (el.innerText || el.textContent || '') : null; }})()",
        locate_js(locator)
    )
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("failed to open {url}"))?;
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<bool> {
        Ok(self.eval(fill_js(locator, text)).await?.as_bool().unwrap_or(false))
    }

    async fn click(&self, locator: &Locator) -> Result<bool> {
        Ok(self.eval(click_js(locator)).await?.as_bool().unwrap_or(false))
    }

    async fn inner_text(&self, locator: &Locator) -> Result<Option<String>> {
        Ok(match self.eval(text_js(locator)).await? {
            Value::String(text) => Some(text),
            _ => None,
        })
    }

    async fn content(&self) -> Result<String> {
        match self.eval("document.documentElement.outerHTML".to_string()).await? {
            Value::String(html) => Ok(html),
            other => anyhow::bail!("unexpected page content: {other}"),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            mut browser,
            page,
            handler,
        } = *self;
        if let Err(e) = page.close().await {
            tracing::debug!("closing page failed: {e}");
        }
        let closed = browser.close().await;
        handler.abort();
        closed.context("failed to close browser")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_quote_untrusted_text() {
        let script = fill_js(&Locator::Css("#resume-input"), "it's \"quoted\"\n</script>");
        assert!(script.contains(r#""it's \"quoted\"\n</script>""#));
        assert!(script.contains(r##"document.querySelectorAll("#resume-input")"##));
    }

    #[test]
    fn css_fills_skip_hidden_fields() {
        let script = fill_js(&Locator::Css("textarea"), "resume");
        assert!(script.contains(&format!(".find(el => {VISIBLE_JS})")));
        // positional fallback still takes hidden fields
        let script = fill_js(&Locator::Nth { tag: "textarea", index: 0 }, "resume");
        assert!(!script.contains("offsetWidth"));
    }

    #[test]
    fn text_match_ignores_case_and_spacing() {
        let script = locate_js(&Locator::Text { tag: "button", text: "Sign  In" });
        assert!(script.contains(r#".toLowerCase().includes("sign in")"#));
        assert!(script.contains(r"replace(/\s+/g, ' ')"));
    }

    #[test]
    fn positional_locator_indexes_all_matches() {
        let script = locate_js(&Locator::Nth { tag: "textarea", index: 1 });
        assert_eq!(script, r#"document.querySelectorAll("textarea")[1] || null"#);
    }

    #[test]
    fn clicks_require_visibility() {
        let script = click_js(&Locator::Text { tag: "button", text: "Scan" });
        assert!(script.contains("offsetWidth"));
        assert!(script.contains(r#".includes("scan")"#));
    }

    #[tokio::test]
    #[ignore = "requires a local Chromium"]
    async fn drives_a_real_page() {
        let session = ChromiumLauncher::new(None).launch(true).await.unwrap();
        let mut session = session;
        session
            .goto("data:text/html,<textarea id=r></textarea><button>Scan</button><div class=score>81% match</div>")
            .await
            .unwrap();
        assert!(session.fill(&Locator::Css("#r"), "hello").await.unwrap());
        assert!(session.click(&Locator::Text { tag: "button", text: "Scan" }).await.unwrap());
        assert_eq!(
            session.inner_text(&Locator::Css(".score")).await.unwrap().as_deref(),
            Some("81% match")
        );
        session.close().await.unwrap();
    }
}
