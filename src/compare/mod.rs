//! Resume/job comparison through a third-party web application.
//!
//! The browser is abstracted behind `BrowserLauncher` / `BrowserSession` so
//! the comparison state machine in `engine` can be driven against Chromium
//! (`chromium`) or a scripted page in tests.

pub mod chromium;
pub mod engine;
pub mod score;

use anyhow::Result;
use async_trait::async_trait;

/// How to find one element on a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// First element matching a CSS selector.
    Css(&'static str),
    /// First visible `tag` element whose text contains `text`.
    Text {
        tag: &'static str,
        text: &'static str,
    },
    /// The `index`-th `tag` element on the page, visible or not.
    Nth { tag: &'static str, index: usize },
}

/// Starts a fresh browser for each comparison.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, headless: bool) -> Result<Box<dyn BrowserSession>>;
}

/// One browser tab. Lookups that find nothing return `Ok(false)` /
/// `Ok(None)`; `Err` is reserved for the browser itself misbehaving.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Replace the value of the located field with `text`.
    async fn fill(&self, locator: &Locator, text: &str) -> Result<bool>;

    /// Click the located element if it is visible.
    async fn click(&self, locator: &Locator) -> Result<bool>;

    /// Rendered text of the located element.
    async fn inner_text(&self, locator: &Locator) -> Result<Option<String>>;

    /// Full page markup.
    async fn content(&self) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;
}
